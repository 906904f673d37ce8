use std::collections::BTreeMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};
use crate::http_client::http_client;
use crate::model::{FeedGame, GameStatus, TeamMeta, Week};

/// Source of live game data for a season.
pub trait ScoreFeed: Send + Sync {
    fn fetch_week(&self, year: i32, week: Week) -> Result<Vec<FeedGame>>;

    /// Whole season, keyed by week. Used for healing after a reset or outage.
    fn fetch_season(&self, year: i32) -> Result<BTreeMap<Week, Vec<FeedGame>>>;
}

/// Run `call` on a worker thread and give up after `timeout`. A late answer
/// is dropped, so nothing downstream ever sees it.
fn call_bounded<T, F>(timeout: Duration, what: String, call: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(call());
    });
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(Error::FeedUnavailable(format!(
            "{what} exceeded {}ms",
            timeout.as_millis()
        ))),
        Err(RecvTimeoutError::Disconnected) => Err(Error::FeedUnavailable(format!(
            "{what}: feed worker exited without a result"
        ))),
    }
}

pub fn fetch_week_bounded(
    feed: &Arc<dyn ScoreFeed>,
    year: i32,
    week: Week,
    timeout: Duration,
) -> Result<Vec<FeedGame>> {
    let worker = Arc::clone(feed);
    call_bounded(timeout, format!("week {week} fetch"), move || {
        worker.fetch_week(year, week)
    })
}

pub fn fetch_season_bounded(
    feed: &Arc<dyn ScoreFeed>,
    year: i32,
    timeout: Duration,
) -> Result<BTreeMap<Week, Vec<FeedGame>>> {
    let worker = Arc::clone(feed);
    call_bounded(timeout, format!("season {year} fetch"), move || {
        worker.fetch_season(year)
    })
}

// ---- HTTP JSON feed -----------------------------------------------------

pub struct HttpScoreFeed {
    base_url: String,
    timeout: Duration,
}

impl HttpScoreFeed {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn get(&self, url: &str) -> anyhow::Result<String> {
        let client = http_client(self.timeout)?;
        let resp = client.get(url).send().context("request failed")?;
        let status = resp.status();
        let body = resp.text().context("failed reading body")?;
        if !status.is_success() {
            return Err(anyhow!("http {status}: {body}"));
        }
        Ok(body)
    }
}

impl ScoreFeed for HttpScoreFeed {
    fn fetch_week(&self, year: i32, week: Week) -> Result<Vec<FeedGame>> {
        let url = format!("{}/seasons/{year}/weeks/{week}", self.base_url);
        let body = self
            .get(&url)
            .map_err(|err| Error::FeedUnavailable(format!("{url}: {err:#}")))?;
        parse_week_json(&body)
    }

    fn fetch_season(&self, year: i32) -> Result<BTreeMap<Week, Vec<FeedGame>>> {
        let url = format!("{}/seasons/{year}", self.base_url);
        let body = self
            .get(&url)
            .map_err(|err| Error::FeedUnavailable(format!("{url}: {err:#}")))?;
        parse_season_json(&body)
    }
}

#[derive(Debug, Deserialize)]
struct WeekPayload {
    #[serde(default)]
    games: Vec<WireGame>,
}

#[derive(Debug, Deserialize)]
struct SeasonPayload {
    #[serde(default)]
    weeks: Vec<SeasonWeek>,
}

#[derive(Debug, Deserialize)]
struct SeasonWeek {
    week: Week,
    #[serde(default)]
    games: Vec<WireGame>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireGame {
    #[serde(default)]
    game_id: Value,
    home_team_id: i64,
    visitor_team_id: i64,
    kickoff: String,
    status: String,
    #[serde(default)]
    status_detail: Option<String>,
    #[serde(default)]
    home_score: Option<u32>,
    #[serde(default)]
    visitor_score: Option<u32>,
    #[serde(default)]
    spread: Option<f64>,
    #[serde(default)]
    home_team: Option<TeamMeta>,
    #[serde(default)]
    visitor_team: Option<TeamMeta>,
}

pub fn parse_week_json(raw: &str) -> Result<Vec<FeedGame>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let payload: WeekPayload = serde_json::from_str(trimmed)
        .map_err(|err| Error::FeedUnavailable(format!("invalid week json: {err}")))?;
    Ok(convert_games(payload.games))
}

pub fn parse_season_json(raw: &str) -> Result<BTreeMap<Week, Vec<FeedGame>>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(BTreeMap::new());
    }
    let payload: SeasonPayload = serde_json::from_str(trimmed)
        .map_err(|err| Error::FeedUnavailable(format!("invalid season json: {err}")))?;
    let mut out: BTreeMap<Week, Vec<FeedGame>> = BTreeMap::new();
    for week in payload.weeks {
        out.entry(week.week)
            .or_default()
            .extend(convert_games(week.games));
    }
    Ok(out)
}

fn convert_games(games: Vec<WireGame>) -> Vec<FeedGame> {
    games
        .into_iter()
        .filter_map(|wire| {
            let converted = convert_game(wire);
            if let Err(reason) = &converted {
                warn!("skipping malformed feed game: {reason}");
            }
            converted.ok()
        })
        .collect()
}

fn convert_game(wire: WireGame) -> std::result::Result<FeedGame, String> {
    let kickoff = parse_kickoff(&wire.kickoff)
        .ok_or_else(|| format!("bad kickoff {:?}", wire.kickoff))?;
    let status = GameStatus::parse(&wire.status)
        .ok_or_else(|| format!("bad status {:?}", wire.status))?;
    let feed_id = match &wire.game_id {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => format!("{}@{}", wire.home_team_id, wire.visitor_team_id),
    };
    let status_detail = wire
        .status_detail
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    Ok(FeedGame {
        feed_id,
        home_team_id: wire.home_team_id,
        visitor_team_id: wire.visitor_team_id,
        kickoff,
        status,
        status_detail,
        home_score: wire.home_score,
        visitor_score: wire.visitor_score,
        spread: wire.spread,
        home_team: wire.home_team,
        visitor_team: wire.visitor_team,
    })
}

fn parse_kickoff(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Epoch seconds show up in some feeds.
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

// ---- in-process feed ----------------------------------------------------

/// Feed backed by in-memory week data. Tests and offline runs swap weeks in
/// between ticks; `fail_with` and `delay` simulate an outage or a slow feed.
#[derive(Default)]
pub struct StaticFeed {
    weeks: Mutex<BTreeMap<Week, Vec<FeedGame>>>,
    failure: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
}

impl StaticFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_week(&self, week: Week, games: Vec<FeedGame>) {
        if let Ok(mut weeks) = self.weeks.lock() {
            weeks.insert(week, games);
        }
    }

    pub fn fail_with(&self, reason: Option<&str>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = reason.map(str::to_string);
        }
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        if let Ok(mut slot) = self.delay.lock() {
            *slot = delay;
        }
    }

    fn check(&self) -> Result<()> {
        let delay = self.delay.lock().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        let failure = self.failure.lock().ok().and_then(|f| f.clone());
        match failure {
            Some(reason) => Err(Error::FeedUnavailable(reason)),
            None => Ok(()),
        }
    }
}

impl ScoreFeed for StaticFeed {
    fn fetch_week(&self, _year: i32, week: Week) -> Result<Vec<FeedGame>> {
        self.check()?;
        let weeks = self
            .weeks
            .lock()
            .map_err(|_| Error::FeedUnavailable("static feed lock poisoned".to_string()))?;
        Ok(weeks.get(&week).cloned().unwrap_or_default())
    }

    fn fetch_season(&self, _year: i32) -> Result<BTreeMap<Week, Vec<FeedGame>>> {
        self.check()?;
        let weeks = self
            .weeks
            .lock()
            .map_err(|_| Error::FeedUnavailable("static feed lock poisoned".to_string()))?;
        Ok(weeks.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::parse_kickoff;

    #[test]
    fn kickoff_accepts_rfc3339_and_epoch() {
        let a = parse_kickoff("2026-09-10T20:20:00Z").unwrap();
        let b = parse_kickoff("2026-09-10T16:20:00-04:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(parse_kickoff(&a.timestamp().to_string()), Some(a));
        assert_eq!(parse_kickoff("next thursday"), None);
    }
}
