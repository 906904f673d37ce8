//! Season progress orchestrator: one `tick` per scheduler interval.
//!
//! A tick fetches the current week from the feed (bounded by a timeout, before
//! any write), walks the week's games in kickoff order applying the sync and
//! the pick guard, recomputes standings when a game went final, and fires the
//! end-of-week side effects once every game of the week is final.
//!
//! Every step is safe to repeat: a crashed or overlapping tick leaves some
//! games updated and others not, and the next tick derives the same result
//! from the same feed data. Week completion is read back from stored state
//! (`store::week_settled`), so a week whose last final landed on a tick that
//! died early stays current until a later tick closes it.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::feed::{ScoreFeed, fetch_season_bounded, fetch_week_bounded};
use crate::guard;
use crate::hooks::SeasonHooks;
use crate::model::{FeedGame, Game, GameId, GameStatus, Pipeline, Week, WeeklyStandingsRow};
use crate::standings::{RecomputeOutcome, StandingsEngine};
use crate::store;
use crate::sync;

#[derive(Debug, Default)]
pub struct TickReport {
    pub week: Option<Week>,
    pub games_seen: usize,
    pub kickoffs: Vec<GameId>,
    pub finals: Vec<GameId>,
    pub picks_locked: usize,
    pub survivors_removed: usize,
    pub inconsistencies: Vec<String>,
    pub recomputed: Vec<(Pipeline, RecomputeOutcome)>,
    pub recompute_failures: Vec<(Pipeline, String)>,
    pub week_completed: bool,
    pub season_completed: bool,
}

impl TickReport {
    fn record_recompute(&mut self, pipeline: Pipeline, result: Result<RecomputeOutcome>) {
        match result {
            Ok(outcome) => self.recomputed.push((pipeline, outcome)),
            Err(err) => self.recompute_failures.push((pipeline, err.to_string())),
        }
    }
}

pub struct Orchestrator {
    conn: Connection,
    feed: Arc<dyn ScoreFeed>,
    hooks: Arc<dyn SeasonHooks>,
    engine: Arc<StandingsEngine>,
}

impl Orchestrator {
    pub fn new(
        conn: Connection,
        feed: Arc<dyn ScoreFeed>,
        hooks: Arc<dyn SeasonHooks>,
        engine: Arc<StandingsEngine>,
    ) -> Self {
        Self {
            conn,
            feed,
            hooks,
            engine,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<TickReport> {
        let mut report = TickReport::default();
        let Some(week) = store::current_week(&self.conn)? else {
            debug!("no games seeded, nothing to do");
            return Ok(report);
        };
        report.week = Some(week);

        let cfg = self.engine.config().clone();
        let feed_games =
            match fetch_week_bounded(&self.feed, cfg.season_year, week, cfg.feed_timeout) {
                Ok(games) => games,
                Err(err) => {
                    error!(week, "tick aborted: {err}");
                    return Err(err);
                }
            };

        let (matched, unmatched) = sync::match_feed_games(&self.conn, week, &feed_games)?;
        report.inconsistencies.extend(unmatched);
        report.games_seen = matched.len();
        let first_game_id = store::load_week_games(&self.conn, week)?
            .first()
            .map(|g| g.id);

        let settled_before = store::week_settled(&self.conn, week)?;
        let mut standings_dirty = false;
        for (stored, feed) in &matched {
            let is_first = Some(stored.id) == first_game_id;
            match self.advance_game(stored, feed, is_first, now, &mut report) {
                Ok(became_final) => standings_dirty |= became_final,
                Err(Error::DataInconsistency(msg)) => {
                    warn!(week, game_id = stored.id, "{msg}");
                    report.inconsistencies.push(msg);
                }
                Err(err) => {
                    warn!(week, game_id = stored.id, "game update failed: {err}");
                    report
                        .inconsistencies
                        .push(format!("game {}: {err}", stored.id));
                }
            }
        }

        let week_games = store::load_week_games(&self.conn, week)?;
        let all_final =
            !week_games.is_empty() && week_games.iter().all(|g| g.status == GameStatus::Final);
        let closing = all_final && (!settled_before || !report.finals.is_empty());

        if standings_dirty || closing {
            for (pipeline, result) in self.engine.recompute_all(&mut self.conn, week) {
                report.record_recompute(pipeline, result);
            }
        }

        if closing {
            if store::week_settled(&self.conn, week)? {
                report.week_completed = true;
                self.finish_week(week, &mut report)?;
            } else {
                warn!(week, "weekly standings not settled, end of week retried next tick");
            }
        }

        info!(
            week,
            games = report.games_seen,
            kickoffs = report.kickoffs.len(),
            finals = report.finals.len(),
            "tick complete"
        );
        Ok(report)
    }

    /// Returns whether the game went final on this tick.
    fn advance_game(
        &mut self,
        stored: &Game,
        feed: &FeedGame,
        is_first_game: bool,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> Result<bool> {
        for team in [&feed.home_team, &feed.visitor_team].into_iter().flatten() {
            store::upsert_team(&self.conn, team)?;
        }

        if now < feed.kickoff || feed.status == GameStatus::Pregame {
            store::update_game_schedule(&self.conn, stored.id, feed.kickoff, feed.spread)?;
            return Ok(false);
        }

        let transition = sync::reconcile(stored, feed, now)?;

        if transition.was_kickoff {
            report.kickoffs.push(stored.id);
            report.picks_locked += guard::guard_game(&self.conn, stored.week, stored.id)?;
            if is_first_game {
                self.start_week(stored.week, report)?;
            }
        }

        sync::apply(&self.conn, stored, &transition)?;

        if transition.became_final() {
            report.finals.push(stored.id);
            return Ok(true);
        }
        Ok(false)
    }

    fn start_week(&mut self, week: Week, report: &mut TickReport) -> Result<()> {
        fire("week_started", week, self.hooks.week_started(week));
        report.survivors_removed += guard::sweep_survivor(&self.conn, week)?;
        let result = self.engine.recompute_survivor(&mut self.conn, week);
        report.record_recompute(Pipeline::Survivor, result);
        Ok(())
    }

    fn finish_week(&mut self, week: Week, report: &mut TickReport) -> Result<()> {
        let standings = store::load_weekly_standings(&self.conn, week)?;
        let winners: Vec<WeeklyStandingsRow> =
            standings.iter().filter(|r| r.rank == 1).cloned().collect();
        info!(week, winners = winners.len(), "week complete");

        fire("request_payouts", week, self.hooks.request_payouts(week, &winners));
        fire("week_ended", week, self.hooks.week_ended(week, &standings));
        fire(
            "enforce_late_payments",
            week,
            self.hooks.enforce_late_payments(week),
        );

        let last_week: Option<Week> =
            self.conn
                .query_row("SELECT MAX(week) FROM games", [], |row| row.get(0))?;
        if last_week == Some(week) {
            report.season_completed = true;
            let overall = store::load_overall_standings(&self.conn)?;
            fire("season_ended", week, self.hooks.season_ended(&overall));
        }
        Ok(())
    }

    /// Pull the whole season from the feed and bring every stored game up to
    /// date, locking missed picks on any game that has started. Every week
    /// whose games changed gets its weekly standings rebuilt; the overall and
    /// survivor views are rebuilt through the current week. Fires no
    /// notifications. Used after a reset or a long outage.
    pub fn heal_season(&mut self, now: DateTime<Utc>) -> Result<TickReport> {
        let cfg = self.engine.config().clone();
        let season = fetch_season_bounded(&self.feed, cfg.season_year, cfg.feed_timeout)?;

        let mut report = TickReport::default();
        let mut changed_weeks = BTreeSet::new();
        for (week, games) in &season {
            let synced = sync::sync_week(&self.conn, *week, games, now)?;
            report.inconsistencies.extend(synced.inconsistencies);
            report.games_seen += synced.transitions.len();
            for transition in &synced.transitions {
                if transition.new_status != GameStatus::Pregame {
                    report.picks_locked +=
                        guard::guard_game(&self.conn, transition.week, transition.game_id)?;
                }
                if transition.status_changed() {
                    changed_weeks.insert(transition.week);
                }
                if transition.became_final() {
                    report.finals.push(transition.game_id);
                }
            }
        }

        for week in &changed_weeks {
            let result = self.engine.recompute_weekly(&mut self.conn, *week);
            report.record_recompute(Pipeline::Weekly, result);
        }

        let week = store::current_week(&self.conn)?;
        report.week = week;
        if let Some(week) = week {
            if !changed_weeks.contains(&week) {
                let result = self.engine.recompute_weekly(&mut self.conn, week);
                report.record_recompute(Pipeline::Weekly, result);
            }
            let result = self.engine.recompute_overall(&mut self.conn, week);
            report.record_recompute(Pipeline::Overall, result);
            let result = self.engine.recompute_survivor(&mut self.conn, week);
            report.record_recompute(Pipeline::Survivor, result);
        }
        debug!(weeks = changed_weeks.len(), "weekly standings rebuilt by heal");
        Ok(report)
    }
}

fn fire(hook: &str, week: Week, result: anyhow::Result<()>) {
    if let Err(err) = result {
        warn!(week, hook, "downstream call failed: {err:#}");
    }
}
