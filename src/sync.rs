//! Merge feed games into persisted game rows and report per-game status
//! transitions. No ranking happens here.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{FeedGame, Game, GameId, GameStatus, Outcome, Week, derive_outcome};
use crate::store;

#[derive(Debug, Clone, PartialEq)]
pub struct GameTransition {
    pub game_id: GameId,
    pub week: Week,
    pub old_status: GameStatus,
    pub new_status: GameStatus,
    /// The game crossed its kickoff on this sync: it was stored as Pregame and
    /// the feed now reports it under way (or done) at or after kickoff.
    pub was_kickoff: bool,
    /// Row as it should look after applying the feed data.
    pub updated: Game,
}

impl GameTransition {
    pub fn status_changed(&self) -> bool {
        self.old_status != self.new_status
    }

    pub fn became_final(&self) -> bool {
        self.new_status == GameStatus::Final && self.old_status != GameStatus::Final
    }
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub transitions: Vec<GameTransition>,
    pub inconsistencies: Vec<String>,
}

/// Pair each feed game with its persisted row (by week and teams), in
/// kickoff order. Unmatched feed games are reported, not fatal.
pub fn match_feed_games(
    conn: &Connection,
    week: Week,
    feed_games: &[FeedGame],
) -> Result<(Vec<(Game, FeedGame)>, Vec<String>)> {
    let mut matched = Vec::with_capacity(feed_games.len());
    let mut inconsistencies = Vec::new();
    for feed in feed_games {
        match store::find_game_by_teams(conn, week, feed.home_team_id, feed.visitor_team_id)? {
            Some(game) => matched.push((game, feed.clone())),
            None => {
                let msg = format!(
                    "week {week}: feed game {} ({} vs {}) has no persisted match",
                    feed.feed_id, feed.home_team_id, feed.visitor_team_id
                );
                warn!(week, feed_id = %feed.feed_id, "{msg}");
                inconsistencies.push(msg);
            }
        }
    }
    matched.sort_by(|a, b| a.0.kickoff.cmp(&b.0.kickoff).then(a.0.id.cmp(&b.0.id)));
    Ok((matched, inconsistencies))
}

/// Work out what the stored row becomes given the feed's view. Pure.
pub fn reconcile(stored: &Game, feed: &FeedGame, now: DateTime<Utc>) -> Result<GameTransition> {
    // Feeds sometimes flip home/visitor; scores follow the stored orientation.
    let (home_score, visitor_score) = if feed.home_team_id == stored.home_team_id {
        (feed.home_score, feed.visitor_score)
    } else {
        (feed.visitor_score, feed.home_score)
    };

    if stored.status == GameStatus::Final && feed.status != GameStatus::Final {
        return Err(Error::DataInconsistency(format!(
            "game {}: feed reports {} after final",
            stored.id, feed.status
        )));
    }

    let mut winner_team_id = None;
    if feed.status == GameStatus::Final {
        match derive_outcome(stored.home_team_id, stored.visitor_team_id, home_score, visitor_score)
        {
            Some(Outcome::Winner(team)) => winner_team_id = Some(team),
            Some(Outcome::Tie) => {}
            None => {
                return Err(Error::DataInconsistency(format!(
                    "game {}: final without both scores",
                    stored.id
                )));
            }
        }
    }

    let updated = Game {
        kickoff: feed.kickoff,
        status: feed.status,
        status_detail: feed.status_detail.clone(),
        home_score,
        visitor_score,
        winner_team_id,
        spread: feed.spread.or(stored.spread),
        ..stored.clone()
    };
    let was_kickoff = stored.status == GameStatus::Pregame
        && feed.status != GameStatus::Pregame
        && now >= feed.kickoff;

    Ok(GameTransition {
        game_id: stored.id,
        week: stored.week,
        old_status: stored.status,
        new_status: feed.status,
        was_kickoff,
        updated,
    })
}

pub fn apply(conn: &Connection, stored: &Game, transition: &GameTransition) -> Result<()> {
    if stored.status == GameStatus::Final
        && (stored.home_score != transition.updated.home_score
            || stored.visitor_score != transition.updated.visitor_score)
    {
        warn!(
            week = transition.week,
            game_id = transition.game_id,
            "corrective re-sync of final score {:?}-{:?} -> {:?}-{:?}",
            stored.home_score,
            stored.visitor_score,
            transition.updated.home_score,
            transition.updated.visitor_score
        );
    }
    if &transition.updated == stored {
        debug!(game_id = transition.game_id, "no change");
        return Ok(());
    }
    store::apply_game_state(conn, &transition.updated)?;
    if transition.status_changed() {
        info!(
            week = transition.week,
            game_id = transition.game_id,
            "status {} -> {}",
            transition.old_status,
            transition.new_status
        );
    }
    Ok(())
}

/// Match, reconcile and persist a whole week of feed games. Per-game problems
/// are collected and the rest of the week still goes through.
pub fn sync_week(
    conn: &Connection,
    week: Week,
    feed_games: &[FeedGame],
    now: DateTime<Utc>,
) -> Result<SyncReport> {
    let (matched, mut inconsistencies) = match_feed_games(conn, week, feed_games)?;
    let mut transitions = Vec::with_capacity(matched.len());
    for (stored, feed) in matched {
        match reconcile(&stored, &feed, now) {
            Ok(transition) => {
                apply(conn, &stored, &transition)?;
                transitions.push(transition);
            }
            Err(Error::DataInconsistency(msg)) => {
                warn!(week, game_id = stored.id, "{msg}");
                inconsistencies.push(msg);
            }
            Err(err) => return Err(err),
        }
    }
    Ok(SyncReport {
        transitions,
        inconsistencies,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::reconcile;
    use crate::error::Error;
    use crate::model::{FeedGame, Game, GameStatus};

    fn stored() -> Game {
        let kickoff = Utc.with_ymd_and_hms(2026, 9, 13, 17, 0, 0).unwrap();
        Game::scheduled(1, 1, 10, 20, kickoff)
    }

    fn feed(status: GameStatus, home: Option<u32>, visitor: Option<u32>) -> FeedGame {
        let game = stored();
        FeedGame {
            feed_id: "g1".to_string(),
            home_team_id: game.home_team_id,
            visitor_team_id: game.visitor_team_id,
            kickoff: game.kickoff,
            status,
            status_detail: None,
            home_score: home,
            visitor_score: visitor,
            spread: None,
            home_team: None,
            visitor_team: None,
        }
    }

    #[test]
    fn kickoff_is_detected_once() {
        let game = stored();
        let now = game.kickoff + Duration::minutes(5);
        let t = reconcile(&game, &feed(GameStatus::InProgress, Some(0), Some(0)), now).unwrap();
        assert!(t.was_kickoff);

        let t2 = reconcile(&t.updated, &feed(GameStatus::InProgress, Some(7), Some(0)), now).unwrap();
        assert!(!t2.was_kickoff);
        assert!(!t2.status_changed());
    }

    #[test]
    fn swapped_orientation_keeps_stored_scores_aligned() {
        let game = stored();
        let mut f = feed(GameStatus::Final, Some(3), Some(27));
        std::mem::swap(&mut f.home_team_id, &mut f.visitor_team_id);
        let t = reconcile(&game, &f, game.kickoff + Duration::hours(4)).unwrap();
        assert_eq!(t.updated.home_score, Some(27));
        assert_eq!(t.updated.visitor_score, Some(3));
        assert_eq!(t.updated.winner_team_id, Some(10));
        assert!(t.became_final());
    }

    #[test]
    fn final_without_scores_is_inconsistent() {
        let game = stored();
        let err = reconcile(&game, &feed(GameStatus::Final, None, Some(3)), game.kickoff).unwrap_err();
        assert!(matches!(err, Error::DataInconsistency(_)));
    }

    #[test]
    fn final_never_regresses() {
        let mut game = stored();
        game.status = GameStatus::Final;
        game.home_score = Some(10);
        game.visitor_score = Some(9);
        let err = reconcile(&game, &feed(GameStatus::InProgress, Some(10), Some(9)), game.kickoff)
            .unwrap_err();
        assert!(matches!(err, Error::DataInconsistency(_)));
    }
}
