//! Weekly, overall and survivor standings pipelines.
//!
//! Each pipeline reads its inputs, ranks them in memory and swaps the stored
//! snapshot inside one IMMEDIATE transaction, so readers see either the old
//! table or the new one. A second trigger for a pipeline that is already
//! running in this process is skipped; the running one produces the same rows.

use std::sync::{Mutex, MutexGuard, TryLockError};

use rusqlite::{Connection, TransactionBehavior};
use tracing::{error, info};

use crate::aggregate::{self, WeekSnapshot};
use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::model::{Pipeline, Week};
use crate::store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeOutcome {
    Replaced { rows: usize },
    Skipped,
}

pub struct StandingsEngine {
    cfg: PoolConfig,
    weekly: Mutex<()>,
    overall: Mutex<()>,
    survivor: Mutex<()>,
}

impl StandingsEngine {
    pub fn new(cfg: PoolConfig) -> Self {
        Self {
            cfg,
            weekly: Mutex::new(()),
            overall: Mutex::new(()),
            survivor: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.cfg
    }

    fn lock_for(&self, pipeline: Pipeline) -> &Mutex<()> {
        match pipeline {
            Pipeline::Weekly => &self.weekly,
            Pipeline::Overall => &self.overall,
            Pipeline::Survivor => &self.survivor,
        }
    }

    fn try_claim(&self, pipeline: Pipeline) -> Option<MutexGuard<'_, ()>> {
        match self.lock_for(pipeline).try_lock() {
            Ok(guard) => Some(guard),
            // A panic mid-recompute never committed anything; the lock is still usable.
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    pub fn recompute(
        &self,
        conn: &mut Connection,
        pipeline: Pipeline,
        week: Week,
    ) -> Result<RecomputeOutcome> {
        let Some(_claim) = self.try_claim(pipeline) else {
            info!(%pipeline, week, "recompute already in flight, skipped");
            return Ok(RecomputeOutcome::Skipped);
        };

        let result = swap_in_transaction(conn, pipeline, |tx| match pipeline {
            Pipeline::Weekly => {
                let snapshot = WeekSnapshot {
                    week,
                    games: store::load_week_games(tx, week)?,
                    picks: store::load_picks_for_week(tx, week)?,
                    tiebreakers: store::load_tiebreakers(tx, week)?,
                };
                let rows = aggregate::weekly_standings(&snapshot, &self.cfg);
                store::replace_weekly_standings(tx, week, &rows)?;
                Ok(rows.len())
            }
            Pipeline::Overall => {
                let games = store::load_games_through(tx, week)?;
                let picks = store::load_picks_through(tx, week)?;
                let rows = aggregate::overall_standings(week, &games, &picks, &self.cfg);
                store::replace_overall_standings(tx, &rows)?;
                Ok(rows.len())
            }
            Pipeline::Survivor => {
                let games = store::load_games_through(tx, week)?;
                let picks = store::load_survivor_picks_through(tx, week)?;
                let rows = aggregate::survivor_standings(week, &games, &picks);
                store::replace_survivor_standings(tx, &rows)?;
                Ok(rows.len())
            }
        });

        match result {
            Ok(rows) => {
                info!(%pipeline, week, rows, "standings replaced");
                Ok(RecomputeOutcome::Replaced { rows })
            }
            Err(err) => {
                error!(%pipeline, week, "standings recompute failed: {err}");
                Err(err)
            }
        }
    }

    pub fn recompute_weekly(&self, conn: &mut Connection, week: Week) -> Result<RecomputeOutcome> {
        self.recompute(conn, Pipeline::Weekly, week)
    }

    pub fn recompute_overall(&self, conn: &mut Connection, week: Week) -> Result<RecomputeOutcome> {
        self.recompute(conn, Pipeline::Overall, week)
    }

    pub fn recompute_survivor(
        &self,
        conn: &mut Connection,
        week: Week,
    ) -> Result<RecomputeOutcome> {
        self.recompute(conn, Pipeline::Survivor, week)
    }

    /// Weekly, then overall, then survivor. A failure in one does not stop
    /// the others.
    pub fn recompute_all(
        &self,
        conn: &mut Connection,
        week: Week,
    ) -> Vec<(Pipeline, Result<RecomputeOutcome>)> {
        [Pipeline::Weekly, Pipeline::Overall, Pipeline::Survivor]
            .into_iter()
            .map(|pipeline| (pipeline, self.recompute(conn, pipeline, week)))
            .collect()
    }
}

/// Run `build` inside an IMMEDIATE transaction and commit. Any error drops the
/// transaction, which rolls it back and leaves the previous snapshot in place.
fn swap_in_transaction<F>(conn: &mut Connection, pipeline: Pipeline, build: F) -> Result<usize>
where
    F: FnOnce(&Connection) -> Result<usize>,
{
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|err| Error::recompute(pipeline, err))?;
    let written = build(&tx).map_err(|err| match err {
        Error::Database(source) => Error::recompute(pipeline, source),
        other => other,
    })?;
    tx.commit().map_err(|err| Error::recompute(pipeline, err))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::{RecomputeOutcome, StandingsEngine};
    use crate::config::PoolConfig;
    use crate::model::Pipeline;
    use crate::store;

    #[test]
    fn second_trigger_is_skipped_while_first_holds_the_lock() {
        let engine = StandingsEngine::new(PoolConfig::default());
        let mut conn = store::open_in_memory().unwrap();

        let held = engine.weekly.lock().unwrap();
        let outcome = engine.recompute(&mut conn, Pipeline::Weekly, 1).unwrap();
        assert_eq!(outcome, RecomputeOutcome::Skipped);

        // Other pipelines are independent of the held one.
        let outcome = engine.recompute(&mut conn, Pipeline::Overall, 1).unwrap();
        assert_eq!(outcome, RecomputeOutcome::Replaced { rows: 0 });
        drop(held);

        let outcome = engine.recompute(&mut conn, Pipeline::Weekly, 1).unwrap();
        assert_eq!(outcome, RecomputeOutcome::Replaced { rows: 0 });
    }

    #[test]
    fn failed_swap_keeps_previous_snapshot() {
        let engine = StandingsEngine::new(PoolConfig::default());
        let mut conn = store::open_in_memory().unwrap();
        conn.execute(
            "INSERT INTO overall_standings (through_week, rank, user_id, tied, points_earned,
                points_wrong, points_possible, points_total, games_correct, games_wrong,
                games_missed, eliminated)
             VALUES (1, 1, 42, 0, 5, 0, 5, 5, 2, 0, 0, 0)",
            [],
        )
        .unwrap();
        conn.execute_batch("DROP TABLE picks;").unwrap();

        let err = engine.recompute(&mut conn, Pipeline::Overall, 1).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::RecomputeFailure {
                pipeline: Pipeline::Overall,
                ..
            }
        ));
        let rows = store::load_overall_standings(&conn).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, 42);
    }
}
