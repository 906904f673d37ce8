use std::sync::Mutex;

use anyhow::Result;
use tracing::info;

use crate::model::{OverallStandingsRow, UserId, Week, WeeklyStandingsRow};

/// Downstream side effects the orchestrator triggers. Calls are fire and
/// forget: an `Err` is logged and never undoes standings that were already
/// committed.
pub trait SeasonHooks: Send + Sync {
    fn week_started(&self, week: Week) -> Result<()>;

    fn week_ended(&self, week: Week, standings: &[WeeklyStandingsRow]) -> Result<()>;

    /// `winners` are the rank-1 rows of the final weekly standings.
    fn request_payouts(&self, week: Week, winners: &[WeeklyStandingsRow]) -> Result<()>;

    fn enforce_late_payments(&self, week: Week) -> Result<()>;

    fn season_ended(&self, _standings: &[OverallStandingsRow]) -> Result<()> {
        Ok(())
    }
}

/// Writes every hook call to the log and does nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHooks;

impl SeasonHooks for LoggingHooks {
    fn week_started(&self, week: Week) -> Result<()> {
        info!(week, "week started");
        Ok(())
    }

    fn week_ended(&self, week: Week, standings: &[WeeklyStandingsRow]) -> Result<()> {
        info!(week, entrants = standings.len(), "week ended");
        Ok(())
    }

    fn request_payouts(&self, week: Week, winners: &[WeeklyStandingsRow]) -> Result<()> {
        let ids: Vec<UserId> = winners.iter().map(|r| r.user_id).collect();
        info!(week, ?ids, "payouts requested");
        Ok(())
    }

    fn enforce_late_payments(&self, week: Week) -> Result<()> {
        info!(week, "late payment enforcement requested");
        Ok(())
    }

    fn season_ended(&self, standings: &[OverallStandingsRow]) -> Result<()> {
        let champions: Vec<UserId> = standings
            .iter()
            .filter(|r| r.rank == 1)
            .map(|r| r.user_id)
            .collect();
        info!(?champions, "season complete");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    WeekStarted(Week),
    WeekEnded(Week),
    Payouts { week: Week, winners: Vec<UserId> },
    LatePayments(Week),
    SeasonEnded { champions: Vec<UserId> },
}

/// Keeps a list of the calls it received. Used by tests and the simulator.
#[derive(Debug, Default)]
pub struct RecordingHooks {
    events: Mutex<Vec<HookEvent>>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<HookEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    fn push(&self, event: HookEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl SeasonHooks for RecordingHooks {
    fn week_started(&self, week: Week) -> Result<()> {
        self.push(HookEvent::WeekStarted(week));
        Ok(())
    }

    fn week_ended(&self, week: Week, _standings: &[WeeklyStandingsRow]) -> Result<()> {
        self.push(HookEvent::WeekEnded(week));
        Ok(())
    }

    fn request_payouts(&self, week: Week, winners: &[WeeklyStandingsRow]) -> Result<()> {
        self.push(HookEvent::Payouts {
            week,
            winners: winners.iter().map(|r| r.user_id).collect(),
        });
        Ok(())
    }

    fn enforce_late_payments(&self, week: Week) -> Result<()> {
        self.push(HookEvent::LatePayments(week));
        Ok(())
    }

    fn season_ended(&self, standings: &[OverallStandingsRow]) -> Result<()> {
        self.push(HookEvent::SeasonEnded {
            champions: standings
                .iter()
                .filter(|r| r.rank == 1)
                .map(|r| r.user_id)
                .collect(),
        });
        Ok(())
    }
}
