use thiserror::Error;

use crate::model::{GameId, Pipeline, UserId};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The score feed timed out, was unreachable, or returned a payload we could not parse.
    /// Aborts the whole tick before anything is written.
    #[error("score feed unavailable: {0}")]
    FeedUnavailable(String),

    /// A single game could not be reconciled (no persisted match, Final without scores).
    /// Only that game is skipped.
    #[error("data inconsistency: {0}")]
    DataInconsistency(String),

    /// A pipeline transaction failed; the previous snapshot stays authoritative.
    #[error("{pipeline} standings recompute failed: {source}")]
    RecomputeFailure {
        pipeline: Pipeline,
        #[source]
        source: rusqlite::Error,
    },

    #[error("pick for user {user_id} on game {game_id} is locked")]
    GuardViolation { user_id: UserId, game_id: GameId },

    #[error("invalid pick: {0}")]
    InvalidPick(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn recompute(pipeline: Pipeline, source: rusqlite::Error) -> Self {
        Error::RecomputeFailure { pipeline, source }
    }
}
