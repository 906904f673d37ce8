use rusqlite::Connection;
use tracing::info;

use crate::error::Result;
use crate::model::{GameId, Week};
use crate::store;

/// Lock in every unset pick on a game that has kicked off. The pick stays
/// null, keeps its point value, and can no longer be changed. A second run
/// finds nothing left to lock.
pub fn guard_game(conn: &Connection, week: Week, game_id: GameId) -> Result<usize> {
    let locked = store::finalize_missed_picks(conn, game_id)?;
    if locked > 0 {
        info!(week, game_id, locked, "finalized missed picks");
    }
    Ok(locked)
}

/// Remove from this week's survivor pool everyone who had not chosen a team
/// by the first kickoff.
pub fn sweep_survivor(conn: &Connection, week: Week) -> Result<usize> {
    let removed = store::soft_delete_unpicked_survivors(conn, week)?;
    if removed > 0 {
        info!(week, removed, "survivor entries without a pick removed");
    }
    Ok(removed)
}
