//! Hypothetical weekly standings: "if these games go this way, where do I
//! finish?" Ranked by the same aggregation and comparator as the stored
//! standings, so a projection that matches reality matches the real table.

use std::collections::HashMap;

use tracing::warn;

use crate::aggregate::{WeekSnapshot, last_game, rank_week};
use crate::config::PoolConfig;
use crate::model::{Game, GameId, GameStatus, TeamId, WeeklyStandingsRow};

#[derive(Debug, Clone, Default)]
pub struct Assumptions {
    /// Assumed winner per unfinished game. Final games keep their real result.
    pub winners: HashMap<GameId, TeamId>,
    /// Assumed combined score of the week's last game, used only while that
    /// game is not final.
    pub last_score: Option<u32>,
}

pub fn project_week(
    snapshot: &WeekSnapshot,
    assumed: &Assumptions,
    cfg: &PoolConfig,
) -> Vec<WeeklyStandingsRow> {
    let real: Vec<Game> = snapshot
        .games
        .iter()
        .filter(|g| g.week == snapshot.week)
        .cloned()
        .collect();
    // The synthetic scores below say nothing about the real total.
    let last_score = last_game(&real)
        .and_then(Game::combined_score)
        .or(assumed.last_score);

    let projected = WeekSnapshot {
        week: snapshot.week,
        games: real
            .iter()
            .map(|game| apply_assumption(game, assumed.winners.get(&game.id).copied()))
            .collect(),
        picks: snapshot.picks.clone(),
        tiebreakers: snapshot.tiebreakers.clone(),
    };
    rank_week(&projected, cfg, last_score)
}

fn apply_assumption(game: &Game, winner: Option<TeamId>) -> Game {
    if game.status == GameStatus::Final {
        return game.clone();
    }
    let Some(winner) = winner else {
        return game.clone();
    };
    if !game.has_team(winner) {
        warn!(game_id = game.id, team_id = winner, "assumed winner is not in this game");
        return game.clone();
    }
    let (home_score, visitor_score) = if winner == game.home_team_id {
        (1, 0)
    } else {
        (0, 1)
    };
    Game {
        status: GameStatus::Final,
        home_score: Some(home_score),
        visitor_score: Some(visitor_score),
        winner_team_id: Some(winner),
        ..game.clone()
    }
}
