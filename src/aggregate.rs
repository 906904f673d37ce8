use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::warn;

use crate::config::PoolConfig;
use crate::model::{
    Game, GameId, GameStatus, Outcome, OverallStandingsRow, Pick, SurvivorPick,
    SurvivorStandingsRow, SurvivorStatus, Tiebreaker, UserId, Week, WeeklyStandingsRow,
};
use crate::ranking::{
    OverallKey, SurvivorKey, WeeklyKey, assign_ranks, classify_survivor_week,
    elimination_flags, fold_survivor_weeks, tiebreak_key,
};

/// Everything the weekly view is computed from.
#[derive(Debug, Clone, Default)]
pub struct WeekSnapshot {
    pub week: Week,
    pub games: Vec<Game>,
    pub picks: Vec<Pick>,
    pub tiebreakers: Vec<Tiebreaker>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PickTally {
    pub user_id: UserId,
    pub points_earned: u32,
    pub points_wrong: u32,
    pub points_total: u32,
    pub games_correct: u32,
    pub games_wrong: u32,
    pub games_missed: u32,
}

impl PickTally {
    pub fn points_possible(&self) -> u32 {
        self.points_total.saturating_sub(self.points_wrong)
    }
}

/// Fold picks into per-user counters.
///
/// Correct picks add their points to earned; wrong picks (winner known, other
/// team, or a tie) add to wrong. A missed pick can never score, so its points
/// go to wrong as well, and it counts toward GamesMissed when its week is past
/// the payment-due threshold.
pub fn tally_picks(
    games: &HashMap<GameId, &Game>,
    picks: &[Pick],
    cfg: &PoolConfig,
) -> BTreeMap<UserId, PickTally> {
    let mut out: BTreeMap<UserId, PickTally> = BTreeMap::new();
    for pick in picks {
        let tally = out.entry(pick.user_id).or_insert_with(|| PickTally {
            user_id: pick.user_id,
            ..PickTally::default()
        });
        let Some(game) = games.get(&pick.game_id) else {
            warn!(user_id = pick.user_id, game_id = pick.game_id, "pick references unknown game");
            continue;
        };
        let points = pick.points.unwrap_or(0);
        tally.points_total += points;

        let outcome = game.outcome();
        match pick.team_id {
            Some(team_id) => {
                let Some(outcome) = outcome else { continue };
                if outcome == Outcome::Winner(team_id) {
                    tally.points_earned += points;
                    tally.games_correct += 1;
                } else {
                    tally.points_wrong += points;
                    tally.games_wrong += 1;
                }
            }
            None => {
                if !(pick.missed || outcome.is_some()) {
                    continue;
                }
                tally.points_wrong += points;
                if cfg.missed_counts_in(game.week) {
                    tally.games_missed += 1;
                }
            }
        }
    }
    out
}

/// Last game of the week by kickoff; its combined score settles tiebreakers.
pub fn last_game(games: &[Game]) -> Option<&Game> {
    games.iter().max_by(|a, b| a.kickoff.cmp(&b.kickoff).then(a.id.cmp(&b.id)))
}

pub fn weekly_standings(snapshot: &WeekSnapshot, cfg: &PoolConfig) -> Vec<WeeklyStandingsRow> {
    let week_games: Vec<Game> = snapshot
        .games
        .iter()
        .filter(|g| g.week == snapshot.week)
        .cloned()
        .collect();
    let last_score = last_game(&week_games).and_then(Game::combined_score);
    rank_week(snapshot, cfg, last_score)
}

/// Weekly ranking with the last-game total supplied by the caller.
pub(crate) fn rank_week(
    snapshot: &WeekSnapshot,
    cfg: &PoolConfig,
    last_score: Option<u32>,
) -> Vec<WeeklyStandingsRow> {
    let games: HashMap<GameId, &Game> = snapshot
        .games
        .iter()
        .filter(|g| g.week == snapshot.week)
        .map(|g| (g.id, g))
        .collect();
    let picks: Vec<Pick> = snapshot
        .picks
        .iter()
        .filter(|p| games.contains_key(&p.game_id))
        .cloned()
        .collect();
    let tallies = tally_picks(&games, &picks, cfg);
    let week_final =
        !games.is_empty() && games.values().all(|g| g.status == GameStatus::Final);

    let guesses: HashMap<UserId, Option<u32>> = snapshot
        .tiebreakers
        .iter()
        .filter(|t| t.week == snapshot.week)
        .map(|t| (t.user_id, t.submitted_score()))
        .collect();

    let items: Vec<(PickTally, Option<u32>)> = tallies
        .into_values()
        .map(|t| {
            let guess = guesses.get(&t.user_id).copied().flatten();
            (t, guess)
        })
        .collect();
    let ranked = assign_ranks(
        items,
        |(t, guess)| {
            WeeklyKey::new(
                t.points_earned,
                t.games_correct,
                tiebreak_key(*guess, last_score),
            )
        },
        |(t, _)| t.user_id,
    );
    let flags = elimination_flags(
        &ranked
            .iter()
            .map(|r| (r.item.0.points_earned, r.item.0.points_possible()))
            .collect::<Vec<_>>(),
    );

    ranked
        .into_iter()
        .zip(flags)
        .map(|(r, eliminated)| {
            let (t, guess) = r.item;
            WeeklyStandingsRow {
                week: snapshot.week,
                rank: r.rank,
                tied: r.tied,
                user_id: t.user_id,
                points_earned: t.points_earned,
                points_wrong: t.points_wrong,
                points_possible: t.points_possible(),
                points_total: t.points_total,
                games_correct: t.games_correct,
                games_wrong: t.games_wrong,
                games_missed: t.games_missed,
                tiebreaker_score: guess,
                last_score,
                eliminated,
                week_final,
            }
        })
        .collect()
}

/// Season-to-date view over every week up to and including `through_week`.
pub fn overall_standings(
    through_week: Week,
    games: &[Game],
    picks: &[Pick],
    cfg: &PoolConfig,
) -> Vec<OverallStandingsRow> {
    let games: HashMap<GameId, &Game> = games
        .iter()
        .filter(|g| g.week <= through_week)
        .map(|g| (g.id, g))
        .collect();
    let picks: Vec<Pick> = picks
        .iter()
        .filter(|p| games.contains_key(&p.game_id))
        .cloned()
        .collect();
    let tallies = tally_picks(&games, &picks, cfg);

    let ranked = assign_ranks(
        tallies.into_values().collect(),
        |t| OverallKey::new(t.points_earned, t.games_correct),
        |t| t.user_id,
    );
    let flags = elimination_flags(
        &ranked
            .iter()
            .map(|r| (r.item.points_earned, r.item.points_possible()))
            .collect::<Vec<_>>(),
    );

    ranked
        .into_iter()
        .zip(flags)
        .map(|(r, eliminated)| OverallStandingsRow {
            through_week,
            rank: r.rank,
            tied: r.tied,
            user_id: r.item.user_id,
            points_earned: r.item.points_earned,
            points_wrong: r.item.points_wrong,
            points_possible: r.item.points_possible(),
            points_total: r.item.points_total,
            games_correct: r.item.games_correct,
            games_wrong: r.item.games_wrong,
            games_missed: r.item.games_missed,
            eliminated,
        })
        .collect()
}

/// Survivor view through `through_week`. Entrants are users holding any
/// survivor row; a week with games but no row for an entrant counts as an
/// unpicked week.
pub fn survivor_standings(
    through_week: Week,
    games: &[Game],
    survivor_picks: &[SurvivorPick],
) -> Vec<SurvivorStandingsRow> {
    let mut games_by_week: BTreeMap<Week, Vec<&Game>> = BTreeMap::new();
    for game in games.iter().filter(|g| g.week <= through_week) {
        games_by_week.entry(game.week).or_default().push(game);
    }
    let entrants: BTreeSet<UserId> = survivor_picks.iter().map(|p| p.user_id).collect();
    let by_user_week: HashMap<(UserId, Week), &SurvivorPick> = survivor_picks
        .iter()
        .filter(|p| p.week <= through_week)
        .map(|p| ((p.user_id, p.week), p))
        .collect();

    let items: Vec<SurvivorStandingsRow> = entrants
        .into_iter()
        .map(|user_id| {
            let statuses: Vec<_> = games_by_week
                .iter()
                .map(|(week, week_games)| {
                    let pick = by_user_week.get(&(user_id, *week));
                    let deleted = pick.is_some_and(|p| p.deleted);
                    let team_id = pick.and_then(|p| p.team_id);
                    let outcome = team_id.and_then(|team| {
                        week_games
                            .iter()
                            .find(|g| g.has_team(team))
                            .and_then(|g| g.outcome())
                    });
                    let week_started = week_games.iter().any(|g| g.status != GameStatus::Pregame);
                    (
                        *week,
                        classify_survivor_week(deleted, team_id, outcome, week_started),
                    )
                })
                .collect();
            let record = fold_survivor_weeks(&statuses);
            let current_status = if record.alive {
                statuses
                    .iter()
                    .find(|(week, _)| *week == through_week)
                    .map(|(_, status)| *status)
                    .or(record.last_status)
                    .unwrap_or(SurvivorStatus::Waiting)
            } else {
                SurvivorStatus::Dead
            };
            SurvivorStandingsRow {
                through_week,
                rank: 0,
                tied: false,
                user_id,
                alive: record.alive,
                weeks_survived: record.weeks_survived,
                current_status,
                current_team_id: by_user_week
                    .get(&(user_id, through_week))
                    .and_then(|p| p.team_id),
                eliminated_week: record.eliminated_week,
            }
        })
        .collect();

    assign_ranks(
        items,
        |row| SurvivorKey::new(row.alive, row.weeks_survived),
        |row| row.user_id,
    )
    .into_iter()
    .map(|r| SurvivorStandingsRow {
        rank: r.rank,
        tied: r.tied,
        ..r.item
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::last_game;
    use crate::model::Game;

    fn game(id: i64, hour: u32) -> Game {
        let kickoff = Utc.with_ymd_and_hms(2026, 9, 13, hour, 0, 0).unwrap();
        Game::scheduled(id, 1, id * 10, id * 10 + 1, kickoff)
    }

    #[test]
    fn last_game_breaks_kickoff_ties_by_id() {
        let games = vec![game(3, 20), game(7, 20), game(5, 17)];
        assert_eq!(last_game(&games).map(|g| g.id), Some(7));
    }
}
