//! Tie-break, dense-rank and elimination rules shared by every standings view.
//!
//! Everything here is pure: the authoritative pipelines in `standings` and the
//! hypothetical projections in `whatif` both rank through [`assign_ranks`] with
//! the same keys, so the two can never disagree on ordering.

use std::cmp::Reverse;

use crate::model::{Outcome, SurvivorStatus, TeamId, UserId, Week};

/// How a user's tiebreaker guess compares to the actual last-game total.
/// Variant order is preference order: under beats over, over beats no guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TiebreakKey {
    /// Last game not final yet; tiebreakers are not compared.
    Unresolved,
    Under { distance: u32 },
    Over { distance: u32 },
    NoGuess,
}

pub fn tiebreak_key(guess: Option<u32>, last_score: Option<u32>) -> TiebreakKey {
    let Some(actual) = last_score else {
        return TiebreakKey::Unresolved;
    };
    let Some(guess) = guess else {
        return TiebreakKey::NoGuess;
    };
    if guess <= actual {
        TiebreakKey::Under {
            distance: actual - guess,
        }
    } else {
        TiebreakKey::Over {
            distance: guess - actual,
        }
    }
}

/// Ascending order of this key is standings order (best first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeeklyKey {
    points_earned: Reverse<u32>,
    games_correct: Reverse<u32>,
    tiebreak: TiebreakKey,
}

impl WeeklyKey {
    pub fn new(points_earned: u32, games_correct: u32, tiebreak: TiebreakKey) -> Self {
        Self {
            points_earned: Reverse(points_earned),
            games_correct: Reverse(games_correct),
            tiebreak,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OverallKey {
    points_earned: Reverse<u32>,
    games_correct: Reverse<u32>,
}

impl OverallKey {
    pub fn new(points_earned: u32, games_correct: u32) -> Self {
        Self {
            points_earned: Reverse(points_earned),
            games_correct: Reverse(games_correct),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurvivorKey {
    alive: Reverse<bool>,
    weeks_survived: Reverse<u32>,
}

impl SurvivorKey {
    pub fn new(alive: bool, weeks_survived: u32) -> Self {
        Self {
            alive: Reverse(alive),
            weeks_survived: Reverse(weeks_survived),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranked<T> {
    pub rank: u32,
    pub tied: bool,
    pub item: T,
}

/// Sort by `key` (ascending = better) with user id as a stable secondary
/// order, then fold once carrying `(rank, previous key)`. Equal keys share a
/// rank and are all flagged tied; the next distinct key gets `rank + 1`.
pub fn assign_ranks<T, K, F, U>(items: Vec<T>, key: F, user_id: U) -> Vec<Ranked<T>>
where
    K: Ord + Copy,
    F: Fn(&T) -> K,
    U: Fn(&T) -> UserId,
{
    let mut keyed: Vec<(K, T)> = items.into_iter().map(|item| (key(&item), item)).collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| user_id(&a.1).cmp(&user_id(&b.1))));

    let (ranked, _) = keyed.into_iter().fold(
        (Vec::<Ranked<T>>::new(), None::<(u32, K)>),
        |(mut out, prev), (k, item)| {
            let rank = match prev {
                Some((rank, prev_key)) if prev_key == k => {
                    if let Some(last) = out.last_mut() {
                        last.tied = true;
                    }
                    out.push(Ranked {
                        rank,
                        tied: true,
                        item,
                    });
                    rank
                }
                Some((rank, _)) => {
                    out.push(Ranked {
                        rank: rank + 1,
                        tied: false,
                        item,
                    });
                    rank + 1
                }
                None => {
                    out.push(Ranked {
                        rank: 1,
                        tied: false,
                        item,
                    });
                    1
                }
            };
            (out, Some((rank, k)))
        },
    );
    ranked
}

/// A user is eliminated when some other user has already earned more than
/// this user can still reach (`possible`). Compares against the best earned
/// total among the others, so a sole leader is measured against the runner-up.
pub fn elimination_flags(earned_possible: &[(u32, u32)]) -> Vec<bool> {
    let mut best: Option<(u32, usize)> = None;
    let mut second: Option<u32> = None;
    for (idx, (earned, _)) in earned_possible.iter().enumerate() {
        match best {
            Some((top, _)) if *earned <= top => {
                second = Some(second.map_or(*earned, |s| s.max(*earned)));
            }
            Some((top, _)) => {
                second = Some(top);
                best = Some((*earned, idx));
            }
            None => best = Some((*earned, idx)),
        }
    }

    earned_possible
        .iter()
        .enumerate()
        .map(|(idx, (_, possible))| {
            let rival = match best {
                Some((_, leader)) if leader == idx => second,
                Some((top, _)) => Some(top),
                None => None,
            };
            rival.is_some_and(|r| r > *possible)
        })
        .collect()
}

/// Alive/dead classification for one user in one week.
///
/// A missing team only kills the entry once the week is under way; before
/// the first kickoff the user can still pick.
pub fn classify_survivor_week(
    deleted: bool,
    team_id: Option<TeamId>,
    outcome: Option<Outcome>,
    week_started: bool,
) -> SurvivorStatus {
    if deleted {
        return SurvivorStatus::Dead;
    }
    let Some(team_id) = team_id else {
        return if week_started {
            SurvivorStatus::Dead
        } else {
            SurvivorStatus::Waiting
        };
    };
    match outcome {
        None => SurvivorStatus::Waiting,
        Some(Outcome::Winner(winner)) if winner == team_id => SurvivorStatus::Alive,
        Some(_) => SurvivorStatus::Dead,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurvivorRecord {
    pub alive: bool,
    pub weeks_survived: u32,
    pub eliminated_week: Option<Week>,
    pub last_status: Option<SurvivorStatus>,
}

/// Fold per-week statuses (any order; sorted here) into the season view.
/// Dead is absorbing: nothing after the first dead week can revive the entry.
pub fn fold_survivor_weeks(weeks: &[(Week, SurvivorStatus)]) -> SurvivorRecord {
    let mut sorted = weeks.to_vec();
    sorted.sort_by_key(|(week, _)| *week);

    sorted.into_iter().fold(
        SurvivorRecord {
            alive: true,
            weeks_survived: 0,
            eliminated_week: None,
            last_status: None,
        },
        |mut acc, (week, status)| {
            if !acc.alive {
                acc.last_status = Some(SurvivorStatus::Dead);
                return acc;
            }
            match status {
                SurvivorStatus::Alive => acc.weeks_survived += 1,
                SurvivorStatus::Dead => {
                    acc.alive = false;
                    acc.eliminated_week = Some(week);
                }
                SurvivorStatus::Waiting => {}
            }
            acc.last_status = Some(status);
            acc
        },
    )
}
