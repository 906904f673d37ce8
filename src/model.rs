use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type GameId = i64;
pub type UserId = i64;
pub type TeamId = i64;
pub type Week = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Pregame,
    InProgress,
    Final,
}

impl GameStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::Pregame => "pregame",
            GameStatus::InProgress => "in_progress",
            GameStatus::Final => "final",
        }
    }

    /// Lenient parse of feed/database status strings. Anything that is clearly
    /// mid-game (quarters, halftime, overtime) collapses into `InProgress`.
    /// Games that are off or not yet underway (postponed, delayed, suspended,
    /// cancelled) stay `Pregame` so they never trip the kickoff guard.
    /// Unrecognised strings are rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let s = raw.trim().to_ascii_lowercase();
        match s.as_str() {
            "pregame" | "pre" | "scheduled" | "p" | "tbd" | "delayed" | "suspended" => {
                Some(GameStatus::Pregame)
            }
            "final" | "f" | "fo" | "final_ot" | "final overtime" => Some(GameStatus::Final),
            "in_progress" | "in progress" | "inprogress" | "live" | "halftime" | "half"
            | "ot" | "overtime" => Some(GameStatus::InProgress),
            "" => None,
            _ if s.starts_with("final") => Some(GameStatus::Final),
            _ if s.starts_with("postpone") || s.starts_with("cancel") => {
                Some(GameStatus::Pregame)
            }
            _ if is_period_marker(&s) => Some(GameStatus::InProgress),
            _ => None,
        }
    }
}

/// "q3", "2nd", "3rd quarter", "end of 1st", "2ot".
fn is_period_marker(s: &str) -> bool {
    let s = s.strip_prefix("end of ").unwrap_or(s);
    let s = s.strip_suffix(" quarter").unwrap_or(s);
    if let Some(rest) = s.strip_prefix('q') {
        return !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit());
    }
    if let Some(n) = s.strip_suffix("ot") {
        return n.chars().all(|c| c.is_ascii_digit());
    }
    matches!(s, "1st" | "2nd" | "3rd" | "4th")
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a finished game. A tie has no winning team, so every pick on it
/// is scored as wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Winner(TeamId),
    Tie,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Game {
    pub id: GameId,
    pub week: Week,
    pub home_team_id: TeamId,
    pub visitor_team_id: TeamId,
    pub kickoff: DateTime<Utc>,
    pub status: GameStatus,
    pub status_detail: Option<String>,
    pub home_score: Option<u32>,
    pub visitor_score: Option<u32>,
    pub winner_team_id: Option<TeamId>,
    pub spread: Option<f64>,
}

impl Game {
    pub fn scheduled(
        id: GameId,
        week: Week,
        home_team_id: TeamId,
        visitor_team_id: TeamId,
        kickoff: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            week,
            home_team_id,
            visitor_team_id,
            kickoff,
            status: GameStatus::Pregame,
            status_detail: None,
            home_score: None,
            visitor_score: None,
            winner_team_id: None,
            spread: None,
        }
    }

    pub fn has_team(&self, team_id: TeamId) -> bool {
        self.home_team_id == team_id || self.visitor_team_id == team_id
    }

    /// Known only once the game is Final with both scores present.
    pub fn outcome(&self) -> Option<Outcome> {
        if self.status != GameStatus::Final {
            return None;
        }
        derive_outcome(
            self.home_team_id,
            self.visitor_team_id,
            self.home_score,
            self.visitor_score,
        )
    }

    pub fn combined_score(&self) -> Option<u32> {
        if self.status != GameStatus::Final {
            return None;
        }
        Some(self.home_score? + self.visitor_score?)
    }

    pub fn has_kicked_off(&self, now: DateTime<Utc>) -> bool {
        now >= self.kickoff || self.status != GameStatus::Pregame
    }
}

pub fn derive_outcome(
    home_team_id: TeamId,
    visitor_team_id: TeamId,
    home_score: Option<u32>,
    visitor_score: Option<u32>,
) -> Option<Outcome> {
    let (Some(home), Some(visitor)) = (home_score, visitor_score) else {
        return None;
    };
    if home > visitor {
        Some(Outcome::Winner(home_team_id))
    } else if visitor > home {
        Some(Outcome::Winner(visitor_team_id))
    } else {
        Some(Outcome::Tie)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pick {
    pub user_id: UserId,
    pub game_id: GameId,
    pub team_id: Option<TeamId>,
    pub points: Option<u32>,
    /// Set by the integrity guard when the game kicked off with no team chosen.
    pub missed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tiebreaker {
    pub user_id: UserId,
    pub week: Week,
    pub score: Option<u32>,
    pub submitted: bool,
}

impl Tiebreaker {
    pub fn submitted_score(&self) -> Option<u32> {
        if self.submitted { self.score } else { None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurvivorPick {
    pub user_id: UserId,
    pub week: Week,
    pub team_id: Option<TeamId>,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TeamMeta {
    pub id: TeamId,
    #[serde(default)]
    pub abbreviation: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub losses: u32,
    #[serde(default)]
    pub ties: u32,
}

/// One game as reported by the score feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedGame {
    pub feed_id: String,
    pub home_team_id: TeamId,
    pub visitor_team_id: TeamId,
    pub kickoff: DateTime<Utc>,
    pub status: GameStatus,
    pub status_detail: Option<String>,
    pub home_score: Option<u32>,
    pub visitor_score: Option<u32>,
    pub spread: Option<f64>,
    pub home_team: Option<TeamMeta>,
    pub visitor_team: Option<TeamMeta>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pipeline {
    Weekly,
    Overall,
    Survivor,
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Pipeline::Weekly => "weekly",
            Pipeline::Overall => "overall",
            Pipeline::Survivor => "survivor",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyStandingsRow {
    pub week: Week,
    pub rank: u32,
    pub tied: bool,
    pub user_id: UserId,
    pub points_earned: u32,
    pub points_wrong: u32,
    pub points_possible: u32,
    pub points_total: u32,
    pub games_correct: u32,
    pub games_wrong: u32,
    pub games_missed: u32,
    pub tiebreaker_score: Option<u32>,
    pub last_score: Option<u32>,
    pub eliminated: bool,
    /// Every game of the week was Final when this row was computed.
    pub week_final: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverallStandingsRow {
    pub through_week: Week,
    pub rank: u32,
    pub tied: bool,
    pub user_id: UserId,
    pub points_earned: u32,
    pub points_wrong: u32,
    pub points_possible: u32,
    pub points_total: u32,
    pub games_correct: u32,
    pub games_wrong: u32,
    pub games_missed: u32,
    pub eliminated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SurvivorStatus {
    Alive,
    Dead,
    Waiting,
}

impl SurvivorStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SurvivorStatus::Alive => "alive",
            SurvivorStatus::Dead => "dead",
            SurvivorStatus::Waiting => "waiting",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "alive" => Some(SurvivorStatus::Alive),
            "dead" => Some(SurvivorStatus::Dead),
            "waiting" => Some(SurvivorStatus::Waiting),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurvivorStandingsRow {
    pub through_week: Week,
    pub rank: u32,
    pub tied: bool,
    pub user_id: UserId,
    pub alive: bool,
    pub weeks_survived: u32,
    pub current_status: SurvivorStatus,
    pub current_team_id: Option<TeamId>,
    pub eliminated_week: Option<Week>,
}
