use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::{Error, Result};
use crate::model::{
    Game, GameId, GameStatus, OverallStandingsRow, Pick, SurvivorPick, SurvivorStandingsRow,
    SurvivorStatus, TeamId, TeamMeta, Tiebreaker, UserId, Week, WeeklyStandingsRow,
};

const BUSY_TIMEOUT_SECS: u64 = 5;

impl ToSql for GameStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for GameStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        GameStatus::parse(raw)
            .ok_or_else(|| FromSqlError::Other(format!("unknown game status {raw:?}").into()))
    }
}

impl ToSql for SurvivorStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SurvivorStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        SurvivorStatus::parse(raw)
            .ok_or_else(|| FromSqlError::Other(format!("unknown survivor status {raw:?}").into()))
    }
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS teams (
            team_id INTEGER PRIMARY KEY,
            abbreviation TEXT NOT NULL,
            name TEXT NOT NULL,
            wins INTEGER NOT NULL DEFAULT 0,
            losses INTEGER NOT NULL DEFAULT 0,
            ties INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS games (
            game_id INTEGER PRIMARY KEY,
            week INTEGER NOT NULL,
            home_team_id INTEGER NOT NULL,
            visitor_team_id INTEGER NOT NULL,
            kickoff TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pregame',
            status_detail TEXT NULL,
            home_score INTEGER NULL,
            visitor_score INTEGER NULL,
            winner_team_id INTEGER NULL,
            spread REAL NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (week, home_team_id, visitor_team_id)
        );
        CREATE INDEX IF NOT EXISTS idx_games_week ON games(week, kickoff);
        CREATE INDEX IF NOT EXISTS idx_games_status ON games(status);

        CREATE TABLE IF NOT EXISTS picks (
            user_id INTEGER NOT NULL,
            game_id INTEGER NOT NULL REFERENCES games(game_id) ON DELETE CASCADE,
            team_id INTEGER NULL,
            points INTEGER NULL,
            missed INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (user_id, game_id)
        );
        CREATE INDEX IF NOT EXISTS idx_picks_game ON picks(game_id);

        CREATE TRIGGER IF NOT EXISTS picks_missed_locked
        BEFORE UPDATE OF team_id, points ON picks
        WHEN OLD.missed = 1
        BEGIN
            SELECT RAISE(ABORT, 'pick finalized as missed');
        END;

        CREATE TABLE IF NOT EXISTS tiebreakers (
            user_id INTEGER NOT NULL,
            week INTEGER NOT NULL,
            score INTEGER NULL,
            submitted INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (user_id, week)
        );

        CREATE TABLE IF NOT EXISTS survivor_picks (
            user_id INTEGER NOT NULL,
            week INTEGER NOT NULL,
            team_id INTEGER NULL,
            deleted INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (user_id, week)
        );

        CREATE TABLE IF NOT EXISTS weekly_standings (
            week INTEGER NOT NULL,
            rank INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            tied INTEGER NOT NULL,
            points_earned INTEGER NOT NULL,
            points_wrong INTEGER NOT NULL,
            points_possible INTEGER NOT NULL,
            points_total INTEGER NOT NULL,
            games_correct INTEGER NOT NULL,
            games_wrong INTEGER NOT NULL,
            games_missed INTEGER NOT NULL,
            tiebreaker_score INTEGER NULL,
            last_score INTEGER NULL,
            eliminated INTEGER NOT NULL,
            week_final INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (week, user_id)
        );

        CREATE TABLE IF NOT EXISTS overall_standings (
            through_week INTEGER NOT NULL,
            rank INTEGER NOT NULL,
            user_id INTEGER PRIMARY KEY,
            tied INTEGER NOT NULL,
            points_earned INTEGER NOT NULL,
            points_wrong INTEGER NOT NULL,
            points_possible INTEGER NOT NULL,
            points_total INTEGER NOT NULL,
            games_correct INTEGER NOT NULL,
            games_wrong INTEGER NOT NULL,
            games_missed INTEGER NOT NULL,
            eliminated INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS survivor_standings (
            through_week INTEGER NOT NULL,
            rank INTEGER NOT NULL,
            user_id INTEGER PRIMARY KEY,
            tied INTEGER NOT NULL,
            alive INTEGER NOT NULL,
            weeks_survived INTEGER NOT NULL,
            current_status TEXT NOT NULL,
            current_team_id INTEGER NULL,
            eliminated_week INTEGER NULL
        );
        "#,
    )?;
    Ok(())
}

// ---- season setup -------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SeasonSeed {
    pub games: Vec<Game>,
    pub users: Vec<UserId>,
    pub survivor_users: Vec<UserId>,
}

/// Insert the season's games plus one empty pick per user/game, one tiebreaker
/// per user/week and one survivor row per entrant/week. Points stay unassigned.
pub fn seed_season(conn: &mut Connection, seed: &SeasonSeed) -> Result<()> {
    let tx = conn.transaction()?;
    let now = Utc::now();
    for game in &seed.games {
        tx.execute(
            r#"
            INSERT INTO games (
                game_id, week, home_team_id, visitor_team_id, kickoff,
                status, status_detail, home_score, visitor_score, winner_team_id,
                spread, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                game.id,
                game.week,
                game.home_team_id,
                game.visitor_team_id,
                game.kickoff,
                game.status,
                game.status_detail,
                game.home_score,
                game.visitor_score,
                game.winner_team_id,
                game.spread,
                now,
            ],
        )?;
        for user_id in &seed.users {
            tx.execute(
                "INSERT INTO picks (user_id, game_id) VALUES (?1, ?2)",
                params![user_id, game.id],
            )?;
        }
    }

    let mut weeks: Vec<Week> = seed.games.iter().map(|g| g.week).collect();
    weeks.sort_unstable();
    weeks.dedup();
    for week in &weeks {
        for user_id in &seed.users {
            tx.execute(
                "INSERT INTO tiebreakers (user_id, week) VALUES (?1, ?2)",
                params![user_id, week],
            )?;
        }
        for user_id in &seed.survivor_users {
            tx.execute(
                "INSERT INTO survivor_picks (user_id, week) VALUES (?1, ?2)",
                params![user_id, week],
            )?;
        }
    }
    tx.commit()?;
    Ok(())
}

// ---- games --------------------------------------------------------------

const GAME_COLUMNS: &str = "game_id, week, home_team_id, visitor_team_id, kickoff, status, \
     status_detail, home_score, visitor_score, winner_team_id, spread";

fn game_from_row(row: &Row<'_>) -> rusqlite::Result<Game> {
    Ok(Game {
        id: row.get(0)?,
        week: row.get(1)?,
        home_team_id: row.get(2)?,
        visitor_team_id: row.get(3)?,
        kickoff: row.get(4)?,
        status: row.get(5)?,
        status_detail: row.get(6)?,
        home_score: row.get(7)?,
        visitor_score: row.get(8)?,
        winner_team_id: row.get(9)?,
        spread: row.get(10)?,
    })
}

pub fn load_games(conn: &Connection) -> Result<Vec<Game>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {GAME_COLUMNS} FROM games ORDER BY week ASC, kickoff ASC, game_id ASC"
    ))?;
    let rows = stmt.query_map([], game_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Games of one week in kickoff order.
pub fn load_week_games(conn: &Connection, week: Week) -> Result<Vec<Game>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {GAME_COLUMNS} FROM games WHERE week = ?1 ORDER BY kickoff ASC, game_id ASC"
    ))?;
    let rows = stmt.query_map(params![week], game_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn load_games_through(conn: &Connection, week: Week) -> Result<Vec<Game>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {GAME_COLUMNS} FROM games WHERE week <= ?1 ORDER BY week ASC, kickoff ASC, game_id ASC"
    ))?;
    let rows = stmt.query_map(params![week], game_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn load_game(conn: &Connection, game_id: GameId) -> Result<Option<Game>> {
    let game = conn
        .query_row(
            &format!("SELECT {GAME_COLUMNS} FROM games WHERE game_id = ?1"),
            params![game_id],
            game_from_row,
        )
        .optional()?;
    Ok(game)
}

/// Lookup by week and the two teams; home/visitor orientation is not trusted.
pub fn find_game_by_teams(
    conn: &Connection,
    week: Week,
    team_a: TeamId,
    team_b: TeamId,
) -> Result<Option<Game>> {
    let game = conn
        .query_row(
            &format!(
                "SELECT {GAME_COLUMNS} FROM games
                 WHERE week = ?1
                   AND ((home_team_id = ?2 AND visitor_team_id = ?3)
                     OR (home_team_id = ?3 AND visitor_team_id = ?2))"
            ),
            params![week, team_a, team_b],
            game_from_row,
        )
        .optional()?;
    Ok(game)
}

/// The week the season is on. An all-final week whose end-of-week step has
/// not landed yet (see [`week_settled`]) comes first; otherwise the lowest week
/// that still has a non-final game; the last week once every game is final;
/// `None` when no games are seeded.
pub fn current_week(conn: &Connection) -> Result<Option<Week>> {
    let unsettled: Option<Week> = conn
        .query_row(
            r#"
            SELECT g.week
            FROM games g
            GROUP BY g.week
            HAVING SUM(CASE WHEN g.status <> 'final' THEN 1 ELSE 0 END) = 0
               AND EXISTS (
                   SELECT 1 FROM picks p JOIN games pg ON pg.game_id = p.game_id
                   WHERE pg.week = g.week
               )
               AND NOT EXISTS (
                   SELECT 1 FROM weekly_standings s
                   WHERE s.week = g.week AND s.week_final = 1
               )
            ORDER BY g.week ASC
            LIMIT 1
            "#,
            [],
            |row| row.get(0),
        )
        .optional()?;
    if unsettled.is_some() {
        return Ok(unsettled);
    }
    let open: Option<Week> = conn.query_row(
        "SELECT MIN(week) FROM games WHERE status <> 'final'",
        [],
        |row| row.get(0),
    )?;
    if open.is_some() {
        return Ok(open);
    }
    let last: Option<Week> = conn.query_row("SELECT MAX(week) FROM games", [], |row| row.get(0))?;
    Ok(last)
}

/// Whether the stored weekly snapshot was computed from an all-final week.
/// A week nobody has picks in has nothing to settle and always counts.
pub fn week_settled(conn: &Connection, week: Week) -> Result<bool> {
    let settled: bool = conn.query_row(
        r#"
        SELECT NOT EXISTS (
                   SELECT 1 FROM picks p JOIN games g ON g.game_id = p.game_id
                   WHERE g.week = ?1
               )
            OR EXISTS (
                   SELECT 1 FROM weekly_standings
                   WHERE week = ?1 AND week_final = 1
               )
        "#,
        params![week],
        |row| row.get(0),
    )?;
    Ok(settled)
}

pub fn update_game_schedule(
    conn: &Connection,
    game_id: GameId,
    kickoff: DateTime<Utc>,
    spread: Option<f64>,
) -> Result<()> {
    conn.execute(
        "UPDATE games SET kickoff = ?2, spread = COALESCE(?3, spread), updated_at = ?4
         WHERE game_id = ?1",
        params![game_id, kickoff, spread, Utc::now()],
    )?;
    Ok(())
}

pub fn apply_game_state(conn: &Connection, game: &Game) -> Result<()> {
    conn.execute(
        r#"
        UPDATE games SET
            kickoff = ?2,
            status = ?3,
            status_detail = ?4,
            home_score = ?5,
            visitor_score = ?6,
            winner_team_id = ?7,
            spread = COALESCE(?8, spread),
            updated_at = ?9
        WHERE game_id = ?1
        "#,
        params![
            game.id,
            game.kickoff,
            game.status,
            game.status_detail,
            game.home_score,
            game.visitor_score,
            game.winner_team_id,
            game.spread,
            Utc::now(),
        ],
    )?;
    Ok(())
}

pub fn upsert_team(conn: &Connection, team: &TeamMeta) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO teams (team_id, abbreviation, name, wins, losses, ties, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(team_id) DO UPDATE SET
            abbreviation = CASE WHEN excluded.abbreviation = '' THEN teams.abbreviation ELSE excluded.abbreviation END,
            name = CASE WHEN excluded.name = '' THEN teams.name ELSE excluded.name END,
            wins = excluded.wins,
            losses = excluded.losses,
            ties = excluded.ties,
            updated_at = excluded.updated_at
        "#,
        params![
            team.id,
            team.abbreviation,
            team.name,
            team.wins,
            team.losses,
            team.ties,
            Utc::now(),
        ],
    )?;
    Ok(())
}

pub fn load_team(conn: &Connection, team_id: TeamId) -> Result<Option<TeamMeta>> {
    let team = conn
        .query_row(
            "SELECT team_id, abbreviation, name, wins, losses, ties FROM teams WHERE team_id = ?1",
            params![team_id],
            |row| {
                Ok(TeamMeta {
                    id: row.get(0)?,
                    abbreviation: row.get(1)?,
                    name: row.get(2)?,
                    wins: row.get(3)?,
                    losses: row.get(4)?,
                    ties: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(team)
}

// ---- picks --------------------------------------------------------------

fn pick_from_row(row: &Row<'_>) -> rusqlite::Result<Pick> {
    Ok(Pick {
        user_id: row.get(0)?,
        game_id: row.get(1)?,
        team_id: row.get(2)?,
        points: row.get(3)?,
        missed: row.get(4)?,
    })
}

pub fn load_picks_for_week(conn: &Connection, week: Week) -> Result<Vec<Pick>> {
    let mut stmt = conn.prepare(
        "SELECT p.user_id, p.game_id, p.team_id, p.points, p.missed
         FROM picks p JOIN games g ON g.game_id = p.game_id
         WHERE g.week = ?1
         ORDER BY p.user_id, p.game_id",
    )?;
    let rows = stmt.query_map(params![week], pick_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn load_picks_through(conn: &Connection, week: Week) -> Result<Vec<Pick>> {
    let mut stmt = conn.prepare(
        "SELECT p.user_id, p.game_id, p.team_id, p.points, p.missed
         FROM picks p JOIN games g ON g.game_id = p.game_id
         WHERE g.week <= ?1
         ORDER BY p.user_id, p.game_id",
    )?;
    let rows = stmt.query_map(params![week], pick_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn load_pick(conn: &Connection, user_id: UserId, game_id: GameId) -> Result<Option<Pick>> {
    let pick = conn
        .query_row(
            "SELECT user_id, game_id, team_id, points, missed FROM picks
             WHERE user_id = ?1 AND game_id = ?2",
            params![user_id, game_id],
            pick_from_row,
        )
        .optional()?;
    Ok(pick)
}

/// Mark every still-unset pick on the game as missed. Returns how many rows
/// changed; zero on a re-run.
pub fn finalize_missed_picks(conn: &Connection, game_id: GameId) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE picks SET missed = 1 WHERE game_id = ?1 AND team_id IS NULL AND missed = 0",
        params![game_id],
    )?;
    Ok(changed)
}

/// User-facing pick write. Refused once the game has kicked off or the guard
/// has finalized the pick.
pub fn submit_pick(
    conn: &Connection,
    user_id: UserId,
    game_id: GameId,
    team_id: TeamId,
    points: u32,
    now: DateTime<Utc>,
) -> Result<()> {
    let game = load_game(conn, game_id)?
        .ok_or_else(|| Error::InvalidPick(format!("unknown game {game_id}")))?;
    let pick = load_pick(conn, user_id, game_id)?.ok_or_else(|| {
        Error::InvalidPick(format!("user {user_id} has no pick slot for game {game_id}"))
    })?;
    if pick.missed || game.has_kicked_off(now) {
        return Err(Error::GuardViolation { user_id, game_id });
    }
    if !game.has_team(team_id) {
        return Err(Error::InvalidPick(format!(
            "team {team_id} is not playing in game {game_id}"
        )));
    }

    let games_in_week: u32 = conn.query_row(
        "SELECT COUNT(*) FROM games WHERE week = ?1",
        params![game.week],
        |row| row.get(0),
    )?;
    if points == 0 || points > games_in_week {
        return Err(Error::InvalidPick(format!(
            "point value {points} outside 1..={games_in_week}"
        )));
    }
    let reused: u32 = conn.query_row(
        "SELECT COUNT(*) FROM picks p JOIN games g ON g.game_id = p.game_id
         WHERE p.user_id = ?1 AND g.week = ?2 AND p.points = ?3 AND p.game_id <> ?4",
        params![user_id, game.week, points, game_id],
        |row| row.get(0),
    )?;
    if reused > 0 {
        return Err(Error::InvalidPick(format!(
            "point value {points} already used in week {}",
            game.week
        )));
    }

    conn.execute(
        "UPDATE picks SET team_id = ?3, points = ?4 WHERE user_id = ?1 AND game_id = ?2",
        params![user_id, game_id, team_id, points],
    )?;
    Ok(())
}

// ---- tiebreakers & survivor ---------------------------------------------

pub fn load_tiebreakers(conn: &Connection, week: Week) -> Result<Vec<Tiebreaker>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, week, score, submitted FROM tiebreakers WHERE week = ?1 ORDER BY user_id",
    )?;
    let rows = stmt.query_map(params![week], |row| {
        Ok(Tiebreaker {
            user_id: row.get(0)?,
            week: row.get(1)?,
            score: row.get(2)?,
            submitted: row.get(3)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Tiebreakers lock when the week's last game kicks off.
pub fn submit_tiebreaker(
    conn: &Connection,
    user_id: UserId,
    week: Week,
    score: u32,
    now: DateTime<Utc>,
) -> Result<()> {
    let games = load_week_games(conn, week)?;
    let Some(last) = games.last() else {
        return Err(Error::InvalidPick(format!("week {week} has no games")));
    };
    if last.has_kicked_off(now) {
        return Err(Error::GuardViolation {
            user_id,
            game_id: last.id,
        });
    }
    let changed = conn.execute(
        "UPDATE tiebreakers SET score = ?3, submitted = 1 WHERE user_id = ?1 AND week = ?2",
        params![user_id, week, score],
    )?;
    if changed == 0 {
        return Err(Error::InvalidPick(format!(
            "user {user_id} has no tiebreaker slot for week {week}"
        )));
    }
    Ok(())
}

pub fn load_survivor_picks_through(conn: &Connection, week: Week) -> Result<Vec<SurvivorPick>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, week, team_id, deleted FROM survivor_picks
         WHERE week <= ?1 ORDER BY user_id, week",
    )?;
    let rows = stmt.query_map(params![week], |row| {
        Ok(SurvivorPick {
            user_id: row.get(0)?,
            week: row.get(1)?,
            team_id: row.get(2)?,
            deleted: row.get(3)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Survivor picks lock when the week's first game kicks off.
pub fn submit_survivor_pick(
    conn: &Connection,
    user_id: UserId,
    week: Week,
    team_id: TeamId,
    now: DateTime<Utc>,
) -> Result<()> {
    let games = load_week_games(conn, week)?;
    let Some(first) = games.first() else {
        return Err(Error::InvalidPick(format!("week {week} has no games")));
    };
    if games.iter().any(|g| g.has_kicked_off(now)) {
        return Err(Error::GuardViolation {
            user_id,
            game_id: first.id,
        });
    }
    if !games.iter().any(|g| g.has_team(team_id)) {
        return Err(Error::InvalidPick(format!(
            "team {team_id} does not play in week {week}"
        )));
    }
    let changed = conn.execute(
        "UPDATE survivor_picks SET team_id = ?3
         WHERE user_id = ?1 AND week = ?2 AND deleted = 0",
        params![user_id, week, team_id],
    )?;
    if changed == 0 {
        return Err(Error::InvalidPick(format!(
            "user {user_id} has no open survivor slot for week {week}"
        )));
    }
    Ok(())
}

/// Soft-delete every survivor entry with no team for the week.
pub fn soft_delete_unpicked_survivors(conn: &Connection, week: Week) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE survivor_picks SET deleted = 1
         WHERE week = ?1 AND team_id IS NULL AND deleted = 0",
        params![week],
    )?;
    Ok(changed)
}

// ---- standings snapshots ------------------------------------------------

pub fn replace_weekly_standings(
    conn: &Connection,
    week: Week,
    rows: &[WeeklyStandingsRow],
) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM weekly_standings WHERE week = ?1", params![week])?;
    let mut stmt = conn.prepare(
        r#"
        INSERT INTO weekly_standings (
            week, rank, user_id, tied, points_earned, points_wrong, points_possible,
            points_total, games_correct, games_wrong, games_missed, tiebreaker_score,
            last_score, eliminated, week_final
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
    )?;
    for row in rows {
        stmt.execute(params![
            row.week,
            row.rank,
            row.user_id,
            row.tied,
            row.points_earned,
            row.points_wrong,
            row.points_possible,
            row.points_total,
            row.games_correct,
            row.games_wrong,
            row.games_missed,
            row.tiebreaker_score,
            row.last_score,
            row.eliminated,
            row.week_final,
        ])?;
    }
    Ok(())
}

pub fn replace_overall_standings(
    conn: &Connection,
    rows: &[OverallStandingsRow],
) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM overall_standings", [])?;
    let mut stmt = conn.prepare(
        r#"
        INSERT INTO overall_standings (
            through_week, rank, user_id, tied, points_earned, points_wrong, points_possible,
            points_total, games_correct, games_wrong, games_missed, eliminated
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )?;
    for row in rows {
        stmt.execute(params![
            row.through_week,
            row.rank,
            row.user_id,
            row.tied,
            row.points_earned,
            row.points_wrong,
            row.points_possible,
            row.points_total,
            row.games_correct,
            row.games_wrong,
            row.games_missed,
            row.eliminated,
        ])?;
    }
    Ok(())
}

pub fn replace_survivor_standings(
    conn: &Connection,
    rows: &[SurvivorStandingsRow],
) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM survivor_standings", [])?;
    let mut stmt = conn.prepare(
        r#"
        INSERT INTO survivor_standings (
            through_week, rank, user_id, tied, alive, weeks_survived,
            current_status, current_team_id, eliminated_week
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )?;
    for row in rows {
        stmt.execute(params![
            row.through_week,
            row.rank,
            row.user_id,
            row.tied,
            row.alive,
            row.weeks_survived,
            row.current_status,
            row.current_team_id,
            row.eliminated_week,
        ])?;
    }
    Ok(())
}

pub fn load_weekly_standings(conn: &Connection, week: Week) -> Result<Vec<WeeklyStandingsRow>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT week, rank, tied, user_id, points_earned, points_wrong, points_possible,
               points_total, games_correct, games_wrong, games_missed, tiebreaker_score,
               last_score, eliminated, week_final
        FROM weekly_standings
        WHERE week = ?1
        ORDER BY rank ASC, user_id ASC
        "#,
    )?;
    let rows = stmt.query_map(params![week], |row| {
        Ok(WeeklyStandingsRow {
            week: row.get(0)?,
            rank: row.get(1)?,
            tied: row.get(2)?,
            user_id: row.get(3)?,
            points_earned: row.get(4)?,
            points_wrong: row.get(5)?,
            points_possible: row.get(6)?,
            points_total: row.get(7)?,
            games_correct: row.get(8)?,
            games_wrong: row.get(9)?,
            games_missed: row.get(10)?,
            tiebreaker_score: row.get(11)?,
            last_score: row.get(12)?,
            eliminated: row.get(13)?,
            week_final: row.get(14)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn load_overall_standings(conn: &Connection) -> Result<Vec<OverallStandingsRow>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT through_week, rank, tied, user_id, points_earned, points_wrong, points_possible,
               points_total, games_correct, games_wrong, games_missed, eliminated
        FROM overall_standings
        ORDER BY rank ASC, user_id ASC
        "#,
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(OverallStandingsRow {
            through_week: row.get(0)?,
            rank: row.get(1)?,
            tied: row.get(2)?,
            user_id: row.get(3)?,
            points_earned: row.get(4)?,
            points_wrong: row.get(5)?,
            points_possible: row.get(6)?,
            points_total: row.get(7)?,
            games_correct: row.get(8)?,
            games_wrong: row.get(9)?,
            games_missed: row.get(10)?,
            eliminated: row.get(11)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn load_survivor_standings(conn: &Connection) -> Result<Vec<SurvivorStandingsRow>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT through_week, rank, tied, user_id, alive, weeks_survived,
               current_status, current_team_id, eliminated_week
        FROM survivor_standings
        ORDER BY rank ASC, user_id ASC
        "#,
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(SurvivorStandingsRow {
            through_week: row.get(0)?,
            rank: row.get(1)?,
            tied: row.get(2)?,
            user_id: row.get(3)?,
            alive: row.get(4)?,
            weeks_survived: row.get(5)?,
            current_status: row.get(6)?,
            current_team_id: row.get(7)?,
            eliminated_week: row.get(8)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{
        SeasonSeed, current_week, load_picks_for_week, load_week_games, open_in_memory,
        replace_weekly_standings, seed_season, week_settled,
    };
    use crate::aggregate::{WeekSnapshot, weekly_standings};
    use crate::config::PoolConfig;
    use crate::model::{Game, GameStatus};

    #[test]
    fn current_week_holds_a_final_week_until_its_snapshot_settles() {
        let mut conn = open_in_memory().unwrap();
        assert_eq!(current_week(&conn).unwrap(), None);

        let kickoff = Utc.with_ymd_and_hms(2026, 9, 10, 20, 0, 0).unwrap();
        let mut done = Game::scheduled(1, 1, 10, 11, kickoff);
        done.status = GameStatus::Final;
        done.home_score = Some(24);
        done.visitor_score = Some(20);
        let later = Game::scheduled(2, 2, 12, 13, kickoff + chrono::Duration::days(7));
        seed_season(
            &mut conn,
            &SeasonSeed {
                games: vec![done.clone(), later],
                users: vec![1],
                survivor_users: vec![],
            },
        )
        .unwrap();

        assert_eq!(current_week(&conn).unwrap(), Some(1));
        assert!(!week_settled(&conn, 1).unwrap());

        let snapshot = WeekSnapshot {
            week: 1,
            games: vec![done],
            picks: load_picks_for_week(&conn, 1).unwrap(),
            tiebreakers: vec![],
        };
        let rows = weekly_standings(&snapshot, &PoolConfig::default());
        assert!(rows.iter().all(|r| r.week_final));
        replace_weekly_standings(&conn, 1, &rows).unwrap();

        assert!(week_settled(&conn, 1).unwrap());
        assert_eq!(current_week(&conn).unwrap(), Some(2));
        let week1 = load_week_games(&conn, 1).unwrap();
        assert_eq!(week1.len(), 1);
        assert_eq!(week1[0].kickoff, kickoff);
        assert_eq!(week1[0].status, GameStatus::Final);
    }

    #[test]
    fn week_without_entries_is_settled_once_final() {
        let mut conn = open_in_memory().unwrap();
        let kickoff = Utc.with_ymd_and_hms(2026, 9, 10, 20, 0, 0).unwrap();
        let mut done = Game::scheduled(1, 1, 10, 11, kickoff);
        done.status = GameStatus::Final;
        done.home_score = Some(3);
        done.visitor_score = Some(0);
        let later = Game::scheduled(2, 2, 12, 13, kickoff + chrono::Duration::days(7));
        seed_season(
            &mut conn,
            &SeasonSeed {
                games: vec![done, later],
                ..SeasonSeed::default()
            },
        )
        .unwrap();

        assert!(week_settled(&conn, 1).unwrap());
        assert_eq!(current_week(&conn).unwrap(), Some(2));
    }
}
