use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::info;

use pickem_standings::config::{self, PoolConfig};
use pickem_standings::fake_feed::{SimulatedFeed, demo_schedule};
use pickem_standings::feed::ScoreFeed;
use pickem_standings::hooks::{HookEvent, RecordingHooks};
use pickem_standings::model::{Game, UserId, Week};
use pickem_standings::orchestrator::Orchestrator;
use pickem_standings::standings::StandingsEngine;
use pickem_standings::store::{self, SeasonSeed};

const DEFAULT_WEEKS: Week = 4;
const DEFAULT_USERS: i64 = 8;
const GAMES_PER_WEEK: usize = 6;

/// Play a short season end to end against the simulated feed.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pickem_standings=info".into()),
        )
        .init();

    let seed = parse_u64_arg("--seed=").unwrap_or(2026);
    let weeks = parse_u64_arg("--weeks=")
        .and_then(|w| Week::try_from(w).ok())
        .unwrap_or(DEFAULT_WEEKS)
        .max(1);
    let users: Vec<UserId> = (1..=parse_u64_arg("--users=").map_or(DEFAULT_USERS, |u| u as i64)).collect();

    let first_kickoff = Utc
        .with_ymd_and_hms(2026, 9, 10, 17, 0, 0)
        .single()
        .context("invalid season start")?;
    let schedule = demo_schedule(weeks, GAMES_PER_WEEK, first_kickoff);
    let opened_at = first_kickoff - Duration::days(1);

    let mut conn = match config::db_path_arg(std::env::args().skip(1)) {
        Some(path) => store::open_db(&path)?,
        None => store::open_in_memory()?,
    };
    store::seed_season(
        &mut conn,
        &SeasonSeed {
            games: schedule.clone(),
            users: users.clone(),
            survivor_users: users.clone(),
        },
    )?;
    let submitted = submit_random_entries(&conn, &schedule, &users, seed, opened_at)?;
    info!(users = users.len(), weeks, submitted, "season seeded");

    let feed = Arc::new(SimulatedFeed::new(schedule.clone(), seed, opened_at));
    let hooks = Arc::new(RecordingHooks::new());
    let engine = Arc::new(StandingsEngine::new(PoolConfig::default()));
    let mut orchestrator = Orchestrator::new(
        conn,
        Arc::clone(&feed) as Arc<dyn ScoreFeed>,
        hooks.clone(),
        engine,
    );

    let season_end = schedule
        .iter()
        .map(|g| g.kickoff)
        .max()
        .unwrap_or(first_kickoff)
        + Duration::hours(6);
    let mut now = opened_at;
    while now <= season_end {
        feed.advance_to(now);
        let report = orchestrator.tick(now)?;
        if report.season_completed {
            break;
        }
        now += Duration::minutes(30);
    }

    for event in hooks.events() {
        match event {
            HookEvent::Payouts { week, winners } => println!("week {week} winners: {winners:?}"),
            HookEvent::SeasonEnded { champions } => println!("champions: {champions:?}"),
            _ => {}
        }
    }
    println!("{:>4} {:>6} {:>6} {:>8} {:>6}", "rank", "user", "earned", "possible", "elim");
    for row in store::load_overall_standings(orchestrator.connection())? {
        println!(
            "{:>4} {:>6} {:>6} {:>8} {:>6}",
            row.rank, row.user_id, row.points_earned, row.points_possible, row.eliminated
        );
    }
    Ok(())
}

/// Random picks, tiebreakers and survivor choices for every user. Roughly one
/// entry in ten is left blank so the guard has something to lock.
fn submit_random_entries(
    conn: &rusqlite::Connection,
    schedule: &[Game],
    users: &[UserId],
    seed: u64,
    now: chrono::DateTime<Utc>,
) -> Result<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut submitted = 0;
    let mut weeks: Vec<Week> = schedule.iter().map(|g| g.week).collect();
    weeks.dedup();
    for week in weeks {
        let games: Vec<&Game> = schedule.iter().filter(|g| g.week == week).collect();
        for user in users {
            let mut points: Vec<u32> = (1..=games.len() as u32).collect();
            points.shuffle(&mut rng);
            for (game, value) in games.iter().zip(points) {
                if rng.gen_bool(0.1) {
                    continue;
                }
                let team = if rng.gen_bool(0.5) {
                    game.home_team_id
                } else {
                    game.visitor_team_id
                };
                store::submit_pick(conn, *user, game.id, team, value, now)?;
                submitted += 1;
            }
            store::submit_tiebreaker(conn, *user, week, rng.gen_range(20..=60), now)?;
            if !rng.gen_bool(0.1) {
                if let Some(game) = games.choose(&mut rng) {
                    store::submit_survivor_pick(conn, *user, week, game.home_team_id, now)?;
                }
            }
        }
    }
    Ok(submitted)
}

fn parse_u64_arg(prefix: &str) -> Option<u64> {
    std::env::args()
        .skip(1)
        .find_map(|arg| arg.strip_prefix(prefix).and_then(|v| v.trim().parse().ok()))
}
