use anyhow::{Context, Result, anyhow};
use serde_json::json;

use pickem_standings::config::{self, PoolConfig};
use pickem_standings::standings::{RecomputeOutcome, StandingsEngine};
use pickem_standings::store;

/// Rebuild all three standings tables for one week and print them as JSON.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pickem_standings=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cfg = PoolConfig::from_env();
    let db_path = config::db_path_arg(std::env::args().skip(1))
        .or_else(|| cfg.db_path.clone())
        .context("unable to resolve sqlite path")?;
    let mut conn = store::open_db(&db_path)?;

    let week = match parse_week_arg() {
        Some(week) => week,
        None => store::current_week(&conn)?.ok_or_else(|| anyhow!("no games seeded"))?,
    };

    let engine = StandingsEngine::new(cfg);
    let mut failures = Vec::new();
    for (pipeline, result) in engine.recompute_all(&mut conn, week) {
        match result {
            Ok(RecomputeOutcome::Replaced { rows }) => {
                eprintln!("{pipeline}: {rows} rows");
            }
            Ok(RecomputeOutcome::Skipped) => eprintln!("{pipeline}: skipped"),
            Err(err) => failures.push(format!("{pipeline}: {err}")),
        }
    }

    let out = json!({
        "week": week,
        "weekly": store::load_weekly_standings(&conn, week)?,
        "overall": store::load_overall_standings(&conn)?,
        "survivor": store::load_survivor_standings(&conn)?,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);

    if !failures.is_empty() {
        return Err(anyhow!("recompute failed: {}", failures.join("; ")));
    }
    Ok(())
}

fn parse_week_arg() -> Option<u32> {
    std::env::args()
        .skip(1)
        .find_map(|arg| arg.strip_prefix("--week=").and_then(|w| w.trim().parse().ok()))
}
