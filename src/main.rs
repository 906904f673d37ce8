use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use pickem_standings::config::{self, PoolConfig};
use pickem_standings::feed::{HttpScoreFeed, ScoreFeed};
use pickem_standings::hooks::LoggingHooks;
use pickem_standings::orchestrator::Orchestrator;
use pickem_standings::standings::StandingsEngine;
use pickem_standings::store;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pickem_standings=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = PoolConfig::from_env();
    cfg.validate()?;
    let db_path = config::db_path_arg(std::env::args().skip(1))
        .or_else(|| cfg.db_path.clone())
        .context("unable to resolve sqlite path")?;
    let conn = store::open_db(&db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    info!(
        season = cfg.season_year,
        db = %db_path.display(),
        feed = %cfg.feed_url,
        "scheduler starting"
    );

    let feed: Arc<dyn ScoreFeed> = Arc::new(HttpScoreFeed::new(&cfg.feed_url, cfg.feed_timeout));
    let tick_interval = cfg.tick_interval;
    let engine = Arc::new(StandingsEngine::new(cfg));
    let mut orchestrator = Orchestrator::new(conn, feed, Arc::new(LoggingHooks), engine);

    if has_flag("--heal") {
        match orchestrator.heal_season(Utc::now()) {
            Ok(report) => info!(
                games = report.games_seen,
                locked = report.picks_locked,
                inconsistencies = report.inconsistencies.len(),
                "season healed"
            ),
            Err(err) => warn!("season heal failed: {err}"),
        }
    }
    let once = has_flag("--once");

    loop {
        match orchestrator.tick(Utc::now()) {
            Ok(report) => {
                for (pipeline, reason) in &report.recompute_failures {
                    warn!(%pipeline, "recompute failed: {reason}");
                }
                if report.season_completed {
                    info!("season complete");
                }
            }
            Err(err) => error!("tick failed: {err}"),
        }
        if once {
            return Ok(());
        }
        thread::sleep(tick_interval);
    }
}

fn has_flag(flag: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == flag)
}
