use std::env;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{Datelike, Utc};

use crate::error::{Error, Result};
use crate::model::Week;

const APP_DIR: &str = "pickem_standings";
const DB_FILE: &str = "pool.sqlite";
const DEFAULT_FEED_URL: &str = "http://127.0.0.1:8080/api";

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub season_year: i32,
    /// Missed picks count toward GamesMissed only in weeks after this one.
    /// Kept as-is from the pool rules; its link to payment deadlines is a
    /// product question, not an accounting one.
    pub payment_due_week: Week,
    pub feed_url: String,
    pub feed_timeout: Duration,
    pub tick_interval: Duration,
    pub db_path: Option<PathBuf>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            season_year: Utc::now().year(),
            payment_due_week: 0,
            feed_url: DEFAULT_FEED_URL.to_string(),
            feed_timeout: Duration::from_secs(10),
            tick_interval: Duration::from_secs(60),
            db_path: default_db_path(),
        }
    }
}

impl PoolConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");

        let defaults = Self::default();
        let season_year = env::var("POOL_SEASON_YEAR")
            .ok()
            .and_then(|val| val.trim().parse::<i32>().ok())
            .unwrap_or(defaults.season_year);
        let payment_due_week = env::var("POOL_PAYMENT_DUE_WEEK")
            .ok()
            .and_then(|val| val.trim().parse::<Week>().ok())
            .unwrap_or(defaults.payment_due_week);
        let feed_url = opt_env("POOL_FEED_URL").unwrap_or(defaults.feed_url);
        let feed_timeout = Duration::from_secs(
            env::var("POOL_FEED_TIMEOUT_SECS")
                .ok()
                .and_then(|val| val.parse::<u64>().ok())
                .unwrap_or(10)
                .clamp(1, 120),
        );
        let tick_interval = Duration::from_secs(
            env::var("POOL_TICK_SECS")
                .ok()
                .and_then(|val| val.parse::<u64>().ok())
                .unwrap_or(60)
                .max(10),
        );
        let db_path = opt_env("POOL_DB_PATH")
            .map(PathBuf::from)
            .or(defaults.db_path);

        Self {
            season_year,
            payment_due_week,
            feed_url,
            feed_timeout,
            tick_interval,
            db_path,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.feed_url.starts_with("http://") || self.feed_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "POOL_FEED_URL must be an http(s) url, got {:?}",
                self.feed_url
            )));
        }
        if !(1900..=2999).contains(&self.season_year) {
            return Err(Error::Config(format!(
                "POOL_SEASON_YEAR out of range: {}",
                self.season_year
            )));
        }
        Ok(())
    }

    pub fn missed_counts_in(&self, week: Week) -> bool {
        week > self.payment_due_week
    }
}

fn opt_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

pub fn app_data_dir() -> Option<PathBuf> {
    if let Some(base) = opt_env("XDG_CACHE_HOME") {
        return Some(PathBuf::from(base).join(APP_DIR));
    }
    let home = opt_env("HOME")?;
    Some(PathBuf::from(home).join(".cache").join(APP_DIR))
}

pub fn default_db_path() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join(DB_FILE))
}

/// Database path from command-line arguments, as `--db=PATH` or `--db PATH`.
/// Pass the arguments without the program name. Blank values are ignored.
pub fn db_path_arg<I, S>(args: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let arg = arg.as_ref();
        let value = if let Some(path) = arg.strip_prefix("--db=") {
            path.trim().to_string()
        } else if arg == "--db" {
            match args.next() {
                Some(next) => next.as_ref().trim().to_string(),
                None => break,
            }
        } else {
            continue;
        };
        if !value.is_empty() {
            return Some(PathBuf::from(value));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{PoolConfig, db_path_arg};

    #[test]
    fn missed_threshold_is_exclusive() {
        let cfg = PoolConfig {
            payment_due_week: 2,
            ..PoolConfig::default()
        };
        assert!(!cfg.missed_counts_in(1));
        assert!(!cfg.missed_counts_in(2));
        assert!(cfg.missed_counts_in(3));
    }

    #[test]
    fn validate_rejects_non_http_feed() {
        let cfg = PoolConfig {
            feed_url: "ftp://scores".to_string(),
            ..PoolConfig::default()
        };
        assert!(cfg.validate().is_err());
        assert!(PoolConfig::default().validate().is_ok());
    }

    #[test]
    fn db_path_arg_accepts_both_spellings() {
        assert_eq!(
            db_path_arg(["--once", "--db=/tmp/pool.sqlite"]),
            Some(PathBuf::from("/tmp/pool.sqlite"))
        );
        assert_eq!(
            db_path_arg(["--db", "pool.sqlite", "--heal"]),
            Some(PathBuf::from("pool.sqlite"))
        );
        assert_eq!(db_path_arg(["--db= ", "--db"]), None);
        assert_eq!(db_path_arg(["--db=", "--db=b.sqlite"]), Some(PathBuf::from("b.sqlite")));
        assert_eq!(db_path_arg(Vec::<String>::new()), None);
    }
}
