pub mod config;
pub mod deviation;
pub mod metric;
pub mod objective;
pub mod pillar;
pub mod ritual;
pub mod session;
pub mod task;
pub mod user;
pub mod waitlist;

use std::error::Error;

use chrono::{DateTime, Utc};
use serde::Serialize;
use telofy_core::{Config, GoalDb};

pub type CmdResult = Result<(), Box<dyn Error>>;

/// Open the database configured in `<data_dir>/config.toml`.
pub fn open_db() -> Result<GoalDb, Box<dyn Error>> {
    let config = Config::load()?;
    Ok(GoalDb::open(&config)?)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse an RFC 3339 instant, defaulting to now.
pub fn instant_or_now(raw: Option<&str>) -> Result<DateTime<Utc>, Box<dyn Error>> {
    match raw {
        Some(raw) => Ok(DateTime::parse_from_rfc3339(raw)
            .map_err(|e| format!("invalid timestamp '{raw}': {e}"))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

/// Parse a comma-separated weekday list (0 = Sunday .. 6 = Saturday).
pub fn parse_days(raw: &str) -> Result<Vec<u8>, Box<dyn Error>> {
    raw.split(',')
        .map(|d| {
            d.trim()
                .parse::<u8>()
                .map_err(|e| format!("invalid weekday '{d}': {e}").into())
        })
        .collect()
}
