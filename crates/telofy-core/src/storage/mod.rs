mod accounts;
mod config;
mod db;
pub mod migrations;
mod objectives;
mod planning;
mod tracking;

pub use accounts::IssuedSession;
pub use config::{
    AccountsConfig, Config, DetectorConfig, ProgressConfig, StorageConfig, StreaksConfig,
};
pub use db::GoalDb;
pub use planning::DeviationFilter;
pub use tracking::CompletionRecorded;

pub(crate) use accounts::objective_owner_tz;
pub(crate) use objectives::{find_objective, refresh_status};
pub(crate) use planning::{deviation_exists, insert_deviation, tasks_of_objective};
pub(crate) use tracking::{
    completion_times, latest_entries, metrics_of_objective, rituals_of_objective, swept_streak,
    write_streak, write_swept_streak,
};

use std::path::PathBuf;

use crate::error::CoreError;

/// Returns the data directory, creating it when missing.
///
/// `TELOFY_DATA_DIR` wins when set. Otherwise `~/.config/telofy`, or
/// `~/.config/telofy-dev` with `TELOFY_ENV=dev`.
pub fn data_dir() -> Result<PathBuf, CoreError> {
    let dir = match std::env::var_os("TELOFY_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("TELOFY_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("telofy-dev")
            } else {
                base_dir.join("telofy")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
