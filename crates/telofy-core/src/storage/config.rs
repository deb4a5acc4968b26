//! TOML-based configuration.
//!
//! Stored at `<data_dir>/config.toml`. Sections:
//! - `storage`: database file and write-lock behaviour
//! - `accounts`: default timezone and session lifetimes
//! - `streaks`: weekly qualification rule
//! - `progress`: pillar progress window
//! - `detector`: deviation sweep thresholds

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::streak::WeeklyRule;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    #[serde(default = "default_db_file")]
    pub db_file: String,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Retries of a whole write transaction after the busy timeout expired.
    #[serde(default = "default_max_write_retries")]
    pub max_write_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountsConfig {
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
    #[serde(default = "default_session_ttl_days")]
    pub session_ttl_days: u32,
    #[serde(default = "default_session_refresh_hours")]
    pub session_refresh_hours: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StreaksConfig {
    #[serde(default)]
    pub weekly_rule: WeeklyRule,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressConfig {
    /// Trailing window of tasks counted towards pillar progress.
    #[serde(default = "default_window_days")]
    pub window_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectorConfig {
    #[serde(default)]
    pub task_grace_minutes: u32,
    /// Relative move against the target direction that counts as a regression.
    #[serde(default = "default_metric_tolerance")]
    pub metric_tolerance: f64,
    #[serde(default = "default_true")]
    pub generate_suggestions: bool,
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub accounts: AccountsConfig,
    #[serde(default)]
    pub streaks: StreaksConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
}

fn default_db_file() -> String {
    "telofy.db".into()
}
fn default_busy_timeout_ms() -> u64 {
    5000
}
fn default_max_write_retries() -> u32 {
    3
}
fn default_timezone() -> String {
    "America/Los_Angeles".into()
}
fn default_session_ttl_days() -> u32 {
    30
}
fn default_session_refresh_hours() -> u32 {
    24
}
fn default_window_days() -> u32 {
    7
}
fn default_metric_tolerance() -> f64 {
    0.05
}
fn default_true() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_file: default_db_file(),
            busy_timeout_ms: default_busy_timeout_ms(),
            max_write_retries: default_max_write_retries(),
        }
    }
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            default_timezone: default_timezone(),
            session_ttl_days: default_session_ttl_days(),
            session_refresh_hours: default_session_refresh_hours(),
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            task_grace_minutes: 0,
            metric_tolerance: default_metric_tolerance(),
            generate_suggestions: true,
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(format!("expected true/false: {e}")))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) => return Err(unknown()),
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default location of the config file.
    pub fn path() -> Result<PathBuf, crate::CoreError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults when the file is missing.
    pub fn load() -> Result<Self, crate::CoreError> {
        Ok(Self::load_from(&Self::path()?)?)
    }

    /// Load from `path`, writing defaults when the file is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the data directory.
    pub fn save(&self) -> Result<(), crate::CoreError> {
        Ok(self.save_to(&Self::path()?)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key. The caller persists the result.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Flattened `key = value` pairs, in section order.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if let Ok(serde_json::Value::Object(sections)) = serde_json::to_value(self) {
            for (section, fields) in sections {
                if let serde_json::Value::Object(fields) = fields {
                    for (field, value) in fields {
                        let value = match value {
                            serde_json::Value::String(s) => s,
                            other => other.to_string(),
                        };
                        out.push((format!("{section}.{field}"), value));
                    }
                }
            }
        }
        out
    }

    /// Reject values that parse but cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };
        if self.storage.db_file.trim().is_empty() {
            return Err(invalid("storage.db_file", "must not be empty"));
        }
        if self
            .accounts
            .default_timezone
            .parse::<chrono_tz::Tz>()
            .is_err()
        {
            return Err(invalid(
                "accounts.default_timezone",
                "not a known IANA timezone",
            ));
        }
        if self.accounts.session_ttl_days == 0 {
            return Err(invalid("accounts.session_ttl_days", "must be at least 1"));
        }
        if self.progress.window_days == 0 {
            return Err(invalid("progress.window_days", "must be at least 1"));
        }
        let tol = self.detector.metric_tolerance;
        if !tol.is_finite() || tol < 0.0 {
            return Err(invalid(
                "detector.metric_tolerance",
                "must be a non-negative number",
            ));
        }
        Ok(())
    }

    /// Default timezone for users without a valid stored zone.
    pub fn default_tz(&self) -> chrono_tz::Tz {
        self.accounts
            .default_timezone
            .parse()
            .unwrap_or(chrono_tz::America::Los_Angeles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.storage.db_file, "telofy.db");
        assert_eq!(parsed.streaks.weekly_rule, WeeklyRule::EveryListedDay);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[detector]\ntask_grace_minutes = 15\n").unwrap();
        assert_eq!(parsed.detector.task_grace_minutes, 15);
        assert_eq!(parsed.detector.metric_tolerance, 0.05);
        assert_eq!(parsed.accounts.session_ttl_days, 30);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("storage.max_write_retries").as_deref(), Some("3"));
        assert_eq!(
            cfg.get("streaks.weekly_rule").as_deref(),
            Some("every_listed_day")
        );
        assert_eq!(cfg.get("detector.generate_suggestions").as_deref(), Some("true"));
        assert!(cfg.get("detector.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_json_value_by_path_updates_nested_number() {
        let mut json = serde_json::to_value(Config::default()).unwrap();
        Config::set_json_value_by_path(&mut json, "progress.window_days", "14").unwrap();
        assert_eq!(
            Config::get_json_value_by_path(&json, "progress.window_days").unwrap(),
            &serde_json::Value::Number(14.into())
        );
    }

    #[test]
    fn set_json_value_by_path_rejects_unknown_key() {
        let mut json = serde_json::to_value(Config::default()).unwrap();
        let result = Config::set_json_value_by_path(&mut json, "detector.nonexistent", "1");
        assert!(matches!(result, Err(ConfigError::UnknownKey(_))));
        let result = Config::set_json_value_by_path(&mut json, "detector", "1");
        assert!(matches!(result, Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn set_rejects_invalid_type() {
        let mut cfg = Config::default();
        let result = cfg.set("detector.generate_suggestions", "sometimes");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn set_parses_floats_and_enums() {
        let mut cfg = Config::default();
        cfg.set("detector.metric_tolerance", "0.1").unwrap();
        assert_eq!(cfg.detector.metric_tolerance, 0.1);

        cfg.set("streaks.weekly_rule", "aggregate").unwrap();
        assert_eq!(cfg.streaks.weekly_rule, WeeklyRule::Aggregate);
        assert!(cfg.set("streaks.weekly_rule", "sometimes").is_err());
        assert_eq!(cfg.streaks.weekly_rule, WeeklyRule::Aggregate);
    }

    #[test]
    fn set_validates_timezone() {
        let mut cfg = Config::default();
        assert!(cfg.set("accounts.default_timezone", "Mars/Olympus").is_err());
        cfg.set("accounts.default_timezone", "Europe/Berlin").unwrap();
        assert_eq!(cfg.default_tz(), chrono_tz::Europe::Berlin);
    }

    #[test]
    fn entries_are_flattened() {
        let entries = Config::default().entries();
        assert!(entries
            .iter()
            .any(|(k, v)| k == "storage.busy_timeout_ms" && v == "5000"));
        assert!(entries.iter().all(|(k, _)| k.contains('.')));
    }

    #[test]
    fn load_from_writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.set("detector.task_grace_minutes", "10").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().detector.task_grace_minutes, 10);
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "storage = 12").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }
}
