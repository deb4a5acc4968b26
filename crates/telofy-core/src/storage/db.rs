//! SQLite store for the goal-tracking model.
//!
//! Every write that appends an event also refreshes the caches derived from it,
//! inside one `BEGIN IMMEDIATE` transaction.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, Transaction, TransactionBehavior};

use super::config::Config;
use super::{data_dir, migrations};
use crate::error::{CoreError, DatabaseError, Result, ValidationError};
use crate::progress::{CompletionRatioRule, PillarProgressRule};

/// Store for users, objectives and everything they own.
pub struct GoalDb {
    pub(super) conn: Connection,
    pub(super) config: Config,
    pub(super) rule: Box<dyn PillarProgressRule>,
}

impl GoalDb {
    /// Open `<data_dir>/<storage.db_file>`.
    pub fn open(config: &Config) -> Result<Self> {
        let path = data_dir()?.join(&config.storage.db_file);
        Self::open_at(&path, config)
    }

    /// Open (creating and migrating) the database at `path`.
    pub fn open_at(path: &Path, config: &Config) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::init(conn, config.clone())
    }

    /// Open an in-memory database with default configuration.
    pub fn open_memory() -> Result<Self> {
        Self::open_memory_with(&Config::default())
    }

    pub fn open_memory_with(config: &Config) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, config.clone())
    }

    fn init(conn: Connection, config: Config) -> Result<Self> {
        conn.busy_timeout(Duration::from_millis(config.storage.busy_timeout_ms))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn,
            config,
            rule: Box::new(CompletionRatioRule),
        })
    }

    /// Replace the rule turning tasks and metrics into pillar progress.
    pub fn with_progress_rule(mut self, rule: Box<dyn PillarProgressRule>) -> Self {
        self.rule = rule;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` in a `BEGIN IMMEDIATE` transaction, committing on success.
    ///
    /// When the database stays locked past the busy timeout the whole
    /// transaction is retried from a fresh read, up to
    /// `storage.max_write_retries` times.
    pub(crate) fn write_tx<T>(
        &self,
        op: &'static str,
        mut f: impl FnMut(&Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut attempt = 0u32;
        loop {
            let result = (|| -> Result<T> {
                let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
                let value = f(&tx)?;
                tx.commit()?;
                Ok(value)
            })();
            match result {
                Err(e) if e.is_retryable() && attempt < self.config.storage.max_write_retries => {
                    attempt += 1;
                    tracing::warn!(op, attempt, "database locked, retrying write transaction");
                }
                other => return other,
            }
        }
    }
}

// === Column helpers ===

/// RFC 3339 with microseconds and `Z`, so text order is time order.
pub(super) fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(super) fn opt_ts(dt: &Option<DateTime<Utc>>) -> Option<String> {
    dt.as_ref().map(ts)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

pub(super) fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

pub(super) fn get_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_ts(idx, &s)).transpose()
}

/// Parse a stored enum label.
pub(super) fn get_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = ValidationError>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

pub(super) fn get_opt_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = ValidationError>,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| s.parse().map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(super) fn get_json<T: serde::de::DeserializeOwned>(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| serde_json::from_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

/// Map a unique-constraint failure to [`CoreError::Conflict`].
pub(super) fn conflict_on_constraint(err: rusqlite::Error, message: &str) -> CoreError {
    match CoreError::from(err) {
        CoreError::Database(DatabaseError::Constraint(_)) => CoreError::Conflict(message.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn open_memory_enables_foreign_keys() {
        let db = GoalDb::open_memory().unwrap();
        let on: i64 = db
            .conn()
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(on, 1);
    }

    #[test]
    fn open_at_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("goals.db");
        let db = GoalDb::open_at(&path, &Config::default()).unwrap();
        assert!(path.exists());
        assert_eq!(
            migrations::get_schema_version(db.conn()),
            migrations::CURRENT_VERSION
        );
    }

    #[test]
    fn timestamps_sort_lexically() {
        let earlier = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let later = earlier + chrono::Duration::microseconds(1);
        assert!(ts(&earlier) < ts(&later));
        assert!(ts(&earlier).ends_with('Z'));
    }

    #[test]
    fn write_tx_rolls_back_on_error() {
        let db = GoalDb::open_memory().unwrap();
        let result: Result<()> = db.write_tx("test", |tx| {
            tx.execute(
                "INSERT INTO waitlist (id, email, created_at) VALUES ('w1', 'a@b.io', 'x')",
                [],
            )?;
            Err(CoreError::Conflict("boom".into()))
        });
        assert!(result.is_err());
        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM waitlist", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn write_tx_gives_up_after_retries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked.db");
        let mut config = Config::default();
        config.storage.busy_timeout_ms = 10;
        config.storage.max_write_retries = 1;
        let db = GoalDb::open_at(&path, &config).unwrap();

        let other = Connection::open(&path).unwrap();
        other.execute_batch("BEGIN IMMEDIATE;").unwrap();

        let mut calls = 0;
        let result: Result<()> = db.write_tx("test", |_| {
            calls += 1;
            Ok(())
        });
        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls, 0);

        other.execute_batch("ROLLBACK;").unwrap();
        assert!(db.write_tx("test", |_| Ok(())).is_ok());
    }
}
