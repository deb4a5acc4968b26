//! Database schema migrations.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Schema version after all migrations ran.
pub const CURRENT_VERSION: i32 = 3;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// Foreign keys must be enabled by the caller; the pragma is a no-op inside a
/// transaction.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Current schema version, 0 for a fresh database.
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version, assuming 0");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Migration v1: accounts, objectives and everything they own.
///
/// Timestamps are RFC 3339 text in UTC; `days_of_week` is a JSON array.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id                            TEXT PRIMARY KEY,
            name                          TEXT NOT NULL,
            email                         TEXT NOT NULL UNIQUE,
            email_verified                INTEGER NOT NULL DEFAULT 0,
            image                         TEXT,
            timezone                      TEXT NOT NULL DEFAULT 'America/Los_Angeles',
            onboarding_completed          INTEGER NOT NULL DEFAULT 0,
            notification_enabled          INTEGER NOT NULL DEFAULT 1,
            notification_advance_minutes  INTEGER NOT NULL DEFAULT 5,
            created_at                    TEXT NOT NULL,
            updated_at                    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            token_hash  TEXT NOT NULL UNIQUE,
            expires_at  TEXT NOT NULL,
            ip_address  TEXT,
            user_agent  TEXT,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS objectives (
            id                        TEXT PRIMARY KEY,
            user_id                   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name                      TEXT NOT NULL,
            category                  TEXT NOT NULL,
            description               TEXT,
            target_outcome            TEXT,
            start_date                TEXT NOT NULL,
            end_date                  TEXT,
            daily_commitment_minutes  INTEGER NOT NULL DEFAULT 60,
            status                    TEXT NOT NULL DEFAULT 'on_track',
            priority                  INTEGER NOT NULL DEFAULT 1,
            created_at                TEXT NOT NULL,
            updated_at                TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS pillars (
            id            TEXT PRIMARY KEY,
            objective_id  TEXT NOT NULL REFERENCES objectives(id) ON DELETE CASCADE,
            name          TEXT NOT NULL,
            description   TEXT,
            weight        REAL NOT NULL DEFAULT 0.25,
            progress      REAL NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS metrics (
            id                TEXT PRIMARY KEY,
            objective_id      TEXT NOT NULL REFERENCES objectives(id) ON DELETE CASCADE,
            pillar_id         TEXT REFERENCES pillars(id) ON DELETE SET NULL,
            name              TEXT NOT NULL,
            unit              TEXT NOT NULL,
            type              TEXT NOT NULL DEFAULT 'number',
            target            REAL,
            target_direction  TEXT,
            current           REAL,
            source            TEXT NOT NULL DEFAULT 'manual',
            created_at        TEXT NOT NULL,
            updated_at        TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS metric_entries (
            id           TEXT PRIMARY KEY,
            metric_id    TEXT NOT NULL REFERENCES metrics(id) ON DELETE CASCADE,
            value        REAL NOT NULL,
            note         TEXT,
            recorded_at  TEXT NOT NULL,
            created_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS rituals (
            id                 TEXT PRIMARY KEY,
            objective_id       TEXT NOT NULL REFERENCES objectives(id) ON DELETE CASCADE,
            pillar_id          TEXT REFERENCES pillars(id) ON DELETE SET NULL,
            name               TEXT NOT NULL,
            description        TEXT,
            frequency          TEXT NOT NULL DEFAULT 'daily',
            days_of_week       TEXT,
            times_per_period   INTEGER NOT NULL DEFAULT 1,
            estimated_minutes  INTEGER,
            current_streak     INTEGER NOT NULL DEFAULT 0,
            longest_streak     INTEGER NOT NULL DEFAULT 0,
            created_at         TEXT NOT NULL,
            updated_at         TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ritual_completions (
            id            TEXT PRIMARY KEY,
            ritual_id     TEXT NOT NULL REFERENCES rituals(id) ON DELETE CASCADE,
            completed_at  TEXT NOT NULL,
            note          TEXT,
            created_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id                TEXT PRIMARY KEY,
            user_id           TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            objective_id      TEXT NOT NULL REFERENCES objectives(id) ON DELETE CASCADE,
            pillar_id         TEXT REFERENCES pillars(id) ON DELETE SET NULL,
            ritual_id         TEXT REFERENCES rituals(id) ON DELETE SET NULL,
            title             TEXT NOT NULL,
            description       TEXT,
            why_it_matters    TEXT,
            scheduled_at      TEXT NOT NULL,
            duration_minutes  INTEGER NOT NULL DEFAULT 30,
            status            TEXT NOT NULL DEFAULT 'pending',
            completed_at      TEXT,
            skipped_reason    TEXT,
            created_at        TEXT NOT NULL,
            updated_at        TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS deviations (
            id             TEXT PRIMARY KEY,
            user_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            objective_id   TEXT NOT NULL REFERENCES objectives(id) ON DELETE CASCADE,
            task_id        TEXT REFERENCES tasks(id) ON DELETE SET NULL,
            ritual_id      TEXT REFERENCES rituals(id) ON DELETE SET NULL,
            type           TEXT NOT NULL,
            detected_at    TEXT NOT NULL,
            resolved_at    TEXT,
            ai_suggestion  TEXT,
            created_at     TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS waitlist (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL UNIQUE,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
        CREATE INDEX IF NOT EXISTS idx_objectives_user ON objectives(user_id);
        CREATE INDEX IF NOT EXISTS idx_pillars_objective ON pillars(objective_id);
        CREATE INDEX IF NOT EXISTS idx_metrics_objective ON metrics(objective_id);
        CREATE INDEX IF NOT EXISTS idx_metric_entries_metric_recorded
            ON metric_entries(metric_id, recorded_at);
        CREATE INDEX IF NOT EXISTS idx_rituals_objective ON rituals(objective_id);
        CREATE INDEX IF NOT EXISTS idx_ritual_completions_ritual_completed
            ON ritual_completions(ritual_id, completed_at);
        CREATE INDEX IF NOT EXISTS idx_tasks_objective_scheduled ON tasks(objective_id, scheduled_at);
        CREATE INDEX IF NOT EXISTS idx_tasks_pillar ON tasks(pillar_id);
        CREATE INDEX IF NOT EXISTS idx_deviations_objective ON deviations(objective_id);",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: cached objective progress and metric-subject deviations.
///
/// Adds:
/// - objectives.overall_progress
/// - deviations.metric_id (weak reference to the regressed metric)
/// - partial index over unresolved deviations
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    if !has_column(&tx, "objectives", "overall_progress")? {
        tx.execute_batch(
            "ALTER TABLE objectives ADD COLUMN overall_progress REAL NOT NULL DEFAULT 0;",
        )?;
    }
    if !has_column(&tx, "deviations", "metric_id")? {
        tx.execute_batch(
            "ALTER TABLE deviations ADD COLUMN metric_id TEXT REFERENCES metrics(id) ON DELETE SET NULL;",
        )?;
    }
    tx.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_deviations_unresolved
            ON deviations(objective_id, type) WHERE resolved_at IS NULL;",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()
}

/// Migration v3: the streak each ritual had at the last deviation sweep.
///
/// Adds:
/// - rituals.swept_streak
/// - rituals.swept_at (NULL until the first sweep)
///
/// Existing rituals take their cached streak as the baseline.
fn migrate_v3(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    if !has_column(&tx, "rituals", "swept_streak")? {
        tx.execute_batch(
            "ALTER TABLE rituals ADD COLUMN swept_streak INTEGER NOT NULL DEFAULT 0;",
        )?;
    }
    if !has_column(&tx, "rituals", "swept_at")? {
        tx.execute_batch("ALTER TABLE rituals ADD COLUMN swept_at TEXT;")?;
        tx.execute_batch(
            "UPDATE rituals SET swept_streak = current_streak, swept_at = updated_at
             WHERE current_streak > 0;",
        )?;
    }

    set_schema_version(&tx, 3)?;
    tx.commit()
}

fn has_column(conn: &Connection, table: &str, column: &str) -> SqliteResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        [table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
