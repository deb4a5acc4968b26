//! Metrics, rituals and their append-only event logs.
//!
//! `metrics.current`, `rituals.current_streak` and `rituals.longest_streak` are
//! caches. They are rewritten from the logs in the same transaction as every
//! append, and can be rebuilt with [`GoalDb::replay_metric`] and
//! [`GoalDb::refresh_ritual_streak`].
//!
//! `rituals.swept_streak` and `rituals.swept_at` are not caches: they hold what
//! the last deviation sweep saw and only the detector writes them.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::accounts::objective_owner_tz;
use super::db::{get_enum, get_json, get_opt_enum, get_opt_ts, get_ts, ts, GoalDb};
use super::objectives::{ensure_pillar_in_objective, load_objective, recompute_pillar_and_objective};
use crate::error::{CoreError, Result, ValidationError};
use crate::model::{
    new_id, Metric, MetricEntry, NewMetric, NewRitual, Ritual, RitualCompletion,
};
use crate::streak::{compute_streak, StreakPolicy, StreakSummary};

const METRIC_COLUMNS: &str = "id, objective_id, pillar_id, name, unit, type, target,
     target_direction, current, source, created_at, updated_at";

const ENTRY_COLUMNS: &str = "id, metric_id, value, note, recorded_at, created_at";

const RITUAL_COLUMNS: &str = "id, objective_id, pillar_id, name, description, frequency,
     days_of_week, times_per_period, estimated_minutes, current_streak, longest_streak,
     created_at, updated_at";

const COMPLETION_COLUMNS: &str = "id, ritual_id, completed_at, note, created_at";

const DEFAULT_METRIC_SOURCE: &str = "manual";

fn row_to_metric(row: &Row<'_>) -> rusqlite::Result<Metric> {
    Ok(Metric {
        id: row.get(0)?,
        objective_id: row.get(1)?,
        pillar_id: row.get(2)?,
        name: row.get(3)?,
        unit: row.get(4)?,
        metric_type: get_enum(row, 5)?,
        target: row.get(6)?,
        target_direction: get_opt_enum(row, 7)?,
        current: row.get(8)?,
        source: row.get(9)?,
        created_at: get_ts(row, 10)?,
        updated_at: get_ts(row, 11)?,
    })
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<MetricEntry> {
    Ok(MetricEntry {
        id: row.get(0)?,
        metric_id: row.get(1)?,
        value: row.get(2)?,
        note: row.get(3)?,
        recorded_at: get_ts(row, 4)?,
        created_at: get_ts(row, 5)?,
    })
}

fn row_to_ritual(row: &Row<'_>) -> rusqlite::Result<Ritual> {
    Ok(Ritual {
        id: row.get(0)?,
        objective_id: row.get(1)?,
        pillar_id: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        frequency: get_enum(row, 5)?,
        days_of_week: get_json(row, 6)?,
        times_per_period: row.get(7)?,
        estimated_minutes: row.get(8)?,
        current_streak: row.get(9)?,
        longest_streak: row.get(10)?,
        created_at: get_ts(row, 11)?,
        updated_at: get_ts(row, 12)?,
    })
}

fn row_to_completion(row: &Row<'_>) -> rusqlite::Result<RitualCompletion> {
    Ok(RitualCompletion {
        id: row.get(0)?,
        ritual_id: row.get(1)?,
        completed_at: get_ts(row, 2)?,
        note: row.get(3)?,
        created_at: get_ts(row, 4)?,
    })
}

// === Metrics ===

fn find_metric(conn: &Connection, id: &str) -> Result<Option<Metric>> {
    Ok(conn
        .query_row(
            &format!("SELECT {METRIC_COLUMNS} FROM metrics WHERE id = ?1"),
            params![id],
            row_to_metric,
        )
        .optional()?)
}

fn load_metric(conn: &Connection, id: &str) -> Result<Metric> {
    find_metric(conn, id)?.ok_or_else(|| CoreError::not_found("metric", id))
}

pub(crate) fn metrics_of_objective(conn: &Connection, objective_id: &str) -> Result<Vec<Metric>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {METRIC_COLUMNS} FROM metrics WHERE objective_id = ?1 ORDER BY created_at, id"
    ))?;
    let rows = stmt.query_map(params![objective_id], row_to_metric)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub(super) fn metrics_of_pillar(conn: &Connection, pillar_id: &str) -> Result<Vec<Metric>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {METRIC_COLUMNS} FROM metrics WHERE pillar_id = ?1 ORDER BY created_at, id"
    ))?;
    let rows = stmt.query_map(params![pillar_id], row_to_metric)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Value of the earliest entry by `recorded_at`, the metric's baseline.
pub(super) fn first_entry_value(conn: &Connection, metric_id: &str) -> Result<Option<f64>> {
    Ok(conn
        .query_row(
            "SELECT value FROM metric_entries WHERE metric_id = ?1
             ORDER BY recorded_at ASC, created_at ASC, rowid ASC LIMIT 1",
            params![metric_id],
            |row| row.get(0),
        )
        .optional()?)
}

/// The `limit` latest entries by `recorded_at`, newest first.
pub(crate) fn latest_entries(
    conn: &Connection,
    metric_id: &str,
    limit: u32,
) -> Result<Vec<MetricEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM metric_entries WHERE metric_id = ?1
         ORDER BY recorded_at DESC, created_at DESC, rowid DESC LIMIT ?2"
    ))?;
    let rows = stmt.query_map(params![metric_id, limit], row_to_entry)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Rewrite `metrics.current` from the entry log.
fn refresh_metric_current(
    conn: &Connection,
    metric_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<f64>> {
    let current = latest_entries(conn, metric_id, 1)?
        .first()
        .map(|entry| entry.value);
    conn.execute(
        "UPDATE metrics SET current = ?1, updated_at = ?2 WHERE id = ?3",
        params![current, ts(&now), metric_id],
    )?;
    tracing::debug!(metric_id, ?current, "metric current replayed");
    Ok(current)
}

// === Rituals ===

fn find_ritual(conn: &Connection, id: &str) -> Result<Option<Ritual>> {
    Ok(conn
        .query_row(
            &format!("SELECT {RITUAL_COLUMNS} FROM rituals WHERE id = ?1"),
            params![id],
            row_to_ritual,
        )
        .optional()?)
}

pub(crate) fn load_ritual(conn: &Connection, id: &str) -> Result<Ritual> {
    find_ritual(conn, id)?.ok_or_else(|| CoreError::not_found("ritual", id))
}

pub(crate) fn rituals_of_objective(conn: &Connection, objective_id: &str) -> Result<Vec<Ritual>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RITUAL_COLUMNS} FROM rituals WHERE objective_id = ?1 ORDER BY created_at, id"
    ))?;
    let rows = stmt.query_map(params![objective_id], row_to_ritual)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// All completion instants of a ritual, oldest first.
pub(crate) fn completion_times(conn: &Connection, ritual_id: &str) -> Result<Vec<DateTime<Utc>>> {
    let mut stmt = conn.prepare(
        "SELECT completed_at FROM ritual_completions WHERE ritual_id = ?1
         ORDER BY completed_at ASC",
    )?;
    let rows = stmt.query_map(params![ritual_id], |row| get_ts(row, 0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Replay the completion log into streaks, keeping the cached longest.
pub(crate) fn replay_streak(
    conn: &Connection,
    ritual: &Ritual,
    now: DateTime<Utc>,
    policy: &StreakPolicy,
) -> Result<StreakSummary> {
    let completions = completion_times(conn, &ritual.id)?;
    Ok(compute_streak(ritual, &completions, now, policy).with_cached_longest(ritual.longest_streak))
}

pub(crate) fn write_streak(
    conn: &Connection,
    ritual_id: &str,
    summary: StreakSummary,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE rituals SET current_streak = ?1, longest_streak = ?2, updated_at = ?3
         WHERE id = ?4",
        params![summary.current, summary.longest, ts(&now), ritual_id],
    )?;
    tracing::debug!(
        ritual_id,
        current = summary.current,
        longest = summary.longest,
        "streak refreshed"
    );
    Ok(())
}

/// The streak a ritual had at the last deviation sweep, and when that sweep ran.
///
/// `None` until the ritual's first sweep.
pub(crate) fn swept_streak(
    conn: &Connection,
    ritual_id: &str,
) -> Result<Option<(u32, DateTime<Utc>)>> {
    let row = conn
        .query_row(
            "SELECT swept_streak, swept_at FROM rituals WHERE id = ?1",
            params![ritual_id],
            |row| Ok((row.get::<_, u32>(0)?, get_opt_ts(row, 1)?)),
        )
        .optional()?;
    Ok(row.and_then(|(streak, at)| at.map(|at| (streak, at))))
}

/// Record the streak seen by a sweep. Only the detector writes this.
pub(crate) fn write_swept_streak(
    conn: &Connection,
    ritual_id: &str,
    streak: u32,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE rituals SET swept_streak = ?1, swept_at = ?2 WHERE id = ?3",
        params![streak, ts(&now), ritual_id],
    )?;
    Ok(())
}

/// The ritual's evaluation policy: its owner's timezone and the weekly rule.
pub(crate) fn ritual_policy(db: &GoalDb, conn: &Connection, ritual: &Ritual) -> Result<StreakPolicy> {
    let tz = objective_owner_tz(conn, &ritual.objective_id, db.config.default_tz())?;
    Ok(StreakPolicy::new(tz, db.config.streaks.weekly_rule))
}

/// A ritual completion and the ritual with its refreshed streaks.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRecorded {
    pub completion: RitualCompletion,
    pub ritual: Ritual,
}

impl GoalDb {
    // === Metrics ===

    pub fn add_metric(&self, input: &NewMetric, now: DateTime<Utc>) -> Result<Metric> {
        input.validate()?;
        let metric = Metric {
            id: new_id(),
            objective_id: input.objective_id.clone(),
            pillar_id: input.pillar_id.clone(),
            name: input.name.trim().to_string(),
            unit: input.unit.trim().to_string(),
            metric_type: input.metric_type,
            target: input.target,
            target_direction: input.target_direction,
            current: None,
            source: input
                .source
                .clone()
                .unwrap_or_else(|| DEFAULT_METRIC_SOURCE.to_string()),
            created_at: now,
            updated_at: now,
        };

        self.write_tx("add_metric", |tx| {
            load_objective(tx, &metric.objective_id)?;
            ensure_pillar_in_objective(tx, metric.pillar_id.as_deref(), &metric.objective_id)?;
            tx.execute(
                &format!(
                    "INSERT INTO metrics ({METRIC_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
                ),
                params![
                    metric.id,
                    metric.objective_id,
                    metric.pillar_id,
                    metric.name,
                    metric.unit,
                    metric.metric_type.as_str(),
                    metric.target,
                    metric.target_direction.map(|d| d.as_str()),
                    metric.current,
                    metric.source,
                    ts(&metric.created_at),
                    ts(&metric.updated_at),
                ],
            )?;
            Ok(())
        })?;
        Ok(metric)
    }

    pub fn get_metric(&self, id: &str) -> Result<Metric> {
        load_metric(&self.conn, id)
    }

    pub fn list_metrics(&self, objective_id: &str) -> Result<Vec<Metric>> {
        metrics_of_objective(&self.conn, objective_id)
    }

    /// Append an entry and refresh `current` and the owning pillar's progress.
    pub fn record_metric_entry(
        &self,
        metric_id: &str,
        value: f64,
        note: Option<&str>,
        recorded_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<MetricEntry> {
        if !value.is_finite() {
            return Err(ValidationError::invalid("value", "must be a finite number").into());
        }
        let entry = MetricEntry {
            id: new_id(),
            metric_id: metric_id.to_string(),
            value,
            note: note.map(str::to_string),
            recorded_at,
            created_at: now,
        };

        self.write_tx("record_metric_entry", |tx| {
            let metric = load_metric(tx, metric_id)?;
            tx.execute(
                &format!(
                    "INSERT INTO metric_entries ({ENTRY_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
                ),
                params![
                    entry.id,
                    entry.metric_id,
                    entry.value,
                    entry.note,
                    ts(&entry.recorded_at),
                    ts(&entry.created_at),
                ],
            )?;
            refresh_metric_current(tx, metric_id, now)?;
            recompute_pillar_and_objective(self, tx, metric.pillar_id.as_deref(), now)?;
            Ok(())
        })?;
        Ok(entry)
    }

    /// Entries ordered by `recorded_at`.
    pub fn list_metric_entries(&self, metric_id: &str) -> Result<Vec<MetricEntry>> {
        load_metric(&self.conn, metric_id)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM metric_entries WHERE metric_id = ?1
             ORDER BY recorded_at ASC, created_at ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map(params![metric_id], row_to_entry)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Rebuild `current` from the entry log.
    pub fn replay_metric(&self, metric_id: &str, now: DateTime<Utc>) -> Result<Metric> {
        self.write_tx("replay_metric", |tx| {
            let metric = load_metric(tx, metric_id)?;
            refresh_metric_current(tx, metric_id, now)?;
            recompute_pillar_and_objective(self, tx, metric.pillar_id.as_deref(), now)?;
            load_metric(tx, metric_id)
        })
    }

    // === Rituals ===

    pub fn add_ritual(&self, input: &NewRitual, now: DateTime<Utc>) -> Result<Ritual> {
        let mut input = input.clone();
        input.validate()?;
        let ritual = Ritual {
            id: new_id(),
            objective_id: input.objective_id,
            pillar_id: input.pillar_id,
            name: input.name.trim().to_string(),
            description: input.description,
            frequency: input.frequency,
            days_of_week: input.days_of_week,
            times_per_period: input.times_per_period,
            estimated_minutes: input.estimated_minutes,
            current_streak: 0,
            longest_streak: 0,
            created_at: now,
            updated_at: now,
        };
        let days_json = ritual
            .days_of_week
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.write_tx("add_ritual", |tx| {
            load_objective(tx, &ritual.objective_id)?;
            ensure_pillar_in_objective(tx, ritual.pillar_id.as_deref(), &ritual.objective_id)?;
            tx.execute(
                &format!(
                    "INSERT INTO rituals ({RITUAL_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                params![
                    ritual.id,
                    ritual.objective_id,
                    ritual.pillar_id,
                    ritual.name,
                    ritual.description,
                    ritual.frequency.as_str(),
                    days_json,
                    ritual.times_per_period,
                    ritual.estimated_minutes,
                    ritual.current_streak,
                    ritual.longest_streak,
                    ts(&ritual.created_at),
                    ts(&ritual.updated_at),
                ],
            )?;
            Ok(())
        })?;
        Ok(ritual)
    }

    pub fn get_ritual(&self, id: &str) -> Result<Ritual> {
        load_ritual(&self.conn, id)
    }

    pub fn list_rituals(&self, objective_id: &str) -> Result<Vec<Ritual>> {
        rituals_of_objective(&self.conn, objective_id)
    }

    /// Append a completion and refresh the ritual's streaks in one transaction.
    pub fn complete_ritual(
        &self,
        ritual_id: &str,
        completed_at: DateTime<Utc>,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<CompletionRecorded> {
        let completion = RitualCompletion {
            id: new_id(),
            ritual_id: ritual_id.to_string(),
            completed_at,
            note: note.map(str::to_string),
            created_at: now,
        };

        let ritual = self.write_tx("complete_ritual", |tx| {
            let ritual = load_ritual(tx, ritual_id)?;
            tx.execute(
                &format!(
                    "INSERT INTO ritual_completions ({COMPLETION_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5)"
                ),
                params![
                    completion.id,
                    completion.ritual_id,
                    ts(&completion.completed_at),
                    completion.note,
                    ts(&completion.created_at),
                ],
            )?;
            let policy = ritual_policy(self, tx, &ritual)?;
            let summary = replay_streak(tx, &ritual, now, &policy)?;
            write_streak(tx, ritual_id, summary, now)?;
            load_ritual(tx, ritual_id)
        })?;
        Ok(CompletionRecorded { completion, ritual })
    }

    pub fn list_ritual_completions(&self, ritual_id: &str) -> Result<Vec<RitualCompletion>> {
        load_ritual(&self.conn, ritual_id)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMPLETION_COLUMNS} FROM ritual_completions WHERE ritual_id = ?1
             ORDER BY completed_at ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map(params![ritual_id], row_to_completion)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Rebuild the streak caches from the completion log as of `now`.
    pub fn refresh_ritual_streak(&self, ritual_id: &str, now: DateTime<Utc>) -> Result<Ritual> {
        self.write_tx("refresh_ritual_streak", |tx| {
            let ritual = load_ritual(tx, ritual_id)?;
            let policy = ritual_policy(self, tx, &ritual)?;
            let summary = replay_streak(tx, &ritual, now, &policy)?;
            write_streak(tx, ritual_id, summary, now)?;
            load_ritual(tx, ritual_id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Frequency, NewObjective, NewPillar, NewUser, Objective, TargetDirection,
    };
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 17, 0, 0).unwrap()
    }

    fn setup() -> (GoalDb, Objective) {
        let db = GoalDb::open_memory().unwrap();
        let mut input = NewUser::new("Ada", "ada@example.com");
        input.timezone = Some("UTC".into());
        let user = db.create_user(&input, t0()).unwrap();
        let objective = db
            .create_objective(&NewObjective::new(&user.id, "Lose 10kg", "health"), t0())
            .unwrap();
        (db, objective)
    }

    #[test]
    fn current_follows_latest_recorded_at_not_insert_order() {
        let (db, objective) = setup();
        let metric = db
            .add_metric(&NewMetric::new(&objective.id, "Weight", "kg"), t0())
            .unwrap();
        assert_eq!(metric.source, "manual");

        db.record_metric_entry(&metric.id, 88.0, None, t0(), t0())
            .unwrap();
        // Backfilled older reading does not become current.
        db.record_metric_entry(&metric.id, 90.0, Some("forgot"), t0() - Duration::days(3), t0())
            .unwrap();
        assert_eq!(db.get_metric(&metric.id).unwrap().current, Some(88.0));

        let entries = db.list_metric_entries(&metric.id).unwrap();
        assert_eq!(
            entries.iter().map(|e| e.value).collect::<Vec<_>>(),
            vec![90.0, 88.0]
        );

        // Corrupt the cache, then replay.
        db.conn()
            .execute("UPDATE metrics SET current = 1 WHERE id = ?1", params![metric.id])
            .unwrap();
        assert_eq!(db.replay_metric(&metric.id, t0()).unwrap().current, Some(88.0));
    }

    #[test]
    fn non_finite_entry_is_rejected() {
        let (db, objective) = setup();
        let metric = db
            .add_metric(&NewMetric::new(&objective.id, "Weight", "kg"), t0())
            .unwrap();
        assert!(db
            .record_metric_entry(&metric.id, f64::INFINITY, None, t0(), t0())
            .is_err());
        assert!(db.list_metric_entries(&metric.id).unwrap().is_empty());
    }

    #[test]
    fn metric_entry_updates_pillar_progress() {
        let (db, objective) = setup();
        let pillar = db
            .add_pillar(&NewPillar::new(&objective.id, "Body", 1.0), t0())
            .unwrap();
        let mut input = NewMetric::new(&objective.id, "Weight", "kg");
        input.pillar_id = Some(pillar.id.clone());
        input.target = Some(80.0);
        input.target_direction = Some(TargetDirection::Decrease);
        let metric = db.add_metric(&input, t0()).unwrap();

        db.record_metric_entry(&metric.id, 90.0, None, t0(), t0())
            .unwrap();
        let later = t0() + Duration::days(7);
        db.record_metric_entry(&metric.id, 85.0, None, later, later)
            .unwrap();

        let pillar = db.get_pillar(&pillar.id).unwrap();
        assert!((pillar.progress - 50.0).abs() < 1e-9);
        let objective = db.get_objective(&objective.id).unwrap();
        assert!((objective.overall_progress - 50.0).abs() < 1e-9);
    }

    #[test]
    fn pillar_of_other_objective_is_rejected() {
        let (db, objective) = setup();
        let other = db
            .create_objective(
                &NewObjective::new(&objective.user_id, "Other", "career"),
                t0(),
            )
            .unwrap();
        let pillar = db
            .add_pillar(&NewPillar::new(&other.id, "Elsewhere", 0.5), t0())
            .unwrap();
        let mut input = NewMetric::new(&objective.id, "Weight", "kg");
        input.pillar_id = Some(pillar.id);
        assert!(matches!(
            db.add_metric(&input, t0()),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn completions_refresh_streaks() {
        let (db, objective) = setup();
        let ritual = db
            .add_ritual(&NewRitual::new(&objective.id, "Meditate", Frequency::Daily), t0())
            .unwrap();

        let mut last = None;
        for day in 0..3 {
            let at = t0() + Duration::days(day);
            last = Some(db.complete_ritual(&ritual.id, at, None, at).unwrap());
        }
        let recorded = last.unwrap();
        assert_eq!(recorded.ritual.current_streak, 3);
        assert_eq!(recorded.ritual.longest_streak, 3);
        assert_eq!(db.list_ritual_completions(&ritual.id).unwrap().len(), 3);

        // Two days later the chain is broken but the longest streak is kept.
        let refreshed = db
            .refresh_ritual_streak(&ritual.id, t0() + Duration::days(4))
            .unwrap();
        assert_eq!(refreshed.current_streak, 0);
        assert_eq!(refreshed.longest_streak, 3);
    }

    #[test]
    fn ritual_days_are_stored_as_json() {
        let (db, objective) = setup();
        let mut input = NewRitual::new(&objective.id, "Gym", Frequency::Weekly);
        input.days_of_week = Some(vec![5, 1, 3]);
        input.times_per_period = 1;
        let ritual = db.add_ritual(&input, t0()).unwrap();
        let stored = db.get_ritual(&ritual.id).unwrap();
        assert_eq!(stored.days_of_week, Some(vec![1, 3, 5]));
        assert_eq!(db.list_rituals(&objective.id).unwrap().len(), 1);
    }

    #[test]
    fn completing_missing_ritual_is_not_found() {
        let (db, _) = setup();
        assert!(matches!(
            db.complete_ritual("nope", t0(), None, t0()),
            Err(CoreError::NotFound { entity: "ritual", .. })
        ));
    }
}
