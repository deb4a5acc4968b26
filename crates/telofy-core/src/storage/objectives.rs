//! Objectives, pillars and the progress caches derived over them.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::accounts::load_user;
use super::db::{get_enum, get_opt_ts, get_ts, opt_ts, ts, GoalDb};
use crate::error::{CoreError, Result, ValidationError};
use crate::model::{
    new_id, NewObjective, NewPillar, Objective, ObjectiveStatus, Pillar, TaskStatus,
};
use crate::progress::{
    metric_attainment, overall_progress, resolve_status, validate_sibling_weights,
    PillarInputs, PillarProgressRule,
};

const OBJECTIVE_COLUMNS: &str = "id, user_id, name, category, description, target_outcome,
     start_date, end_date, daily_commitment_minutes, status, priority, overall_progress,
     created_at, updated_at";

const PILLAR_COLUMNS: &str =
    "id, objective_id, name, description, weight, progress, created_at, updated_at";

const DEFAULT_DAILY_COMMITMENT_MINUTES: u32 = 60;
const DEFAULT_PRIORITY: i32 = 1;

fn row_to_objective(row: &Row<'_>) -> rusqlite::Result<Objective> {
    Ok(Objective {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        category: row.get(3)?,
        description: row.get(4)?,
        target_outcome: row.get(5)?,
        start_date: get_ts(row, 6)?,
        end_date: get_opt_ts(row, 7)?,
        daily_commitment_minutes: row.get(8)?,
        status: get_enum(row, 9)?,
        priority: row.get(10)?,
        overall_progress: row.get(11)?,
        created_at: get_ts(row, 12)?,
        updated_at: get_ts(row, 13)?,
    })
}

fn row_to_pillar(row: &Row<'_>) -> rusqlite::Result<Pillar> {
    Ok(Pillar {
        id: row.get(0)?,
        objective_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        weight: row.get(4)?,
        progress: row.get(5)?,
        created_at: get_ts(row, 6)?,
        updated_at: get_ts(row, 7)?,
    })
}

pub(crate) fn find_objective(conn: &Connection, id: &str) -> Result<Option<Objective>> {
    Ok(conn
        .query_row(
            &format!("SELECT {OBJECTIVE_COLUMNS} FROM objectives WHERE id = ?1"),
            params![id],
            row_to_objective,
        )
        .optional()?)
}

pub(super) fn load_objective(conn: &Connection, id: &str) -> Result<Objective> {
    find_objective(conn, id)?.ok_or_else(|| CoreError::not_found("objective", id))
}

pub(super) fn find_pillar(conn: &Connection, id: &str) -> Result<Option<Pillar>> {
    Ok(conn
        .query_row(
            &format!("SELECT {PILLAR_COLUMNS} FROM pillars WHERE id = ?1"),
            params![id],
            row_to_pillar,
        )
        .optional()?)
}

fn load_pillar(conn: &Connection, id: &str) -> Result<Pillar> {
    find_pillar(conn, id)?.ok_or_else(|| CoreError::not_found("pillar", id))
}

fn pillars_of(conn: &Connection, objective_id: &str) -> Result<Vec<Pillar>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PILLAR_COLUMNS} FROM pillars WHERE objective_id = ?1 ORDER BY created_at, id"
    ))?;
    let rows = stmt.query_map(params![objective_id], row_to_pillar)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// A weak pillar reference must point at a pillar of the same objective.
pub(super) fn ensure_pillar_in_objective(
    conn: &Connection,
    pillar_id: Option<&str>,
    objective_id: &str,
) -> Result<()> {
    let Some(pillar_id) = pillar_id else {
        return Ok(());
    };
    let pillar = load_pillar(conn, pillar_id)?;
    if pillar.objective_id != objective_id {
        return Err(ValidationError::invalid(
            "pillar_id",
            format!("pillar {pillar_id} belongs to another objective"),
        )
        .into());
    }
    Ok(())
}

/// Rewrite the cached overall progress from the pillars.
pub(super) fn refresh_overall_progress(
    conn: &Connection,
    objective_id: &str,
    now: DateTime<Utc>,
) -> Result<f64> {
    let progress = overall_progress(&pillars_of(conn, objective_id)?);
    conn.execute(
        "UPDATE objectives SET overall_progress = ?1, updated_at = ?2 WHERE id = ?3",
        params![progress, ts(&now), objective_id],
    )?;
    tracing::debug!(objective_id, progress, "overall progress recomputed");
    Ok(progress)
}

/// Re-derive the automatic part of an objective's status.
pub(crate) fn refresh_status(
    conn: &Connection,
    objective_id: &str,
    now: DateTime<Utc>,
) -> Result<ObjectiveStatus> {
    let objective = load_objective(conn, objective_id)?;
    let unresolved: i64 = conn.query_row(
        "SELECT COUNT(*) FROM deviations WHERE objective_id = ?1 AND resolved_at IS NULL",
        params![objective_id],
        |row| row.get(0),
    )?;
    let status = resolve_status(objective.status, unresolved.max(0) as usize);
    if status != objective.status {
        conn.execute(
            "UPDATE objectives SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), ts(&now), objective_id],
        )?;
        tracing::debug!(objective_id, from = %objective.status, to = %status, "objective status changed");
    }
    Ok(status)
}

/// Tasks and metric attainment feeding a pillar's progress.
fn pillar_inputs(
    conn: &Connection,
    pillar_id: &str,
    window_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<PillarInputs> {
    let mut inputs = PillarInputs::default();

    let mut stmt = conn.prepare(
        "SELECT status, COUNT(*) FROM tasks
         WHERE pillar_id = ?1 AND scheduled_at >= ?2 AND scheduled_at <= ?3
         GROUP BY status",
    )?;
    let rows = stmt.query_map(params![pillar_id, ts(&window_start), ts(&now)], |row| {
        Ok((get_enum::<TaskStatus>(row, 0)?, row.get::<_, u32>(1)?))
    })?;
    for row in rows {
        let (status, count) = row?;
        inputs.tasks_scheduled += count;
        if status == TaskStatus::Completed {
            inputs.tasks_completed += count;
        }
    }

    for metric in super::tracking::metrics_of_pillar(conn, pillar_id)? {
        let baseline = super::tracking::first_entry_value(conn, &metric.id)?;
        if let Some(attainment) = metric_attainment(&metric, baseline) {
            inputs.metric_attainment.push(attainment);
        }
    }
    Ok(inputs)
}

/// Recompute one pillar's progress. `None` when the pillar no longer exists.
pub(super) fn recompute_pillar(
    conn: &Connection,
    rule: &dyn PillarProgressRule,
    window_days: u32,
    pillar_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<Pillar>> {
    let Some(mut pillar) = find_pillar(conn, pillar_id)? else {
        tracing::debug!(pillar_id, "pillar vanished, progress update dropped");
        return Ok(None);
    };
    let window_start = now - Duration::days(i64::from(window_days));
    let inputs = pillar_inputs(conn, pillar_id, window_start, now)?;
    pillar.progress = rule.progress(&inputs).clamp(0.0, 100.0);
    pillar.updated_at = now;
    conn.execute(
        "UPDATE pillars SET progress = ?1, updated_at = ?2 WHERE id = ?3",
        params![pillar.progress, ts(&now), pillar.id],
    )?;
    tracing::debug!(pillar_id, progress = pillar.progress, "pillar progress recomputed");
    Ok(Some(pillar))
}

/// Recompute a pillar and then its objective's overall progress.
pub(super) fn recompute_pillar_and_objective(
    db: &GoalDb,
    conn: &Connection,
    pillar_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    let Some(pillar_id) = pillar_id else {
        return Ok(());
    };
    if let Some(pillar) = recompute_pillar(
        conn,
        db.rule.as_ref(),
        db.config.progress.window_days,
        pillar_id,
        now,
    )? {
        refresh_overall_progress(conn, &pillar.objective_id, now)?;
    }
    Ok(())
}

fn sibling_weight_total(conn: &Connection, objective_id: &str, except: Option<&str>) -> Result<f64> {
    Ok(conn.query_row(
        "SELECT COALESCE(SUM(weight), 0) FROM pillars
         WHERE objective_id = ?1 AND (?2 IS NULL OR id != ?2)",
        params![objective_id, except],
        |row| row.get(0),
    )?)
}

impl GoalDb {
    // === Objectives ===

    pub fn create_objective(&self, input: &NewObjective, now: DateTime<Utc>) -> Result<Objective> {
        input.validate(now)?;
        let objective = Objective {
            id: new_id(),
            user_id: input.user_id.clone(),
            name: input.name.trim().to_string(),
            category: input.category.trim().to_string(),
            description: input.description.clone(),
            target_outcome: input.target_outcome.clone(),
            start_date: input.start_date.unwrap_or(now),
            end_date: input.end_date,
            daily_commitment_minutes: input
                .daily_commitment_minutes
                .unwrap_or(DEFAULT_DAILY_COMMITMENT_MINUTES),
            status: ObjectiveStatus::OnTrack,
            priority: input.priority.unwrap_or(DEFAULT_PRIORITY),
            overall_progress: 0.0,
            created_at: now,
            updated_at: now,
        };

        self.write_tx("create_objective", |tx| {
            load_user(tx, &objective.user_id)?;
            tx.execute(
                &format!(
                    "INSERT INTO objectives ({OBJECTIVE_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
                ),
                params![
                    objective.id,
                    objective.user_id,
                    objective.name,
                    objective.category,
                    objective.description,
                    objective.target_outcome,
                    ts(&objective.start_date),
                    opt_ts(&objective.end_date),
                    objective.daily_commitment_minutes,
                    objective.status.as_str(),
                    objective.priority,
                    objective.overall_progress,
                    ts(&objective.created_at),
                    ts(&objective.updated_at),
                ],
            )?;
            Ok(())
        })?;
        tracing::debug!(objective_id = %objective.id, "objective created");
        Ok(objective)
    }

    pub fn get_objective(&self, id: &str) -> Result<Objective> {
        load_objective(&self.conn, id)
    }

    pub fn list_objectives(&self, user_id: &str) -> Result<Vec<Objective>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {OBJECTIVE_COLUMNS} FROM objectives
             WHERE user_id = ?1 ORDER BY priority DESC, created_at, id"
        ))?;
        let rows = stmt.query_map(params![user_id], row_to_objective)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Objectives included in deviation sweeps.
    pub fn list_active_objectives(&self) -> Result<Vec<Objective>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {OBJECTIVE_COLUMNS} FROM objectives
             WHERE status NOT IN ('paused', 'completed') ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map([], row_to_objective)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Set an objective's status.
    ///
    /// `paused` and `completed` are stored as given. Asking for `on_track` or
    /// `deviation_detected` resumes automatic tracking, so the stored status is
    /// re-derived from unresolved deviations.
    pub fn set_objective_status(
        &self,
        id: &str,
        status: ObjectiveStatus,
        now: DateTime<Utc>,
    ) -> Result<Objective> {
        self.write_tx("set_objective_status", |tx| {
            load_objective(tx, id)?;
            let stored = if status.is_manual() {
                status
            } else {
                ObjectiveStatus::OnTrack
            };
            tx.execute(
                "UPDATE objectives SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![stored.as_str(), ts(&now), id],
            )?;
            refresh_status(tx, id, now)?;
            load_objective(tx, id)
        })
    }

    /// Delete an objective and everything it owns.
    pub fn delete_objective(&self, id: &str) -> Result<()> {
        self.write_tx("delete_objective", |tx| {
            if tx.execute("DELETE FROM objectives WHERE id = ?1", params![id])? == 0 {
                return Err(CoreError::not_found("objective", id));
            }
            Ok(())
        })?;
        tracing::debug!(objective_id = id, "objective deleted");
        Ok(())
    }

    /// Recompute every pillar of an objective, then its overall progress.
    pub fn recompute_objective_progress(&self, id: &str, now: DateTime<Utc>) -> Result<Objective> {
        self.write_tx("recompute_objective_progress", |tx| {
            load_objective(tx, id)?;
            for pillar in pillars_of(tx, id)? {
                recompute_pillar(
                    tx,
                    self.rule.as_ref(),
                    self.config.progress.window_days,
                    &pillar.id,
                    now,
                )?;
            }
            refresh_overall_progress(tx, id, now)?;
            load_objective(tx, id)
        })
    }

    // === Pillars ===

    pub fn add_pillar(&self, input: &NewPillar, now: DateTime<Utc>) -> Result<Pillar> {
        crate::model::require_non_empty("name", &input.name)?;
        let pillar = Pillar {
            id: new_id(),
            objective_id: input.objective_id.clone(),
            name: input.name.trim().to_string(),
            description: input.description.clone(),
            weight: input.weight,
            progress: 0.0,
            created_at: now,
            updated_at: now,
        };

        self.write_tx("add_pillar", |tx| {
            load_objective(tx, &pillar.objective_id)?;
            let siblings = sibling_weight_total(tx, &pillar.objective_id, None)?;
            validate_sibling_weights(&pillar.objective_id, siblings, pillar.weight)?;
            tx.execute(
                &format!(
                    "INSERT INTO pillars ({PILLAR_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                ),
                params![
                    pillar.id,
                    pillar.objective_id,
                    pillar.name,
                    pillar.description,
                    pillar.weight,
                    pillar.progress,
                    ts(&pillar.created_at),
                    ts(&pillar.updated_at),
                ],
            )?;
            refresh_overall_progress(tx, &pillar.objective_id, now)?;
            Ok(())
        })?;
        Ok(pillar)
    }

    pub fn get_pillar(&self, id: &str) -> Result<Pillar> {
        load_pillar(&self.conn, id)
    }

    pub fn list_pillars(&self, objective_id: &str) -> Result<Vec<Pillar>> {
        pillars_of(&self.conn, objective_id)
    }

    pub fn set_pillar_weight(&self, id: &str, weight: f64, now: DateTime<Utc>) -> Result<Pillar> {
        self.write_tx("set_pillar_weight", |tx| {
            let pillar = load_pillar(tx, id)?;
            let siblings = sibling_weight_total(tx, &pillar.objective_id, Some(id))?;
            validate_sibling_weights(&pillar.objective_id, siblings, weight)?;
            tx.execute(
                "UPDATE pillars SET weight = ?1, updated_at = ?2 WHERE id = ?3",
                params![weight, ts(&now), id],
            )?;
            refresh_overall_progress(tx, &pillar.objective_id, now)?;
            load_pillar(tx, id)
        })
    }

    /// Delete a pillar. Its metrics, rituals and tasks stay, detached.
    pub fn delete_pillar(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        self.write_tx("delete_pillar", |tx| {
            let pillar = load_pillar(tx, id)?;
            tx.execute("DELETE FROM pillars WHERE id = ?1", params![id])?;
            refresh_overall_progress(tx, &pillar.objective_id, now)?;
            Ok(())
        })
    }

    pub fn recompute_pillar_progress(&self, id: &str, now: DateTime<Utc>) -> Result<Pillar> {
        self.write_tx("recompute_pillar_progress", |tx| {
            let pillar = recompute_pillar(
                tx,
                self.rule.as_ref(),
                self.config.progress.window_days,
                id,
                now,
            )?
            .ok_or_else(|| CoreError::not_found("pillar", id))?;
            refresh_overall_progress(tx, &pillar.objective_id, now)?;
            Ok(pillar)
        })
    }
}
