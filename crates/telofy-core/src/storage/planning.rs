//! Tasks and deviations.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::db::{get_enum, get_opt_ts, get_ts, opt_ts, ts, GoalDb};
use super::objectives::{
    ensure_pillar_in_objective, load_objective, recompute_pillar_and_objective, refresh_status,
};
use super::tracking::load_ritual;
use crate::error::{CoreError, Result, ValidationError};
use crate::model::{
    new_id, Deviation, DeviationSubject, DeviationType, NewDeviation, NewTask, Task, TaskStatus,
    TaskTransition,
};

const TASK_COLUMNS: &str = "id, user_id, objective_id, pillar_id, ritual_id, title, description,
     why_it_matters, scheduled_at, duration_minutes, status, completed_at, skipped_reason,
     created_at, updated_at";

const DEVIATION_COLUMNS: &str = "id, user_id, objective_id, task_id, ritual_id, metric_id, type,
     detected_at, resolved_at, ai_suggestion, created_at";

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        user_id: row.get(1)?,
        objective_id: row.get(2)?,
        pillar_id: row.get(3)?,
        ritual_id: row.get(4)?,
        title: row.get(5)?,
        description: row.get(6)?,
        why_it_matters: row.get(7)?,
        scheduled_at: get_ts(row, 8)?,
        duration_minutes: row.get(9)?,
        status: get_enum(row, 10)?,
        completed_at: get_opt_ts(row, 11)?,
        skipped_reason: row.get(12)?,
        created_at: get_ts(row, 13)?,
        updated_at: get_ts(row, 14)?,
    })
}

fn row_to_deviation(row: &Row<'_>) -> rusqlite::Result<Deviation> {
    Ok(Deviation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        objective_id: row.get(2)?,
        task_id: row.get(3)?,
        ritual_id: row.get(4)?,
        metric_id: row.get(5)?,
        deviation_type: get_enum(row, 6)?,
        detected_at: get_ts(row, 7)?,
        resolved_at: get_opt_ts(row, 8)?,
        ai_suggestion: row.get(9)?,
        created_at: get_ts(row, 10)?,
    })
}

fn find_task(conn: &Connection, id: &str) -> Result<Option<Task>> {
    Ok(conn
        .query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            params![id],
            row_to_task,
        )
        .optional()?)
}

fn load_task(conn: &Connection, id: &str) -> Result<Task> {
    find_task(conn, id)?.ok_or_else(|| CoreError::not_found("task", id))
}

/// Tasks of an objective, optionally narrowed to one status, by `scheduled_at`.
pub(crate) fn tasks_of_objective(
    conn: &Connection,
    objective_id: &str,
    status: Option<TaskStatus>,
) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         WHERE objective_id = ?1 AND (?2 IS NULL OR status = ?2)
         ORDER BY scheduled_at, id"
    ))?;
    let rows = stmt.query_map(
        params![objective_id, status.map(|s| s.as_str())],
        row_to_task,
    )?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn load_deviation(conn: &Connection, id: &str) -> Result<Deviation> {
    conn.query_row(
        &format!("SELECT {DEVIATION_COLUMNS} FROM deviations WHERE id = ?1"),
        params![id],
        row_to_deviation,
    )
    .optional()?
    .ok_or_else(|| CoreError::not_found("deviation", id))
}

/// Whether a deviation of this type exists for the subject.
///
/// `unresolved_only` narrows to open deviations; `detected_since` to those
/// detected at or after the instant.
pub(crate) fn deviation_exists(
    conn: &Connection,
    deviation_type: DeviationType,
    subject: &DeviationSubject,
    unresolved_only: bool,
    detected_since: Option<DateTime<Utc>>,
) -> Result<bool> {
    let sql = format!(
        "SELECT EXISTS(
            SELECT 1 FROM deviations
            WHERE type = ?1 AND {column} = ?2
              AND (?3 = 0 OR resolved_at IS NULL)
              AND (?4 IS NULL OR detected_at >= ?4)
         )",
        column = subject.column()
    );
    Ok(conn.query_row(
        &sql,
        params![
            deviation_type.as_str(),
            subject.id(),
            unresolved_only,
            opt_ts(&detected_since),
        ],
        |row| row.get(0),
    )?)
}

/// Record a deviation unless an unresolved one of the same type already exists
/// for the subject.
pub(crate) fn insert_deviation(conn: &Connection, input: &NewDeviation) -> Result<Option<Deviation>> {
    if deviation_exists(conn, input.deviation_type, &input.subject, true, None)? {
        return Ok(None);
    }
    let mut deviation = Deviation {
        id: new_id(),
        user_id: input.user_id.clone(),
        objective_id: input.objective_id.clone(),
        task_id: None,
        ritual_id: None,
        metric_id: None,
        deviation_type: input.deviation_type,
        detected_at: input.detected_at,
        resolved_at: None,
        ai_suggestion: None,
        created_at: input.detected_at,
    };
    match &input.subject {
        DeviationSubject::Task(id) => deviation.task_id = Some(id.clone()),
        DeviationSubject::Ritual(id) => deviation.ritual_id = Some(id.clone()),
        DeviationSubject::Metric(id) => deviation.metric_id = Some(id.clone()),
    }
    conn.execute(
        &format!(
            "INSERT INTO deviations ({DEVIATION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        params![
            deviation.id,
            deviation.user_id,
            deviation.objective_id,
            deviation.task_id,
            deviation.ritual_id,
            deviation.metric_id,
            deviation.deviation_type.as_str(),
            ts(&deviation.detected_at),
            opt_ts(&deviation.resolved_at),
            deviation.ai_suggestion,
            ts(&deviation.created_at),
        ],
    )?;
    tracing::info!(
        deviation_id = %deviation.id,
        objective_id = %deviation.objective_id,
        kind = %deviation.deviation_type,
        subject = input.subject.id(),
        "deviation detected"
    );
    Ok(Some(deviation))
}

/// Filter for [`GoalDb::list_deviations`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviationFilter {
    pub user_id: Option<String>,
    pub objective_id: Option<String>,
    pub unresolved_only: bool,
}

impl GoalDb {
    // === Tasks ===

    /// Insert a planned task. The owner is taken from the objective.
    pub fn create_task(&self, input: &NewTask, now: DateTime<Utc>) -> Result<Task> {
        input.validate()?;
        self.write_tx("create_task", |tx| {
            let objective = load_objective(tx, &input.objective_id)?;
            ensure_pillar_in_objective(tx, input.pillar_id.as_deref(), &objective.id)?;
            if let Some(ritual_id) = input.ritual_id.as_deref() {
                let ritual = load_ritual(tx, ritual_id)?;
                if ritual.objective_id != objective.id {
                    return Err(ValidationError::invalid(
                        "ritual_id",
                        format!("ritual {ritual_id} belongs to another objective"),
                    )
                    .into());
                }
            }
            let task = Task {
                id: new_id(),
                user_id: objective.user_id.clone(),
                objective_id: objective.id.clone(),
                pillar_id: input.pillar_id.clone(),
                ritual_id: input.ritual_id.clone(),
                title: input.title.trim().to_string(),
                description: input.description.clone(),
                why_it_matters: input.why_it_matters.clone(),
                scheduled_at: input.scheduled_at,
                duration_minutes: input.duration_minutes,
                status: TaskStatus::Pending,
                completed_at: None,
                skipped_reason: None,
                created_at: now,
                updated_at: now,
            };
            tx.execute(
                &format!(
                    "INSERT INTO tasks ({TASK_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
                ),
                params![
                    task.id,
                    task.user_id,
                    task.objective_id,
                    task.pillar_id,
                    task.ritual_id,
                    task.title,
                    task.description,
                    task.why_it_matters,
                    ts(&task.scheduled_at),
                    task.duration_minutes,
                    task.status.as_str(),
                    opt_ts(&task.completed_at),
                    task.skipped_reason,
                    ts(&task.created_at),
                    ts(&task.updated_at),
                ],
            )?;
            recompute_pillar_and_objective(self, tx, task.pillar_id.as_deref(), now)?;
            Ok(task)
        })
    }

    pub fn get_task(&self, id: &str) -> Result<Task> {
        load_task(&self.conn, id)
    }

    pub fn list_tasks(&self, objective_id: &str, status: Option<TaskStatus>) -> Result<Vec<Task>> {
        tasks_of_objective(&self.conn, objective_id, status)
    }

    /// Move a task through its lifecycle and refresh its pillar's progress.
    pub fn transition_task(
        &self,
        id: &str,
        transition: TaskTransition,
        now: DateTime<Utc>,
    ) -> Result<Task> {
        self.write_tx("transition_task", |tx| {
            let mut task = load_task(tx, id)?;
            task.apply(transition.clone(), now)?;
            tx.execute(
                "UPDATE tasks SET status = ?1, completed_at = ?2, skipped_reason = ?3,
                                  updated_at = ?4
                 WHERE id = ?5",
                params![
                    task.status.as_str(),
                    opt_ts(&task.completed_at),
                    task.skipped_reason,
                    ts(&task.updated_at),
                    task.id,
                ],
            )?;
            recompute_pillar_and_objective(self, tx, task.pillar_id.as_deref(), now)?;
            Ok(task)
        })
    }

    // === Deviations ===

    pub fn get_deviation(&self, id: &str) -> Result<Deviation> {
        load_deviation(&self.conn, id)
    }

    pub fn list_deviations(&self, filter: &DeviationFilter) -> Result<Vec<Deviation>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DEVIATION_COLUMNS} FROM deviations
             WHERE (?1 IS NULL OR user_id = ?1)
               AND (?2 IS NULL OR objective_id = ?2)
               AND (?3 = 0 OR resolved_at IS NULL)
             ORDER BY detected_at, id"
        ))?;
        let rows = stmt.query_map(
            params![filter.user_id, filter.objective_id, filter.unresolved_only],
            row_to_deviation,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Close a deviation and re-derive its objective's status.
    ///
    /// Resolving an already resolved deviation keeps the first `resolved_at`.
    pub fn resolve_deviation(&self, id: &str, at: DateTime<Utc>) -> Result<Deviation> {
        self.write_tx("resolve_deviation", |tx| {
            let deviation = load_deviation(tx, id)?;
            if deviation.is_resolved() {
                return Ok(deviation);
            }
            tx.execute(
                "UPDATE deviations SET resolved_at = ?1 WHERE id = ?2",
                params![ts(&at), id],
            )?;
            refresh_status(tx, &deviation.objective_id, at)?;
            load_deviation(tx, id)
        })
    }

    /// Attach a corrective suggestion to a deviation.
    pub fn set_ai_suggestion(&self, id: &str, suggestion: &str) -> Result<Deviation> {
        self.write_tx("set_ai_suggestion", |tx| {
            if tx.execute(
                "UPDATE deviations SET ai_suggestion = ?1 WHERE id = ?2",
                params![suggestion, id],
            )? == 0
            {
                return Err(CoreError::not_found("deviation", id));
            }
            load_deviation(tx, id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewObjective, NewUser, Objective, ObjectiveStatus};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn setup() -> (GoalDb, Objective) {
        let db = GoalDb::open_memory().unwrap();
        let user = db
            .create_user(&NewUser::new("Ada", "ada@example.com"), t0())
            .unwrap();
        let objective = db
            .create_objective(&NewObjective::new(&user.id, "Get Promoted", "career"), t0())
            .unwrap();
        (db, objective)
    }

    fn make_test_task(db: &GoalDb, objective: &Objective) -> Task {
        db.create_task(
            &NewTask::new(&objective.id, "Draft promo packet", t0() + Duration::hours(1)),
            t0(),
        )
        .unwrap()
    }

    #[test]
    fn task_takes_owner_from_objective() {
        let (db, objective) = setup();
        let task = make_test_task(&db, &objective);
        assert_eq!(task.user_id, objective.user_id);
        assert_eq!(task.duration_minutes, 30);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(db.list_tasks(&objective.id, None).unwrap().len(), 1);
        assert_eq!(
            db.list_tasks(&objective.id, Some(TaskStatus::Completed))
                .unwrap()
                .len(),
            0
        );
    }

    #[test]
    fn terminal_tasks_are_immutable() {
        let (db, objective) = setup();
        let task = make_test_task(&db, &objective);
        let done = db
            .transition_task(&task.id, TaskTransition::Complete, t0())
            .unwrap();
        assert_eq!(done.completed_at, Some(t0()));

        let err = db
            .transition_task(&task.id, TaskTransition::Start, t0())
            .unwrap_err();
        assert!(matches!(err, CoreError::Transition(_)));
        assert_eq!(db.get_task(&task.id).unwrap().status, TaskStatus::Completed);
    }

    #[test]
    fn deviation_lifecycle_drives_status() {
        let (db, objective) = setup();
        let task = make_test_task(&db, &objective);
        let input = NewDeviation {
            user_id: objective.user_id.clone(),
            objective_id: objective.id.clone(),
            deviation_type: DeviationType::MissedTask,
            subject: DeviationSubject::Task(task.id.clone()),
            detected_at: t0(),
        };

        let deviation = db
            .write_tx("test", |tx| {
                let d = insert_deviation(tx, &input)?;
                refresh_status(tx, &objective.id, t0())?;
                Ok(d)
            })
            .unwrap()
            .unwrap();
        // Same subject and type while unresolved: skipped.
        let duplicate = db.write_tx("test", |tx| insert_deviation(tx, &input)).unwrap();
        assert!(duplicate.is_none());
        assert_eq!(
            db.get_objective(&objective.id).unwrap().status,
            ObjectiveStatus::DeviationDetected
        );

        let resolved = db.resolve_deviation(&deviation.id, t0()).unwrap();
        assert_eq!(resolved.resolved_at, Some(t0()));
        let again = db
            .resolve_deviation(&deviation.id, t0() + Duration::hours(1))
            .unwrap();
        assert_eq!(again.resolved_at, Some(t0()));
        assert_eq!(
            db.get_objective(&objective.id).unwrap().status,
            ObjectiveStatus::OnTrack
        );

        let filter = DeviationFilter {
            objective_id: Some(objective.id.clone()),
            unresolved_only: true,
            ..Default::default()
        };
        assert!(db.list_deviations(&filter).unwrap().is_empty());
        let all = DeviationFilter {
            user_id: Some(objective.user_id.clone()),
            ..Default::default()
        };
        assert_eq!(db.list_deviations(&all).unwrap().len(), 1);

        let with_hint = db.set_ai_suggestion(&deviation.id, "Block 30 minutes").unwrap();
        assert_eq!(with_hint.ai_suggestion.as_deref(), Some("Block 30 minutes"));
    }

    #[test]
    fn deleting_task_detaches_deviation() {
        let (db, objective) = setup();
        let task = make_test_task(&db, &objective);
        let input = NewDeviation {
            user_id: objective.user_id.clone(),
            objective_id: objective.id.clone(),
            deviation_type: DeviationType::MissedTask,
            subject: DeviationSubject::Task(task.id.clone()),
            detected_at: t0(),
        };
        let deviation = db
            .write_tx("test", |tx| insert_deviation(tx, &input))
            .unwrap()
            .unwrap();
        db.conn()
            .execute("DELETE FROM tasks WHERE id = ?1", params![task.id])
            .unwrap();
        let reloaded = db.get_deviation(&deviation.id).unwrap();
        assert!(reloaded.task_id.is_none());
    }

    #[test]
    fn resolving_unknown_deviation_is_not_found() {
        let (db, _) = setup();
        assert!(matches!(
            db.resolve_deviation("nope", t0()),
            Err(CoreError::NotFound { entity: "deviation", .. })
        ));
    }
}
