//! Integration tests for the goal-tracking workflow.
//!
//! These tests drive the public API end to end: planning work under pillars,
//! recording it, sweeping for deviations and resolving them.

use chrono::{DateTime, Duration, TimeZone, Utc};
use telofy_core::{
    Config, CoreError, DeviationDetector, DeviationFilter, DeviationType, Frequency, GoalDb,
    NewMetric, NewObjective, NewPillar, NewRitual, NewTask, NewUser, Objective, ObjectiveStatus,
    PillarInputs, PillarProgressRule, TargetDirection, TaskTransition, WaitlistOutcome,
};

/// Counts only completed tasks, 10 points each.
struct TenPerTask;

impl PillarProgressRule for TenPerTask {
    fn progress(&self, inputs: &PillarInputs) -> f64 {
        f64::from(inputs.tasks_completed) * 10.0
    }
}

/// Rows of `table` whose `column` equals `id`.
fn count_rows(db: &GoalDb, table: &str, column: &str, id: &str) -> i64 {
    db.conn()
        .query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE {column} = ?1"),
            [id],
            |row| row.get(0),
        )
        .unwrap()
}

/// Monday 2026-03-02, 09:00 UTC.
fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

fn setup(db: &GoalDb) -> Objective {
    let mut input = NewUser::new("Grace", "grace@example.com");
    input.timezone = Some("UTC".into());
    let user = db.create_user(&input, t0()).unwrap();
    db.create_objective(&NewObjective::new(&user.id, "Get Promoted", "career"), t0())
        .unwrap()
}

/// Plan `total` tasks in the past under `pillar_id` and complete `done` of them.
fn plan_and_complete(db: &GoalDb, objective: &Objective, pillar_id: &str, total: usize, done: usize) {
    for i in 0..total {
        let mut input = NewTask::new(&objective.id, format!("Task {i}"), t0() - Duration::hours(2));
        input.pillar_id = Some(pillar_id.to_string());
        let task = db.create_task(&input, t0()).unwrap();
        if i < done {
            db.transition_task(&task.id, TaskTransition::Complete, t0())
                .unwrap();
        }
    }
}

#[test]
fn test_weighted_progress_end_to_end() {
    let db = GoalDb::open_memory().unwrap();
    let objective = setup(&db);
    let skills = db
        .add_pillar(&NewPillar::new(&objective.id, "Technical Skills", 0.6), t0())
        .unwrap();
    let visibility = db
        .add_pillar(&NewPillar::new(&objective.id, "Visibility", 0.4), t0())
        .unwrap();

    plan_and_complete(&db, &objective, &skills.id, 5, 4);
    plan_and_complete(&db, &objective, &visibility.id, 5, 2);

    assert!((db.get_pillar(&skills.id).unwrap().progress - 80.0).abs() < 1e-9);
    assert!((db.get_pillar(&visibility.id).unwrap().progress - 40.0).abs() < 1e-9);
    let objective = db.get_objective(&objective.id).unwrap();
    assert!((objective.overall_progress - 64.0).abs() < 1e-9);

    // Recomputing from scratch agrees with the caches.
    let recomputed = db.recompute_objective_progress(&objective.id, t0()).unwrap();
    assert!((recomputed.overall_progress - 64.0).abs() < 1e-9);
}

#[test]
fn test_custom_progress_rule() {
    let db = GoalDb::open_memory()
        .unwrap()
        .with_progress_rule(Box::new(TenPerTask));
    let objective = setup(&db);
    let pillar = db
        .add_pillar(&NewPillar::new(&objective.id, "Output", 1.0), t0())
        .unwrap();
    plan_and_complete(&db, &objective, &pillar.id, 5, 3);

    assert!((db.get_pillar(&pillar.id).unwrap().progress - 30.0).abs() < 1e-9);
    let objective = db.get_objective(&objective.id).unwrap();
    assert!((objective.overall_progress - 30.0).abs() < 1e-9);
}

#[test]
fn test_deleting_pillar_detaches_work_and_renormalizes() {
    let db = GoalDb::open_memory().unwrap();
    let objective = setup(&db);
    let skills = db
        .add_pillar(&NewPillar::new(&objective.id, "Technical Skills", 0.6), t0())
        .unwrap();
    let visibility = db
        .add_pillar(&NewPillar::new(&objective.id, "Visibility", 0.4), t0())
        .unwrap();
    plan_and_complete(&db, &objective, &skills.id, 5, 4);
    plan_and_complete(&db, &objective, &visibility.id, 5, 2);
    let mut metric = NewMetric::new(&objective.id, "Talks given", "count");
    metric.pillar_id = Some(visibility.id.clone());
    let metric = db.add_metric(&metric, t0()).unwrap();
    let mut ritual = NewRitual::new(&objective.id, "Post an update", Frequency::Daily);
    ritual.pillar_id = Some(visibility.id.clone());
    let ritual = db.add_ritual(&ritual, t0()).unwrap();

    db.delete_pillar(&visibility.id, t0()).unwrap();

    assert_eq!(db.get_metric(&metric.id).unwrap().pillar_id, None);
    assert_eq!(db.get_ritual(&ritual.id).unwrap().pillar_id, None);

    let objective = db.get_objective(&objective.id).unwrap();
    assert!((objective.overall_progress - 80.0).abs() < 1e-9);
    let detached = db
        .list_tasks(&objective.id, None)
        .unwrap()
        .into_iter()
        .filter(|t| t.pillar_id.is_none())
        .count();
    assert_eq!(detached, 5);
}

#[test]
fn test_pillar_weights_cannot_exceed_one() {
    let db = GoalDb::open_memory().unwrap();
    let objective = setup(&db);
    db.add_pillar(&NewPillar::new(&objective.id, "A", 0.7), t0())
        .unwrap();
    let err = db
        .add_pillar(&NewPillar::new(&objective.id, "B", 0.4), t0())
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)), "{err}");
    assert_eq!(db.list_pillars(&objective.id).unwrap().len(), 1);
}

#[test]
fn test_objective_delete_cascades() {
    let db = GoalDb::open_memory().unwrap();
    let objective = setup(&db);
    let pillar = db
        .add_pillar(&NewPillar::new(&objective.id, "Reading", 1.0), t0())
        .unwrap();
    let task = db
        .create_task(&NewTask::new(&objective.id, "Write", t0()), t0())
        .unwrap();
    let ritual = db
        .add_ritual(&NewRitual::new(&objective.id, "Read", Frequency::Daily), t0())
        .unwrap();
    db.complete_ritual(&ritual.id, t0(), None, t0()).unwrap();
    let mut metric = NewMetric::new(&objective.id, "Pages", "count");
    metric.pillar_id = Some(pillar.id.clone());
    let metric = db.add_metric(&metric, t0()).unwrap();
    db.record_metric_entry(&metric.id, 40.0, None, t0(), t0())
        .unwrap();
    DeviationDetector::new(Config::default().detector)
        .sweep(&db, t0() + Duration::hours(2))
        .unwrap();
    assert_eq!(count_rows(&db, "ritual_completions", "ritual_id", &ritual.id), 1);
    assert_eq!(count_rows(&db, "metric_entries", "metric_id", &metric.id), 1);

    db.delete_objective(&objective.id).unwrap();

    assert!(matches!(db.get_task(&task.id), Err(CoreError::NotFound { .. })));
    assert!(matches!(db.get_ritual(&ritual.id), Err(CoreError::NotFound { .. })));
    assert!(matches!(db.get_metric(&metric.id), Err(CoreError::NotFound { .. })));
    assert!(matches!(db.get_pillar(&pillar.id), Err(CoreError::NotFound { .. })));
    assert_eq!(count_rows(&db, "pillars", "objective_id", &objective.id), 0);
    assert_eq!(count_rows(&db, "ritual_completions", "ritual_id", &ritual.id), 0);
    assert_eq!(count_rows(&db, "metric_entries", "metric_id", &metric.id), 0);
    let remaining = db
        .list_deviations(&DeviationFilter {
            user_id: Some(objective.user_id.clone()),
            ..Default::default()
        })
        .unwrap();
    assert!(remaining.is_empty());
}

#[test]
fn test_user_delete_removes_everything() {
    let db = GoalDb::open_memory().unwrap();
    let objective = setup(&db);
    db.create_session(&objective.user_id, None, None, t0())
        .unwrap();
    db.delete_user(&objective.user_id).unwrap();
    assert!(matches!(
        db.get_objective(&objective.id),
        Err(CoreError::NotFound { .. })
    ));
}

#[test]
fn test_sweep_resolve_cycle() {
    let db = GoalDb::open_memory().unwrap();
    let objective = setup(&db);
    db.create_task(&NewTask::new(&objective.id, "Write", t0()), t0())
        .unwrap();
    let mut metric = NewMetric::new(&objective.id, "Body weight", "kg");
    metric.target = Some(80.0);
    metric.target_direction = Some(TargetDirection::Decrease);
    let metric = db.add_metric(&metric, t0()).unwrap();
    db.record_metric_entry(&metric.id, 85.0, None, t0() - Duration::days(7), t0())
        .unwrap();
    db.record_metric_entry(&metric.id, 90.0, None, t0(), t0())
        .unwrap();

    let detector = DeviationDetector::new(Config::default().detector);
    let now = t0() + Duration::hours(2);
    let report = detector.sweep(&db, now).unwrap();
    let mut kinds: Vec<_> = report.deviations.iter().map(|d| d.deviation_type).collect();
    kinds.sort_by_key(|k| k.as_str());
    assert_eq!(kinds, vec![DeviationType::MetricRegressed, DeviationType::MissedTask]);
    assert_eq!(
        db.get_objective(&objective.id).unwrap().status,
        ObjectiveStatus::DeviationDetected
    );

    // Sweeping unchanged data again is a no-op.
    assert!(detector.sweep(&db, now).unwrap().deviations.is_empty());

    for deviation in &report.deviations {
        db.resolve_deviation(&deviation.id, now).unwrap();
    }
    assert_eq!(
        db.get_objective(&objective.id).unwrap().status,
        ObjectiveStatus::OnTrack
    );

    // Resolving twice keeps the first resolution time.
    let again = db
        .resolve_deviation(&report.deviations[0].id, now + Duration::hours(1))
        .unwrap();
    assert_eq!(again.resolved_at, Some(now));
}

#[test]
fn test_completed_objective_keeps_status_through_resolution() {
    let db = GoalDb::open_memory().unwrap();
    let objective = setup(&db);
    db.create_task(&NewTask::new(&objective.id, "Write", t0()), t0())
        .unwrap();
    let report = DeviationDetector::new(Config::default().detector)
        .sweep(&db, t0() + Duration::hours(2))
        .unwrap();
    db.set_objective_status(&objective.id, ObjectiveStatus::Completed, t0())
        .unwrap();
    db.resolve_deviation(&report.deviations[0].id, t0() + Duration::hours(3))
        .unwrap();
    assert_eq!(
        db.get_objective(&objective.id).unwrap().status,
        ObjectiveStatus::Completed
    );
}

#[test]
fn test_backdated_completion_rebuilds_streak() {
    let db = GoalDb::open_memory().unwrap();
    let objective = setup(&db);
    let ritual = db
        .add_ritual(&NewRitual::new(&objective.id, "Journal", Frequency::Daily), t0())
        .unwrap();
    let day = |n: i64| t0() + Duration::days(n);

    db.complete_ritual(&ritual.id, day(1), None, day(1)).unwrap();
    db.complete_ritual(&ritual.id, day(3), None, day(3)).unwrap();
    let recorded = db.complete_ritual(&ritual.id, day(2), Some("late entry"), day(3))
        .unwrap();

    assert_eq!(recorded.ritual.current_streak, 3);
    assert_eq!(recorded.ritual.longest_streak, 3);
    let completions = db.list_ritual_completions(&ritual.id).unwrap();
    assert_eq!(completions.len(), 3);
    assert!(completions.windows(2).all(|w| w[0].completed_at <= w[1].completed_at));
}

#[test]
fn test_waitlist_deduplicates_case_insensitively() {
    let db = GoalDb::open_memory().unwrap();
    assert!(matches!(
        db.join_waitlist("Early@Example.com", t0()).unwrap(),
        WaitlistOutcome::Joined { .. }
    ));
    assert!(matches!(
        db.join_waitlist("early@example.com ", t0()).unwrap(),
        WaitlistOutcome::AlreadyListed
    ));
    assert_eq!(db.list_waitlist().unwrap().len(), 1);
}

#[test]
fn test_session_lifecycle() {
    let db = GoalDb::open_memory().unwrap();
    let objective = setup(&db);
    let issued = db
        .create_session(&objective.user_id, Some("127.0.0.1"), Some("curl"), t0())
        .unwrap();

    let user = db.current_user(&issued.token, t0() + Duration::days(1)).unwrap();
    assert_eq!(user.map(|u| u.id), Some(objective.user_id.clone()));

    // Well past the sliding expiry.
    let late = t0() + Duration::days(90);
    assert!(db.current_user(&issued.token, late).unwrap().is_none());
    assert!(db.get_session(&issued.token).unwrap().is_none());
    assert!(!db.revoke_session(&issued.token).unwrap());
}

#[test]
fn test_file_database_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("telofy.db");
    let config = Config::default();

    let objective_id = {
        let db = GoalDb::open_at(&path, &config).unwrap();
        setup(&db).id
    };

    let db = GoalDb::open_at(&path, &config).unwrap();
    let objective = db.get_objective(&objective_id).unwrap();
    assert_eq!(objective.name, "Get Promoted");
    assert_eq!(objective.status, ObjectiveStatus::OnTrack);
}
