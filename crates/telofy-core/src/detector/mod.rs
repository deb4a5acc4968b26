//! Deviation detection.
//!
//! A sweep walks every objective that is neither paused nor completed and flags
//! gaps between plan and reality:
//! - `missed_task`: a pending task past its time box plus grace
//! - `missed_ritual`: the last closed period of a ritual did not qualify
//! - `streak_broken`: the run seen by the previous sweep has since ended
//! - `metric_regressed`: the latest entry moved against the target direction
//!
//! Each objective is scanned in its own write transaction; a failing objective
//! is reported and the sweep moves on.

mod suggest;

pub use suggest::{RuleBasedSuggester, Suggester};

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::error::Result;
use crate::model::{
    Deviation, DeviationSubject, DeviationType, NewDeviation, Ritual, TargetDirection, Task,
    TaskStatus,
};
use crate::storage::{self, DetectorConfig, GoalDb};
use crate::streak::{
    completion_counts, compute_streak, last_closed_period, period_qualifies, run_ended_since,
    Period, StreakPolicy,
};

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub objectives_scanned: usize,
    /// Deviations created by this sweep, with suggestions when generated.
    pub deviations: Vec<Deviation>,
    pub streaks_refreshed: usize,
    pub failures: Vec<SweepFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepFailure {
    pub objective_id: String,
    pub error: String,
}

#[derive(Debug, Default)]
struct ObjectiveScan {
    deviations: Vec<Deviation>,
    streaks_refreshed: usize,
}

impl ObjectiveScan {
    fn record(&mut self, deviation: Option<Deviation>) {
        self.deviations.extend(deviation);
    }
}

/// A pending task whose time box plus `grace` has passed.
pub fn task_is_missed(task: &Task, now: DateTime<Utc>, grace: Duration) -> bool {
    task.status == TaskStatus::Pending && task.due_at() + grace < now
}

/// The ritual's last closed period, when it existed for all of it and the
/// period did not qualify.
pub fn missed_period(
    ritual: &Ritual,
    completions: &[DateTime<Utc>],
    now: DateTime<Utc>,
    policy: &StreakPolicy,
) -> Option<Period> {
    let period = last_closed_period(ritual, now, policy.timezone)?;
    if ritual.created_at > period.start_utc(policy.timezone) {
        return None;
    }
    let counts = completion_counts(completions, policy.timezone, now);
    if period_qualifies(ritual, &counts, &period, policy.weekly_rule) {
        None
    } else {
        Some(period)
    }
}

fn magnitude(value: f64) -> f64 {
    if value.abs() > f64::EPSILON {
        value.abs()
    } else {
        1.0
    }
}

/// Whether `latest` moved against `direction` by more than `tolerance`.
///
/// Tolerance is a ratio of the reference magnitude: the previous value, or the
/// target when the previous value is zero. `maintain` compares the latest value
/// to the target, or to the previous value when there is no target.
pub fn metric_regressed(
    direction: TargetDirection,
    previous: Option<f64>,
    latest: f64,
    target: Option<f64>,
    tolerance: f64,
) -> bool {
    let allowance = |previous: f64| {
        let reference = if previous.abs() > f64::EPSILON {
            previous.abs()
        } else {
            target.map(magnitude).unwrap_or(1.0)
        };
        tolerance * reference
    };
    match direction {
        TargetDirection::Increase => previous.is_some_and(|p| latest < p - allowance(p)),
        TargetDirection::Decrease => previous.is_some_and(|p| latest > p + allowance(p)),
        TargetDirection::Maintain => match target.or(previous) {
            Some(anchor) => (latest - anchor).abs() > tolerance * magnitude(anchor),
            None => false,
        },
    }
}

pub struct DeviationDetector {
    config: DetectorConfig,
    suggester: Option<Box<dyn Suggester>>,
}

impl DeviationDetector {
    /// Detector with the rule-based suggester when `generate_suggestions` is set.
    pub fn new(config: DetectorConfig) -> Self {
        let suggester: Option<Box<dyn Suggester>> = if config.generate_suggestions {
            Some(Box::new(RuleBasedSuggester))
        } else {
            None
        };
        Self { config, suggester }
    }

    pub fn with_suggester(mut self, suggester: Box<dyn Suggester>) -> Self {
        self.suggester = Some(suggester);
        self
    }

    pub fn without_suggester(mut self) -> Self {
        self.suggester = None;
        self
    }

    /// Scan every active objective as of `now`.
    pub fn sweep(&self, db: &GoalDb, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        for objective in db.list_active_objectives()? {
            report.objectives_scanned += 1;
            let scanned = db.write_tx("sweep_objective", |tx| {
                self.scan_objective(db, tx, &objective.id, now)
            });
            match scanned {
                Ok(scan) => {
                    report.streaks_refreshed += scan.streaks_refreshed;
                    report.deviations.extend(scan.deviations);
                }
                Err(e) => {
                    tracing::warn!(objective_id = %objective.id, error = %e, "objective sweep failed");
                    report.failures.push(SweepFailure {
                        objective_id: objective.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if let Some(suggester) = &self.suggester {
            for deviation in report.deviations.iter_mut() {
                self.attach_suggestion(db, suggester.as_ref(), deviation);
            }
        }

        tracing::info!(
            objectives = report.objectives_scanned,
            created = report.deviations.len(),
            streaks_refreshed = report.streaks_refreshed,
            failures = report.failures.len(),
            "deviation sweep finished"
        );
        Ok(report)
    }

    fn attach_suggestion(&self, db: &GoalDb, suggester: &dyn Suggester, deviation: &mut Deviation) {
        let text = match suggester.suggest(deviation) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    suggester = suggester.name(),
                    deviation_id = %deviation.id,
                    error = %e,
                    "suggestion failed"
                );
                return;
            }
        };
        match db.set_ai_suggestion(&deviation.id, &text) {
            Ok(updated) => *deviation = updated,
            Err(e) => {
                tracing::warn!(deviation_id = %deviation.id, error = %e, "failed to store suggestion");
            }
        }
    }

    fn scan_objective(
        &self,
        db: &GoalDb,
        conn: &Connection,
        objective_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ObjectiveScan> {
        let mut scan = ObjectiveScan::default();
        // Re-read inside the transaction: it may have been paused or deleted since listing.
        let Some(objective) = storage::find_objective(conn, objective_id)? else {
            tracing::debug!(objective_id, "objective vanished before sweep");
            return Ok(scan);
        };
        if !objective.status.is_active() {
            return Ok(scan);
        }

        let tz = storage::objective_owner_tz(conn, &objective.id, db.config().default_tz())?;
        let policy = StreakPolicy::new(tz, db.config().streaks.weekly_rule);
        let new_deviation = |deviation_type: DeviationType, subject: DeviationSubject| NewDeviation {
            user_id: objective.user_id.clone(),
            objective_id: objective.id.clone(),
            deviation_type,
            subject,
            detected_at: now,
        };

        let grace = Duration::minutes(i64::from(self.config.task_grace_minutes));
        for task in storage::tasks_of_objective(conn, &objective.id, Some(TaskStatus::Pending))? {
            if !task_is_missed(&task, now, grace) {
                continue;
            }
            let subject = DeviationSubject::Task(task.id.clone());
            // A task is flagged at most once, even after resolution.
            if storage::deviation_exists(conn, DeviationType::MissedTask, &subject, false, None)? {
                continue;
            }
            scan.record(storage::insert_deviation(
                conn,
                &new_deviation(DeviationType::MissedTask, subject),
            )?);
        }

        for ritual in storage::rituals_of_objective(conn, &objective.id)? {
            let completions = storage::completion_times(conn, &ritual.id)?;
            let summary = compute_streak(&ritual, &completions, now, &policy)
                .with_cached_longest(ritual.longest_streak);

            // Compared against the previous sweep, not the cache: completions and
            // refreshes rewrite the cache between sweeps. A ritual never swept
            // falls back to the cache as of its last write.
            let baseline = match storage::swept_streak(conn, &ritual.id)? {
                Some(swept) => Some(swept),
                None => (ritual.current_streak > 0)
                    .then_some((ritual.current_streak, ritual.updated_at)),
            };
            if let Some((streak, since)) = baseline {
                if streak > 0 && run_ended_since(&ritual, &completions, since, now, &policy) {
                    scan.record(storage::insert_deviation(
                        conn,
                        &new_deviation(
                            DeviationType::StreakBroken,
                            DeviationSubject::Ritual(ritual.id.clone()),
                        ),
                    )?);
                }
            }
            storage::write_swept_streak(conn, &ritual.id, summary.current, now)?;
            if summary.current != ritual.current_streak || summary.longest != ritual.longest_streak
            {
                storage::write_streak(conn, &ritual.id, summary, now)?;
                scan.streaks_refreshed += 1;
            }

            if let Some(period) = missed_period(&ritual, &completions, now, &policy) {
                let subject = DeviationSubject::Ritual(ritual.id.clone());
                let judged = storage::deviation_exists(
                    conn,
                    DeviationType::MissedRitual,
                    &subject,
                    false,
                    Some(period.end_utc(tz)),
                )?;
                if !judged {
                    scan.record(storage::insert_deviation(
                        conn,
                        &new_deviation(DeviationType::MissedRitual, subject),
                    )?);
                }
            }
        }

        for metric in storage::metrics_of_objective(conn, &objective.id)? {
            let Some(direction) = metric.target_direction else {
                continue;
            };
            let entries = storage::latest_entries(conn, &metric.id, 2)?;
            let Some(latest) = entries.first() else {
                continue;
            };
            let previous = entries.get(1).map(|entry| entry.value);
            if !metric_regressed(
                direction,
                previous,
                latest.value,
                metric.target,
                self.config.metric_tolerance,
            ) {
                continue;
            }
            let subject = DeviationSubject::Metric(metric.id.clone());
            let judged = storage::deviation_exists(
                conn,
                DeviationType::MetricRegressed,
                &subject,
                false,
                Some(latest.created_at),
            )?;
            if !judged {
                scan.record(storage::insert_deviation(
                    conn,
                    &new_deviation(DeviationType::MetricRegressed, subject),
                )?);
            }
        }

        storage::refresh_status(conn, &objective.id, now)?;
        Ok(scan)
    }
}
