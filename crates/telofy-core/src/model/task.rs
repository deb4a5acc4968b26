//! Scheduled tasks and their lifecycle.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Task status.
///
///   PENDING ──> IN_PROGRESS ──> COMPLETED
///      │             │
///      │             +────────> SKIPPED
///      +──> COMPLETED | SKIPPED
///
/// COMPLETED and SKIPPED are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Skipped,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Skipped)
    }

    /// Check if a transition is valid.
    pub fn can_transition_to(&self, to: &TaskStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match self {
            TaskStatus::Pending => *to != TaskStatus::Pending,
            _ => to.is_terminal(),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "skipped" => Ok(TaskStatus::Skipped),
            other => Err(ValidationError::UnknownVariant {
                kind: "task status",
                value: other.to_string(),
            }),
        }
    }
}

/// Action that moves a task through its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum TaskTransition {
    Start,
    Complete,
    Skip { reason: Option<String> },
}

impl TaskTransition {
    pub fn target(&self) -> TaskStatus {
        match self {
            TaskTransition::Start => TaskStatus::InProgress,
            TaskTransition::Complete => TaskStatus::Completed,
            TaskTransition::Skip { .. } => TaskStatus::Skipped,
        }
    }
}

/// Error returned when an invalid state transition is attempted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[error("Invalid task transition: {from} -> {to}")]
pub struct TaskTransitionError {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// Time-boxed unit of work generated for an objective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub objective_id: String,
    pub pillar_id: Option<String>,
    pub ritual_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub why_it_matters: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub status: TaskStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub skipped_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// End of the scheduled time box.
    pub fn due_at(&self) -> DateTime<Utc> {
        self.scheduled_at + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Apply a lifecycle action.
    ///
    /// Returns an error if the transition is invalid; the task is left untouched.
    pub fn apply(
        &mut self,
        transition: TaskTransition,
        now: DateTime<Utc>,
    ) -> Result<(), TaskTransitionError> {
        let to = transition.target();
        if !self.status.can_transition_to(&to) {
            return Err(TaskTransitionError {
                from: self.status,
                to,
            });
        }
        match transition {
            TaskTransition::Start => {}
            TaskTransition::Complete => {
                self.completed_at = Some(now);
            }
            TaskTransition::Skip { reason } => {
                self.skipped_reason = reason;
            }
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub objective_id: String,
    pub pillar_id: Option<String>,
    pub ritual_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub why_it_matters: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
}

/// Default time box of a task in minutes.
pub const DEFAULT_TASK_MINUTES: u32 = 30;

impl NewTask {
    pub fn new(
        objective_id: impl Into<String>,
        title: impl Into<String>,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            objective_id: objective_id.into(),
            pillar_id: None,
            ritual_id: None,
            title: title.into(),
            description: None,
            why_it_matters: None,
            scheduled_at,
            duration_minutes: DEFAULT_TASK_MINUTES,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        super::require_non_empty("title", &self.title)?;
        if self.duration_minutes == 0 {
            return Err(ValidationError::invalid(
                "duration_minutes",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_task() -> Task {
        let now = Utc::now();
        Task {
            id: "t1".into(),
            user_id: "u1".into(),
            objective_id: "o1".into(),
            pillar_id: None,
            ritual_id: None,
            title: "Draft promo packet".into(),
            description: None,
            why_it_matters: None,
            scheduled_at: now,
            duration_minutes: 45,
            status: TaskStatus::Pending,
            completed_at: None,
            skipped_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn start_then_complete() {
        let mut task = make_task();
        let now = Utc::now();
        task.apply(TaskTransition::Start, now).unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        task.apply(TaskTransition::Complete, now).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.completed_at, Some(now));
    }

    #[test]
    fn pending_can_be_skipped_directly() {
        let mut task = make_task();
        task.apply(
            TaskTransition::Skip {
                reason: Some("sick".into()),
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(task.status, TaskStatus::Skipped);
        assert_eq!(task.skipped_reason.as_deref(), Some("sick"));
    }

    #[test]
    fn terminal_states_reject_everything() {
        let mut task = make_task();
        task.apply(TaskTransition::Complete, Utc::now()).unwrap();
        let err = task.apply(TaskTransition::Start, Utc::now()).unwrap_err();
        assert_eq!(err.from, TaskStatus::Completed);
        assert_eq!(err.to, TaskStatus::InProgress);
        assert!(task
            .apply(TaskTransition::Skip { reason: None }, Utc::now())
            .is_err());
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[test]
    fn in_progress_cannot_restart() {
        assert!(!TaskStatus::InProgress.can_transition_to(&TaskStatus::InProgress));
        assert!(!TaskStatus::InProgress.can_transition_to(&TaskStatus::Pending));
    }

    #[test]
    fn due_at_adds_duration() {
        let task = make_task();
        assert_eq!(task.due_at() - task.scheduled_at, Duration::minutes(45));
    }
}
