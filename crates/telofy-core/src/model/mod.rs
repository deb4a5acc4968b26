//! Domain entities.
//!
//! Every entity is owned by a [`User`], directly or through an [`Objective`].
//! Derived fields (`progress`, `overall_progress`, `current`, streaks) are caches
//! over the append-only event logs and are only written by the recompute paths in
//! [`crate::storage`].

pub mod account;
pub mod deviation;
pub mod objective;
pub mod task;
pub mod tracking;

pub use account::{NewUser, Session, User, WaitlistEntry, WaitlistOutcome};
pub use deviation::{Deviation, DeviationSubject, DeviationType, NewDeviation};
pub use objective::{NewObjective, NewPillar, Objective, ObjectiveStatus, Pillar};
pub use task::{NewTask, Task, TaskStatus, TaskTransition, TaskTransitionError};
pub use tracking::{
    Frequency, Metric, MetricEntry, MetricType, NewMetric, NewRitual, Ritual, RitualCompletion,
    TargetDirection,
};

use crate::error::ValidationError;

/// Fresh identifier for a new row.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::invalid(field, "must not be empty"))
    } else {
        Ok(())
    }
}
