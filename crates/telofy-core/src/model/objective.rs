use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Objective status.
///
/// `OnTrack` and `DeviationDetected` are maintained automatically from the
/// objective's unresolved deviations. `Paused` and `Completed` are set by the
/// owner and win over any automatic transition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveStatus {
    #[default]
    OnTrack,
    DeviationDetected,
    Paused,
    Completed,
}

impl ObjectiveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectiveStatus::OnTrack => "on_track",
            ObjectiveStatus::DeviationDetected => "deviation_detected",
            ObjectiveStatus::Paused => "paused",
            ObjectiveStatus::Completed => "completed",
        }
    }

    /// Set by an explicit owner action.
    pub fn is_manual(&self) -> bool {
        matches!(self, ObjectiveStatus::Paused | ObjectiveStatus::Completed)
    }

    /// Included in deviation sweeps.
    pub fn is_active(&self) -> bool {
        !self.is_manual()
    }
}

impl fmt::Display for ObjectiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectiveStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on_track" => Ok(ObjectiveStatus::OnTrack),
            "deviation_detected" => Ok(ObjectiveStatus::DeviationDetected),
            "paused" => Ok(ObjectiveStatus::Paused),
            "completed" => Ok(ObjectiveStatus::Completed),
            other => Err(ValidationError::UnknownVariant {
                kind: "objective status",
                value: other.to_string(),
            }),
        }
    }
}

/// A user goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objective {
    pub id: String,
    pub user_id: String,
    pub name: String,
    /// Free-form category (career, fitness, health, ...)
    pub category: String,
    pub description: Option<String>,
    pub target_outcome: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub daily_commitment_minutes: u32,
    pub status: ObjectiveStatus,
    pub priority: i32,
    /// Weighted mean of pillar progress (0-100), cached.
    pub overall_progress: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an objective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewObjective {
    pub user_id: String,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub target_outcome: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub daily_commitment_minutes: Option<u32>,
    pub priority: Option<i32>,
}

impl NewObjective {
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            category: category.into(),
            description: None,
            target_outcome: None,
            start_date: None,
            end_date: None,
            daily_commitment_minutes: None,
            priority: None,
        }
    }

    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), ValidationError> {
        super::require_non_empty("name", &self.name)?;
        super::require_non_empty("category", &self.category)?;
        let start = self.start_date.unwrap_or(now);
        if let Some(end) = self.end_date {
            if end <= start {
                return Err(ValidationError::InvalidTimeRange { start, end });
            }
        }
        Ok(())
    }
}

/// Weighted sub-component of an objective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pillar {
    pub id: String,
    pub objective_id: String,
    pub name: String,
    pub description: Option<String>,
    /// Share of the objective, 0-1.
    pub weight: f64,
    /// Derived progress, 0-100.
    pub progress: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Default weight of a pillar when none is given.
pub const DEFAULT_PILLAR_WEIGHT: f64 = 0.25;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPillar {
    pub objective_id: String,
    pub name: String,
    pub description: Option<String>,
    pub weight: f64,
}

impl NewPillar {
    pub fn new(objective_id: impl Into<String>, name: impl Into<String>, weight: f64) -> Self {
        Self {
            objective_id: objective_id.into(),
            name: name.into(),
            description: None,
            weight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn status_round_trips_through_labels() {
        for status in [
            ObjectiveStatus::OnTrack,
            ObjectiveStatus::DeviationDetected,
            ObjectiveStatus::Paused,
            ObjectiveStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<ObjectiveStatus>().unwrap(), status);
        }
        assert!("archived".parse::<ObjectiveStatus>().is_err());
    }

    #[test]
    fn manual_statuses_are_not_swept() {
        assert!(ObjectiveStatus::OnTrack.is_active());
        assert!(ObjectiveStatus::DeviationDetected.is_active());
        assert!(!ObjectiveStatus::Paused.is_active());
        assert!(!ObjectiveStatus::Completed.is_active());
    }

    #[test]
    fn new_objective_rejects_end_before_start() {
        let now = Utc::now();
        let mut input = NewObjective::new("u1", "Get Promoted", "career");
        input.end_date = Some(now - Duration::days(1));
        assert!(matches!(
            input.validate(now),
            Err(ValidationError::InvalidTimeRange { .. })
        ));

        input.end_date = Some(now + Duration::days(90));
        assert!(input.validate(now).is_ok());
    }

    #[test]
    fn new_objective_requires_name() {
        let input = NewObjective::new("u1", "  ", "career");
        assert!(input.validate(Utc::now()).is_err());
    }
}
