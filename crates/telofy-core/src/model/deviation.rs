use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Kind of gap between plan and reality.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeviationType {
    MissedTask,
    MissedRitual,
    StreakBroken,
    MetricRegressed,
}

impl DeviationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviationType::MissedTask => "missed_task",
            DeviationType::MissedRitual => "missed_ritual",
            DeviationType::StreakBroken => "streak_broken",
            DeviationType::MetricRegressed => "metric_regressed",
        }
    }
}

impl fmt::Display for DeviationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviationType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "missed_task" => Ok(DeviationType::MissedTask),
            "missed_ritual" => Ok(DeviationType::MissedRitual),
            "streak_broken" => Ok(DeviationType::StreakBroken),
            "metric_regressed" => Ok(DeviationType::MetricRegressed),
            other => Err(ValidationError::UnknownVariant {
                kind: "deviation type",
                value: other.to_string(),
            }),
        }
    }
}

/// The row a deviation was raised against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum DeviationSubject {
    Task(String),
    Ritual(String),
    Metric(String),
}

impl DeviationSubject {
    /// Column holding this subject's id on the deviations table.
    pub(crate) fn column(&self) -> &'static str {
        match self {
            DeviationSubject::Task(_) => "task_id",
            DeviationSubject::Ritual(_) => "ritual_id",
            DeviationSubject::Metric(_) => "metric_id",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            DeviationSubject::Task(id)
            | DeviationSubject::Ritual(id)
            | DeviationSubject::Metric(id) => id,
        }
    }
}

/// Detected gap between plan and reality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deviation {
    pub id: String,
    pub user_id: String,
    pub objective_id: String,
    pub task_id: Option<String>,
    pub ritual_id: Option<String>,
    pub metric_id: Option<String>,
    pub deviation_type: DeviationType,
    pub detected_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub ai_suggestion: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Deviation {
    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }

    pub fn subject(&self) -> Option<DeviationSubject> {
        if let Some(id) = &self.task_id {
            Some(DeviationSubject::Task(id.clone()))
        } else if let Some(id) = &self.ritual_id {
            Some(DeviationSubject::Ritual(id.clone()))
        } else {
            self.metric_id.clone().map(DeviationSubject::Metric)
        }
    }
}

/// Deviation about to be recorded by the detector.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDeviation {
    pub user_id: String,
    pub objective_id: String,
    pub deviation_type: DeviationType,
    pub subject: DeviationSubject,
    pub detected_at: DateTime<Utc>,
}
