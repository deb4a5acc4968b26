//! Metrics and rituals: the two event-sourced signals under an objective.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Kind of value a metric records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    #[default]
    Number,
    Boolean,
    Duration,
    Rating,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Number => "number",
            MetricType::Boolean => "boolean",
            MetricType::Duration => "duration",
            MetricType::Rating => "rating",
        }
    }
}

impl FromStr for MetricType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "number" => Ok(MetricType::Number),
            "boolean" => Ok(MetricType::Boolean),
            "duration" => Ok(MetricType::Duration),
            "rating" => Ok(MetricType::Rating),
            other => Err(ValidationError::UnknownVariant {
                kind: "metric type",
                value: other.to_string(),
            }),
        }
    }
}

/// Which way a metric should move to approach its target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TargetDirection {
    Increase,
    Decrease,
    Maintain,
}

impl TargetDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetDirection::Increase => "increase",
            TargetDirection::Decrease => "decrease",
            TargetDirection::Maintain => "maintain",
        }
    }
}

impl FromStr for TargetDirection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "increase" => Ok(TargetDirection::Increase),
            "decrease" => Ok(TargetDirection::Decrease),
            "maintain" => Ok(TargetDirection::Maintain),
            other => Err(ValidationError::UnknownVariant {
                kind: "target direction",
                value: other.to_string(),
            }),
        }
    }
}

/// Quantitative signal tracked against a target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub id: String,
    pub objective_id: String,
    /// Weak reference; cleared when the pillar is deleted.
    pub pillar_id: Option<String>,
    pub name: String,
    pub unit: String,
    pub metric_type: MetricType,
    pub target: Option<f64>,
    pub target_direction: Option<TargetDirection>,
    /// Value of the latest entry by `recorded_at`, cached.
    pub current: Option<f64>,
    /// Where entries come from (manual, apple_health, google_fit, ...)
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMetric {
    pub objective_id: String,
    pub pillar_id: Option<String>,
    pub name: String,
    pub unit: String,
    pub metric_type: MetricType,
    pub target: Option<f64>,
    pub target_direction: Option<TargetDirection>,
    pub source: Option<String>,
}

impl NewMetric {
    pub fn new(
        objective_id: impl Into<String>,
        name: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            objective_id: objective_id.into(),
            pillar_id: None,
            name: name.into(),
            unit: unit.into(),
            metric_type: MetricType::Number,
            target: None,
            target_direction: None,
            source: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        super::require_non_empty("name", &self.name)?;
        super::require_non_empty("unit", &self.unit)?;
        if let Some(target) = self.target {
            if !target.is_finite() {
                return Err(ValidationError::invalid("target", "must be a finite number"));
            }
        }
        Ok(())
    }
}

/// One immutable observation of a metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricEntry {
    pub id: String,
    pub metric_id: String,
    pub value: f64,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Cadence of a ritual.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            other => Err(ValidationError::UnknownVariant {
                kind: "frequency",
                value: other.to_string(),
            }),
        }
    }
}

/// Recurring commitment tracked through completions and streaks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ritual {
    pub id: String,
    pub objective_id: String,
    /// Weak reference; cleared when the pillar is deleted.
    pub pillar_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub frequency: Frequency,
    /// Weekdays the ritual is scheduled on, 0 = Sunday .. 6 = Saturday.
    pub days_of_week: Option<Vec<u8>>,
    pub times_per_period: u32,
    pub estimated_minutes: Option<u32>,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ritual {
    /// Listed weekdays, or `None` when the ritual runs on any day.
    pub fn scheduled_days(&self) -> Option<&[u8]> {
        self.days_of_week.as_deref().filter(|days| !days.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRitual {
    pub objective_id: String,
    pub pillar_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub frequency: Frequency,
    pub days_of_week: Option<Vec<u8>>,
    pub times_per_period: u32,
    pub estimated_minutes: Option<u32>,
}

impl NewRitual {
    pub fn new(objective_id: impl Into<String>, name: impl Into<String>, frequency: Frequency) -> Self {
        Self {
            objective_id: objective_id.into(),
            pillar_id: None,
            name: name.into(),
            description: None,
            frequency,
            days_of_week: None,
            times_per_period: 1,
            estimated_minutes: None,
        }
    }

    /// Validate and normalise (`days_of_week` sorted, deduplicated).
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        super::require_non_empty("name", &self.name)?;
        if self.times_per_period == 0 {
            return Err(ValidationError::invalid(
                "times_per_period",
                "must be at least 1",
            ));
        }
        if let Some(days) = self.days_of_week.as_mut() {
            if let Some(bad) = days.iter().find(|d| **d > 6) {
                return Err(ValidationError::invalid(
                    "days_of_week",
                    format!("{bad} is not a weekday (0 = Sunday .. 6 = Saturday)"),
                ));
            }
            days.sort_unstable();
            days.dedup();
        }
        Ok(())
    }
}

/// One immutable completion of a ritual.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RitualCompletion {
    pub id: String,
    pub ritual_id: String,
    pub completed_at: DateTime<Utc>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}
