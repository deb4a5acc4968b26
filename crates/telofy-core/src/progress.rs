//! Objective aggregation.
//!
//! An objective's progress is the weight-normalised mean of its pillars'
//! progress. Pillar progress itself comes from a [`PillarProgressRule`] over the
//! pillar's tasks and metrics in the current window.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::model::{Metric, ObjectiveStatus, Pillar, TargetDirection};

/// Sibling weights may exceed 1 by at most this much (float noise).
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-3;

/// `Σ(progress × weight) / Σ(weight)`, or 0 when the total weight is 0.
///
/// Tolerates weights that do not sum to 1; the result is clamped to [0, 100].
pub fn weighted_progress<I>(parts: I) -> f64
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let (weighted, total) = parts
        .into_iter()
        .filter(|(weight, progress)| weight.is_finite() && progress.is_finite())
        .fold((0.0, 0.0), |(weighted, total), (weight, progress)| {
            let weight = weight.max(0.0);
            (weighted + progress * weight, total + weight)
        });
    if total <= 0.0 {
        return 0.0;
    }
    (weighted / total).clamp(0.0, 100.0)
}

/// Overall progress of an objective from its pillars.
pub fn overall_progress(pillars: &[Pillar]) -> f64 {
    weighted_progress(pillars.iter().map(|p| (p.weight, p.progress)))
}

/// Validate a single pillar weight.
pub fn validate_weight(weight: f64) -> Result<(), ValidationError> {
    if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
        return Err(ValidationError::WeightOutOfRange { weight });
    }
    Ok(())
}

/// Validate that `weight` can join siblings already summing to `siblings_total`.
pub fn validate_sibling_weights(
    objective_id: &str,
    siblings_total: f64,
    weight: f64,
) -> Result<(), ValidationError> {
    validate_weight(weight)?;
    let total = siblings_total + weight;
    if total > 1.0 + WEIGHT_SUM_TOLERANCE {
        return Err(ValidationError::WeightSumExceeded {
            objective_id: objective_id.to_string(),
            total,
        });
    }
    Ok(())
}

/// Everything a pillar's progress may depend on within the current window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PillarInputs {
    pub tasks_completed: u32,
    /// Tasks due in the window, including skipped ones.
    pub tasks_scheduled: u32,
    /// Attainment of each targeted metric, 0-1.
    pub metric_attainment: Vec<f64>,
}

/// Turns [`PillarInputs`] into a progress value in [0, 100].
pub trait PillarProgressRule: Send + Sync {
    fn progress(&self, inputs: &PillarInputs) -> f64;
}

/// Mean of the task completion ratio and the mean metric attainment,
/// using whichever of the two is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletionRatioRule;

impl PillarProgressRule for CompletionRatioRule {
    fn progress(&self, inputs: &PillarInputs) -> f64 {
        let mut components = Vec::with_capacity(2);
        if inputs.tasks_scheduled > 0 {
            let ratio = f64::from(inputs.tasks_completed.min(inputs.tasks_scheduled))
                / f64::from(inputs.tasks_scheduled);
            components.push(ratio);
        }
        let attainment: Vec<f64> = inputs
            .metric_attainment
            .iter()
            .copied()
            .filter(|a| a.is_finite())
            .collect();
        if !attainment.is_empty() {
            components.push(attainment.iter().sum::<f64>() / attainment.len() as f64);
        }
        if components.is_empty() {
            return 0.0;
        }
        let mean = components.iter().sum::<f64>() / components.len() as f64;
        (mean * 100.0).clamp(0.0, 100.0)
    }
}

/// How far a metric has come towards its target, 0-1.
///
/// `baseline` is the first recorded value. Returns `None` when the metric has no
/// target, direction or current value.
pub fn metric_attainment(metric: &Metric, baseline: Option<f64>) -> Option<f64> {
    let target = metric.target?;
    let direction = metric.target_direction?;
    let current = metric.current?;

    let attainment = match direction {
        TargetDirection::Increase | TargetDirection::Decrease => {
            let start = baseline.unwrap_or(current);
            let span = target - start;
            if span.abs() < f64::EPSILON {
                // Started at the target: attained while still there.
                let on_target = match direction {
                    TargetDirection::Increase => current >= target,
                    _ => current <= target,
                };
                if on_target {
                    1.0
                } else {
                    0.0
                }
            } else {
                (current - start) / span
            }
        }
        TargetDirection::Maintain => {
            if target.abs() < f64::EPSILON {
                if current.abs() < f64::EPSILON {
                    1.0
                } else {
                    0.0
                }
            } else {
                1.0 - (current - target).abs() / target.abs()
            }
        }
    };
    Some(attainment.clamp(0.0, 1.0))
}

/// Status an objective should have given its unresolved deviations.
///
/// Paused and completed objectives keep their status.
pub fn resolve_status(current: ObjectiveStatus, unresolved_deviations: usize) -> ObjectiveStatus {
    if current.is_manual() {
        current
    } else if unresolved_deviations > 0 {
        ObjectiveStatus::DeviationDetected
    } else {
        ObjectiveStatus::OnTrack
    }
}
