use crate::error::CoreError;
use crate::model::{Deviation, DeviationType};

/// Produces a corrective hint for a freshly detected deviation.
/// Failures are logged by the caller and never block recording.
pub trait Suggester: Send + Sync {
    /// Identifier used in logs (e.g. "rules", "llm").
    fn name(&self) -> &str;

    fn suggest(&self, deviation: &Deviation) -> Result<String, CoreError>;
}

/// Fixed hint per deviation type.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedSuggester;

impl Suggester for RuleBasedSuggester {
    fn name(&self) -> &str {
        "rules"
    }

    fn suggest(&self, deviation: &Deviation) -> Result<String, CoreError> {
        let hint = match deviation.deviation_type {
            DeviationType::MissedTask => {
                "Reschedule the missed task into your next free block, or split it into a \
                 smaller first step you can finish today."
            }
            DeviationType::MissedRitual => {
                "Do a minimal version of the ritual today to get back on cadence, and tie it \
                 to an existing daily habit."
            }
            DeviationType::StreakBroken => {
                "Streak reset. Restart with the smallest version that still counts; \
                 consistency matters more than intensity."
            }
            DeviationType::MetricRegressed => {
                "The latest reading moved away from your target. Review what changed since \
                 the previous entry and adjust one input this week."
            }
        };
        Ok(hint.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn every_type_gets_a_hint() {
        let now = Utc::now();
        for deviation_type in [
            DeviationType::MissedTask,
            DeviationType::MissedRitual,
            DeviationType::StreakBroken,
            DeviationType::MetricRegressed,
        ] {
            let deviation = Deviation {
                id: "d1".into(),
                user_id: "u1".into(),
                objective_id: "o1".into(),
                task_id: None,
                ritual_id: None,
                metric_id: None,
                deviation_type,
                detected_at: now,
                resolved_at: None,
                ai_suggestion: None,
                created_at: now,
            };
            let hint = RuleBasedSuggester.suggest(&deviation).unwrap();
            assert!(!hint.is_empty());
        }
    }
}
