//! # Telofy Core Library
//!
//! Goal-tracking engine behind the `telofy` CLI. Users own objectives; an
//! objective is split into weighted pillars and tracked through tasks, metrics
//! and recurring rituals. Everything derived (pillar and objective progress,
//! metric current values, ritual streaks, objective status) is a cache that can
//! be rebuilt from the underlying event logs.
//!
//! ## Architecture
//!
//! - **Model**: plain entities and their validation rules
//! - **Progress**: weighted aggregation from pillars up to the objective
//! - **Streaks**: calendar-aware replay of ritual completions in the owner's timezone
//! - **Detector**: periodic sweep flagging missed tasks, missed rituals, broken
//!   streaks and regressing metrics
//! - **Storage**: SQLite persistence with one write transaction per operation,
//!   and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`GoalDb`]: persistence and every mutating operation
//! - [`DeviationDetector`]: the sweep
//! - [`Config`]: application configuration management

pub mod detector;
pub mod error;
pub mod model;
pub mod progress;
pub mod storage;
pub mod streak;

pub use detector::{DeviationDetector, RuleBasedSuggester, Suggester, SweepFailure, SweepReport};
pub use error::{ConfigError, CoreError, DatabaseError, Result, ValidationError};
pub use model::{
    Deviation, DeviationSubject, DeviationType, Frequency, Metric, MetricEntry, MetricType,
    NewMetric, NewObjective, NewPillar, NewRitual, NewTask, NewUser, Objective, ObjectiveStatus,
    Pillar, Ritual, RitualCompletion, Session, TargetDirection, Task, TaskStatus, TaskTransition,
    User, WaitlistEntry, WaitlistOutcome,
};
pub use progress::{CompletionRatioRule, PillarInputs, PillarProgressRule};
pub use storage::{CompletionRecorded, Config, DeviationFilter, GoalDb, IssuedSession};
pub use streak::{StreakPolicy, StreakSummary, WeeklyRule};
