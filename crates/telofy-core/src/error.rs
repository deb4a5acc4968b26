//! Core error types for telofy-core.
//!
//! Validation and referential failures are reported before any write happens;
//! store-level failures are wrapped in [`DatabaseError`].

use std::path::PathBuf;
use thiserror::Error;

use crate::model::TaskTransitionError;

/// Core error type for telofy-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Invalid task lifecycle move
    #[error("{0}")]
    Transition(#[from] TaskTransitionError),

    /// Referenced entity does not exist (or was cascaded away)
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Unique constraint violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// External collaborator failure (suggestion generator)
    #[error("Collaborator '{name}' failed: {message}")]
    Collaborator { name: String, message: String },

    /// Operating system randomness unavailable
    #[error("Random source unavailable: {0}")]
    Entropy(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Whether retrying the same transaction with a fresh read may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Database(DatabaseError::Locked))
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Unique or foreign key constraint violated
    #[error("Constraint violated: {0}")]
    Constraint(String),

    /// Database is busy or locked by another writer
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Invalid time range
    #[error("Invalid time range: end ({end}) must be after start ({start})")]
    InvalidTimeRange {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },

    /// Pillar weight outside [0, 1]
    #[error("Pillar weight {weight} must be within [0, 1]")]
    WeightOutOfRange { weight: f64 },

    /// Sibling pillar weights would exceed 1
    #[error("Pillar weights under objective {objective_id} would sum to {total:.3} (max 1.0)")]
    WeightSumExceeded { objective_id: String, total: f64 },

    /// Unknown enum label read from input or storage
    #[error("Unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl ValidationError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, msg) => match code.code {
                rusqlite::ErrorCode::DatabaseLocked | rusqlite::ErrorCode::DatabaseBusy => {
                    DatabaseError::Locked
                }
                rusqlite::ErrorCode::ConstraintViolation => {
                    DatabaseError::Constraint(msg.clone().unwrap_or_else(|| code.to_string()))
                }
                _ => DatabaseError::QueryFailed(err.to_string()),
            },
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(DatabaseError::from(err))
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_and_locked_map_to_retryable() {
        for code in [rusqlite::ffi::SQLITE_BUSY, rusqlite::ffi::SQLITE_LOCKED] {
            let err = rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), None);
            let core: CoreError = err.into();
            assert!(core.is_retryable(), "{core}");
        }
    }

    #[test]
    fn constraint_failure_keeps_message() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            Some("UNIQUE constraint failed: users.email".to_string()),
        );
        match DatabaseError::from(err) {
            DatabaseError::Constraint(msg) => assert!(msg.contains("users.email")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn not_found_display() {
        let err = CoreError::not_found("ritual", "r-1");
        assert_eq!(err.to_string(), "ritual not found: r-1");
        assert!(!err.is_retryable());
    }
}
