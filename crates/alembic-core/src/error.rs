//! Error types for alembic-core

use thiserror::Error;

/// Fields every resolution request must carry
pub const REQUIRED_RECORD_FIELDS: [&str; 3] = ["error_type", "affected_columns", "current_value"];

/// Fields every feedback submission must carry
pub const REQUIRED_FEEDBACK_FIELDS: [&str; 3] = ["error_id", "suggestion_used", "was_helpful"];

/// Engine error type
#[derive(Debug, Error)]
pub enum Error {
    /// Request is missing one or more required fields
    #[error("missing required fields: {}", missing.join(", "))]
    MissingFields {
        /// Fields that were absent
        missing: Vec<String>,
        /// Full list of required fields
        required: Vec<String>,
    },

    /// Malformed or wrongly shaped input
    #[error("validation error: {0}")]
    Validation(String),

    /// Feedback references an unknown error id
    #[error("not found: {0}")]
    NotFound(String),

    /// Unexpected fault during analysis or suggestion
    #[error("internal error: {0}")]
    Internal(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a `MissingFields` error from the required list and the keys present
    pub fn missing_fields(required: &[&str], missing: Vec<String>) -> Self {
        Self::MissingFields {
            missing,
            required: required.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Whether the caller caused this error (maps to a 4xx response)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingFields { .. } | Self::Validation(_) | Self::NotFound(_)
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_message() {
        let err = Error::missing_fields(&REQUIRED_RECORD_FIELDS, vec!["current_value".into()]);
        assert_eq!(err.to_string(), "missing required fields: current_value");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_internal_is_not_client_error() {
        assert!(!Error::Internal("boom".into()).is_client_error());
    }
}
