//! Error types for kbfilter.
//!
//! A single error enum covers configuration, I/O, model, knowledge base and
//! validation failures.

use thiserror::Error;

/// Unified error type.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors (transport, status, unparseable output)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Knowledge base and retrieval errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Malformed input handed across a component boundary.
    ///
    /// The message always names the offending field or path.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Build a validation error for a named field.
    pub fn invalid_field(field: &str, reason: impl std::fmt::Display) -> Self {
        AppError::Validation(format!("field '{}': {}", field, reason))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_field_names_field() {
        let err = AppError::invalid_field("role", "expected a string, found number");
        let msg = err.to_string();
        assert!(msg.starts_with("Validation error"));
        assert!(msg.contains("'role'"));
        assert!(msg.contains("expected a string"));
    }

    #[test]
    fn test_from_serde_json() {
        let err: AppError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
