// crates/circuit-breaker/src/error.rs
//! Error types for the circuit breaker

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for calls made through a circuit breaker
pub type BreakerResult<T, E> = Result<T, BreakerError<E>>;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors returned by a guarded call
///
/// `CircuitOpen` and `ExecutionTimeout` are produced by the breaker itself.
/// Anything the wrapped operation returns comes back as `Operation`, untouched.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// Call rejected without invoking the operation
    #[error("Circuit breaker '{name}' is open")]
    CircuitOpen { name: String },

    /// Call exceeded its enforced timeout
    #[error("Call through circuit breaker '{name}' timed out after {timeout:?}")]
    ExecutionTimeout { name: String, timeout: Duration },

    /// Error returned by the wrapped operation
    #[error(transparent)]
    Operation(E),
}

impl<E> BreakerError<E> {
    /// Returns true if the breaker rejected the call
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Returns true if the call was cut off by the enforced timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ExecutionTimeout { .. })
    }

    /// Borrows the operation's own error, if that is what this is
    pub fn operation(&self) -> Option<&E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Unwraps the operation's own error, if that is what this is
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors that can occur while building or loading a breaker configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read settings file
    #[error("Failed to read breaker settings at {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse settings
    #[error("Failed to parse breaker settings{}: {source}", display_path(.path))]
    ParseError {
        path: Option<PathBuf>,
        source: toml::de::Error,
    },

    /// Failed to serialize settings
    #[error("Failed to serialize breaker settings: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Configuration contains invalid values
    #[error("Breaker config validation failed: {}", join_errors(.0))]
    ValidationError(Vec<ValidationError>),
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" at {}", p.display()))
        .unwrap_or_default()
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// One invalid field in a breaker configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Field '{field}': {message}{}", display_value(.value))]
pub struct ValidationError {
    /// Field name as it appears in settings (e.g., "failure_threshold")
    pub field: String,

    /// What the field must satisfy
    pub message: String,

    /// The rejected value, when it can be shown
    pub value: Option<String>,
}

impl ValidationError {
    /// Creates a validation error without the rejected value
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: None,
        }
    }

    /// Creates a validation error carrying the rejected value
    pub fn with_value(
        field: impl Into<String>,
        message: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self {
            value: Some(value.to_string()),
            ..Self::new(field, message)
        }
    }
}

fn display_value(value: &Option<String>) -> String {
    value
        .as_deref()
        .map(|v| format!(" (got: {})", v))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("backend unavailable")]
    struct Unavailable;

    #[test]
    fn test_circuit_open_error() {
        let err: BreakerError<Unavailable> = BreakerError::CircuitOpen {
            name: "payments".to_string(),
        };
        assert!(err.is_circuit_open());
        assert!(!err.is_timeout());
        assert_eq!(err.to_string(), "Circuit breaker 'payments' is open");
    }

    #[test]
    fn test_timeout_error() {
        let err: BreakerError<Unavailable> = BreakerError::ExecutionTimeout {
            name: "payments".to_string(),
            timeout: Duration::from_millis(250),
        };
        assert!(err.is_timeout());
        assert!(err.to_string().contains("timed out"));
        assert!(err.to_string().contains("250ms"));
    }

    #[test]
    fn test_operation_error_is_transparent() {
        let err = BreakerError::Operation(Unavailable);
        assert_eq!(err.to_string(), "backend unavailable");
        assert!(err.operation().is_some());
        assert!(err.into_operation().is_some());
    }

    #[test]
    fn test_breaker_errors_have_no_operation() {
        let err: BreakerError<Unavailable> = BreakerError::CircuitOpen {
            name: "x".to_string(),
        };
        assert!(err.operation().is_none());
        assert!(err.into_operation().is_none());
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("failure_threshold", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "Field 'failure_threshold': must be at least 1"
        );
    }

    #[test]
    fn test_validation_error_with_value() {
        let err = ValidationError::with_value("failure_threshold", "must be at least 1", 0);
        assert_eq!(
            err.to_string(),
            "Field 'failure_threshold': must be at least 1 (got: 0)"
        );
    }

    #[test]
    fn test_config_validation_error_lists_every_field() {
        let err = ConfigError::ValidationError(vec![
            ValidationError::new("failure_threshold", "must be at least 1"),
            ValidationError::new("cool_down", "must be greater than zero"),
        ]);
        let message = err.to_string();
        assert!(message.contains("failure_threshold"));
        assert!(message.contains("cool_down"));
    }
}
