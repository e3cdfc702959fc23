// crates/circuit-breaker/src/config.rs
//! Circuit breaker configuration
//!
//! [`BreakerConfig`] is the value a breaker is built from. [`BreakerSettings`]
//! is its serializable subset, for breakers configured from a TOML file; the
//! failure predicate is code and can only be attached programmatically.

use crate::error::{ConfigError, ConfigResult};
use crate::validation::{ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Decides whether an operation error counts against the breaker
pub type FailurePredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

const DEFAULT_NAME: &str = "default";
const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
const DEFAULT_COOL_DOWN: Duration = Duration::from_secs(60);
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Circuit breaker configuration
///
/// `E` is the error type of the guarded operation. Every error counts as a
/// failure unless a predicate is set with [`with_failure_predicate`].
///
/// [`with_failure_predicate`]: BreakerConfig::with_failure_predicate
pub struct BreakerConfig<E> {
    /// Descriptive name, used in errors and log lines
    name: String,
    /// Number of consecutive qualifying failures before opening the circuit
    failure_threshold: u32,
    /// How long the circuit stays open before a trial call is allowed
    cool_down: Duration,
    /// Expected upper bound for one call
    call_timeout: Duration,
    /// Whether async calls are raced against `call_timeout`
    enforce_call_timeout: bool,
    is_failure: FailurePredicate<E>,
}

impl<E: 'static> BreakerConfig<E> {
    /// Creates a new configuration
    pub fn new(name: impl Into<String>, failure_threshold: u32, cool_down: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold,
            cool_down,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            enforce_call_timeout: false,
            is_failure: Arc::new(|_: &E| true),
        }
    }

    /// Sets the call timeout
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Sets whether async calls are cut off at the call timeout
    ///
    /// When disabled (the default) the timeout is advisory: slow calls are
    /// logged and their result is returned as-is.
    pub fn with_timeout_enforcement(mut self, enforce: bool) -> Self {
        self.enforce_call_timeout = enforce;
        self
    }

    /// Sets the predicate deciding which errors count as failures
    pub fn with_failure_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.is_failure = Arc::new(predicate);
        self
    }

    /// Gets the breaker name used in logs and errors
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the number of consecutive failures that opens the circuit
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Gets how long the circuit stays open before a trial
    pub fn cool_down(&self) -> Duration {
        self.cool_down
    }

    /// Gets the per-call timeout
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Checks whether async calls are cut off at the call timeout
    pub fn enforces_call_timeout(&self) -> bool {
        self.enforce_call_timeout
    }

    /// Applies the failure predicate to an operation error
    pub fn is_failure(&self, error: &E) -> bool {
        (self.is_failure)(error)
    }

    /// Validates the configuration
    ///
    /// Returns every invalid field, not just the first.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![
            Validator::at_least(self.failure_threshold, 1, "failure_threshold"),
            Validator::non_zero_duration(self.cool_down, "cool_down"),
            Validator::non_zero_duration(self.call_timeout, "call_timeout"),
        ])
    }
}

impl<E: 'static> Default for BreakerConfig<E> {
    fn default() -> Self {
        Self::new(DEFAULT_NAME, DEFAULT_FAILURE_THRESHOLD, DEFAULT_COOL_DOWN)
    }
}

impl<E> Clone for BreakerConfig<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            failure_threshold: self.failure_threshold,
            cool_down: self.cool_down,
            call_timeout: self.call_timeout,
            enforce_call_timeout: self.enforce_call_timeout,
            is_failure: Arc::clone(&self.is_failure),
        }
    }
}

impl<E> fmt::Debug for BreakerConfig<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerConfig")
            .field("name", &self.name)
            .field("failure_threshold", &self.failure_threshold)
            .field("cool_down", &self.cool_down)
            .field("call_timeout", &self.call_timeout)
            .field("enforce_call_timeout", &self.enforce_call_timeout)
            .finish_non_exhaustive()
    }
}

/// File-backed breaker settings
///
/// Missing keys take their default values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BreakerSettings {
    /// Descriptive name
    pub name: String,

    /// Consecutive failures before tripping
    pub failure_threshold: u32,

    /// Open period in milliseconds
    pub cool_down_ms: u64,

    /// Call timeout in milliseconds
    pub call_timeout_ms: u64,

    /// Race async calls against the call timeout
    pub enforce_call_timeout: bool,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            cool_down_ms: DEFAULT_COOL_DOWN.as_millis() as u64,
            call_timeout_ms: DEFAULT_CALL_TIMEOUT.as_millis() as u64,
            enforce_call_timeout: false,
        }
    }
}

impl BreakerSettings {
    /// Parses settings from a TOML string
    pub fn from_toml_str(input: &str) -> ConfigResult<Self> {
        toml::from_str(input).map_err(|source| ConfigError::ParseError { path: None, source })
    }

    /// Loads settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        let settings: Self =
            toml::from_str(&contents).map_err(|source| ConfigError::ParseError {
                path: Some(path.to_path_buf()),
                source,
            })?;

        log::debug!(
            "Loaded breaker settings '{}' from {}",
            settings.name,
            path.display()
        );
        Ok(settings)
    }

    /// Serializes settings to TOML
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string(self)?)
    }

    /// Validates the settings
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![
            Validator::at_least(self.failure_threshold, 1, "failure_threshold"),
            Validator::non_zero_duration(
                Duration::from_millis(self.cool_down_ms),
                "cool_down_ms",
            ),
            Validator::non_zero_duration(
                Duration::from_millis(self.call_timeout_ms),
                "call_timeout_ms",
            ),
        ])
    }

    /// Converts to a breaker configuration using the default failure predicate
    pub fn into_config<E: 'static>(self) -> BreakerConfig<E> {
        BreakerConfig::new(
            self.name,
            self.failure_threshold,
            Duration::from_millis(self.cool_down_ms),
        )
        .with_call_timeout(Duration::from_millis(self.call_timeout_ms))
        .with_timeout_enforcement(self.enforce_call_timeout)
    }
}
