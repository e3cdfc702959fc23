//! Validators for breaker configuration values

pub use crate::error::ValidationError;
use std::time::Duration;

/// Common validators for config values
pub struct Validator;

impl Validator {
    /// Validates that a count is at least `min`
    pub fn at_least(value: u32, min: u32, field: &str) -> Result<(), ValidationError> {
        if value < min {
            Err(ValidationError::with_value(
                field,
                format!("must be at least {}", min),
                value,
            ))
        } else {
            Ok(())
        }
    }

    /// Validates that a duration is not zero
    pub fn non_zero_duration(value: Duration, field: &str) -> Result<(), ValidationError> {
        if value.is_zero() {
            Err(ValidationError::with_value(
                field,
                "must be greater than zero",
                format!("{:?}", value),
            ))
        } else {
            Ok(())
        }
    }

    /// Gathers every failed check, or `Ok` if all passed
    pub fn collect_errors(
        results: impl IntoIterator<Item = Result<(), ValidationError>>,
    ) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<ValidationError> = results.into_iter().filter_map(Result::err).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
