// crates/circuit-breaker/src/lib.rs
//! In-process circuit breaker
//!
//! Guards one logical operation. After a run of qualifying failures the
//! breaker opens and rejects calls without invoking the operation; once a
//! cool-down has passed a single trial call is let through, and its outcome
//! either closes the circuit again or re-opens it for another cool-down.
//!
//! - Closed / Open / Half-Open state machine with a consecutive-failure trip
//! - Pluggable failure predicate
//! - Timer-driven recovery on a thread or a tokio runtime
//! - Optional call-timeout enforcement for async operations
//! - TOML-loadable settings
//!
//! # Example
//!
//! ```rust
//! use breakwater_circuit_breaker::{BreakerConfig, CircuitBreaker, State};
//! use std::time::Duration;
//!
//! let config = BreakerConfig::new("inventory", 3, Duration::from_millis(100));
//! let cb = CircuitBreaker::new(config).expect("valid config");
//!
//! for _ in 0..3 {
//!     let _ = cb.execute(|| Err::<(), _>("connection refused"));
//! }
//! assert_eq!(cb.state(), State::Open);
//!
//! let rejected = cb.execute(|| Ok::<_, &str>(42)).unwrap_err();
//! assert!(rejected.is_circuit_open());
//! ```

mod circuit_breaker;
mod config;
mod error;
mod recovery;
mod state;
mod timeout;
mod validation;

pub use circuit_breaker::CircuitBreaker;
pub use config::{BreakerConfig, BreakerSettings, FailurePredicate};
pub use error::{BreakerError, BreakerResult, ConfigError, ConfigResult, ValidationError};
pub use recovery::{
    RecoveryHandle, RecoveryScheduler, RecoveryTask, ThreadScheduler, TokioScheduler,
};
pub use state::State;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_exports_accessible() {
        let _: BreakerConfig<String> = BreakerConfig::default();
        let _: BreakerSettings = BreakerSettings::default();
        let _: CircuitBreaker<String> =
            CircuitBreaker::new(BreakerConfig::default()).expect("default config is valid");
        let _: RecoveryHandle = RecoveryHandle::inert();
        let _: ThreadScheduler = ThreadScheduler;
        let _: State = State::Closed;
    }
}
