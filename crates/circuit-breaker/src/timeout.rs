// crates/circuit-breaker/src/timeout.rs
//! Call timeout handling
//!
//! Advisory by default: a call that runs past its limit is logged and its
//! result kept. When enforcement is on, async calls are raced against a
//! tokio timer and dropped at the limit. Blocking calls cannot be preempted
//! and are always advisory.

use std::future::Future;
use std::time::{Duration, Instant};

/// Returned when an enforced limit cut a call off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimedOut;

#[derive(Debug, Clone, Copy)]
pub(crate) struct CallTimeout {
    limit: Duration,
    enforced: bool,
}

impl CallTimeout {
    pub(crate) fn new(limit: Duration, enforced: bool) -> Self {
        Self { limit, enforced }
    }

    pub(crate) fn limit(&self) -> Duration {
        self.limit
    }

    /// Drops enforcement when no tokio runtime is running
    ///
    /// `tokio::time::timeout` panics outside a runtime, so a call polled
    /// by another executor falls back to the advisory check.
    pub(crate) fn for_current_runtime(self, name: &str) -> Self {
        if self.enforced && tokio::runtime::Handle::try_current().is_err() {
            log::warn!(
                "Circuit breaker '{}' has no tokio runtime; call timeout is advisory",
                name
            );
            return Self {
                enforced: false,
                ..self
            };
        }
        self
    }

    /// Runs a blocking operation, noting if it overran
    pub(crate) fn run_blocking<T>(&self, name: &str, operation: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let output = operation();
        self.observe(name, start.elapsed());
        output
    }

    /// Awaits an operation, racing it against the limit when enforced
    ///
    /// Enforcement needs a tokio runtime with the time driver enabled.
    pub(crate) async fn run<F>(&self, name: &str, operation: F) -> Result<F::Output, TimedOut>
    where
        F: Future,
    {
        if self.enforced {
            return tokio::time::timeout(self.limit, operation)
                .await
                .map_err(|_| TimedOut);
        }

        let start = Instant::now();
        let output = operation.await;
        self.observe(name, start.elapsed());
        Ok(output)
    }

    fn observe(&self, name: &str, elapsed: Duration) {
        if elapsed > self.limit {
            log::warn!(
                "Call through circuit breaker '{}' took {:?}, over its {:?} timeout",
                name,
                elapsed,
                self.limit
            );
        }
    }
}
