// crates/circuit-breaker/src/circuit_breaker.rs
//! Circuit breaker pattern implementation
//!
//! All state lives in one [`StateMachine`] behind one mutex. The lock is
//! taken twice per call, once to admit and once to record the outcome; the
//! wrapped operation itself runs unlocked. Half-open admits a single trial
//! by setting a flag in the admission critical section, so concurrent
//! callers are rejected until the trial resolves.

use crate::config::BreakerConfig;
use crate::error::{BreakerError, BreakerResult, ConfigError, ConfigResult};
use crate::recovery::{RecoveryScheduler, ThreadScheduler};
use crate::state::{State, StateMachine, Ticket, Transition};
use crate::timeout::{CallTimeout, TimedOut};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

/// Circuit breaker guarding one logical operation
///
/// `E` is the operation's error type. Wrap the breaker in an `Arc` to share
/// it between threads or tasks.
pub struct CircuitBreaker<E> {
    shared: Arc<Shared<E>>,
}

struct Shared<E> {
    config: BreakerConfig<E>,
    call_timeout: CallTimeout,
    machine: Mutex<StateMachine>,
    scheduler: Arc<dyn RecoveryScheduler>,
}

impl<E: 'static> CircuitBreaker<E> {
    /// Creates a circuit breaker whose recovery timers run on threads
    pub fn new(config: BreakerConfig<E>) -> ConfigResult<Self> {
        Self::with_scheduler(config, ThreadScheduler)
    }

    /// Creates a circuit breaker with a custom recovery scheduler
    pub fn with_scheduler<S>(config: BreakerConfig<E>, scheduler: S) -> ConfigResult<Self>
    where
        S: RecoveryScheduler + 'static,
    {
        config.validate().map_err(ConfigError::ValidationError)?;

        let machine = StateMachine::new(
            config.name(),
            config.failure_threshold(),
            config.cool_down(),
        );
        let call_timeout = CallTimeout::new(config.call_timeout(), config.enforces_call_timeout());

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                call_timeout,
                machine: Mutex::new(machine),
                scheduler: Arc::new(scheduler),
            }),
        })
    }

    /// Gets the breaker's name
    pub fn name(&self) -> &str {
        self.shared.config.name()
    }

    /// Gets the configuration
    pub fn config(&self) -> &BreakerConfig<E> {
        &self.shared.config
    }

    /// Gets the current state
    ///
    /// An open circuit whose cool-down has already passed reports
    /// half-open, even if its recovery timer has not fired.
    pub fn state(&self) -> State {
        self.shared.lock().refresh(Instant::now())
    }

    /// Gets the number of qualifying failures since the last reset
    pub fn failure_count(&self) -> u32 {
        self.shared.lock().failure_count()
    }

    /// Executes a blocking operation through the circuit breaker
    ///
    /// Returns `CircuitOpen` without calling `operation` when the circuit
    /// is open or a half-open trial is already running. Otherwise the
    /// operation's result is returned unchanged, its error wrapped in
    /// `Operation`.
    pub fn execute<T, F>(&self, operation: F) -> BreakerResult<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let permit = self.shared.admit()?;
        let result = self
            .shared
            .call_timeout
            .run_blocking(self.name(), operation);

        permit.complete(self.shared.classify(&result));
        result.map_err(BreakerError::Operation)
    }

    /// Executes an async operation through the circuit breaker
    ///
    /// With timeout enforcement on, an operation still pending at the call
    /// timeout is dropped, counted as a failure, and reported as
    /// `ExecutionTimeout`. Enforcement needs a tokio runtime; polled from
    /// any other executor the call timeout is advisory.
    pub async fn execute_async<T, F, Fut>(&self, operation: F) -> BreakerResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let call_timeout = self.shared.call_timeout.for_current_runtime(self.name());
        let permit = self.shared.admit()?;

        match call_timeout.run(self.name(), operation()).await {
            Ok(result) => {
                permit.complete(self.shared.classify(&result));
                result.map_err(BreakerError::Operation)
            }
            Err(TimedOut) => {
                permit.complete(true);
                Err(BreakerError::ExecutionTimeout {
                    name: self.name().to_string(),
                    timeout: call_timeout.limit(),
                })
            }
        }
    }

    /// Resets the circuit breaker to closed state
    ///
    /// Cancels any pending recovery timer. Calls still in flight from
    /// before the reset no longer affect the state.
    pub fn reset(&self) {
        self.shared.lock().reset();
    }
}

impl<E: 'static> Shared<E> {
    /// Locks the state machine
    ///
    /// The lock never spans user code, so a poisoned guard still holds
    /// consistent state and is recovered.
    fn lock(&self) -> MutexGuard<'_, StateMachine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit(self: &Arc<Self>) -> Result<Permit<'_, E>, BreakerError<E>> {
        match self.lock().admit(Instant::now()) {
            Some(ticket) => Ok(Permit {
                shared: self,
                ticket: Some(ticket),
            }),
            None => Err(BreakerError::CircuitOpen {
                name: self.config.name().to_string(),
            }),
        }
    }

    fn classify<T>(&self, result: &Result<T, E>) -> bool {
        match result {
            Ok(_) => false,
            Err(e) => self.config.is_failure(e),
        }
    }

    fn settle(self: &Arc<Self>, ticket: Ticket, outcome: Option<bool>) {
        let mut machine = self.lock();
        let transition = match outcome {
            Some(failed) => machine.record(ticket, failed),
            None => machine.abandon(ticket),
        };

        if let Transition::Tripped { generation } = transition {
            // Armed under the same lock as the trip: one timer per open period.
            let handle = self.scheduler.schedule(
                self.config.cool_down(),
                Box::new(recovery_task(Arc::downgrade(self), generation)),
            );
            machine.arm(handle);
        }
    }
}

fn recovery_task<E: 'static>(shared: Weak<Shared<E>>, generation: u64) -> impl FnOnce() + Send {
    move || {
        if let Some(shared) = shared.upgrade() {
            shared.lock().recover(generation);
        }
    }
}

/// An admitted call
///
/// Dropped without [`complete`](Permit::complete) (the operation panicked,
/// or its future was dropped) the call is settled as abandoned.
struct Permit<'a, E: 'static> {
    shared: &'a Arc<Shared<E>>,
    ticket: Option<Ticket>,
}

impl<E: 'static> Permit<'_, E> {
    fn complete(mut self, failed: bool) {
        if let Some(ticket) = self.ticket.take() {
            self.shared.settle(ticket, Some(failed));
        }
    }
}

impl<E: 'static> Drop for Permit<'_, E> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.shared.settle(ticket, None);
        }
    }
}

impl<E> std::fmt::Debug for CircuitBreaker<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}
