// crates/circuit-breaker/src/recovery.rs
//! Recovery timers
//!
//! When a breaker opens it asks a [`RecoveryScheduler`] to run a task after
//! the cool-down. The task re-checks the breaker under its lock, so a timer
//! that fires late, or after a reset, does nothing.

use std::fmt;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// Work run when a recovery timer fires
pub type RecoveryTask = Box<dyn FnOnce() + Send + 'static>;

/// Something that can run a task after a delay without blocking the caller
pub trait RecoveryScheduler: Send + Sync {
    /// Runs `task` once `after` has elapsed, unless the returned handle is
    /// cancelled or dropped first
    fn schedule(&self, after: Duration, task: RecoveryTask) -> RecoveryHandle;
}

/// Handle to a pending recovery timer
///
/// Cancelling or dropping the handle disarms the timer. Neither blocks.
pub struct RecoveryHandle {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl RecoveryHandle {
    /// Creates a handle that runs `cancel` when disarmed
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Creates a handle with nothing to disarm
    pub fn inert() -> Self {
        Self { cancel: None }
    }

    /// Disarms the timer
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for RecoveryHandle {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for RecoveryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

/// Runs each timer on its own short-lived thread
///
/// The thread waits on a channel with a timeout; disarming the handle
/// disconnects the channel and wakes it immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadScheduler;

impl RecoveryScheduler for ThreadScheduler {
    fn schedule(&self, after: Duration, task: RecoveryTask) -> RecoveryHandle {
        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();

        let spawned = thread::Builder::new()
            .name("breaker-recovery".to_string())
            .spawn(move || match cancel_rx.recv_timeout(after) {
                Err(RecvTimeoutError::Timeout) => task(),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            });

        match spawned {
            Ok(_) => RecoveryHandle::new(move || drop(cancel_tx)),
            Err(e) => {
                // Admission still moves to half-open once the cool-down has passed.
                log::warn!("Failed to spawn recovery timer thread: {}", e);
                RecoveryHandle::inert()
            }
        }
    }
}

/// Runs timers as tasks on a tokio runtime
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: tokio::runtime::Handle,
}

impl TokioScheduler {
    /// Creates a scheduler spawning onto the given runtime
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Creates a scheduler for the runtime the caller is running on
    ///
    /// Returns `None` outside a tokio runtime.
    pub fn current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }
}

impl RecoveryScheduler for TokioScheduler {
    fn schedule(&self, after: Duration, task: RecoveryTask) -> RecoveryHandle {
        let join = self.handle.spawn(async move {
            tokio::time::sleep(after).await;
            task();
        });
        RecoveryHandle::new(move || join.abort())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_task(counter: &Arc<AtomicUsize>) -> RecoveryTask {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_inert_handle_cancels_nothing() {
        let handle = RecoveryHandle::inert();
        assert!(format!("{:?}", handle).contains("armed: false"));
        handle.cancel();
    }

    #[test]
    fn test_cancel_runs_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let handle = RecoveryHandle::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        handle.cancel();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_thread_scheduler_fires() {
        let counter = Arc::new(AtomicUsize::new(0));
        let _handle = ThreadScheduler.schedule(Duration::from_millis(20), counting_task(&counter));

        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_thread_scheduler_cancel() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = ThreadScheduler.schedule(Duration::from_millis(50), counting_task(&counter));

        handle.cancel();
        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_tokio_scheduler_outside_runtime() {
        assert!(TokioScheduler::current().is_none());
    }

    #[tokio::test]
    async fn test_tokio_scheduler_fires() {
        let scheduler = TokioScheduler::current().expect("inside a runtime");
        let counter = Arc::new(AtomicUsize::new(0));
        let _handle = scheduler.schedule(Duration::from_millis(20), counting_task(&counter));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tokio_scheduler_cancel() {
        let scheduler = TokioScheduler::current().expect("inside a runtime");
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = scheduler.schedule(Duration::from_millis(20), counting_task(&counter));

        handle.cancel();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
