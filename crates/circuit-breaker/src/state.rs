// crates/circuit-breaker/src/state.rs
//! Circuit breaker state machine
//!
//! Pure bookkeeping: no locking, no timers. The breaker owns one
//! [`StateMachine`] behind its mutex and arms recovery timers when a
//! transition asks for it.
//!
//! ```text
//! Closed   --failures reach threshold-->  Open
//! Open     --cool-down elapses-------->   HalfOpen
//! HalfOpen --trial succeeds----------->   Closed
//! HalfOpen --trial fails-------------->   Open
//! ```
//!
//! Every state entry bumps a generation counter. Admission tickets and
//! recovery timers carry the generation they were issued in, so outcomes
//! and timer firings that belong to an earlier period are ignored.

use crate::recovery::RecoveryHandle;
use std::fmt;
use std::time::{Duration, Instant};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Circuit is closed, requests flow normally
    Closed,
    /// Circuit is open, requests are rejected
    Open,
    /// Circuit is half-open, a single trial request is allowed through
    HalfOpen,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Closed => write!(f, "closed"),
            State::Open => write!(f, "open"),
            State::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// How a call was let through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AdmissionKind {
    /// Admitted while closed
    Normal,
    /// The single probe admitted while half-open
    Trial,
}

/// Proof of admission, handed back when the call's outcome is known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket {
    pub(crate) kind: AdmissionKind,
    pub(crate) generation: u64,
}

/// What the caller must do after a state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    /// Nothing to arm
    None,
    /// Circuit just opened; a recovery timer must be armed for `generation`
    Tripped { generation: u64 },
}

#[derive(Debug)]
pub(crate) struct StateMachine {
    name: String,
    failure_threshold: u32,
    cool_down: Duration,
    state: State,
    failure_count: u32,
    generation: u64,
    trial_in_flight: bool,
    opened_at: Option<Instant>,
    recovery: Option<RecoveryHandle>,
}

impl StateMachine {
    pub(crate) fn new(name: impl Into<String>, failure_threshold: u32, cool_down: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold,
            cool_down,
            state: State::Closed,
            failure_count: 0,
            generation: 0,
            trial_in_flight: false,
            opened_at: None,
            recovery: None,
        }
    }

    pub(crate) fn state(&self) -> State {
        self.state
    }

    pub(crate) fn failure_count(&self) -> u32 {
        self.failure_count
    }

    #[cfg(test)]
    pub(crate) fn trial_in_flight(&self) -> bool {
        self.trial_in_flight
    }

    /// Decides whether a call may proceed
    ///
    /// Returns `None` when the call must be rejected: the circuit is open,
    /// or half-open with the trial already taken. An open circuit whose
    /// cool-down has passed by `now` moves to half-open here, even if its
    /// recovery timer has not fired yet.
    pub(crate) fn admit(&mut self, now: Instant) -> Option<Ticket> {
        self.refresh(now);

        match self.state {
            State::Closed => Some(self.ticket(AdmissionKind::Normal)),
            State::HalfOpen if !self.trial_in_flight => {
                self.trial_in_flight = true;
                self.failure_count = 0;
                log::debug!("Circuit breaker '{}' admitted trial call", self.name);
                Some(self.ticket(AdmissionKind::Trial))
            }
            State::HalfOpen | State::Open => {
                log::debug!(
                    "Circuit breaker '{}' rejected call while {}",
                    self.name,
                    self.state
                );
                None
            }
        }
    }

    /// Moves an open circuit whose cool-down has passed by `now` to half-open
    ///
    /// Covers a recovery timer that fired late or was never armed.
    pub(crate) fn refresh(&mut self, now: Instant) -> State {
        if self.state == State::Open && self.cool_down_elapsed(now) {
            log::debug!(
                "Circuit breaker '{}' cool-down elapsed before its timer fired",
                self.name
            );
            if let Some(handle) = self.recovery.take() {
                handle.cancel();
            }
            self.enter_half_open();
        }
        self.state
    }

    /// Records the outcome of an admitted call
    pub(crate) fn record(&mut self, ticket: Ticket, failed: bool) -> Transition {
        if ticket.generation != self.generation {
            log::debug!(
                "Circuit breaker '{}' ignored outcome of a call admitted before the last transition",
                self.name
            );
            return Transition::None;
        }

        match ticket.kind {
            AdmissionKind::Normal if failed => {
                self.failure_count += 1;
                if self.failure_count >= self.failure_threshold {
                    self.trip()
                } else {
                    Transition::None
                }
            }
            AdmissionKind::Normal => {
                self.failure_count = 0;
                Transition::None
            }
            AdmissionKind::Trial => {
                self.trial_in_flight = false;
                if failed {
                    log::info!("Circuit breaker '{}' trial call failed", self.name);
                    self.trip()
                } else {
                    self.enter_closed();
                    log::info!(
                        "Circuit breaker '{}' closed after successful trial",
                        self.name
                    );
                    Transition::None
                }
            }
        }
    }

    /// Records a call that ended without an outcome (panic, dropped future)
    ///
    /// A lost trial counts as a failed trial so the circuit cannot stay
    /// half-open with nobody probing. A lost normal call changes nothing.
    pub(crate) fn abandon(&mut self, ticket: Ticket) -> Transition {
        match ticket.kind {
            AdmissionKind::Trial => {
                log::debug!(
                    "Circuit breaker '{}' trial call ended without an outcome",
                    self.name
                );
                self.record(ticket, true)
            }
            AdmissionKind::Normal => Transition::None,
        }
    }

    /// Stores the timer armed for the current open period
    pub(crate) fn arm(&mut self, handle: RecoveryHandle) {
        if let Some(stale) = self.recovery.replace(handle) {
            stale.cancel();
        }
    }

    /// Handles a recovery timer firing
    ///
    /// Returns true if the circuit moved to half-open.
    pub(crate) fn recover(&mut self, generation: u64) -> bool {
        if self.state != State::Open || self.generation != generation {
            log::debug!("Circuit breaker '{}' ignored stale recovery timer", self.name);
            return false;
        }

        // The timer that owns this handle is the one firing.
        self.recovery = None;
        self.enter_half_open();
        true
    }

    /// Forces the circuit closed
    pub(crate) fn reset(&mut self) {
        self.enter_closed();
        log::info!("Circuit breaker '{}' reset", self.name);
    }

    fn ticket(&self, kind: AdmissionKind) -> Ticket {
        Ticket {
            kind,
            generation: self.generation,
        }
    }

    fn cool_down_elapsed(&self, now: Instant) -> bool {
        self.opened_at
            .is_some_and(|opened| now.saturating_duration_since(opened) >= self.cool_down)
    }

    fn trip(&mut self) -> Transition {
        self.state = State::Open;
        self.failure_count = self.failure_threshold;
        self.trial_in_flight = false;
        self.opened_at = Some(Instant::now());
        self.generation += 1;
        if let Some(stale) = self.recovery.take() {
            stale.cancel();
        }

        log::info!(
            "Circuit breaker '{}' opened after {} failure(s), cooling down for {:?}",
            self.name,
            self.failure_count,
            self.cool_down
        );
        Transition::Tripped {
            generation: self.generation,
        }
    }

    fn enter_half_open(&mut self) {
        self.state = State::HalfOpen;
        self.failure_count = 0;
        self.trial_in_flight = false;
        self.opened_at = None;
        self.generation += 1;
        log::info!("Circuit breaker '{}' is half-open", self.name);
    }

    fn enter_closed(&mut self) {
        self.state = State::Closed;
        self.failure_count = 0;
        self.trial_in_flight = false;
        self.opened_at = None;
        self.generation += 1;
        if let Some(handle) = self.recovery.take() {
            handle.cancel();
        }
    }
}
