//! Failure isolation for the outbound CRM channel.
//!
//! Closed → Open after `failure_threshold` consecutive failures. Open fails
//! fast until `open_timeout` has passed, then the next check moves to HalfOpen
//! and lets exactly one trial call through. The trial's outcome closes the
//! breaker or re-opens it for another base `open_timeout`; the timeout does
//! not escalate. Outcomes recorded while Open belong to calls that started
//! before it opened: failures are counted, successes are ignored.
//!
//! All state lives behind one mutex so transitions are atomic with respect
//! to each other across call-handling tasks.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::{info, warn};
use serde::Serialize;

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Point-in-time view for logs and status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub failure_count: u32,
    pub open_until: Option<Instant>,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    open_until: Option<Instant>,
    /// Set while the HalfOpen trial call is out.
    trial_started: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    open_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32, open_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            open_timeout,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                open_until: None,
                trial_started: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn open_timeout(&self) -> Duration {
        self.open_timeout
    }

    /// Whether a guarded call may go out now.
    ///
    /// Does not touch the failure count. The only state it moves is the
    /// time-driven Open → HalfOpen step, and in HalfOpen it hands out the
    /// single trial slot: the first caller gets `true`, everyone after that
    /// gets `false` until the trial is recorded.
    pub fn is_operation_allowed(&self) -> bool {
        self.is_operation_allowed_at(Instant::now())
    }

    pub fn record_success(&self) {
        self.record_success_at(Instant::now());
    }

    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    /// Effective state without side effects.
    pub fn state(&self) -> BreakerState {
        self.snapshot_at(Instant::now()).state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        self.snapshot_at(Instant::now())
    }

    pub(crate) fn is_operation_allowed_at(&self, now: Instant) -> bool {
        let mut inner = self.lock();

        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                if inner.open_until.is_some_and(|until| now >= until) {
                    inner.state = BreakerState::HalfOpen;
                    inner.trial_started = Some(now);
                    info!("Circuit '{}' half-open, allowing one trial call", self.name);
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => match inner.trial_started {
                // A trial whose outcome never got recorded must not wedge the breaker.
                Some(started) if now.saturating_duration_since(started) < self.open_timeout => {
                    false
                }
                _ => {
                    inner.trial_started = Some(now);
                    true
                }
            },
        }
    }

    pub(crate) fn record_success_at(&self, _now: Instant) {
        let mut inner = self.lock();

        match inner.state {
            BreakerState::Closed => {}
            BreakerState::HalfOpen => {
                info!("Circuit '{}' closed after successful trial", self.name);
            }
            // Late success from a call that started before the breaker opened.
            // Only the HalfOpen trial may close it.
            BreakerState::Open => return,
        }

        inner.state = BreakerState::Closed;
        inner.failure_count = 0;
        inner.open_until = None;
        inner.trial_started = None;
    }

    pub(crate) fn record_failure_at(&self, now: Instant) {
        let mut inner = self.lock();

        match inner.state {
            BreakerState::Closed => {
                inner.failure_count = inner.failure_count.saturating_add(1);
                if inner.failure_count >= self.failure_threshold {
                    self.open(&mut inner, now);
                    warn!(
                        "Circuit '{}' opened after {} consecutive failures, retry in {:?}",
                        self.name, inner.failure_count, self.open_timeout
                    );
                }
            }
            BreakerState::HalfOpen => {
                inner.failure_count = inner.failure_count.saturating_add(1);
                self.open(&mut inner, now);
                warn!(
                    "Circuit '{}' trial failed, re-opened for {:?}",
                    self.name, self.open_timeout
                );
            }
            // Late failures from calls that started before the breaker opened.
            BreakerState::Open => {
                inner.failure_count = inner.failure_count.saturating_add(1);
            }
        }
    }

    pub(crate) fn snapshot_at(&self, now: Instant) -> BreakerSnapshot {
        let inner = self.lock();

        let state = match inner.state {
            BreakerState::Open if inner.open_until.is_some_and(|until| now >= until) => {
                BreakerState::HalfOpen
            }
            state => state,
        };

        BreakerSnapshot {
            state,
            failure_count: inner.failure_count,
            open_until: inner.open_until,
        }
    }

    fn open(&self, inner: &mut BreakerInner, now: Instant) {
        inner.state = BreakerState::Open;
        inner.open_until = Some(now + self.open_timeout);
        inner.trial_started = None;
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        // Updates are plain field stores, so a poisoned guard is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new("crm", DEFAULT_FAILURE_THRESHOLD, DEFAULT_OPEN_TIMEOUT)
    }
}
