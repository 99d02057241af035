//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: a bounded number of trial calls probe for recovery
//!
//! # Generations
//! Every transition starts a new generation and clears the counts. A call is
//! tagged with the generation it was admitted under; its outcome is dropped
//! if the generation moved on while the call was in flight.
//!
//! # Design Decisions
//! - One mutex guards state, counts, generation and expiry
//! - The lock covers admission and outcome recording only; the protected
//!   operation runs outside it
//! - Time-driven transitions are resolved lazily on access; there is no timer
//! - Outcome accounting lives in a `Drop` guard so panics count as failures

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::observability::metrics;
use crate::resilience::clock::{Clock, SystemClock};
use crate::resilience::counts::Counts;
use crate::resilience::error::BreakerError;
use crate::resilience::settings::{Settings, StateChangeHook, TripPredicate, WindowExpiry};
use crate::resilience::state::State;

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: State,
    pub generation: u64,
    pub counts: Counts,
}

/// Mutable breaker state. Only touched with the breaker's lock held.
#[derive(Debug)]
struct Core {
    state: State,
    generation: u64,
    counts: Counts,
    /// `None` while half-open.
    expiry: Option<Instant>,
}

/// A transition that happened under the lock, published after release.
#[derive(Debug, Clone, Copy)]
struct Transition {
    from: State,
    to: State,
    generation: u64,
}

/// A thread-safe circuit breaker.
///
/// ```
/// use circuit_breaker::resilience::{CircuitBreaker, Settings};
///
/// let breaker = CircuitBreaker::new(Settings::new("inventory"));
/// let body: Result<&str, _> = breaker.execute(|| Ok::<_, std::io::Error>("ok"));
/// assert_eq!(body.unwrap(), "ok");
/// ```
pub struct CircuitBreaker {
    name: String,
    timeout: Duration,
    interval: Duration,
    max_requests: u32,
    window_expiry: WindowExpiry,
    ready_to_trip: TripPredicate,
    on_state_change: Option<StateChangeHook>,
    clock: Arc<dyn Clock>,
    core: Mutex<Core>,
}

impl CircuitBreaker {
    /// Create a breaker reading time from the system clock.
    pub fn new(settings: Settings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    /// Create a breaker reading time from `clock`.
    pub fn with_clock(settings: Settings, clock: Arc<dyn Clock>) -> Self {
        let interval = settings.effective_interval();
        let now = clock.now();

        let breaker = Self {
            name: settings.name.clone(),
            timeout: settings.effective_timeout(),
            interval,
            max_requests: settings.effective_max_requests(),
            window_expiry: settings.window_expiry,
            ready_to_trip: settings.effective_trip(),
            on_state_change: settings.on_state_change.clone(),
            clock,
            core: Mutex::new(Core {
                state: State::Closed,
                generation: 0,
                counts: Counts::default(),
                expiry: now.checked_add(interval),
            }),
        };

        tracing::debug!(
            breaker = %breaker.name,
            timeout = ?breaker.timeout,
            interval = ?breaker.interval,
            max_requests = breaker.max_requests,
            window_expiry = ?breaker.window_expiry,
            "Circuit breaker created"
        );
        metrics::record_state(&breaker.name, State::Closed);
        breaker
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state, applying any transition that is due.
    pub fn state(&self) -> State {
        self.snapshot().state
    }

    /// Counts of the current generation.
    pub fn counts(&self) -> Counts {
        self.snapshot().counts
    }

    pub fn generation(&self) -> u64 {
        self.snapshot().generation
    }

    /// State, generation and counts read under a single lock acquisition.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let now = self.clock.now();
        let mut transitions = Vec::new();
        let snapshot = {
            let mut core = self.lock();
            let (state, generation) = self.current_state(&mut core, now, &mut transitions);
            BreakerSnapshot {
                name: self.name.clone(),
                state,
                generation,
                counts: core.counts,
            }
        };
        self.publish(&transitions);
        snapshot
    }

    /// Run `op` through the breaker.
    ///
    /// Rejected calls return without invoking `op`. An `Err` from `op` is
    /// recorded as a failure and returned inside [`BreakerError::Operation`].
    /// A panic in `op` is recorded as a failure and then resumes unwinding.
    pub fn execute<T, E, F>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let permit = match self.allow() {
            Ok(permit) => permit,
            Err(rejection) => return Err(rejection.widen()),
        };
        let result = op();
        permit.record(result.is_ok());
        result.map_err(BreakerError::Operation)
    }

    /// Async counterpart of [`execute`](Self::execute).
    ///
    /// The permit is held across the await; a future dropped before it
    /// completes is recorded as a failure.
    pub async fn execute_async<T, E, F, Fut>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = match self.allow() {
            Ok(permit) => permit,
            Err(rejection) => return Err(rejection.widen()),
        };
        let result = op().await;
        permit.record(result.is_ok());
        result.map_err(BreakerError::Operation)
    }

    /// Two-step admission: ask for a permit, run the call, report the outcome
    /// on the permit.
    pub fn allow(&self) -> Result<Permit<'_>, BreakerError<Infallible>> {
        let generation = self.before_request()?;
        Ok(Permit {
            breaker: self,
            generation,
            settled: false,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn before_request(&self) -> Result<u64, BreakerError<Infallible>> {
        let now = self.clock.now();
        let mut transitions = Vec::new();

        let admission = {
            let mut core = self.lock();
            let (state, generation) = self.current_state(&mut core, now, &mut transitions);
            core.counts.on_request();

            match state {
                State::Open => Err(BreakerError::Open),
                State::HalfOpen if core.counts.requests > self.max_requests => {
                    Err(BreakerError::TooManyRequests)
                }
                _ => Ok(generation),
            }
        };

        self.publish(&transitions);

        if let Err(rejection) = &admission {
            tracing::debug!(breaker = %self.name, reason = rejection.reason(), "Call rejected");
            metrics::record_rejection(&self.name, rejection.reason());
        }
        admission
    }

    fn after_request(&self, before: u64, success: bool) {
        let now = self.clock.now();
        let mut transitions = Vec::new();

        let applied = {
            let mut core = self.lock();
            let (state, generation) = self.current_state(&mut core, now, &mut transitions);

            if generation != before {
                false
            } else {
                if success {
                    self.on_success(&mut core, state, now, &mut transitions);
                } else {
                    self.on_failure(&mut core, state, now, &mut transitions);
                }
                true
            }
        };

        self.publish(&transitions);

        let outcome = match (applied, success) {
            (false, _) => {
                tracing::trace!(breaker = %self.name, generation = before, "Stale outcome discarded");
                "stale"
            }
            (true, true) => "success",
            (true, false) => "failure",
        };
        metrics::record_outcome(&self.name, outcome);
    }

    fn on_success(&self, core: &mut Core, state: State, now: Instant, transitions: &mut Vec<Transition>) {
        match state {
            State::Closed => {
                core.counts.on_success();
                if self.should_trip(&core.counts) {
                    self.set_state(core, State::Open, now, transitions);
                }
            }
            State::HalfOpen => {
                core.counts.on_success();
                if core.counts.consecutive_successes >= self.max_requests {
                    self.set_state(core, State::Closed, now, transitions);
                }
            }
            State::Open => {}
        }
    }

    fn on_failure(&self, core: &mut Core, state: State, now: Instant, transitions: &mut Vec<Transition>) {
        match state {
            State::Closed => {
                core.counts.on_failure();
                if self.should_trip(&core.counts) {
                    self.set_state(core, State::Open, now, transitions);
                }
            }
            State::HalfOpen => {
                core.counts.on_failure();
                self.set_state(core, State::Open, now, transitions);
            }
            State::Open => {}
        }
    }

    /// Resolve the effective state at `now`, applying a due time-driven
    /// transition first.
    fn current_state(&self, core: &mut Core, now: Instant, transitions: &mut Vec<Transition>) -> (State, u64) {
        match (core.state, core.expiry) {
            (State::Closed, Some(expiry)) if expiry < now => match self.window_expiry {
                WindowExpiry::Reset => {
                    self.new_generation(core, now);
                    tracing::trace!(
                        breaker = %self.name,
                        generation = core.generation,
                        "Closed window elapsed, counts reset"
                    );
                }
                WindowExpiry::Probe => self.set_state(core, State::HalfOpen, now, transitions),
            },
            (State::Open, Some(expiry)) if expiry <= now => {
                self.set_state(core, State::HalfOpen, now, transitions);
            }
            _ => {}
        }
        (core.state, core.generation)
    }

    fn set_state(&self, core: &mut Core, to: State, now: Instant, transitions: &mut Vec<Transition>) {
        if core.state == to {
            return;
        }

        let from = core.state;
        core.state = to;
        self.new_generation(core, now);
        transitions.push(Transition {
            from,
            to,
            generation: core.generation,
        });
    }

    fn new_generation(&self, core: &mut Core, now: Instant) {
        core.counts.clear();
        core.generation = core.generation.wrapping_add(1);
        core.expiry = match core.state {
            State::Closed => now.checked_add(self.interval),
            State::Open => now.checked_add(self.timeout),
            State::HalfOpen => None,
        };
    }

    fn publish(&self, transitions: &[Transition]) {
        for t in transitions {
            tracing::info!(
                breaker = %self.name,
                from = %t.from,
                to = %t.to,
                generation = t.generation,
                "Circuit breaker state changed"
            );
            metrics::record_transition(&self.name, t.from, t.to);
            if let Some(hook) = &self.on_state_change {
                self.guard_unwinding("on_state_change", || hook(&self.name, t.from, t.to));
            }
        }
    }

    fn should_trip(&self, counts: &Counts) -> bool {
        self.guard_unwinding("ready_to_trip", || (self.ready_to_trip)(counts))
            .unwrap_or(false)
    }

    /// Runs a user callback. While the thread is already unwinding, a panic
    /// from the callback is caught and logged instead of aborting the process.
    fn guard_unwinding<T>(&self, callback: &'static str, f: impl FnOnce() -> T) -> Option<T> {
        if !std::thread::panicking() {
            return Some(f());
        }
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::error!(breaker = %self.name, callback, "Callback panicked during unwinding");
                None
            }
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("interval", &self.interval)
            .field("max_requests", &self.max_requests)
            .field("window_expiry", &self.window_expiry)
            .field("core", &*self.lock())
            .finish()
    }
}

/// Admission granted by [`CircuitBreaker::allow`].
///
/// Report the outcome with [`success`](Self::success),
/// [`failure`](Self::failure) or [`record`](Self::record). A permit dropped
/// without an outcome (panic, cancelled future) counts as a failure.
#[must_use = "dropping a permit records a failure"]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    settled: bool,
}

impl Permit<'_> {
    /// Generation the call was admitted under.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn success(self) {
        self.record(true);
    }

    pub fn failure(self) {
        self.record(false);
    }

    pub fn record(mut self, success: bool) {
        self.settled = true;
        self.breaker.after_request(self.generation, success);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if std::thread::panicking() {
            tracing::warn!(breaker = %self.breaker.name, "Protected call panicked, recording failure");
        } else {
            tracing::debug!(breaker = %self.breaker.name, "Permit dropped without outcome, recording failure");
        }
        self.breaker.after_request(self.generation, false);
    }
}

impl fmt::Debug for Permit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit")
            .field("breaker", &self.breaker.name)
            .field("generation", &self.generation)
            .finish()
    }
}
