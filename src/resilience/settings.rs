//! Construction-time breaker settings.
//!
//! Settings are fixed once a breaker is built. Zero durations and a zero
//! `max_requests` fall back to the defaults.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::resilience::counts::Counts;
use crate::resilience::state::State;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_REQUESTS: u32 = 5;
pub const DEFAULT_CONSECUTIVE_FAILURES: u32 = 5;

/// Decides from the current counts whether the breaker should open.
pub type TripPredicate = Arc<dyn Fn(&Counts) -> bool + Send + Sync>;

/// Called after a real transition with (breaker name, from, to).
pub type StateChangeHook = Arc<dyn Fn(&str, State, State) + Send + Sync>;

/// What happens when the closed-state observation window elapses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowExpiry {
    /// Start a new generation and stay closed.
    Reset,
    /// Move to half-open and let trial calls confirm the dependency.
    #[default]
    Probe,
}

/// Declarative trip predicates, usable from configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TripPolicy {
    /// Trip after `threshold` failures in a row.
    ConsecutiveFailures { threshold: u32 },
    /// Trip once at least `min_requests` were seen and the failure share
    /// reaches `ratio`.
    FailureRatio { min_requests: u32, ratio: f64 },
}

impl Default for TripPolicy {
    fn default() -> Self {
        TripPolicy::ConsecutiveFailures {
            threshold: DEFAULT_CONSECUTIVE_FAILURES,
        }
    }
}

impl TripPolicy {
    pub fn should_trip(&self, counts: &Counts) -> bool {
        match *self {
            TripPolicy::ConsecutiveFailures { threshold } => counts.consecutive_failures >= threshold,
            TripPolicy::FailureRatio { min_requests, ratio } => {
                counts.requests >= min_requests && counts.failure_ratio() >= ratio
            }
        }
    }

    pub fn into_predicate(self) -> TripPredicate {
        Arc::new(move |counts: &Counts| self.should_trip(counts))
    }
}

/// Breaker configuration.
#[derive(Clone)]
pub struct Settings {
    /// Name used in logs, metric labels and the state-change hook.
    pub name: String,
    /// How long the breaker stays open before probing.
    pub timeout: Duration,
    /// Trial calls admitted while half-open, and the success streak that
    /// closes the breaker again.
    pub max_requests: u32,
    /// Length of the closed-state observation window. Defaults to `timeout`.
    pub interval: Option<Duration>,
    pub window_expiry: WindowExpiry,
    /// Defaults to five consecutive failures.
    pub ready_to_trip: Option<TripPredicate>,
    pub on_state_change: Option<StateChangeHook>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: String::new(),
            timeout: DEFAULT_TIMEOUT,
            max_requests: DEFAULT_MAX_REQUESTS,
            interval: None,
            window_expiry: WindowExpiry::default(),
            ready_to_trip: None,
            on_state_change: None,
        }
    }
}

impl Settings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = max_requests;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_window_expiry(mut self, window_expiry: WindowExpiry) -> Self {
        self.window_expiry = window_expiry;
        self
    }

    /// Trip predicate evaluated after every outcome recorded while closed.
    ///
    /// The predicate runs under the breaker lock and must not panic. If it
    /// panics while the permit is being dropped during unwinding, the panic
    /// is caught, logged and treated as "do not trip".
    pub fn with_ready_to_trip<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Counts) -> bool + Send + Sync + 'static,
    {
        self.ready_to_trip = Some(Arc::new(predicate));
        self
    }

    pub fn with_trip_policy(mut self, policy: TripPolicy) -> Self {
        self.ready_to_trip = Some(policy.into_predicate());
        self
    }

    /// Hook called after each transition, outside the breaker lock.
    ///
    /// The hook must not panic. A panic raised while the calling thread is
    /// already unwinding is caught and logged so it cannot abort the process.
    pub fn with_on_state_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, State, State) + Send + Sync + 'static,
    {
        self.on_state_change = Some(Arc::new(hook));
        self
    }

    /// Open-state timeout with the zero fallback applied.
    pub(crate) fn effective_timeout(&self) -> Duration {
        if self.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            self.timeout
        }
    }

    pub(crate) fn effective_max_requests(&self) -> u32 {
        if self.max_requests == 0 {
            DEFAULT_MAX_REQUESTS
        } else {
            self.max_requests
        }
    }

    pub(crate) fn effective_interval(&self) -> Duration {
        match self.interval {
            Some(interval) if !interval.is_zero() => interval,
            _ => self.effective_timeout(),
        }
    }

    pub(crate) fn effective_trip(&self) -> TripPredicate {
        self.ready_to_trip
            .clone()
            .unwrap_or_else(|| TripPolicy::default().into_predicate())
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("max_requests", &self.max_requests)
            .field("interval", &self.interval)
            .field("window_expiry", &self.window_expiry)
            .field("ready_to_trip", &self.ready_to_trip.as_ref().map(|_| "custom"))
            .field("on_state_change", &self.on_state_change.is_some())
            .finish()
    }
}
