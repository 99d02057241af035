//! Circuit breaker state.
//!
//! # State Transitions
//! ```text
//! Closed → Open:      trip predicate true after an outcome
//! Closed → Closed:    observation window elapsed (new generation)
//! Open → Half-Open:   timeout elapsed, observed on next access
//! Half-Open → Closed: max_requests consecutive successes
//! Half-Open → Open:   any failure
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum State {
    /// Calls pass through, failures accumulate.
    Closed,
    /// Trial calls probe whether the dependency recovered.
    HalfOpen,
    /// Calls fail fast until the timeout elapses.
    Open,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::HalfOpen => "half-open",
            State::Open => "open",
        }
    }

    /// Numeric value exported on the state gauge.
    pub fn gauge_value(&self) -> f64 {
        match self {
            State::Closed => 0.0,
            State::HalfOpen => 1.0,
            State::Open => 2.0,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_serde() {
        for state in [State::Closed, State::HalfOpen, State::Open] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state));
        }
    }

    #[test]
    fn test_gauge_ordering() {
        assert!(State::Closed.gauge_value() < State::HalfOpen.gauge_value());
        assert!(State::HalfOpen.gauge_value() < State::Open.gauge_value());
    }
}
