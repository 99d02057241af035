//! Shared helpers for breaker integration tests.

use std::sync::Arc;

use circuit_breaker::resilience::{BreakerError, CircuitBreaker, ManualClock, Settings};

/// Breaker on a manual clock, plus a handle to advance that clock.
pub fn manual_breaker(settings: Settings) -> (Arc<CircuitBreaker>, ManualClock) {
    let clock = ManualClock::new();
    let breaker = CircuitBreaker::with_clock(settings, Arc::new(clock.clone()));
    (Arc::new(breaker), clock)
}

pub fn fail(breaker: &CircuitBreaker) -> Result<(), BreakerError<&'static str>> {
    breaker.execute(|| Err("upstream returned 503"))
}

#[allow(dead_code)]
pub fn succeed(breaker: &CircuitBreaker) -> Result<(), BreakerError<&'static str>> {
    breaker.execute(|| Ok(()))
}
