//! End-to-end state machine scenarios.

use std::time::Duration;

use circuit_breaker::resilience::{BreakerError, Counts, Settings, State, TripPolicy, WindowExpiry};

mod common;
use common::{fail, manual_breaker, succeed};

#[test]
fn test_default_lifecycle() {
    let (cb, clock) = manual_breaker(Settings::new("orders"));

    for _ in 0..5 {
        assert_eq!(fail(&cb), Err(BreakerError::Operation("upstream returned 503")));
    }
    assert_eq!(cb.state(), State::Open);

    clock.advance(Duration::from_secs(30));
    assert_eq!(succeed(&cb), Err(BreakerError::Open));

    clock.advance(Duration::from_secs(31));
    assert_eq!(succeed(&cb), Ok(()));
    assert_eq!(cb.state(), State::HalfOpen);

    for _ in 0..4 {
        assert_eq!(succeed(&cb), Ok(()));
    }
    assert_eq!(cb.state(), State::Closed);
    assert_eq!(cb.counts(), Counts::default());
}

#[test]
fn test_failure_ratio_needs_request_floor() {
    let (cb, _) = manual_breaker(Settings::new("search").with_trip_policy(TripPolicy::FailureRatio {
        min_requests: 3,
        ratio: 0.5,
    }));

    fail(&cb).unwrap_err();
    fail(&cb).unwrap_err();
    assert_eq!(cb.state(), State::Closed);
    assert_eq!(cb.counts().total_failures, 2);

    fail(&cb).unwrap_err();
    assert_eq!(cb.state(), State::Open);
}

#[test]
fn test_custom_closure_predicate() {
    let (cb, _) = manual_breaker(
        Settings::new("search")
            .with_ready_to_trip(|c| c.requests >= 3 && c.total_failures as f64 / c.requests as f64 >= 0.5),
    );

    succeed(&cb).unwrap();
    fail(&cb).unwrap_err();
    assert_eq!(cb.state(), State::Closed);
    fail(&cb).unwrap_err();
    assert_eq!(cb.state(), State::Open);
}

#[test]
fn test_open_window_boundary() {
    let timeout = Duration::from_secs(5);
    let (cb, clock) = manual_breaker(
        Settings::new("ledger")
            .with_timeout(timeout)
            .with_trip_policy(TripPolicy::ConsecutiveFailures { threshold: 1 }),
    );
    fail(&cb).unwrap_err();

    clock.advance(timeout - Duration::from_millis(1));
    assert_eq!(succeed(&cb), Err(BreakerError::Open));

    clock.advance(Duration::from_millis(1));
    assert_eq!(succeed(&cb), Ok(()));
    assert_eq!(cb.state(), State::HalfOpen);
}

#[test]
fn test_trip_then_timeout_already_elapsed() {
    let (cb, clock) = manual_breaker(
        Settings::new("ledger")
            .with_timeout(Duration::from_secs(1))
            .with_trip_policy(TripPolicy::ConsecutiveFailures { threshold: 1 }),
    );
    fail(&cb).unwrap_err();
    clock.advance(Duration::from_secs(2));

    assert_eq!(succeed(&cb), Ok(()));
}

#[test]
fn test_half_open_admits_exactly_max_requests() {
    let (cb, clock) = manual_breaker(
        Settings::new("profile")
            .with_max_requests(3)
            .with_trip_policy(TripPolicy::ConsecutiveFailures { threshold: 1 }),
    );
    fail(&cb).unwrap_err();
    clock.advance(Duration::from_secs(60));

    let permits: Vec<_> = (0..3).map(|_| cb.allow().unwrap()).collect();
    for _ in 0..3 {
        assert_eq!(cb.allow().unwrap_err(), BreakerError::TooManyRequests);
    }
    assert_eq!(cb.state(), State::HalfOpen);

    for permit in permits {
        permit.success();
    }
    assert_eq!(cb.state(), State::Closed);
    assert_eq!(succeed(&cb), Ok(()));
}

#[test]
fn test_half_open_failure_discards_trial_successes() {
    let (cb, clock) = manual_breaker(Settings::new("profile").with_trip_policy(TripPolicy::ConsecutiveFailures {
        threshold: 1,
    }));
    fail(&cb).unwrap_err();
    clock.advance(Duration::from_secs(60));

    for _ in 0..4 {
        succeed(&cb).unwrap();
    }
    let before = cb.generation();
    fail(&cb).unwrap_err();

    assert_eq!(cb.state(), State::Open);
    assert_eq!(cb.generation(), before + 1);
    assert_eq!(cb.counts(), Counts::default());
    assert_eq!(succeed(&cb), Err(BreakerError::Open));
}

#[test]
fn test_outcome_from_previous_generation_is_ignored() {
    let (cb, _) = manual_breaker(Settings::new("inventory").with_trip_policy(TripPolicy::ConsecutiveFailures {
        threshold: 2,
    }));

    let slow = cb.allow().unwrap();
    let admitted_under = slow.generation();
    fail(&cb).unwrap_err();
    fail(&cb).unwrap_err();
    assert_eq!(cb.state(), State::Open);

    let after_trip = cb.counts();
    slow.failure();
    assert_eq!(cb.counts(), after_trip);
    assert!(cb.generation() > admitted_under);
}

#[test]
fn test_in_flight_call_across_recovery() {
    let (cb, clock) = manual_breaker(
        Settings::new("inventory")
            .with_max_requests(1)
            .with_trip_policy(TripPolicy::ConsecutiveFailures { threshold: 1 }),
    );
    fail(&cb).unwrap_err();
    clock.advance(Duration::from_secs(60));

    // a single trial call confirms recovery
    let trial = cb.allow().unwrap();
    assert_eq!(cb.allow().unwrap_err(), BreakerError::TooManyRequests);
    trial.success();
    assert_eq!(cb.state(), State::Closed);

    let closed_gen = cb.generation();
    let late = cb.allow().unwrap();
    fail(&cb).unwrap_err();
    late.success();
    assert_eq!(cb.state(), State::Open);
    assert!(cb.generation() > closed_gen);
    assert_eq!(cb.counts(), Counts::default());
}

#[test]
fn test_closed_window_resets_stale_streak() {
    let (cb, clock) = manual_breaker(
        Settings::new("mail")
            .with_interval(Duration::from_secs(10))
            .with_window_expiry(WindowExpiry::Reset),
    );

    for _ in 0..4 {
        fail(&cb).unwrap_err();
    }
    clock.advance(Duration::from_secs(11));

    // streak restarted, four more failures stay below the threshold
    for _ in 0..4 {
        fail(&cb).unwrap_err();
    }
    assert_eq!(cb.state(), State::Closed);
    assert_eq!(cb.counts().consecutive_failures, 4);

    fail(&cb).unwrap_err();
    assert_eq!(cb.state(), State::Open);
}

#[test]
fn test_closed_window_probe_mode() {
    let (cb, clock) = manual_breaker(
        Settings::new("mail")
            .with_max_requests(1)
            .with_interval(Duration::from_secs(10))
            .with_window_expiry(WindowExpiry::Probe),
    );
    succeed(&cb).unwrap();
    clock.advance(Duration::from_secs(11));

    let trial = cb.allow().unwrap();
    assert_eq!(cb.state(), State::HalfOpen);
    assert_eq!(cb.allow().unwrap_err(), BreakerError::TooManyRequests);
    trial.success();
    assert_eq!(cb.state(), State::Closed);
}
