//! Concurrent callers sharing one breaker.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use circuit_breaker::resilience::{BreakerError, CircuitBreaker, Settings, State, TripPolicy};

mod common;
use common::{fail, manual_breaker};

#[test]
fn test_counts_are_exact_under_contention() {
    let (cb, _) = manual_breaker(Settings::new("kv").with_trip_policy(TripPolicy::ConsecutiveFailures {
        threshold: u32::MAX,
    }));
    let threads = 8;
    let per_thread = 250;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let cb = cb.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for n in 0..per_thread {
                    let _ = cb.execute(|| if (i + n) % 2 == 0 { Ok(()) } else { Err("flaky") });
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let counts = cb.counts();
    let total = (threads * per_thread) as u32;
    assert_eq!(counts.requests, total);
    assert_eq!(counts.total_successes + counts.total_failures, total);
    assert_eq!(cb.state(), State::Closed);
}

#[test]
fn test_operation_runs_outside_the_lock() {
    let cb = Arc::new(CircuitBreaker::new(Settings::new("slow")));
    let barrier = Arc::new(Barrier::new(2));

    // both calls must be inside the operation at the same time to pass the barrier
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let cb = cb.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                cb.execute(|| {
                    barrier.wait();
                    Ok::<_, ()>(())
                })
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), Ok(()));
    }
    assert_eq!(cb.counts().total_successes, 2);
}

#[test]
fn test_half_open_limits_concurrent_trials() {
    let (cb, clock) = manual_breaker(
        Settings::new("trials")
            .with_max_requests(2)
            .with_trip_policy(TripPolicy::ConsecutiveFailures { threshold: 1 }),
    );
    fail(&cb).unwrap_err();
    clock.advance(Duration::from_secs(60));

    let admitted = Arc::new(AtomicU32::new(0));
    let rejected = Arc::new(AtomicU32::new(0));
    let threads = 6;
    let start = Arc::new(Barrier::new(threads));
    let decided = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let cb = cb.clone();
            let (admitted, rejected) = (admitted.clone(), rejected.clone());
            let (start, decided) = (start.clone(), decided.clone());
            thread::spawn(move || {
                start.wait();
                let admission = cb.allow();
                // every caller gets its admission decision before any trial completes
                decided.wait();
                match admission {
                    Ok(permit) => {
                        admitted.fetch_add(1, Ordering::SeqCst);
                        permit.success();
                    }
                    Err(BreakerError::TooManyRequests) => {
                        rejected.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(other) => panic!("unexpected rejection: {other}"),
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(admitted.load(Ordering::SeqCst), 2);
    assert_eq!(rejected.load(Ordering::SeqCst), 4);
    assert_eq!(cb.state(), State::Closed);
}

#[test]
fn test_panicking_callers_trip_the_breaker() {
    let (cb, _) = manual_breaker(Settings::new("fragile"));

    for _ in 0..5 {
        let cb = cb.clone();
        let joined = thread::spawn(move || cb.execute(|| -> Result<(), ()> { panic!("segment fault in driver") }))
            .join();
        assert!(joined.is_err());
    }

    assert_eq!(cb.state(), State::Open);
}

#[tokio::test]
async fn test_async_tasks_share_breaker() {
    let (cb, _) = manual_breaker(Settings::new("rpc").with_trip_policy(TripPolicy::ConsecutiveFailures {
        threshold: 3,
    }));

    let mut tasks = Vec::new();
    for _ in 0..3 {
        let cb = cb.clone();
        tasks.push(tokio::spawn(async move {
            cb.execute_async(|| async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Err::<(), _>("deadline exceeded")
            })
            .await
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), Err(BreakerError::Operation("deadline exceeded")));
    }

    assert_eq!(cb.state(), State::Open);
    let rejected = cb.execute_async(|| async { Ok::<_, &str>(()) }).await;
    assert_eq!(rejected, Err(BreakerError::Open));
}

#[tokio::test]
async fn test_cancelled_call_counts_as_failure() {
    let (cb, _) = manual_breaker(Settings::new("rpc"));

    let call = cb.execute_async(|| async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok::<_, &str>(())
    });
    let timed_out = tokio::time::timeout(Duration::from_millis(10), call).await;
    assert!(timed_out.is_err());

    assert_eq!(cb.counts().total_failures, 1);
}
