use crate::circuit_breaker::{BreakerState, CircuitBreaker};

use std::time::{Duration, Instant};

const OPEN_TIMEOUT: Duration = Duration::from_secs(30);

fn breaker() -> CircuitBreaker {
    CircuitBreaker::new("test", 3, OPEN_TIMEOUT)
}

fn trip(breaker: &CircuitBreaker, at: Instant) {
    for _ in 0..3 {
        breaker.record_failure_at(at);
    }
}

/// **VALUE**: The breaker opens at the threshold and fails fast.
///
/// **WHY THIS MATTERS**: Without this every call event would wait for a
/// dead CRM's timeout before tracking moves on.
///
/// **BUG THIS CATCHES**: Would catch an off-by-one threshold or an Open state
/// that still lets calls through.
#[test]
fn given_three_failures_when_threshold_is_three_then_opens_and_blocks() {
    // GIVEN: A closed breaker
    let breaker = breaker();
    let now = Instant::now();
    assert!(breaker.is_operation_allowed_at(now));

    // WHEN: Recording three consecutive failures
    breaker.record_failure_at(now);
    breaker.record_failure_at(now);
    assert_eq!(breaker.snapshot_at(now).state, BreakerState::Closed);
    breaker.record_failure_at(now);

    // THEN: Open, calls blocked right away
    assert_eq!(breaker.snapshot_at(now).state, BreakerState::Open);
    assert!(!breaker.is_operation_allowed_at(now));
    assert!(!breaker.is_operation_allowed_at(now + OPEN_TIMEOUT / 2));
}

#[test]
fn given_success_between_failures_when_recorded_then_count_resets() {
    // GIVEN: Two failures
    let breaker = breaker();
    let now = Instant::now();
    breaker.record_failure_at(now);
    breaker.record_failure_at(now);

    // WHEN: A success and then two more failures
    breaker.record_success_at(now);
    breaker.record_failure_at(now);
    breaker.record_failure_at(now);

    // THEN: Still closed, the failures were not consecutive
    let snapshot = breaker.snapshot_at(now);
    assert_eq!(snapshot.state, BreakerState::Closed);
    assert_eq!(snapshot.failure_count, 2);
}

/// **VALUE**: HalfOpen admits exactly one trial.
///
/// **WHY THIS MATTERS**: Several concurrent call events hit the gate as soon as
/// the timeout expires. Letting all of them through would hammer a CRM that is
/// still recovering.
///
/// **BUG THIS CATCHES**: Would catch `is_operation_allowed` returning true for
/// every caller in HalfOpen.
#[test]
fn given_open_timeout_elapsed_when_checked_then_half_open_allows_exactly_one() {
    // GIVEN: A tripped breaker
    let breaker = breaker();
    let opened = Instant::now();
    trip(&breaker, opened);

    // WHEN: Checking after the open timeout
    let later = opened + OPEN_TIMEOUT;
    assert_eq!(breaker.snapshot_at(later).state, BreakerState::HalfOpen);
    let first = breaker.is_operation_allowed_at(later);
    let second = breaker.is_operation_allowed_at(later);
    let third = breaker.is_operation_allowed_at(later + Duration::from_secs(1));

    // THEN: Only the first caller gets the trial
    assert!(first);
    assert!(!second);
    assert!(!third);
}

#[test]
fn given_half_open_trial_when_success_recorded_then_closes() {
    // GIVEN: A breaker in HalfOpen with its trial out
    let breaker = breaker();
    let opened = Instant::now();
    trip(&breaker, opened);
    let later = opened + OPEN_TIMEOUT;
    assert!(breaker.is_operation_allowed_at(later));

    // WHEN: The trial succeeds
    breaker.record_success_at(later);

    // THEN: Closed with a clean counter
    let snapshot = breaker.snapshot_at(later);
    assert_eq!(snapshot.state, BreakerState::Closed);
    assert_eq!(snapshot.failure_count, 0);
    assert!(breaker.is_operation_allowed_at(later));
    assert!(breaker.is_operation_allowed_at(later));
}

/// **VALUE**: Only the HalfOpen trial can close an open breaker.
///
/// **BUG THIS CATCHES**: Would catch a slow notification that was sent
/// before the breaker opened closing it again the moment it succeeds, which
/// skips the open timeout entirely.
#[test]
fn given_open_breaker_when_late_success_recorded_then_stays_open() {
    // GIVEN: A freshly opened breaker
    let breaker = breaker();
    let opened = Instant::now();
    trip(&breaker, opened);

    // WHEN: A call that started earlier reports success
    breaker.record_success_at(opened + Duration::from_secs(1));

    // THEN: Still open, counter untouched, nothing allowed through
    let snapshot = breaker.snapshot_at(opened + Duration::from_secs(1));
    assert_eq!(snapshot.state, BreakerState::Open);
    assert_eq!(snapshot.failure_count, 3);
    assert_eq!(snapshot.open_until, Some(opened + OPEN_TIMEOUT));
    assert!(!breaker.is_operation_allowed_at(opened + Duration::from_secs(1)));
}

/// **VALUE**: A failed trial re-opens for the base timeout, not an escalated one.
///
/// **WHY THIS MATTERS**: Recovery timing must be predictable for operators.
///
/// **BUG THIS CATCHES**: Would catch the timeout doubling on each failed trial.
#[test]
fn given_half_open_trial_when_failure_recorded_then_reopens_for_base_timeout() {
    // GIVEN: A breaker in HalfOpen with its trial out
    let breaker = breaker();
    let opened = Instant::now();
    trip(&breaker, opened);
    let trial_at = opened + OPEN_TIMEOUT;
    assert!(breaker.is_operation_allowed_at(trial_at));

    // WHEN: The trial fails
    breaker.record_failure_at(trial_at);

    // THEN: Open until exactly one base timeout later
    let snapshot = breaker.snapshot_at(trial_at);
    assert_eq!(snapshot.state, BreakerState::Open);
    assert_eq!(snapshot.open_until, Some(trial_at + OPEN_TIMEOUT));
    assert!(!breaker.is_operation_allowed_at(trial_at + OPEN_TIMEOUT - Duration::from_secs(1)));
    assert!(breaker.is_operation_allowed_at(trial_at + OPEN_TIMEOUT));
}

#[test]
fn given_trial_never_recorded_when_open_timeout_passes_again_then_new_trial_allowed() {
    // GIVEN: A HalfOpen breaker whose trial outcome was lost
    let breaker = breaker();
    let opened = Instant::now();
    trip(&breaker, opened);
    let trial_at = opened + OPEN_TIMEOUT;
    assert!(breaker.is_operation_allowed_at(trial_at));

    // WHEN: Another open timeout passes without a record
    let allowed = breaker.is_operation_allowed_at(trial_at + OPEN_TIMEOUT);

    // THEN: A fresh trial is handed out
    assert!(allowed);
    assert!(!breaker.is_operation_allowed_at(trial_at + OPEN_TIMEOUT));
}

#[test]
fn given_open_breaker_when_state_read_then_nothing_changes() {
    // GIVEN: A breaker whose timeout has elapsed
    let breaker = breaker();
    let opened = Instant::now();
    trip(&breaker, opened);
    let later = opened + OPEN_TIMEOUT;

    // WHEN: Reading the state repeatedly
    for _ in 0..5 {
        assert_eq!(breaker.snapshot_at(later).state, BreakerState::HalfOpen);
    }

    // THEN: The trial slot is still available
    assert!(breaker.is_operation_allowed_at(later));
}

/// **VALUE**: Concurrent failures are never lost.
///
/// **WHY THIS MATTERS**: Notifications for different calls fail in parallel
/// when the CRM goes down.
///
/// **BUG THIS CATCHES**: Would catch state split across separate locks or
/// atomics where increments race with the Open transition.
#[test]
fn given_parallel_failures_when_recorded_then_every_failure_is_counted() {
    // GIVEN: A shared breaker with a high threshold
    let breaker = CircuitBreaker::new("parallel", 1000, OPEN_TIMEOUT);
    let now = Instant::now();

    // WHEN: Eight threads record 50 failures each
    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..50 {
                    breaker.record_failure_at(now);
                }
            });
        }
    });

    // THEN: All 400 landed and the breaker is still closed
    let snapshot = breaker.snapshot_at(now);
    assert_eq!(snapshot.failure_count, 400);
    assert_eq!(snapshot.state, BreakerState::Closed);
}
