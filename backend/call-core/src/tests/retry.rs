use crate::error::contact_source::ContactSourceError;
use crate::retry::RetryPolicy;

use std::time::Duration;

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay: Duration::from_millis(1),
        backoff_factor: 2.0,
        max_delay: Duration::from_millis(5),
    }
}

/// **VALUE**: Transient failures are absorbed within the attempt budget.
///
/// **WHY THIS MATTERS**: The contact export is routinely "not ready yet" right
/// after the directory server starts. Giving up on the first miss would leave
/// the bridge without contacts until the next refresh.
///
/// **BUG THIS CATCHES**: Would catch an off-by-one in the attempt counter that
/// stops after two attempts.
#[tokio::test]
async fn given_two_transient_failures_when_executed_then_third_attempt_succeeds() {
    // GIVEN: An operation that fails twice with a transient error
    let policy = fast_policy(3);
    let mut attempts = 0u32;

    // WHEN: Executing it under the retry policy
    let result = policy
        .execute_with_retry(
            "test fetch",
            || {
                attempts += 1;
                let attempt = attempts;
                async move {
                    if attempt < 3 {
                        Err(ContactSourceError::transient("not ready"))
                    } else {
                        Ok(attempt)
                    }
                }
            },
            ContactSourceError::is_retryable,
        )
        .await;

    // THEN: The third attempt's result comes back
    assert_eq!(result.expect("third attempt should succeed"), 3);
    assert_eq!(attempts, 3);
}

/// **VALUE**: Permanent errors are never retried.
///
/// **WHY THIS MATTERS**: A payload with the wrong schema will be wrong on every
/// attempt; retrying only delays the fallback to the previous index.
///
/// **BUG THIS CATCHES**: Would catch `should_retry` being ignored while attempts remain.
#[tokio::test]
async fn given_permanent_failure_when_executed_then_aborts_after_first_attempt() {
    // GIVEN: An operation that always fails permanently
    let policy = fast_policy(5);
    let mut attempts = 0u32;

    // WHEN: Executing it
    let result: Result<(), ContactSourceError> = policy
        .execute_with_retry(
            "test fetch",
            || {
                attempts += 1;
                async { Err(ContactSourceError::permanent("bad schema")) }
            },
            ContactSourceError::is_retryable,
        )
        .await;

    // THEN: One attempt, permanent error surfaced
    assert!(matches!(result, Err(ContactSourceError::Permanent { .. })));
    assert_eq!(attempts, 1);
}

#[tokio::test]
async fn given_unavailable_source_when_executed_then_not_retried() {
    // GIVEN: An operation whose dependency is unreachable
    let policy = fast_policy(3);
    let mut attempts = 0u32;

    // WHEN: Executing it
    let result: Result<(), ContactSourceError> = policy
        .execute_with_retry(
            "test fetch",
            || {
                attempts += 1;
                async { Err(ContactSourceError::unavailable("connection refused")) }
            },
            ContactSourceError::is_retryable,
        )
        .await;

    // THEN: Unavailable is not retryable
    assert!(matches!(result, Err(ContactSourceError::Unavailable { .. })));
    assert_eq!(attempts, 1);
}

#[tokio::test]
async fn given_endless_transient_failures_when_executed_then_last_error_after_budget() {
    // GIVEN: An operation that never becomes ready
    let policy = fast_policy(3);
    let mut attempts = 0u32;

    // WHEN: Executing it
    let result: Result<(), ContactSourceError> = policy
        .execute_with_retry(
            "test fetch",
            || {
                attempts += 1;
                let attempt = attempts;
                async move { Err(ContactSourceError::transient(format!("attempt {attempt}"))) }
            },
            ContactSourceError::is_retryable,
        )
        .await;

    // THEN: Exactly max_attempts tries, the last error is returned
    assert_eq!(attempts, 3);
    let error = result.expect_err("budget should be exhausted");
    assert!(error.to_string().contains("attempt 3"), "{error}");
}

#[test]
fn given_default_policy_when_delays_computed_then_doubles_from_one_second() {
    // GIVEN: The default policy (3 attempts, 1s, x2, cap 30s)
    let policy = RetryPolicy::default();

    // WHEN: Computing the waits
    let delays: Vec<u128> = policy.delays().iter().map(Duration::as_millis).collect();

    // THEN: Two waits between three attempts
    assert_eq!(delays, vec![1000, 2000]);
}

#[test]
fn given_low_cap_when_delays_computed_then_growth_stops_at_max_delay() {
    // GIVEN: A policy whose cap is hit after three steps
    let policy = RetryPolicy {
        max_attempts: 6,
        initial_delay: Duration::from_secs(1),
        backoff_factor: 2.0,
        max_delay: Duration::from_secs(5),
    };

    // WHEN: Computing the waits
    let delays: Vec<u128> = policy.delays().iter().map(Duration::as_millis).collect();

    // THEN: 1s, 2s, 4s and then the cap
    assert_eq!(delays, vec![1000, 2000, 4000, 5000, 5000]);
}

#[test]
fn given_initial_delay_above_cap_when_delays_computed_then_first_wait_is_capped() {
    // GIVEN: A policy whose first delay already exceeds the cap
    let policy = RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_secs(5),
        backoff_factor: 2.0,
        max_delay: Duration::from_secs(2),
    };

    // WHEN: Computing the waits
    let delays: Vec<u128> = policy.delays().iter().map(Duration::as_millis).collect();

    // THEN: No wait is longer than the cap, the first one included
    assert_eq!(delays, vec![2000, 2000]);
}
