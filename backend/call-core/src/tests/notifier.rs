use crate::circuit_breaker::{BreakerState, CircuitBreaker};
use crate::error::notify::NotifyError;
use crate::notifier::{LogNotifier, NotificationSink, Notifier, NotifyOutcome};
use crate::status::StatusBoard;

use common::HttpStatusCode;
use models::{CallDirection, CallState, Notification, NotificationKind};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

#[derive(Clone, Copy)]
enum Behaviour {
    Accept,
    Reject,
    Fail,
    Hang,
}

struct FakeSink {
    behaviour: Behaviour,
    calls: AtomicUsize,
}

impl FakeSink {
    fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSink for FakeSink {
    async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            Behaviour::Accept => Ok(()),
            Behaviour::Reject => Err(NotifyError::from_status(HttpStatusCode(422), "unknown contact")),
            Behaviour::Fail => Err(NotifyError::unavailable("connection refused")),
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            }
        }
    }
}

fn notification() -> Notification {
    Notification {
        kind: NotificationKind::NewCall,
        call_id: "c1".to_string(),
        direction: CallDirection::Inbound,
        state: CallState::Offered,
        remote_number: "+49 89 12345678".to_string(),
        contact_id: String::new(),
        contact_name: String::new(),
        began_at: None,
        ended_at: None,
        duration_seconds: None,
    }
}

fn notifier(sink: Arc<FakeSink>, timeout: Duration) -> Notifier {
    Notifier::new(
        sink,
        Arc::new(CircuitBreaker::new("test", 3, Duration::from_secs(30))),
        2,
        timeout,
    )
}

/// **VALUE**: The degraded mode really stops traffic to a dead CRM.
///
/// **WHY THIS MATTERS**: While the CRM is down every call would otherwise
/// spend its notify timeout waiting, and the CRM gets hammered on recovery.
///
/// **BUG THIS CATCHES**: Would catch `notify` not consulting the breaker, or
/// failures not being recorded into it.
#[tokio::test]
async fn given_failing_sink_when_threshold_reached_then_later_notifications_skipped() {
    // GIVEN: A sink that always fails
    let sink = FakeSink::new(Behaviour::Fail);
    let notifier = notifier(sink.clone(), Duration::from_secs(1));

    // WHEN: Five notifications are attempted
    let mut outcomes = Vec::new();
    for _ in 0..5 {
        outcomes.push(notifier.notify(&notification()).await);
    }

    // THEN: Three attempts fail, the rest are skipped without touching the sink
    assert_eq!(
        outcomes,
        vec![
            NotifyOutcome::Failed,
            NotifyOutcome::Failed,
            NotifyOutcome::Failed,
            NotifyOutcome::Skipped,
            NotifyOutcome::Skipped,
        ]
    );
    assert_eq!(sink.calls(), 3);
    assert_eq!(notifier.breaker().state(), BreakerState::Open);
}

/// **VALUE**: A business rejection does not count against the channel.
///
/// **WHY THIS MATTERS**: The CRM refusing one event (unknown contact, bad
/// state) proves it is alive. Tripping on that would silence every other call.
///
/// **BUG THIS CATCHES**: Would catch the breaker recording every `Err` as a failure.
#[tokio::test]
async fn given_rejecting_sink_when_notified_repeatedly_then_breaker_stays_closed() {
    // GIVEN: A sink that answers 422
    let sink = FakeSink::new(Behaviour::Reject);
    let notifier = notifier(sink.clone(), Duration::from_secs(1));

    // WHEN: Notifying more often than the threshold
    for _ in 0..5 {
        assert_eq!(notifier.notify(&notification()).await, NotifyOutcome::Rejected);
    }

    // THEN: Every attempt reached the sink, breaker closed
    assert_eq!(sink.calls(), 5);
    assert_eq!(notifier.breaker().state(), BreakerState::Closed);
}

/// **VALUE**: A hung send is cut off and its permit is returned.
///
/// **WHY THIS MATTERS**: A leaked permit per timeout would starve the gate
/// after a handful of slow answers, silently stopping all notifications.
///
/// **BUG THIS CATCHES**: Would catch permits released only on the success path.
#[tokio::test]
async fn given_hanging_sink_when_timeout_elapses_then_failed_and_permit_released() {
    // GIVEN: A sink that never answers in time
    let sink = FakeSink::new(Behaviour::Hang);
    let notifier = notifier(sink, Duration::from_millis(20));
    assert_eq!(notifier.available_permits(), 2);

    // WHEN: Notifying
    let outcome = notifier.notify(&notification()).await;

    // THEN: Counted as a failure, permits all back
    assert_eq!(outcome, NotifyOutcome::Failed);
    assert_eq!(notifier.breaker().snapshot().failure_count, 1);
    assert_eq!(notifier.available_permits(), 2);
}

#[tokio::test]
async fn given_status_board_when_breaker_opens_then_crm_reported_unavailable() {
    // GIVEN: A failing sink reporting to a status board
    let board = Arc::new(StatusBoard::new());
    let notifier = notifier(FakeSink::new(Behaviour::Fail), Duration::from_secs(1))
        .with_status(Arc::clone(&board));

    // WHEN: The breaker trips
    for _ in 0..3 {
        notifier.notify(&notification()).await;
    }

    // THEN: The board shows the CRM as unavailable
    assert!(!board.current().crm_available);
}

#[tokio::test]
async fn given_accepting_sink_when_notified_then_delivered() {
    // GIVEN: A sink that accepts everything
    let sink = FakeSink::new(Behaviour::Accept);
    let notifier = notifier(sink.clone(), Duration::from_secs(1));

    // WHEN: Notifying
    let outcome = notifier.notify(&notification()).await;

    // THEN: Delivered once
    assert_eq!(outcome, NotifyOutcome::Delivered);
    assert_eq!(sink.calls(), 1);
}

#[tokio::test]
async fn given_log_notifier_when_sent_then_always_succeeds() {
    // GIVEN / WHEN: The log-only sink
    let result = LogNotifier.send(&notification()).await;

    // THEN: Nothing can fail
    assert!(result.is_ok());
}
