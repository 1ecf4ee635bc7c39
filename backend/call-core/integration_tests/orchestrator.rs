use crate::helpers::{
    RecordingSink, StallingSink, contact, eventually, inbound, orchestrator,
    orchestrator_with_sink,
};

use call_core::circuit_breaker::BreakerState;
use call_core::error::{CallError, OrchestratorError};

use models::{CallEventState, CallState, ConnectivityState, NotificationKind, TransportKind};

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// **VALUE**: The full path from transport events to CRM notifications.
///
/// **WHY THIS MATTERS**: This is the one flow users see: a known caller rings,
/// is answered, hangs up, and the CRM gets a matched journal entry.
///
/// **BUG THIS CATCHES**: Would catch a broken link anywhere in normalize →
/// lookup → track → notify, such as the wrong notification kind per change or
/// a journal entry without duration.
#[tokio::test]
async fn given_known_caller_when_call_completes_then_new_call_state_change_and_journal() {
    // GIVEN: A directory with a contact whose number shares the 7-digit suffix
    let sink = RecordingSink::accepting();
    let orchestrator = orchestrator(
        sink.clone(),
        vec![contact("doc", "Dr. Example", &["08912345 6"])],
        7,
    );
    let start = SystemTime::now();

    // WHEN: Offered, connected, disconnected for c1
    orchestrator
        .handle_event(&inbound("c1", CallEventState::Offered, "+4989123456", start))
        .await
        .expect("offer");
    orchestrator
        .handle_event(&inbound("c1", CallEventState::Connected, "", start + Duration::from_secs(1)))
        .await
        .expect("connect");
    orchestrator
        .handle_event(&inbound("c1", CallEventState::Disconnected, "", start + Duration::from_secs(61)))
        .await
        .expect("disconnect");

    // THEN: Exactly the three expected notifications, all matched
    let received = sink.received();
    let kinds: Vec<NotificationKind> = received.iter().map(|n| n.kind).collect();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::NewCall,
            NotificationKind::CallStateChanged,
            NotificationKind::NewJournal,
        ]
    );

    assert!(received.iter().all(|n| n.contact_id == "doc"));
    assert_eq!(received[1].state, CallState::Connected);

    let journal = &received[2];
    assert_eq!(journal.state, CallState::Finished);
    assert!(journal.duration_seconds.is_some_and(|d| d > 0));
    assert!(journal.ended_at >= journal.began_at);
}

#[tokio::test]
async fn given_running_dispatcher_when_events_submitted_then_same_notifications_after_shutdown() {
    // GIVEN: A spawned orchestrator
    let sink = RecordingSink::accepting();
    let handle = orchestrator(sink.clone(), vec![contact("doc", "Dr. Example", &["08912345 6"])], 7)
        .spawn(16, Duration::from_secs(60));
    let start = SystemTime::now();

    // WHEN: Submitting the lifecycle and shutting down
    for (state, offset) in [
        (CallEventState::Offered, 0),
        (CallEventState::Connected, 1),
        (CallEventState::Disconnected, 30),
    ] {
        handle
            .submit(inbound("c1", state, "+4989123456", start + Duration::from_secs(offset)))
            .await
            .expect("dispatcher accepts events");
    }
    handle.shutdown().await;

    // THEN: Every submitted event was processed before shutdown returned
    assert_eq!(
        sink.kinds_for("c1"),
        vec![
            NotificationKind::NewCall,
            NotificationKind::CallStateChanged,
            NotificationKind::NewJournal,
        ]
    );
}

/// **VALUE**: Per-call ordering holds while calls are processed concurrently.
///
/// **WHY THIS MATTERS**: Transports interleave events of simultaneous calls.
/// Applying a disconnect before its connect would journal an answered call as
/// abandoned.
///
/// **BUG THIS CATCHES**: Would catch a dispatcher that fans events out to a
/// shared pool without keying workers by call id.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn given_interleaved_calls_when_dispatched_then_each_call_sees_its_own_order() {
    // GIVEN: A spawned orchestrator and twenty calls
    let sink = RecordingSink::accepting();
    let handle = orchestrator(sink.clone(), Vec::new(), 10).spawn(8, Duration::from_secs(60));
    let sender = handle.event_sender();
    let start = SystemTime::now();
    let call_ids: Vec<String> = (0..20).map(|i| format!("call-{i}")).collect();

    // WHEN: Submitting their events round-robin
    for (step, state) in [
        CallEventState::Offered,
        CallEventState::Ringing,
        CallEventState::Connected,
        CallEventState::Disconnected,
    ]
    .into_iter()
    .enumerate()
    {
        for (i, id) in call_ids.iter().enumerate() {
            let at = start + Duration::from_secs(step as u64 * 10 + i as u64);
            sender
                .send(inbound(id, state, &format!("030 555 {i:04}"), at))
                .await
                .expect("dispatcher accepts events");
        }
    }
    handle.shutdown().await;

    // THEN: Every call finished with the lifecycle in order
    for id in &call_ids {
        assert_eq!(
            sink.kinds_for(id),
            vec![
                NotificationKind::NewCall,
                NotificationKind::CallStateChanged,
                NotificationKind::NewJournal,
            ],
            "wrong sequence for {id}"
        );
    }
}

#[tokio::test]
async fn given_disconnect_for_unknown_call_when_handled_then_ignored_without_notification() {
    // GIVEN: An orchestrator with no calls
    let sink = RecordingSink::accepting();
    let orchestrator = orchestrator(sink.clone(), Vec::new(), 10);

    // WHEN: A disconnect for an unknown id arrives
    let result = orchestrator
        .handle_event(&inbound("ghost", CallEventState::Disconnected, "", SystemTime::now()))
        .await;

    // THEN: Reported as a protocol violation, nothing sent
    assert!(matches!(result, Err(CallError::ProtocolViolation { .. })));
    assert!(sink.received().is_empty());
    assert!(orchestrator.active_calls().await.is_empty());
}

/// **VALUE**: Call tracking keeps going while the CRM is down.
///
/// **WHY THIS MATTERS**: The CRM is an optional consumer; losing it must not
/// lose calls.
///
/// **BUG THIS CATCHES**: Would catch notification errors propagating into
/// `handle_event` or the breaker not gating later sends.
#[tokio::test]
async fn given_crm_down_when_calls_continue_then_tracked_and_notifications_skipped() {
    // GIVEN: A sink that always fails
    let sink = RecordingSink::failing();
    let orchestrator = orchestrator(sink.clone(), Vec::new(), 10);
    let start = SystemTime::now();

    // WHEN: Five calls are offered
    for i in 0..5 {
        orchestrator
            .handle_event(&inbound(&format!("c{i}"), CallEventState::Offered, "030 1234567", start))
            .await
            .expect("tracking continues");
    }

    // THEN: All tracked, only three send attempts before the breaker opened
    assert_eq!(orchestrator.active_calls().await.len(), 5);
    assert_eq!(sink.received().len(), 3);
    assert_eq!(orchestrator.notifier().breaker().state(), BreakerState::Open);
    assert!(!orchestrator.status().current().crm_available);
}

#[tokio::test]
async fn given_ambiguous_call_when_contact_selected_then_contact_changed_sent() {
    // GIVEN: An offered call from a number shared by two contacts
    let sink = RecordingSink::accepting();
    let handle = orchestrator(
        sink.clone(),
        vec![
            contact("a", "Anna", &["089 12345678"]),
            contact("b", "Bernd", &["+49 89 12345678"]),
        ],
        10,
    )
    .spawn(8, Duration::from_secs(60));
    handle
        .orchestrator()
        .handle_event(&inbound("c1", CallEventState::Offered, "089 12345678", SystemTime::now()))
        .await
        .expect("offer");

    // WHEN: The user picks b, and then an unknown contact
    let update = handle.select_contact("c1", "b").await.expect("b exists");
    let unknown = handle.select_contact("c1", "nobody").await;

    // THEN: Contact changed to b; the unknown id is rejected
    assert_eq!(update.record.contact.as_ref().map(|c| c.name.as_str()), Some("Bernd"));
    assert_eq!(
        sink.kinds_for("c1"),
        vec![NotificationKind::NewCall, NotificationKind::ContactChanged]
    );
    assert!(matches!(
        unknown,
        Err(OrchestratorError::Call(CallError::UnknownContact { .. }))
    ));

    handle.shutdown().await;
}

#[tokio::test]
async fn given_dial_request_when_confirmed_by_transport_then_pending_becomes_call() {
    // GIVEN: A dial request to a known contact
    let sink = RecordingSink::accepting();
    let orchestrator = orchestrator(sink.clone(), vec![contact("a", "Anna", &["089 12345678"])], 10);
    let pending = orchestrator
        .request_dial("089 12345678", Some("a"))
        .await
        .expect("contact exists");
    assert_eq!(orchestrator.active_calls().await[0].state, CallState::Pending);

    // WHEN: The transport reports the outbound call
    let mut event = inbound("t-1", CallEventState::Dialing, "+49 89 12345678", SystemTime::now());
    event.direction = models::CallDirection::Outbound;
    let update = orchestrator.handle_event(&event).await.expect("dialing");

    // THEN: One active call, carrying the dial's id and contact
    let active = orchestrator.active_calls().await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].call_id, "t-1");
    assert_eq!(update.record.pending_id.as_deref(), Some(pending.pending_id.as_str()));
    assert_eq!(sink.received()[0].contact_id, "a");
}

#[tokio::test]
async fn given_unknown_contact_when_dial_requested_then_rejected() {
    // GIVEN: An empty directory
    let orchestrator = orchestrator(RecordingSink::accepting(), Vec::new(), 10);

    // WHEN: Dialing with a contact id
    let result = orchestrator.request_dial("089 12345678", Some("missing")).await;

    // THEN: Unknown contact, nothing pending
    assert!(matches!(result, Err(CallError::UnknownContact { .. })));
    assert!(orchestrator.active_calls().await.is_empty());
}

#[tokio::test]
async fn given_finished_call_when_acknowledged_then_no_longer_queryable() {
    // GIVEN: A finished call
    let orchestrator = orchestrator(RecordingSink::accepting(), Vec::new(), 10);
    let start = SystemTime::now();
    orchestrator
        .handle_event(&inbound("c1", CallEventState::Connected, "030 1234567", start))
        .await
        .expect("connect");
    orchestrator
        .handle_event(&inbound("c1", CallEventState::Disconnected, "", start))
        .await
        .expect("disconnect");
    assert_eq!(orchestrator.terminal_calls().await.len(), 1);

    // WHEN: Acknowledging it
    let record = orchestrator.acknowledge("c1").await.expect("terminal call");

    // THEN: Gone
    assert_eq!(record.state, CallState::Finished);
    assert!(orchestrator.get_call("c1").await.is_none());
}

#[tokio::test]
async fn given_pending_dial_when_swept_after_window_then_evicted() {
    // GIVEN: An unconfirmed dial
    let orchestrator = orchestrator(RecordingSink::accepting(), Vec::new(), 10);
    orchestrator.request_dial("030 1234567", None).await.expect("dial");

    // WHEN: Sweeping after the stale-pending window
    let eviction = orchestrator
        .sweep_at(Instant::now() + Duration::from_secs(301))
        .await;

    // THEN: Evicted and gone from active calls
    assert_eq!(eviction.pending.len(), 1);
    assert!(orchestrator.active_calls().await.is_empty());
}

#[tokio::test]
async fn given_transports_reporting_when_status_read_then_aggregate_reflects_them() {
    // GIVEN: An orchestrator with two transports
    let orchestrator = orchestrator(RecordingSink::accepting(), Vec::new(), 10);

    // WHEN: One is up and one is down
    orchestrator.report_transport(TransportKind::LineMonitor, true);
    orchestrator.report_transport(TransportKind::Browser, false);

    // THEN: Partial
    assert_eq!(
        orchestrator.status().current().connectivity,
        ConnectivityState::Partial
    );
}

/// Tasks left running on the test runtime: the dispatcher and the sweeper
/// plus one per live call worker.
fn alive_tasks() -> usize {
    tokio::runtime::Handle::current().metrics().num_alive_tasks()
}

/// **VALUE**: Workers of calls removed by the stale sweep are shut down.
///
/// **WHY THIS MATTERS**: The stale sweep exists for calls whose disconnect
/// never arrived. If their workers stayed, every lost disconnect would leak
/// a task for the life of the process.
///
/// **BUG THIS CATCHES**: Would catch workers being retired only by a
/// disconnect event.
#[tokio::test]
async fn given_calls_without_disconnect_when_swept_as_stale_then_workers_exit() {
    // GIVEN: 100 offered calls that never end, each with its own worker
    let orchestrator = orchestrator(RecordingSink::accepting(), Vec::new(), 10);
    let handle = Arc::clone(&orchestrator).spawn(256, Duration::from_secs(3600));
    let now = SystemTime::now();
    for n in 0..100 {
        handle
            .submit(inbound(&format!("c{n}"), CallEventState::Offered, "030 1234567", now))
            .await
            .expect("dispatcher accepts events");
    }
    let tracked = &orchestrator;
    assert!(
        eventually(Duration::from_secs(5), move || async move {
            tracked.active_calls().await.len() == 100
        })
        .await
    );
    assert_eq!(alive_tasks(), 102);

    // WHEN: The sweep runs past the stale-call timeout
    let eviction = orchestrator
        .sweep_at(Instant::now() + Duration::from_secs(5 * 60 * 60))
        .await;

    // THEN: Every call is evicted and only the dispatcher and sweeper remain
    assert_eq!(eviction.stale_calls.len(), 100);
    assert!(
        eventually(Duration::from_secs(5), || async { alive_tasks() == 2 }).await,
        "{} tasks still alive",
        alive_tasks()
    );

    // AND: A reused call id still gets a fresh worker
    handle
        .submit(inbound("c0", CallEventState::Offered, "030 1234567", now))
        .await
        .expect("dispatcher accepts events");
    handle.shutdown().await;
    assert_eq!(
        orchestrator.get_call("c0").await.map(|record| record.state),
        Some(CallState::Offered)
    );
}

/// **VALUE**: One call stuck on a slow CRM send does not hold up other calls.
///
/// **WHY THIS MATTERS**: A CRM that hangs on one event can take the whole
/// notify timeout per notification. Other callers must still show up.
///
/// **BUG THIS CATCHES**: Would catch the dispatcher awaiting space in a
/// single call's full queue while every other call waits behind it.
#[tokio::test]
async fn given_stalled_crm_send_for_one_call_when_other_call_arrives_then_tracked_immediately() {
    // GIVEN: A CRM that stalls on call "slow", which then gets a flood of events
    let sink = StallingSink::stalling("slow");
    let orchestrator = orchestrator_with_sink(sink.clone(), Vec::new(), 10);
    let handle = Arc::clone(&orchestrator).spawn(256, Duration::from_secs(3600));
    let now = SystemTime::now();
    handle
        .submit(inbound("slow", CallEventState::Offered, "030 1111111", now))
        .await
        .expect("dispatcher accepts events");
    for _ in 0..40 {
        handle
            .submit(inbound("slow", CallEventState::Ringing, "030 1111111", now))
            .await
            .expect("dispatcher accepts events");
    }

    // WHEN: Another call arrives
    handle
        .submit(inbound("fast", CallEventState::Offered, "030 2222222", now))
        .await
        .expect("dispatcher accepts events");

    // THEN: It is tracked well before the stalled send could time out
    let tracker = &orchestrator;
    let tracked = eventually(Duration::from_millis(500), move || async move {
        tracker.get_call("fast").await.is_some()
    })
    .await;

    sink.release();
    handle.shutdown().await;

    assert!(tracked, "call 'fast' waited behind call 'slow'");
    assert_eq!(
        orchestrator.get_call("slow").await.map(|record| record.state),
        Some(CallState::Offered)
    );
}
