use call_core::crm_client::CrmClient;
use call_core::error::NotifyError;
use call_core::notifier::NotificationSink;

use models::{CallDirection, CallState, Notification, NotificationKind};

use std::time::{Duration, SystemTime};

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn journal() -> Notification {
    let began = SystemTime::now();
    Notification {
        kind: NotificationKind::NewJournal,
        call_id: "c1".to_string(),
        direction: CallDirection::Inbound,
        state: CallState::Finished,
        remote_number: "+4989123456".to_string(),
        contact_id: "doc".to_string(),
        contact_name: "Dr. Example".to_string(),
        began_at: Some(began),
        ended_at: Some(began + Duration::from_secs(60)),
        duration_seconds: Some(60),
    }
}

/// **VALUE**: Pins the wire contract with the CRM endpoint.
///
/// **WHY THIS MATTERS**: The CRM side parses these fields by name; a renamed
/// field silently drops journal entries.
///
/// **BUG THIS CATCHES**: Would catch a changed endpoint path, a lost base path
/// segment, or snake_case field names.
#[tokio::test]
async fn given_crm_accepting_when_sent_then_posts_camel_case_json_to_events() {
    // GIVEN: A CRM under a base path that accepts events
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/events"))
        .and(body_partial_json(json!({
            "kind": "new-journal",
            "callId": "c1",
            "contactId": "doc",
            "state": "finished",
            "durationSeconds": 60
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    let client = CrmClient::new(&format!("{}/api", server.uri()), Duration::from_secs(2))
        .expect("valid base url");

    // WHEN: Sending a journal notification
    let result = client.send(&journal()).await;

    // THEN: Accepted
    assert!(result.is_ok(), "{result:?}");
    assert_eq!(client.events_url().path(), "/api/events");
}

#[tokio::test]
async fn given_crm_refusing_when_sent_then_rejected_and_breaker_untouched() {
    // GIVEN: A CRM that answers 422
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(422).set_body_string("unknown call"))
        .mount(&server)
        .await;
    let client = CrmClient::new(&server.uri(), Duration::from_secs(2)).expect("valid base url");

    // WHEN: Sending
    let error = client.send(&journal()).await.expect_err("422 is an error");

    // THEN: Business rejection that does not trip the breaker
    assert!(matches!(error, NotifyError::Rejected { .. }), "{error}");
    assert!(!error.trips_breaker());
    assert!(error.to_string().contains("unknown call"));
}

#[tokio::test]
async fn given_crm_overloaded_when_sent_then_unavailable() {
    // GIVEN: A CRM answering 503 and then 429
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    let client = CrmClient::new(&server.uri(), Duration::from_secs(2)).expect("valid base url");

    // WHEN: Sending twice
    let first = client.send(&journal()).await.expect_err("503");
    let second = client.send(&journal()).await.expect_err("429");

    // THEN: Both count against the channel
    assert!(matches!(first, NotifyError::Unavailable { .. }), "{first}");
    assert!(matches!(second, NotifyError::Unavailable { .. }), "{second}");
    assert!(first.trips_breaker() && second.trips_breaker());
}

#[tokio::test]
async fn given_slow_crm_when_sent_then_timeout() {
    // GIVEN: A CRM slower than the client timeout
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;
    let client = CrmClient::new(&server.uri(), Duration::from_millis(50)).expect("valid base url");

    // WHEN: Sending
    let error = client.send(&journal()).await.expect_err("too slow");

    // THEN: Timeout
    assert!(matches!(error, NotifyError::Timeout { .. }), "{error}");
}

#[tokio::test]
async fn given_nothing_listening_when_sent_then_unavailable() {
    // GIVEN: A port with no server
    let client = CrmClient::new("http://127.0.0.1:9", Duration::from_secs(2)).expect("valid base url");

    // WHEN: Sending
    let error = client.send(&journal()).await.expect_err("connection refused");

    // THEN: Unavailable, counts against the channel
    assert!(error.trips_breaker(), "{error}");
}

#[test]
fn given_malformed_base_url_when_constructed_then_error() {
    // GIVEN / WHEN: A base URL that does not parse
    let result = CrmClient::new("not a url", Duration::from_secs(2));

    // THEN: Construction fails instead of panicking
    assert!(result.is_err());
}
