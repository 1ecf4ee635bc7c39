use call_core::contact_index::{ContactIndex, SharedContactIndex};
use call_core::contacts::{ContactLoader, ContactSource, FileContactSource, HttpContactSource};
use call_core::error::ContactSourceError;
use call_core::normalizer::PhoneNormalizer;
use call_core::retry::RetryPolicy;
use call_core::status::StatusBoard;

use crate::helpers::contact;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn directory_json() -> serde_json::Value {
    json!([
        { "id": "a", "name": "Anna", "origin": "primary-directory", "numbers": ["089 12345678"] },
        { "id": "i", "name": "Clinic", "origin": "institution", "numbers": ["+49 30 5555555", ""] }
    ])
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(5),
        backoff_factor: 2.0,
        max_delay: Duration::from_millis(20),
    }
}

fn loader(source: Arc<dyn ContactSource>, index: SharedContactIndex) -> ContactLoader {
    ContactLoader::new(source, fast_retry(), PhoneNormalizer::default(), index)
        .with_fetch_timeout(Duration::from_secs(2))
}

async fn http_source(server: &MockServer) -> Arc<dyn ContactSource> {
    Arc::new(
        HttpContactSource::new(&format!("{}/contacts", server.uri()), Duration::from_secs(2))
            .expect("valid url"),
    )
}

#[tokio::test]
async fn given_directory_served_when_fetched_then_contacts_decoded() {
    // GIVEN: A directory endpoint
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(directory_json()))
        .mount(&server)
        .await;

    // WHEN: Fetching
    let contacts = http_source(&server).await.fetch().await.expect("valid payload");

    // THEN: Both contacts with their origins
    assert_eq!(contacts.len(), 2);
    assert_eq!(contacts[1].origin, models::ContactOrigin::Institution);
}

#[tokio::test]
async fn given_export_not_ready_when_fetched_then_transient() {
    // GIVEN: A source answering 204 No Content
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    // WHEN: Fetching
    let error = http_source(&server).await.fetch().await.expect_err("no data yet");

    // THEN: Worth retrying
    assert!(error.is_retryable(), "{error}");
}

#[tokio::test]
async fn given_incompatible_payload_when_fetched_then_permanent() {
    // GIVEN: A source returning the wrong shape
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "contacts": "nope" })))
        .mount(&server)
        .await;

    // WHEN: Fetching
    let error = http_source(&server).await.fetch().await.expect_err("bad schema");

    // THEN: Not retryable
    assert!(matches!(error, ContactSourceError::Permanent { .. }), "{error}");
}

/// **VALUE**: The loader retries a not-yet-ready source and then swaps the index.
///
/// **WHY THIS MATTERS**: At startup the directory export often lags behind the
/// bridge. Without the retry the first calls of the day would all be unmatched.
///
/// **BUG THIS CATCHES**: Would catch the loader not wiring `is_retryable` into
/// the retry policy, or forgetting to publish the built index.
#[tokio::test]
async fn given_source_ready_on_third_attempt_when_refreshed_then_index_replaced() {
    // GIVEN: A source that answers 404 (export not there yet) twice, then serves data
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(directory_json()))
        .expect(1)
        .mount(&server)
        .await;
    let index = SharedContactIndex::default();
    let board = Arc::new(StatusBoard::new());
    let loader = loader(http_source(&server).await, index.clone()).with_status(Arc::clone(&board));

    // WHEN: Refreshing
    let loaded = loader.refresh().await.expect("third attempt succeeds");

    // THEN: Index holds the directory, sync time published
    assert_eq!(loaded, 2);
    let snapshot = index.snapshot().await;
    let normalizer = PhoneNormalizer::default();
    assert_eq!(snapshot.lookup(&normalizer.normalize("+49 89 12345678"))[0].id, "a");
    assert!(board.current().last_sync.is_some());
}

/// **VALUE**: A failed refresh never empties the directory.
///
/// **WHY THIS MATTERS**: A flaky directory server at the hourly refresh would
/// otherwise turn every caller into "unknown" until the next hour.
///
/// **BUG THIS CATCHES**: Would catch the loader replacing the index before the
/// fetch has succeeded.
#[tokio::test]
async fn given_loaded_index_when_refresh_fails_then_previous_index_kept() {
    // GIVEN: An index with one contact and a source that is down
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let normalizer = PhoneNormalizer::default();
    let index = SharedContactIndex::new(ContactIndex::build(
        vec![contact("kept", "Kept", &["089 12345678"])],
        &normalizer,
    ));
    let loader = loader(http_source(&server).await, index.clone());

    // WHEN: Refreshing
    let result = loader.refresh().await;

    // THEN: Error surfaced, old contact still found
    assert!(matches!(result, Err(ContactSourceError::Unavailable { .. })));
    assert!(index.snapshot().await.get("kept").is_some());
}

#[tokio::test]
async fn given_unreachable_source_when_refreshed_then_unavailable_without_retry() {
    // GIVEN: A source URL where nothing listens
    let source: Arc<dyn ContactSource> = Arc::new(
        HttpContactSource::new("http://127.0.0.1:9/contacts", Duration::from_secs(2)).expect("valid url"),
    );
    let loader = loader(source, SharedContactIndex::default());

    // WHEN: Refreshing
    let result = loader.refresh().await;

    // THEN: Unavailable
    assert!(matches!(result, Err(ContactSourceError::Unavailable { .. })), "{result:?}");
}

#[tokio::test]
async fn given_contact_file_when_fetched_then_contacts_decoded() {
    // GIVEN: A JSON export on disk
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(file, "{}", directory_json()).expect("write export");
    let source = FileContactSource::new(file.path());

    // WHEN: Fetching
    let contacts = source.fetch().await.expect("valid file");

    // THEN: Decoded
    assert_eq!(contacts.len(), 2);
    assert_eq!(source.describe(), file.path().display().to_string());
}

#[tokio::test]
async fn given_missing_file_when_fetched_then_transient() {
    // GIVEN: A path inside an empty directory
    let dir = tempfile::tempdir().expect("temp dir");
    let source = FileContactSource::new(dir.path().join("contacts.json"));

    // WHEN: Fetching
    let error = source.fetch().await.expect_err("file missing");

    // THEN: The export may still appear
    assert!(error.is_retryable(), "{error}");
}

#[tokio::test]
async fn given_malformed_file_when_fetched_then_permanent() {
    // GIVEN: A file that is not a contact list
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(file, "id;name;number").expect("write export");
    let source = FileContactSource::new(file.path());

    // WHEN: Fetching
    let error = source.fetch().await.expect_err("not json");

    // THEN: Permanent
    assert!(matches!(error, ContactSourceError::Permanent { .. }), "{error}");
}
