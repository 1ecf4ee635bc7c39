use callbridge::replay;

use call_core::config::BridgeConfig;
use call_core::contact_index::SharedContactIndex;
use call_core::contacts::{ContactLoader, FileContactSource};
use call_core::error::NotifyError;
use call_core::normalizer::PhoneNormalizer;
use call_core::notifier::NotificationSink;
use call_core::orchestrator::CallOrchestrator;
use call_core::status::StatusBoard;

use models::{Notification, NotificationKind};

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

#[derive(Default)]
struct RecordingSink {
    received: Mutex<Vec<Notification>>,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.received
            .lock()
            .expect("sink lock")
            .push(notification.clone());
        Ok(())
    }
}

const CONFIG: &str = r#"
[matching]
max_compare_length = 7

[crm]
failure_threshold = 2
"#;

const CONTACTS: &str = r#"[
  {"id": "k-1", "name": "Anna Berg", "origin": "primary-directory", "numbers": ["08912345 6"]}
]"#;

/// **VALUE**: The whole host path works: config text, a contact file, the
/// loader, the orchestrator and the replay transport together.
///
/// **WHY THIS MATTERS**: Each piece has its own tests, but only this one
/// proves the host feeds them into each other with matching settings.
///
/// **BUG THIS CATCHES**: Would catch the loader and orchestrator being built
/// with different compare lengths, which silently leaves every call unmatched.
#[tokio::test]
async fn given_contact_file_and_replayed_call_when_run_then_crm_sees_matched_lifecycle() {
    // GIVEN: A config, a contact file and a recording CRM
    let dir = tempfile::tempdir().unwrap();
    let contacts_path = dir.path().join("contacts.json");
    std::fs::write(&contacts_path, CONTACTS).unwrap();

    let config = BridgeConfig::parse(CONFIG).unwrap();
    let status = Arc::new(StatusBoard::new());
    let index = SharedContactIndex::default();
    let sink = Arc::new(RecordingSink::default());

    let loader = ContactLoader::new(
        Arc::new(FileContactSource::new(&contacts_path)),
        config.retry_policy(),
        PhoneNormalizer::new(config.matching.max_compare_length),
        index.clone(),
    )
    .with_status(Arc::clone(&status));
    assert_eq!(loader.refresh().await.unwrap(), 1);

    let orchestrator = Arc::new(CallOrchestrator::from_config(
        &config,
        index,
        sink.clone(),
        Arc::clone(&status),
    ));
    let handle = Arc::clone(&orchestrator).spawn(16, config.sweep_interval());

    // WHEN: Replaying an answered inbound call
    let input = br#"{"callId":"c1","state":"offered","remoteNumber":"+4989123456"}
{"callId":"c1","state":"connected"}
{"callId":"c1","state":"disconnected"}
"#;
    let stats = replay::run(&input[..], handle.event_sender(), &status)
        .await
        .unwrap();
    handle.shutdown().await;

    // THEN: The CRM saw the lifecycle, matched to the contact
    assert_eq!(stats.accepted, 3);
    let received = sink.received.lock().unwrap().clone();
    let kinds: Vec<NotificationKind> = received.iter().map(|n| n.kind).collect();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::NewCall,
            NotificationKind::CallStateChanged,
            NotificationKind::NewJournal,
        ]
    );
    assert!(
        received
            .iter()
            .all(|n| n.contact_id == "k-1")
    );
    assert!(status.current().last_sync.is_some());
}
