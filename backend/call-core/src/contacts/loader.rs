use crate::contact_index::{ContactIndex, SharedContactIndex};
use crate::contacts::ContactSource;
use crate::error::contact_source::ContactSourceError;
use crate::normalizer::PhoneNormalizer;
use crate::retry::RetryPolicy;
use crate::status::StatusBoard;

use models::Contact;

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use log::{error, info};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout as TokioTimeout};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

pub struct ContactLoader {
    source: Arc<dyn ContactSource>,
    retry: RetryPolicy,
    fetch_timeout: Duration,
    normalizer: PhoneNormalizer,
    index: SharedContactIndex,
    status: Option<Arc<StatusBoard>>,
}

impl ContactLoader {
    pub fn new(
        source: Arc<dyn ContactSource>,
        retry: RetryPolicy,
        normalizer: PhoneNormalizer,
        index: SharedContactIndex,
    ) -> Self {
        Self {
            source,
            retry,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            normalizer,
            index,
            status: None,
        }
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Record every successful sync on `status`.
    pub fn with_status(mut self, status: Arc<StatusBoard>) -> Self {
        self.status = Some(status);
        self
    }

    /// Fetch, rebuild and swap the index. Returns the number of contacts loaded.
    ///
    /// On failure the previous index stays in place.
    pub async fn refresh(&self) -> Result<usize, ContactSourceError> {
        let label = format!("Contact fetch from {}", self.source.describe());

        let contacts = match self
            .retry
            .execute_with_retry(&label, || self.fetch_once(), ContactSourceError::is_retryable)
            .await
        {
            Ok(contacts) => contacts,
            Err(e) => {
                let kept = self.index.snapshot().await.contact_count();
                error!(
                    "{label} failed ({}), keeping previous index with {kept} contacts: {e}",
                    e.error_category()
                );
                return Err(e);
            }
        };

        let index = ContactIndex::build(contacts, &self.normalizer);
        let count = index.contact_count();
        self.index.replace(index).await;

        if let Some(status) = &self.status {
            status.mark_synced(SystemTime::now());
        }

        Ok(count)
    }

    /// Refresh every `every`, starting one interval from now.
    pub fn spawn_refresh_loop(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                "Contact refresh from {} every {every:?}",
                self.source.describe()
            );

            loop {
                ticker.tick().await;
                // Failures are logged inside and leave the old index in place.
                let _ = self.refresh().await;
            }
        })
    }

    async fn fetch_once(&self) -> Result<Vec<Contact>, ContactSourceError> {
        match TokioTimeout(self.fetch_timeout, self.source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(ContactSourceError::transient(format!(
                "No answer from {} within {:?}",
                self.source.describe(),
                self.fetch_timeout
            ))),
        }
    }
}
