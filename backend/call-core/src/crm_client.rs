//! HTTP sink for the CRM notification channel.

use crate::error::notify::NotifyError;
use crate::notifier::NotificationSink;

use common::HttpStatusCode;
use models::Notification;

use std::time::Duration;

use async_trait::async_trait;
use log::trace;
use reqwest::Client;
use url::Url;

const CRM_EVENTS_ENDPOINT: &str = "events";

/// Posts every notification as JSON to `{base_url}/events`.
#[derive(Clone)]
pub struct CrmClient {
    events_url: Url,
    client: Client,
    timeout: Duration,
}

impl CrmClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let mut base_url = Url::parse(base_url)?;

        // Without the trailing slash `join` would replace the last path segment.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let events_url = base_url.join(CRM_EVENTS_ENDPOINT)?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(crate::USER_AGENT)
            .build()
            .map_err(|e| NotifyError::transport(format!("Failed to build CRM client: {e}")))?;

        Ok(Self {
            events_url,
            client,
            timeout,
        })
    }

    pub fn events_url(&self) -> &Url {
        &self.events_url
    }
}

#[async_trait]
impl NotificationSink for CrmClient {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        trace!("POST {} {}", self.events_url, notification.kind);

        let response = self
            .client
            .post(self.events_url.clone())
            .json(notification)
            .send()
            .await
            .map_err(|e| NotifyError::from_reqwest(&e, self.timeout))?;

        let status = HttpStatusCode(response.status().as_u16());
        if !status.is_success() {
            return Err(NotifyError::from_status(
                status,
                response.text().await.unwrap_or_default(),
            ));
        }

        Ok(())
    }
}
