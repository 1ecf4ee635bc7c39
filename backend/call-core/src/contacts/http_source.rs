use crate::contacts::ContactSource;
use crate::error::contact_source::ContactSourceError;

use common::HttpStatusCode;
use models::Contact;

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use url::Url;

/// Contact directory served as a JSON array over HTTP.
#[derive(Clone)]
pub struct HttpContactSource {
    url: Url,
    client: Client,
}

impl HttpContactSource {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ContactSourceError> {
        let url = Url::parse(url)?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(crate::USER_AGENT)
            .build()
            .map_err(|e| ContactSourceError::unavailable(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { url, client })
    }
}

#[async_trait]
impl ContactSource for HttpContactSource {
    async fn fetch(&self) -> Result<Vec<Contact>, ContactSourceError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| ContactSourceError::from_reqwest(&e))?;

        let status = HttpStatusCode(response.status().as_u16());

        // 204 is a success code but means the export is not there yet.
        if !status.is_success() || status.is_not_ready() {
            return Err(ContactSourceError::from_status(
                status,
                response.text().await.unwrap_or_default(),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ContactSourceError::from_reqwest(&e))?;
        let contacts: Vec<Contact> = serde_json::from_str(&body)?;

        debug!("Fetched {} contacts from {}", contacts.len(), self.url);
        Ok(contacts)
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}
