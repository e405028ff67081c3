use anyhow::{Context, Result, bail};
use reqwest::Client;

use super::mapper::RelayPayload;

/// HTTP client for the notification sink.
#[derive(Clone)]
pub struct Notifier {
    client: Client,
    endpoint: String,
    secret: String,
}

impl Notifier {
    /// `base_url` may carry a trailing slash; `/notify` is appended.
    pub fn new(base_url: &str, secret: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/notify", base_url.trim_end_matches('/')),
            secret: secret.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn send(&self, payload: &RelayPayload) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.secret)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("posting to {}", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable>".to_owned());
            bail!("sink responded {status}: {body}");
        }
        Ok(())
    }
}
