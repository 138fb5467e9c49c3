use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;

use super::Notifier;

/// Posts notification text to a Slack incoming webhook.
#[derive(Clone)]
pub struct SlackNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: webhook_url.into(),
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, text: &str) -> anyhow::Result<()> {
        let message = SlackMessage { text };

        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&message)
            .send()
            .await
            .context("failed to send slack notification")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("slack returned error: status={}, body={}", status, body);
        }

        tracing::debug!("Sent Slack notification ({} chars)", text.len());
        Ok(())
    }
}

#[derive(Serialize)]
struct SlackMessage<'a> {
    text: &'a str,
}
