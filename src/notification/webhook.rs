use anyhow::{Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, warn};

use super::Notifier;

// ── Payload ──────────────────────────────────────────────────

/// JSON body posted to the webhook endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload<'a> {
    pub event_type: &'static str,
    /// ISO-8601 timestamp of the delivery attempt.
    pub timestamp: String,
    pub text: &'a str,
}

impl<'a> WebhookPayload<'a> {
    pub fn notification(text: &'a str) -> Self {
        Self {
            event_type: "notification",
            timestamp: chrono::Utc::now().to_rfc3339(),
            text,
        }
    }
}

// ── HMAC Signing ─────────────────────────────────────────────

/// HMAC-SHA256 of `payload` keyed by `secret`, formatted as `sha256=<hex>`.
fn hmac_sha256_hex(secret: &str, payload: &[u8]) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid webhook signing key: {}", e))?;
    mac.update(payload);
    let bytes = mac.finalize().into_bytes();
    Ok(format!("sha256={}", hex::encode(bytes)))
}

// ── Webhook Notifier ─────────────────────────────────────────

/// Posts notifications to a generic HTTP endpoint.
///
/// When a signing secret is configured the body is signed with HMAC-SHA256
/// and the signature sent in `X-Courier-Signature`.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    signing_secret: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, signing_secret: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("Courier-Webhook/1.0")
            .build()
            .context("failed to build webhook HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
            signing_secret,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        let payload = WebhookPayload::notification(text);
        let body = serde_json::to_vec(&payload).context("webhook serialize error")?;
        let delivery_id = uuid::Uuid::new_v4().to_string();

        let mut req = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .header("x-courier-delivery-id", &delivery_id)
            .header("x-courier-timestamp", chrono::Utc::now().timestamp().to_string())
            .header("x-courier-event", payload.event_type);

        if let Some(secret) = &self.signing_secret {
            req = req.header("x-courier-signature", hmac_sha256_hex(secret, &body)?);
        }

        let resp = req
            .body(body)
            .send()
            .await
            .with_context(|| format!("webhook request to {} failed", self.url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(
                url = %self.url,
                delivery_id = %delivery_id,
                status = %status,
                body = %body,
                "webhook delivery failed (non-2xx)"
            );
            anyhow::bail!("webhook returned error: status={}", status);
        }

        debug!(url = %self.url, delivery_id = %delivery_id, "webhook delivered");
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────
