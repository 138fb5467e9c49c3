use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::delivery::retry::RetryConfig;
use crate::errors::CourierError;

// ── Sections ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Steady-state refill rate.
    #[serde(default = "default_messages_per_minute")]
    pub messages_per_minute: u32,
    /// Bucket capacity; sends allowed back-to-back above the steady rate.
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            messages_per_minute: default_messages_per_minute(),
            burst_size: default_burst_size(),
        }
    }
}

fn default_messages_per_minute() -> u32 {
    30
}

fn default_burst_size() -> u32 {
    5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Default timeout applied when `create_approval` is given none.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Pending approvals allowed at once; the oldest is evicted beyond this.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Settled results kept until someone polls them.
    #[serde(default = "default_max_unclaimed_results")]
    pub max_unclaimed_results: usize,
}

impl ApprovalConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            max_concurrent: default_max_concurrent(),
            max_unclaimed_results: default_max_unclaimed_results(),
        }
    }
}

fn default_timeout_seconds() -> u64 {
    300
}

fn default_max_concurrent() -> usize {
    50
}

fn default_max_unclaimed_results() -> usize {
    256
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchingConfig {
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    /// Joins queued messages into one outbound send.
    #[serde(default = "default_separator")]
    pub separator: String,
}

impl BatchingConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Queued messages at least this old are dropped instead of sent.
    pub fn stale_after(&self) -> Duration {
        self.window() * 2
    }
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_queue_size: default_max_queue_size(),
            separator: default_separator(),
        }
    }
}

fn default_window_ms() -> u64 {
    1000
}

fn default_max_queue_size() -> usize {
    100
}

fn default_separator() -> String {
    "\n\n".to_string()
}

// ── Top level ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourierConfig {
    #[serde(default)]
    pub rate_limiting: RateLimitConfig,
    #[serde(default)]
    pub approval: ApprovalConfig,
    #[serde(default)]
    pub batching: BatchingConfig,
    #[serde(default)]
    pub delivery: RetryConfig,
}

impl CourierConfig {
    /// Reject values that would stall or disable a component.
    pub fn validate(&self) -> Result<(), CourierError> {
        let checks = [
            (self.rate_limiting.messages_per_minute == 0, "rate_limiting.messages_per_minute must be > 0"),
            (self.rate_limiting.burst_size == 0, "rate_limiting.burst_size must be > 0"),
            (self.approval.timeout_seconds == 0, "approval.timeout_seconds must be > 0"),
            (self.approval.max_concurrent == 0, "approval.max_concurrent must be > 0"),
            (self.approval.max_unclaimed_results == 0, "approval.max_unclaimed_results must be > 0"),
            (self.batching.window_ms == 0, "batching.window_ms must be > 0"),
            (self.batching.max_queue_size == 0, "batching.max_queue_size must be > 0"),
            (self.delivery.max_attempts == 0, "delivery.max_attempts must be > 0"),
        ];
        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, msg)) => Err(CourierError::Config((*msg).to_string())),
            None => Ok(()),
        }
    }
}

/// Process-level configuration for the `courier` binary.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Guards the management API when set.
    pub api_key: Option<String>,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub slack_webhook_url: Option<String>,
    pub courier: CourierConfig,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let base = match std::env::var("COURIER_CONFIG") {
        Ok(path) => load_file(Path::new(&path))?,
        Err(_) => CourierConfig::default(),
    };
    let courier = apply_env(base, |key| std::env::var(key).ok());
    courier.validate()?;

    Ok(Config {
        port: std::env::var("COURIER_PORT")
            .unwrap_or_else(|_| "8787".into())
            .parse()
            .unwrap_or(8787),
        api_key: std::env::var("COURIER_API_KEY").ok().filter(|k| !k.is_empty()),
        webhook_url: std::env::var("COURIER_WEBHOOK_URL").ok().filter(|u| !u.is_empty()),
        webhook_secret: std::env::var("COURIER_WEBHOOK_SECRET").ok().filter(|s| !s.is_empty()),
        slack_webhook_url: std::env::var("COURIER_SLACK_WEBHOOK_URL")
            .ok()
            .filter(|u| !u.is_empty()),
        courier,
    })
}

/// Parse a YAML configuration file. Missing sections take their defaults.
pub fn load_file(path: &Path) -> anyhow::Result<CourierConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    parse_yaml(&raw).with_context(|| format!("invalid config file {}", path.display()))
}

pub fn parse_yaml(raw: &str) -> anyhow::Result<CourierConfig> {
    if raw.trim().is_empty() {
        return Ok(CourierConfig::default());
    }
    Ok(serde_yaml::from_str(raw)?)
}

/// Overlay environment variables on `cfg`. Unparseable values are ignored.
pub fn apply_env(mut cfg: CourierConfig, var: impl Fn(&str) -> Option<String>) -> CourierConfig {
    fn parsed<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
        var(key).and_then(|v| v.trim().parse().ok())
    }

    if let Some(v) = parsed(&var, "COURIER_RATE_LIMIT_RPM") {
        cfg.rate_limiting.messages_per_minute = v;
    }
    if let Some(v) = parsed(&var, "COURIER_RATE_LIMIT_BURST") {
        cfg.rate_limiting.burst_size = v;
    }
    if let Some(v) = parsed(&var, "COURIER_APPROVAL_TIMEOUT_SECS") {
        cfg.approval.timeout_seconds = v;
    }
    if let Some(v) = parsed(&var, "COURIER_APPROVAL_MAX_CONCURRENT") {
        cfg.approval.max_concurrent = v;
    }
    if let Some(v) = parsed(&var, "COURIER_APPROVAL_MAX_UNCLAIMED") {
        cfg.approval.max_unclaimed_results = v;
    }
    if let Some(v) = parsed(&var, "COURIER_BATCH_WINDOW_MS") {
        cfg.batching.window_ms = v;
    }
    if let Some(v) = parsed(&var, "COURIER_BATCH_MAX_QUEUE") {
        cfg.batching.max_queue_size = v;
    }
    if let Some(v) = parsed(&var, "COURIER_DELIVERY_MAX_ATTEMPTS") {
        cfg.delivery.max_attempts = v;
    }
    if let Some(v) = parsed(&var, "COURIER_DELIVERY_BASE_BACKOFF_MS") {
        cfg.delivery.base_backoff_ms = v;
    }
    if let Some(v) = parsed(&var, "COURIER_DELIVERY_MAX_BACKOFF_MS") {
        cfg.delivery.max_backoff_ms = v;
    }
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = CourierConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.batching.stale_after(), Duration::from_millis(2000));
        assert_eq!(cfg.approval.default_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_yaml_partial_sections() {
        let cfg = parse_yaml(
            r#"
rate_limiting:
  messages_per_minute: 120
batching:
  window_ms: 250
"#,
        )
        .unwrap();
        assert_eq!(cfg.rate_limiting.messages_per_minute, 120);
        assert_eq!(cfg.rate_limiting.burst_size, 5);
        assert_eq!(cfg.batching.window_ms, 250);
        assert_eq!(cfg.batching.max_queue_size, 100);
        assert_eq!(cfg.approval, ApprovalConfig::default());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(parse_yaml("  \n").unwrap(), CourierConfig::default());
    }

    #[test]
    fn test_env_overrides_and_ignores_garbage() {
        let env: HashMap<&str, &str> = [
            ("COURIER_RATE_LIMIT_BURST", "9"),
            ("COURIER_APPROVAL_MAX_CONCURRENT", " 2 "),
            ("COURIER_BATCH_WINDOW_MS", "soon"),
        ]
        .into_iter()
        .collect();

        let cfg = apply_env(CourierConfig::default(), |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.rate_limiting.burst_size, 9);
        assert_eq!(cfg.approval.max_concurrent, 2);
        assert_eq!(cfg.batching.window_ms, 1000);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut cfg = CourierConfig::default();
        cfg.rate_limiting.burst_size = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("burst_size"));

        let mut cfg = CourierConfig::default();
        cfg.batching.max_queue_size = 0;
        assert!(cfg.validate().is_err());
    }
}
