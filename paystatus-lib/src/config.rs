//! Configuration for the status channel and reducer.
//!
//! Every field has a serde default so a partial JSON document (or none at
//! all) yields a working configuration. Durations are stored as
//! milliseconds.

use crate::status::codes;
use crate::{Result, StatusError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default merchant-status endpoint; the identifier is appended.
pub const DEFAULT_ENDPOINT: &str = "wss://payments.pre-bnvo.com/ws/merchant/";

/// Top-level configuration consumed by [`crate::StatusMonitor`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Connection and reconnect settings.
    #[serde(default)]
    pub channel: ChannelConfig,
    /// Status derivation and publish settings.
    #[serde(default)]
    pub reducer: ReducerConfig,
}

impl MonitorConfig {
    /// Parse a JSON configuration document.
    pub fn from_json(body: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(body)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with `PAYSTATUS_*` environment variables.
    ///
    /// Unparseable values are ignored and the previous value is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overlay `PAYSTATUS_*` environment variables onto this config.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(v) = get("PAYSTATUS_ENDPOINT") {
            if !v.trim().is_empty() {
                self.channel.endpoint = v.trim().to_string();
            }
        }
        if let Some(v) = get("PAYSTATUS_CONNECT_DELAY_MS") {
            self.channel.connect_delay_ms = v.parse().unwrap_or(self.channel.connect_delay_ms);
        }
        if let Some(v) = get("PAYSTATUS_RECONNECT_BACKOFF_MS") {
            self.channel.reconnect_backoff_ms =
                v.parse().unwrap_or(self.channel.reconnect_backoff_ms);
        }
        if let Some(v) = get("PAYSTATUS_CONNECT_TIMEOUT_MS") {
            self.channel.connect_timeout_ms = v.parse().unwrap_or(self.channel.connect_timeout_ms);
        }
        if let Some(v) = get("PAYSTATUS_MAX_RECONNECT_ATTEMPTS") {
            self.channel.max_reconnect_attempts =
                v.parse().unwrap_or(self.channel.max_reconnect_attempts);
        }
        if let Some(v) = get("PAYSTATUS_SETTLE_DELAY_MS") {
            self.reducer.settle_delay_ms = v.parse().unwrap_or(self.reducer.settle_delay_ms);
        }
        if let Some(v) = get("PAYSTATUS_COMPLETION_POLICY") {
            if let Some(policy) = CompletionPolicy::from_name(&v) {
                self.reducer.completion_policy = policy;
            }
        }
    }

    /// Reject values the channel cannot work with.
    pub fn validate(&self) -> Result<()> {
        self.channel.validate()?;
        self.reducer.validate()
    }
}

/// Settings for [`crate::PaymentStatusChannel`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Endpoint base URL; the identifier is appended.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Delay before the first connection attempt after `open`.
    #[serde(default = "default_connect_delay_ms")]
    pub connect_delay_ms: u64,
    /// Fixed wait between an abnormal close and the next attempt.
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,
    /// Upper bound on a single connect call; expiry counts as abnormal.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Abnormal closes tolerated before switching to fallback mode.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Behaviour of the simulated channel used in fallback mode.
    #[serde(default)]
    pub fallback: FallbackConfig,
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_connect_delay_ms() -> u64 {
    2000
}

fn default_reconnect_backoff_ms() -> u64 {
    2000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_max_reconnect_attempts() -> u32 {
    3
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            connect_delay_ms: default_connect_delay_ms(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            fallback: FallbackConfig::default(),
        }
    }
}

impl ChannelConfig {
    /// Use a different endpoint base.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the initial connect delay.
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay_ms = millis(delay);
        self
    }

    /// Set the reconnect backoff.
    pub fn with_reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff_ms = millis(backoff);
        self
    }

    /// Set the attempt budget.
    pub fn with_max_reconnect_attempts(mut self, max: u32) -> Self {
        self.max_reconnect_attempts = max;
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = millis(timeout);
        self
    }

    /// Replace the fallback script.
    pub fn with_fallback(mut self, fallback: FallbackConfig) -> Self {
        self.fallback = fallback;
        self
    }

    /// Initial connect delay.
    pub fn connect_delay(&self) -> Duration {
        Duration::from_millis(self.connect_delay_ms)
    }

    /// Reconnect backoff.
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    /// Connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(StatusError::invalid_config("endpoint", "must not be empty"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(StatusError::invalid_config(
                "connect_timeout_ms",
                "must be positive",
            ));
        }
        if self.max_reconnect_attempts == 0 {
            return Err(StatusError::invalid_config(
                "max_reconnect_attempts",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Frames replayed by the simulated channel in fallback mode.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Scripted frames, in order. Empty means a silent channel.
    #[serde(default)]
    pub script: Vec<ScriptedFrame>,
}

/// One scripted frame of the simulated channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScriptedFrame {
    /// Wait before emitting, measured from the previous frame.
    pub after_ms: u64,
    /// Frame body, sent as JSON text.
    pub payload: serde_json::Value,
}

impl ScriptedFrame {
    /// Create a scripted frame.
    pub fn new(after: Duration, payload: serde_json::Value) -> Self {
        Self {
            after_ms: millis(after),
            payload,
        }
    }
}

/// How strictly the completion code is interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionPolicy {
    /// Completion code plus a strictly positive confirmed amount.
    #[default]
    RequireConfirmedAmount,
    /// Completion code alone.
    StatusCodeOnly,
}

impl CompletionPolicy {
    /// Parse `require_confirmed_amount` / `status_code_only`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "require_confirmed_amount" | "strict" => Some(Self::RequireConfirmedAmount),
            "status_code_only" | "lenient" => Some(Self::StatusCodeOnly),
            _ => None,
        }
    }
}

/// Status code table used by the reducer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCodeTable {
    /// Code meaning the payment completed.
    #[serde(default = "default_completed_code")]
    pub completed: String,
    /// Codes meaning the order expired.
    #[serde(default = "default_expired_codes")]
    pub expired: Vec<String>,
    /// Codes meaning the payment failed.
    #[serde(default = "default_failed_codes")]
    pub failed: Vec<String>,
}

fn default_completed_code() -> String {
    codes::COMPLETED.to_string()
}

fn default_expired_codes() -> Vec<String> {
    vec![codes::EXPIRED.to_string()]
}

fn default_failed_codes() -> Vec<String> {
    vec![
        codes::FAILED.to_string(),
        codes::CANCELLED.to_string(),
        codes::OUT_OF_CONDITION.to_string(),
    ]
}

impl Default for StatusCodeTable {
    fn default() -> Self {
        Self {
            completed: default_completed_code(),
            expired: default_expired_codes(),
            failed: default_failed_codes(),
        }
    }
}

/// Settings for [`crate::PaymentStatusReducer`] and [`crate::StatusPublisher`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReducerConfig {
    /// Status code table.
    #[serde(default)]
    pub codes: StatusCodeTable,
    /// Completion rule.
    #[serde(default)]
    pub completion_policy: CompletionPolicy,
    /// Window between receiving an event and publishing its status.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_settle_delay_ms() -> u64 {
    500
}

impl Default for ReducerConfig {
    fn default() -> Self {
        Self {
            codes: StatusCodeTable::default(),
            completion_policy: CompletionPolicy::default(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl ReducerConfig {
    /// Set the completion policy.
    pub fn with_completion_policy(mut self, policy: CompletionPolicy) -> Self {
        self.completion_policy = policy;
        self
    }

    /// Set the settle delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay_ms = millis(delay);
        self
    }

    /// Settle delay as a duration.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.codes.completed.trim().is_empty() {
            return Err(StatusError::invalid_config(
                "codes.completed",
                "must not be empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_huge_durations_saturate() {
        let config = ChannelConfig::default()
            .with_connect_timeout(Duration::MAX)
            .with_connect_delay(Duration::from_millis(1500));
        assert_eq!(config.connect_timeout_ms, u64::MAX);
        assert_eq!(config.connect_delay_ms, 1500);
        assert_eq!(ScriptedFrame::new(Duration::MAX, serde_json::Value::Null).after_ms, u64::MAX);
    }

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.channel.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.channel.connect_delay(), Duration::from_secs(2));
        assert_eq!(config.channel.max_reconnect_attempts, 3);
        assert_eq!(config.reducer.settle_delay(), Duration::from_millis(500));
        assert_eq!(
            config.reducer.completion_policy,
            CompletionPolicy::RequireConfirmedAmount
        );
        assert!(config.channel.fallback.script.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = MonitorConfig::from_json(
            r#"{"channel": {"connect_delay_ms": 10}, "reducer": {"completion_policy": "status_code_only"}}"#,
        )
        .unwrap();
        assert_eq!(config.channel.connect_delay_ms, 10);
        assert_eq!(config.channel.reconnect_backoff_ms, 2000);
        assert_eq!(config.reducer.completion_policy, CompletionPolicy::StatusCodeOnly);
        assert_eq!(config.reducer.codes.completed, "CO");
    }

    #[test]
    fn test_validation() {
        let err = MonitorConfig::from_json(r#"{"channel": {"max_reconnect_attempts": 0}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("max_reconnect_attempts"));

        let err = MonitorConfig::from_json(r#"{"channel": {"endpoint": " "}}"#).unwrap_err();
        assert!(err.to_string().contains("endpoint"));
    }

    #[test]
    fn test_env_overlay() {
        let vars: HashMap<&str, &str> = [
            ("PAYSTATUS_ENDPOINT", "wss://localhost:9000/ws/"),
            ("PAYSTATUS_CONNECT_DELAY_MS", "5"),
            ("PAYSTATUS_MAX_RECONNECT_ATTEMPTS", "not-a-number"),
            ("PAYSTATUS_COMPLETION_POLICY", "lenient"),
        ]
        .into_iter()
        .collect();

        let mut config = MonitorConfig::default();
        config.apply_vars(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.channel.endpoint, "wss://localhost:9000/ws/");
        assert_eq!(config.channel.connect_delay_ms, 5);
        assert_eq!(config.channel.max_reconnect_attempts, 3);
        assert_eq!(config.reducer.completion_policy, CompletionPolicy::StatusCodeOnly);
    }

    #[test]
    fn test_completion_policy_names() {
        assert_eq!(
            CompletionPolicy::from_name("STRICT"),
            Some(CompletionPolicy::RequireConfirmedAmount)
        );
        assert_eq!(CompletionPolicy::from_name("bogus"), None);
    }
}
