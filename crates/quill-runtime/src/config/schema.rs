//! Configuration schema definitions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use quill_core::{RetryAttempts, RetryPolicy};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QuillConfig {
    /// Platform host settings.
    #[serde(default)]
    pub host: HostConfig,

    /// Bot identity and key material.
    #[serde(default)]
    pub bot: BotConfig,

    /// Event feed selection and options.
    #[serde(default)]
    pub datafeed: DatafeedConfig,

    /// Retry/backoff settings applied to every platform call.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Platform host settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Base URL of the platform (scheme + host, no trailing slash).
    #[serde(default = "default_host_url")]
    pub url: String,

    /// Overall request timeout in milliseconds. Must sit above the
    /// server-side long-poll window.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            url: default_host_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_host_url() -> String {
    "https://localhost:8443".to_string()
}

fn default_timeout_ms() -> u64 {
    60_000
}

/// Bot identity configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BotConfig {
    /// Service-account login name.
    pub username: String,

    /// The bot's own numeric user id, used for self-loop prevention.
    pub user_id: i64,

    /// Path to the RSA private key (PEM) proving the identity.
    pub private_key_path: PathBuf,

    /// Application id, required only for on-behalf-of authentication.
    #[serde(default)]
    pub app_id: Option<String>,

    /// Whether the platform issues a secondary key-manager token.
    #[serde(default)]
    pub dual_token: bool,
}

/// Which feed protocol a bot consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FeedMode {
    /// Server-side feed created, read by id and deleted on shutdown.
    Explicit,
    /// Per-identity cursor threaded through every read.
    #[default]
    Cursor,
}

/// Event feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatafeedConfig {
    /// Feed protocol variant.
    #[serde(default)]
    pub mode: FeedMode,

    /// Feed id persisted from a previous run (explicit variant only).
    /// Reading and writing the persistence file stays with the caller.
    #[serde(default)]
    pub persisted_feed_id: Option<String>,
}

/// Retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts. Ignored when `unbounded` is set.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Retry forever. The ingestion loop typically runs unbounded.
    #[serde(default)]
    pub unbounded: bool,

    /// First-retry interval in milliseconds.
    #[serde(default = "default_base_interval_ms")]
    pub base_interval_ms: u64,

    /// Exponential backoff multiplier.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Upper bound on any computed interval, in milliseconds.
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,

    /// Randomize computed intervals.
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            unbounded: false,
            base_interval_ms: default_base_interval_ms(),
            multiplier: default_multiplier(),
            max_interval_ms: default_max_interval_ms(),
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Converts to a core retry policy.
    pub fn to_policy(&self) -> RetryPolicy {
        let attempts = if self.unbounded {
            RetryAttempts::Unbounded
        } else {
            RetryAttempts::Bounded(self.max_attempts.max(1))
        };
        RetryPolicy::new(attempts)
            .base_interval(Duration::from_millis(self.base_interval_ms))
            .multiplier(self.multiplier)
            .max_interval(Duration::from_millis(self.max_interval_ms))
            .jitter(self.jitter)
    }
}

fn default_max_attempts() -> u32 {
    10
}

fn default_base_interval_ms() -> u64 {
    500
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_interval_ms() -> u64 {
    30_000
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    /// Single-line compact output (default).
    #[default]
    Compact,
    /// Standard tracing output.
    Full,
    /// Multi-line human-friendly output.
    Pretty,
    /// Structured JSON output (requires the `json-log` feature).
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Global log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include thread IDs in log output.
    #[serde(default)]
    pub thread_ids: bool,

    /// Per-module level overrides, e.g. `quill_datafeed = "trace"`.
    #[serde(default)]
    pub filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            thread_ids: false,
            filters: HashMap::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_config_maps_onto_the_policy() {
        let config = RetryConfig {
            max_attempts: 3,
            unbounded: false,
            base_interval_ms: 100,
            multiplier: 2.0,
            max_interval_ms: 350,
            jitter: false,
        };
        let policy = config.to_policy();
        assert_eq!(policy.attempts(), RetryAttempts::Bounded(3));
        assert_eq!(policy.interval_for(3), Duration::from_millis(350));
    }

    #[test]
    fn unbounded_flag_overrides_max_attempts() {
        let config = RetryConfig {
            unbounded: true,
            ..Default::default()
        };
        assert_eq!(config.to_policy().attempts(), RetryAttempts::Unbounded);
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        let config = RetryConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert_eq!(config.to_policy().attempts(), RetryAttempts::Bounded(1));
    }
}
