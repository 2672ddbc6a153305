//! Environment-level configuration.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use wabridge_commands::{ApiConfig, InterpreterConfig};
use wabridge_webhook::EventFilter;

use crate::reconnect::UNLIMITED_RETRIES;

/// Gateway configuration, normally assembled from environment variables
/// by the embedding service.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Webhook destination; `None` disables webhook delivery.
    pub webhook_url: Option<Url>,
    /// Allow-listed webhook event types.
    pub webhook_allowed_events: EventFilter,
    /// Maximum reconnect attempts per session; `-1` means unlimited.
    pub max_reconnect_attempts: i32,
    /// Delay between reconnect attempts.
    pub reconnect_interval: Duration,
    /// Mark inbound messages as read before processing.
    pub auto_mark_read: bool,
    /// Embed downloaded media as base64 in webhook payloads.
    pub media_in_base64: bool,
    /// Directory holding credential and message-store files.
    pub sessions_dir: PathBuf,
    /// External report/journal API.
    pub api: ApiConfig,
    /// Command authorization settings.
    pub interpreter: InterpreterConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            webhook_allowed_events: EventFilter::default(),
            max_reconnect_attempts: 0,
            reconnect_interval: Duration::ZERO,
            auto_mark_read: false,
            media_in_base64: false,
            sessions_dir: PathBuf::from("sessions"),
            api: ApiConfig {
                base_url: String::new(),
                api_key: String::new(),
            },
            interpreter: InterpreterConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Reads the configuration from the process environment.
    ///
    /// Missing or unparseable variables fall back to the defaults;
    /// notably `MAX_RETRIES=-1` selects unlimited reconnects.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            webhook_url: env_var("APP_WEBHOOK_URL").and_then(|v| Url::parse(&v).ok()),
            webhook_allowed_events: env_var("APP_WEBHOOK_ALLOWED_EVENTS")
                .map(|v| EventFilter::parse(&v))
                .unwrap_or_default(),
            max_reconnect_attempts: env_var("MAX_RETRIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_reconnect_attempts),
            reconnect_interval: env_var("RECONNECT_INTERVAL")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.reconnect_interval),
            auto_mark_read: env_flag("AUTO_READ_MESSAGES"),
            media_in_base64: env_flag("APP_WEBHOOK_FILE_IN_BASE64"),
            sessions_dir: env_var("SESSIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.sessions_dir),
            api: ApiConfig {
                base_url: env_var("APP_API_BASE_URL").unwrap_or_default(),
                api_key: env_var("APP_API_KEY").unwrap_or_default(),
            },
            interpreter: InterpreterConfig {
                authorized_numbers: env_var("APP_AUTHORIZED_NUMBERS")
                    .map(|v| {
                        v.split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
                report_recipient: env_var("APP_REPORT_RECIPIENT"),
            },
        }
    }

    /// Whether reconnects are unlimited.
    pub fn unlimited_retries(&self) -> bool {
        self.max_reconnect_attempts == UNLIMITED_RETRIES
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_flag(name: &str) -> bool {
    env_var(name).is_some_and(|v| v == "true")
}
