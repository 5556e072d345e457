//! Session configuration.

use crate::autosave::AutosaveConfig;
use crate::init::InitConfig;
use crate::time::Duration;
use serde::{Deserialize, Serialize};

/// Tunables for a scene session. Every field has a default, so a partial
/// JSON object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub debounce_ms: u64,
    pub saved_display_ms: u64,
    pub failed_display_ms: u64,
    pub init_first_attempt_ms: u64,
    pub init_retry_ms: u64,
    pub init_error_retry_ms: u64,
    pub init_max_retries: u32,
    pub init_timeout_ms: u64,
    /// Keep the latest autosave skipped during a write.
    pub retry_skipped: bool,
    /// Document store WebSocket URL (`ws://host:port/ws`). None = offline only.
    pub server_url: Option<String>,
    /// Origin used in share links.
    pub origin: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 2000,
            saved_display_ms: 2000,
            failed_display_ms: 3000,
            init_first_attempt_ms: 100,
            init_retry_ms: 500,
            init_error_retry_ms: 1000,
            init_max_retries: 5,
            init_timeout_ms: 10_000,
            retry_skipped: false,
            server_url: None,
            origin: "http://localhost:3000".to_string(),
        }
    }
}

impl SyncConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn autosave(&self) -> AutosaveConfig {
        AutosaveConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            saved_display: Duration::from_millis(self.saved_display_ms),
            failed_display: Duration::from_millis(self.failed_display_ms),
            retry_skipped: self.retry_skipped,
        }
    }

    pub fn init(&self) -> InitConfig {
        InitConfig {
            first_attempt: Duration::from_millis(self.init_first_attempt_ms),
            retry_delay: Duration::from_millis(self.init_retry_ms),
            error_retry_delay: Duration::from_millis(self.init_error_retry_ms),
            max_retries: self.init_max_retries,
            timeout: Duration::from_millis(self.init_timeout_ms),
        }
    }
}
