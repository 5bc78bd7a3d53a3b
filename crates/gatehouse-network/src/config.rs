//! Remote store configuration.

use crate::error::{NetworkError, Result};
use gatehouse_core::constants::DEFAULT_DELIVERY_TIMEOUT_MS;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Connection settings for the hosted REST store.
///
/// # Example
///
/// ```
/// use gatehouse_network::RemoteConfig;
/// use std::time::Duration;
///
/// let config = RemoteConfig::new("https://example.supabase.co/", "key")
///     .timeout(Duration::from_secs(2));
///
/// assert_eq!(
///     config.endpoint("access_logs"),
///     "https://example.supabase.co/rest/v1/access_logs"
/// );
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Project URL, without the `/rest/v1` suffix
    pub base_url: String,

    /// Sent as both `apikey` and bearer token
    #[serde(default)]
    pub api_key: String,

    /// Bound on a single request, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub tables: RemoteTables,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_DELIVERY_TIMEOUT_MS
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout_ms: DEFAULT_DELIVERY_TIMEOUT_MS,
            tables: RemoteTables::default(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn tables(mut self, tables: RemoteTables) -> Self {
        self.tables = tables;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// REST endpoint of `table`.
    pub fn endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url.trim_end_matches('/'), table)
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(NetworkError::configuration("remote base_url is empty"));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(NetworkError::configuration(format!(
                "remote base_url must be http(s): {url}"
            )));
        }
        if self.timeout_ms == 0 {
            return Err(NetworkError::configuration("remote timeout_ms must be positive"));
        }
        Ok(())
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout_ms", &self.timeout_ms)
            .field("tables", &self.tables)
            .finish()
    }
}

/// Table names in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteTables {
    /// Granted access events
    pub access_logs: String,
    /// Denied access events
    pub unidentified_cards: String,
    /// Person directory with card identifiers
    pub persons: String,
    /// Year membership of tracked persons
    pub roster: String,
    pub practice_dates: String,
    pub manual_attendance: String,
}

impl Default for RemoteTables {
    fn default() -> Self {
        Self {
            access_logs: "access_logs".to_string(),
            unidentified_cards: "unidentified_cards".to_string(),
            persons: "persons".to_string(),
            roster: "choir_register".to_string(),
            practice_dates: "choir_practice_dates".to_string(),
            manual_attendance: "manual_choir_attendance".to_string(),
        }
    }
}
