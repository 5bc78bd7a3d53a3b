//! Gate configuration file.
//!
//! A TOML document with one table per component. Everything except
//! `remote.base_url` has a default.
//!
//! ```toml
//! [gate]
//! id = "lock-1"
//! card_file = "/etc/gatehouse/authorized_cards.json"
//!
//! [reader]
//! port = "/dev/ttyS0"
//! baud_rate = 115200
//! read_timeout_ms = 500
//! poll_interval_ms = 50
//!
//! [actuator]
//! unlock_secs = 5
//! grant_tone_ms = 200
//! deny_tone_ms = 100
//! deny_gap_ms = 100
//! deny_tone_count = 3
//!
//! [queue]
//! database_path = "/var/lib/gatehouse/queue.db"
//!
//! [sync]
//! interval_secs = 60
//! batch_limit = 100
//!
//! [remote]
//! base_url = "https://project.supabase.co"
//! api_key = "..."          # or GATEHOUSE_API_KEY
//! timeout_ms = 3000
//!
//! [attendance]
//! utc_offset_secs = 7200
//! ```

use crate::error::{ControllerError, Result};
use crate::sync_worker::SyncConfig;
use chrono::FixedOffset;
use gatehouse_attendance::DEFAULT_UTC_OFFSET_SECS;
use gatehouse_core::constants::{
    DEFAULT_DENY_GAP_MS, DEFAULT_DENY_TONE_COUNT, DEFAULT_DENY_TONE_MS, DEFAULT_GATE_ID,
    DEFAULT_GRANT_TONE_MS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_READ_TIMEOUT_MS,
    DEFAULT_SYNC_BATCH_LIMIT, DEFAULT_SYNC_INTERVAL_SECS, DEFAULT_UNLOCK_SECS,
};
use gatehouse_hardware::ActuationProfile;
use gatehouse_network::RemoteConfig;
use gatehouse_storage::DatabaseConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable that overrides `remote.api_key`.
pub const API_KEY_ENV: &str = "GATEHOUSE_API_KEY";

/// Baud rate used by PN532 HSU mode.
const DEFAULT_BAUD_RATE: u32 = 115_200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub gate: GateSection,
    #[serde(default)]
    pub reader: ReaderSection,
    #[serde(default)]
    pub actuator: ActuatorSection,
    #[serde(default)]
    pub queue: QueueSection,
    #[serde(default)]
    pub sync: SyncSection,
    pub remote: RemoteConfig,
    #[serde(default)]
    pub attendance: AttendanceSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateSection {
    /// Reported as `lock` with every delivered event
    pub id: String,
    /// JSON array of authorized card identifiers
    pub card_file: PathBuf,
}

impl Default for GateSection {
    fn default() -> Self {
        Self {
            id: DEFAULT_GATE_ID.to_string(),
            card_file: PathBuf::from("authorized_cards.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSection {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for ReaderSection {
    fn default() -> Self {
        Self {
            port: "/dev/ttyS0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl ReaderSection {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorSection {
    pub unlock_secs: u64,
    pub grant_tone_ms: u64,
    pub deny_tone_ms: u64,
    pub deny_gap_ms: u64,
    pub deny_tone_count: u8,
}

impl Default for ActuatorSection {
    fn default() -> Self {
        Self {
            unlock_secs: DEFAULT_UNLOCK_SECS,
            grant_tone_ms: DEFAULT_GRANT_TONE_MS,
            deny_tone_ms: DEFAULT_DENY_TONE_MS,
            deny_gap_ms: DEFAULT_DENY_GAP_MS,
            deny_tone_count: DEFAULT_DENY_TONE_COUNT,
        }
    }
}

impl ActuatorSection {
    pub fn profile(&self) -> ActuationProfile {
        ActuationProfile {
            grant_tone: Duration::from_millis(self.grant_tone_ms),
            unlock: Duration::from_secs(self.unlock_secs),
            deny_tone: Duration::from_millis(self.deny_tone_ms),
            deny_gap: Duration::from_millis(self.deny_gap_ms),
            deny_tone_count: self.deny_tone_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSection {
    pub database_path: String,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            database_path: DatabaseConfig::default().database_path,
        }
    }
}

impl QueueSection {
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.database_path.clone()).synchronous_full(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    pub interval_secs: u64,
    pub batch_limit: usize,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            batch_limit: DEFAULT_SYNC_BATCH_LIMIT,
        }
    }
}

impl SyncSection {
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig::default()
            .interval(Duration::from_secs(self.interval_secs))
            .batch_limit(self.batch_limit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceSection {
    /// Offset used to assign events to calendar days
    pub utc_offset_secs: i32,
}

impl Default for AttendanceSection {
    fn default() -> Self {
        Self {
            utc_offset_secs: DEFAULT_UTC_OFFSET_SECS,
        }
    }
}

impl AttendanceSection {
    pub fn offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_secs).ok_or_else(|| {
            ControllerError::config(format!(
                "attendance.utc_offset_secs out of range: {}",
                self.utc_offset_secs
            ))
        })
    }
}

impl GateConfig {
    /// Parse a configuration document without touching the environment.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` and apply the `GATEHOUSE_API_KEY` override.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ControllerError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut config = Self::from_toml(&text)?;
        config.apply_api_key(std::env::var(API_KEY_ENV).ok());
        debug!(path = %path.display(), gate_id = %config.gate.id, "Configuration loaded");
        Ok(config)
    }

    /// Replace the API key when `key` is set and non-empty.
    pub fn apply_api_key(&mut self, key: Option<String>) {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.remote.api_key = key;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.gate.id.trim().is_empty() {
            return Err(ControllerError::config("gate.id is empty"));
        }
        if self.reader.read_timeout_ms == 0 {
            return Err(ControllerError::config("reader.read_timeout_ms must be positive"));
        }
        if self.actuator.unlock_secs == 0 {
            return Err(ControllerError::config("actuator.unlock_secs must be positive"));
        }
        if self.sync.interval_secs == 0 {
            return Err(ControllerError::config("sync.interval_secs must be positive"));
        }
        if self.sync.batch_limit == 0 {
            return Err(ControllerError::config("sync.batch_limit must be positive"));
        }
        self.attendance.offset()?;
        self.remote.validate()?;
        Ok(())
    }
}
