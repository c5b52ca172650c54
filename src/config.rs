//! Runtime configuration for the background core.
//! Defaults mirror production values; an optional JSON file overrides them.
//! Secrets (API keys) never live here, they come from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;
use serde::Deserialize;
use tracing::{info, warn};

use crate::gate::GateAction;

/// Configuration surface of the background core. Every field has a default,
/// so a partial config file only overrides what it names.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Language served without translation.
    pub base_lang: String,
    /// When true, lookup reads the merged tier view instead of only the
    /// tier selected by the caller's persist flag.
    pub merged_value_reads: bool,
    pub persist_interval_secs: u64,
    pub sweep_interval_secs: u64,
    pub sweep_jitter_secs: u64,
    pub sweep_backoff_secs: u64,
    pub otp_cooldown_secs: u64,
    pub generate_cooldown_secs: u64,
    pub gate_capacity: usize,
    pub populate_workers: usize,
    pub populate_queue_depth: usize,
    pub provider_deadline_secs: u64,
    pub notify_deadline_secs: u64,
    /// Fixed UTC offset used for all event expiry comparisons, e.g. "+05:30".
    pub timezone_offset: String,
    pub translations_path: PathBuf,
    pub translations_backup_path: PathBuf,
    pub events_db_path: PathBuf,
    pub provider_url: String,
    pub mail_api_url: String,
    pub mail_from: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_lang: "en".into(),
            merged_value_reads: false,
            persist_interval_secs: 60,
            sweep_interval_secs: 30,
            sweep_jitter_secs: 10,
            sweep_backoff_secs: 60,
            otp_cooldown_secs: 30,
            generate_cooldown_secs: 10,
            gate_capacity: 4096,
            populate_workers: 4,
            populate_queue_depth: 64,
            provider_deadline_secs: 20,
            notify_deadline_secs: 15,
            timezone_offset: "+05:30".into(),
            translations_path: "translations.json".into(),
            translations_backup_path: "translations_backup.json".into(),
            events_db_path: "events.db".into(),
            provider_url: "http://127.0.0.1:5000/translate".into(),
            mail_api_url: "https://api.mailrelay.invalid/v1/send".into(),
            mail_from: "noreply@campline.app".into(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    BadTimezone(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config IO error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
            ConfigError::BadTimezone(s) => write!(f, "bad timezone offset: {s:?}"),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl AppConfig {
    /// Load configuration from a JSON file. The timezone offset is validated
    /// here so a typo fails at startup, not in the middle of a sweep.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.timezone()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file is missing
    /// or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            info!(path = %path.display(), "no config file, using defaults");
            return Self::default();
        }
        match Self::load_from_file(path) {
            Ok(config) => {
                info!(path = %path.display(), "config loaded");
                config
            }
            Err(e) => {
                warn!(error = %e, "config load failed, using defaults");
                Self::default()
            }
        }
    }

    /// The fixed offset all expiry comparisons use.
    pub fn timezone(&self) -> Result<FixedOffset, ConfigError> {
        self.timezone_offset
            .parse::<FixedOffset>()
            .map_err(|_| ConfigError::BadTimezone(self.timezone_offset.clone()))
    }

    pub fn persist_interval(&self) -> Duration {
        Duration::from_secs(self.persist_interval_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn sweep_jitter(&self) -> Duration {
        Duration::from_secs(self.sweep_jitter_secs)
    }

    pub fn sweep_backoff(&self) -> Duration {
        Duration::from_secs(self.sweep_backoff_secs)
    }

    pub fn provider_deadline(&self) -> Duration {
        Duration::from_secs(self.provider_deadline_secs)
    }

    pub fn notify_deadline(&self) -> Duration {
        Duration::from_secs(self.notify_deadline_secs)
    }

    /// Cooldown for one gated action kind.
    pub fn cooldown(&self, action: GateAction) -> Duration {
        match action {
            GateAction::OtpIssue => Duration::from_secs(self.otp_cooldown_secs),
            GateAction::DescriptionGen => Duration::from_secs(self.generate_cooldown_secs),
        }
    }
}
