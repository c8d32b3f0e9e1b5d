//! Settings service
//!
//! Manages application settings persistence using JSON file storage.

use crate::config::{
    DEFAULT_CONNECTIVITY_PROBE_URL, DEFAULT_SYNC_INTERVAL_SECS, MIN_SYNC_INTERVAL_SECS,
    SETTINGS_FILE_NAME,
};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

/// Outbox processor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between outbox drains (minimum 10)
    #[serde(default = "default_sync_interval")]
    pub interval_secs: u64,
    /// Endpoint probed before each drain
    #[serde(default = "default_probe_url")]
    pub probe_url: String,
}

fn default_true() -> bool {
    true
}

fn default_sync_interval() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECS
}

fn default_probe_url() -> String {
    DEFAULT_CONNECTIVITY_PROBE_URL.to_string()
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_sync_interval(),
            probe_url: default_probe_url(),
        }
    }
}

impl SyncSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_secs < MIN_SYNC_INTERVAL_SECS {
            return Err(AppError::Validation(format!(
                "sync interval must be at least {} seconds",
                MIN_SYNC_INTERVAL_SECS
            )));
        }
        if reqwest::Url::parse(&self.probe_url).is_err() {
            return Err(AppError::Validation(format!(
                "invalid probe URL: {}",
                self.probe_url
            )));
        }
        Ok(())
    }
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppSettings {
    #[serde(default)]
    pub sync: SyncSettings,
}

/// Service for managing application settings
#[derive(Clone)]
pub struct SettingsService {
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new(app_data_dir: PathBuf) -> Self {
        Self {
            settings_path: app_data_dir.join(SETTINGS_FILE_NAME),
        }
    }

    /// Load settings from disk or create default if not exists.
    /// An interval below the minimum is raised to it.
    pub async fn load(&self) -> Result<AppSettings> {
        if !fs::try_exists(&self.settings_path).await? {
            tracing::info!("Settings file not found, creating default settings");
            let default = AppSettings::default();
            self.save(&default).await?;
            return Ok(default);
        }

        let content = fs::read_to_string(&self.settings_path).await?;
        let mut settings: AppSettings = serde_json::from_str(&content)
            .map_err(|e| AppError::Generic(format!("Failed to parse settings: {}", e)))?;

        if settings.sync.interval_secs < MIN_SYNC_INTERVAL_SECS {
            tracing::warn!(
                "Sync interval of {}s is below the minimum, using {}s",
                settings.sync.interval_secs,
                MIN_SYNC_INTERVAL_SECS
            );
            settings.sync.interval_secs = MIN_SYNC_INTERVAL_SECS;
        }

        Ok(settings)
    }

    /// Save settings to disk
    pub async fn save(&self, settings: &AppSettings) -> Result<()> {
        let content = serde_json::to_string_pretty(settings)
            .map_err(|e| AppError::Generic(format!("Failed to serialize settings: {}", e)))?;

        fs::write(&self.settings_path, content).await?;
        tracing::info!("Settings saved to {:?}", self.settings_path);

        Ok(())
    }

    pub async fn get_sync(&self) -> Result<SyncSettings> {
        let settings = self.load().await?;
        Ok(settings.sync)
    }

    /// Update sync settings; rejected values leave the file untouched
    pub async fn update_sync(&self, sync: SyncSettings) -> Result<()> {
        sync.validate()?;

        let mut settings = self.load().await?;
        settings.sync = sync;
        self.save(&settings).await?;
        Ok(())
    }
}
