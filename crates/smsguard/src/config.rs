//! Application configuration persisted as JSON.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

const APP_DIR: &str = "smsguard";

/// Settings that persist across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `SQLite` database holding the blocklist.
    pub database_path: PathBuf,
    /// Seconds between background sweeps while receiving. 0 disables them.
    pub sweep_interval_secs: u64,
    /// File name used by `export` when no path is given.
    pub export_file_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("smsguard.db"),
            sweep_interval_secs: 3600,
            export_file_name: "blocked_sms_list.json".to_string(),
        }
    }
}

impl Config {
    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.json")
    }

    /// Load configuration, falling back to defaults when the file is absent.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;

        serde_json::from_str(&contents).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Write configuration, creating parent directories as needed.
    pub async fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, contents)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        tracing::info!("Config saved to {:?}", path);
        Ok(())
    }
}
