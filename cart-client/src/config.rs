use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Persisted client state: which server we talk to and the tokens from
/// the last login.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    pub server_url: Option<String>,
    pub username: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let contents =
            fs::read_to_string(&config_path).context("Failed to read config file")?;
        serde_json::from_str(&contents).context("Failed to parse config file")
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_file_path()?;
        let config_dir = config_path
            .parent()
            .context("Failed to get config directory")?;
        fs::create_dir_all(config_dir).context("Failed to create config directory")?;

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, contents).context("Failed to write config file")?;
        Ok(())
    }

    /// Removes all client state, used by `cart logout`.
    pub fn clear() -> Result<()> {
        let path = Self::config_file_path()?;
        if path.exists() {
            fs::remove_file(&path).context("Failed to delete config file")?;
            info!("Deleted config file at {:?}", path);
        }
        Ok(())
    }

    pub fn config_file_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to get config directory")?;
        Ok(config_dir.join("cartridge").join("config.json"))
    }

    pub fn server_url(&self) -> Result<&str> {
        self.server_url
            .as_deref()
            .context("Not logged in; run `cart login` first")
    }
}
