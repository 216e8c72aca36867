use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// AUR 助手命令（yay / paru）
    pub aur_helper: String,
    pub search_timeout_secs: u64,
    /// `pacman -Q <name>` / `-Qi` / `pactree` 这类单包查询
    pub point_query_timeout_secs: u64,
    pub remote_info_timeout_secs: u64,
    pub updates_timeout_secs: u64,
    pub listing_timeout_secs: u64,
    pub details_cache_capacity: usize,
    pub export_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Self {
            aur_helper: "yay".to_string(),
            search_timeout_secs: 30,
            point_query_timeout_secs: 5,
            remote_info_timeout_secs: 8,
            updates_timeout_secs: 30,
            listing_timeout_secs: 60,
            details_cache_capacity: 200,
            export_dir: PathBuf::from(home).join(".pkger/exports"),
        }
    }
}

impl Config {
    fn config_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".config/pkger/config.toml")
    }

    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            log::debug!("loaded config from {}", config_path.display());
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    pub fn point_query_timeout(&self) -> Duration {
        Duration::from_secs(self.point_query_timeout_secs)
    }

    pub fn remote_info_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_info_timeout_secs)
    }

    pub fn updates_timeout(&self) -> Duration {
        Duration::from_secs(self.updates_timeout_secs)
    }

    pub fn listing_timeout(&self) -> Duration {
        Duration::from_secs(self.listing_timeout_secs)
    }
}
