//! Configuration resolution for Herald.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (`$XDG_CONFIG_HOME/herald/settings.json`)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables (`HERALD_*`)
//!
//! CLI arguments are applied on top by the binary.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Complete Herald configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub devices: DeviceConfig,
}

/// Process-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "herald=info,herald_server=info".to_string(),
            log_json: false,
        }
    }
}

/// Relational store settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite file. `None` falls back to [`database_path`].
    pub path: Option<PathBuf>,
}

/// Key-value cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Redis connection URL. `None` selects the in-process memory cache.
    pub redis_url: Option<String>,
    pub pool_size: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            pool_size: 8,
        }
    }
}

/// Device listing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Hard ceiling on a single device page.
    pub max_page_size: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self { max_page_size: 300 }
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            config = load_config_file(&global_path)?;
        }
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file {} does not exist",
                path.display()
            )));
        }
        let overlay = load_config_file(path)?;
        merge_config(&mut config, overlay);
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("herald").join("settings.json"))
}

/// Default SQLite path when none is configured.
pub fn database_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("herald").join("herald.db"))
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn merge_config(base: &mut Config, overlay: Config) {
    base.server = overlay.server;

    if overlay.database.path.is_some() {
        base.database.path = overlay.database.path;
    }

    if overlay.cache.redis_url.is_some() {
        base.cache.redis_url = overlay.cache.redis_url;
    }
    base.cache.pool_size = overlay.cache.pool_size;

    base.devices = overlay.devices;
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(val) = var("HERALD_LOG_LEVEL") {
        config.server.log_level = val;
    }
    if let Some(val) = var("HERALD_LOG_JSON") {
        config.server.log_json = matches!(val.as_str(), "1" | "true" | "yes");
    }
    if let Some(val) = var("HERALD_DB_PATH") {
        config.database.path = Some(PathBuf::from(val));
    }
    if let Some(val) = var("HERALD_REDIS_URL") {
        config.cache.redis_url = Some(val);
    }
    if let Some(n) = var("HERALD_REDIS_POOL_SIZE").and_then(|v| v.parse().ok()) {
        config.cache.pool_size = n;
    }
    if let Some(n) = var("HERALD_MAX_PAGE_SIZE").and_then(|v| v.parse().ok()) {
        config.devices.max_page_size = n;
    }
}
