//! Server configuration.

use anyhow::Context;
use bionic_sdk::{SDKConfig, StoreProvider};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const DEFAULT_ADDR: &str = "127.0.0.1:7420";

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the REST API listens on
    pub addr: SocketAddr,
    /// Data directory (`BIONIC_DATA_DIR` or `~/.bionic`)
    pub data_dir: PathBuf,
    /// Path to the SDK configuration file
    pub config_path: PathBuf,
    /// Emit JSON log lines instead of human-readable ones
    pub json_logs: bool,
    /// Memory engine configuration
    pub sdk: SDKConfig,
}

impl Config {
    /// Load configuration from the environment and the config file.
    ///
    /// Directory structure:
    /// ```text
    /// ~/.bionic/
    /// ├── config.toml   # SDKConfig (memory, embedding, summary, scheduler, store)
    /// └── memory.db     # SQLite vector store
    /// ```
    pub fn load() -> anyhow::Result<Self> {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let data_dir = std::env::var("BIONIC_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".bionic"));
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let config_path = std::env::var("BIONIC_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("config.toml"));

        let addr = std::env::var("BIONIC_SERVER_ADDR")
            .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
            .parse()
            .context("BIONIC_SERVER_ADDR is not a socket address")?;

        let json_logs = std::env::var("BIONIC_LOG_FORMAT").is_ok_and(|v| v == "json");

        let mut sdk = read_sdk_config(&config_path)?;
        sdk.apply_env_overrides();
        if sdk.store.provider == StoreProvider::Sqlite
            && sdk.store.path.is_none()
            && std::env::var("BIONIC_DATABASE_PATH").is_err()
        {
            sdk.store.path = Some(data_dir.join("memory.db"));
        }

        Ok(Self {
            addr,
            data_dir,
            config_path,
            json_logs,
            sdk,
        })
    }
}

/// Read the SDK section from a TOML file; a missing file means defaults.
fn read_sdk_config(path: &Path) -> anyhow::Result<SDKConfig> {
    if !path.exists() {
        return Ok(SDKConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
