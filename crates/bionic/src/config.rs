//! Configuration management for bionic.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Environment variables (BIONIC_*)
//! 2. Config file (`$BIONIC_CONFIG` or `~/.bionic/config.toml`)
//! 3. Default values
//!
//! The file holds an [`SDKConfig`], the same one `bionic-server` reads.

use anyhow::{Context, Result};
use bionic_sdk::{SDKConfig, StoreProvider};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Effective configuration
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Where the configuration was read from
    pub path: PathBuf,

    /// Whether `path` exists
    pub from_file: bool,

    /// Memory engine configuration
    pub sdk: SDKConfig,
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    fn load_from(path: &Path) -> Result<Self> {
        let from_file = path.exists();
        let mut sdk = if from_file {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            SDKConfig::default()
        };

        sdk.apply_env_overrides();
        if sdk.store.provider == StoreProvider::Sqlite
            && sdk.store.path.is_none()
            && std::env::var("BIONIC_DATABASE_PATH").is_err()
        {
            sdk.store.path = Some(default_data_dir().join("memory.db"));
        }

        Ok(Self {
            path: path.to_path_buf(),
            from_file,
            sdk,
        })
    }

    /// Write the default configuration unless a file already exists.
    ///
    /// Returns false when nothing was written.
    pub fn init(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content =
            toml::to_string_pretty(&SDKConfig::default()).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(true)
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("BIONIC_CONFIG") {
            PathBuf::from(path)
        } else {
            default_data_dir().join("config.toml")
        }
    }

    /// Copy of the configuration safe to print.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        for key in [&mut config.sdk.embedding.api_key, &mut config.sdk.summary.api_key] {
            if key.is_some() {
                *key = Some("********".into());
            }
        }
        config
    }
}

fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("BIONIC_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bionic")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert!(!config.from_file);
        assert_eq!(config.sdk.memory.max_retrieval_results, 10);
    }

    #[test]
    fn test_init_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(Config::init(&path).unwrap());
        assert!(!Config::init(&path).unwrap());

        let config = Config::load_from(&path).unwrap();
        assert!(config.from_file);
        assert_eq!(config.sdk.scheduler.short_term_interval_secs, 600);
        assert_eq!(
            config.sdk.memory.long_term_profile.as_deref(),
            Some("days_31")
        );
    }

    #[test]
    fn test_file_values_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[memory]\nmax_retrieval_results = 4\n\n[store]\nprovider = \"memory\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.sdk.memory.max_retrieval_results, 4);
        assert_eq!(config.sdk.store.provider, StoreProvider::Memory);
        assert!(config.sdk.store.path.is_none());
    }

    #[test]
    fn test_redacted_hides_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        config.sdk.embedding.api_key = Some("sk-secret".into());

        let shown = config.redacted();
        assert_eq!(shown.sdk.embedding.api_key.as_deref(), Some("********"));
        assert_eq!(config.sdk.embedding.api_key.as_deref(), Some("sk-secret"));
    }
}
