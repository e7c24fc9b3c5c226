//! Configuration file handling for ~/.tilecache/config.ini.
//!
//! Loads and saves user configuration with sensible defaults, and derives
//! the typed runtime settings the library components take.

use ini::Ini;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::defaults::clamp_concurrent;
use super::settings::ConfigFile;
use crate::fetch::{FetchConfig, FetchOptions, DEFAULT_RETRY_BACKOFF};
use crate::store::StoreSettings;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load configuration from the default path (~/.tilecache/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        let path = config_file_path();
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Create the config file at `path` if it doesn't exist.
    ///
    /// Returns whether a file was written.
    pub fn ensure_exists(path: &Path) -> Result<bool, ConfigFileError> {
        if path.exists() {
            return Ok(false);
        }
        Self::default().save_to(path)?;
        Ok(true)
    }

    /// Store settings for the writer registry and query helper.
    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            directory: self.store.directory.clone(),
            extension: self.store.extension.clone(),
            queue_capacity: self.store.queue_capacity.max(1),
            enqueue_timeout: Duration::from_millis(self.store.enqueue_timeout_ms),
            busy_timeout: Duration::from_millis(self.store.busy_timeout_ms),
            shutdown_timeout: Duration::from_secs(self.store.shutdown_timeout_secs),
        }
    }

    /// Fetcher tuning.
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            max_concurrent: clamp_concurrent(self.download.max_concurrent),
            max_retries: self.download.max_retries,
            request_timeout: Duration::from_secs(self.download.timeout),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            progress_batch_size: self.download.progress_batch_size.max(1),
            progress_interval: Duration::from_millis(self.download.progress_interval_ms),
            persist_batch_size: self.download.persist_batch_size.max(1),
        }
    }

    /// Default options for fetch passes.
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            cache_enabled: self.session.cache_enabled,
            online_enabled: self.session.online_enabled,
        }
    }
}

/// Get the path to the config directory (~/.tilecache).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tilecache")
}

/// Get the path to the config file (~/.tilecache/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
