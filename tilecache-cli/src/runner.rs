//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading, logging initialization and service creation
//! to reduce duplication across command handlers.

use crate::error::CliError;
use std::path::Path;
use tilecache::config::{config_file_path, ConfigFile};
use tilecache::logging::{init_logging, split_log_path, LoggingGuard};
use tilecache::service::{HttpTileSource, MapService};
use tracing::info;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Load config (from `config_path` or the default location) and
    /// initialize logging.
    pub fn new(config_path: Option<&Path>, stdout: bool) -> Result<Self, CliError> {
        let config = match config_path {
            Some(path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load_from(&config_file_path())?,
        };

        let (log_dir, log_file) = split_log_path(&config.logging.file);
        let logging_guard = init_logging(&log_dir, &log_file, stdout)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Where this run logs to.
    pub fn log_path(&self) -> &Path {
        self.logging_guard.path()
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("tilecache v{}", tilecache::VERSION);
        info!("tilecache CLI: {} command", command);
    }

    /// Create a service from `config`, which may differ from the loaded one
    /// by command-line overrides.
    pub fn create_service(&self, config: &ConfigFile) -> Result<MapService<HttpTileSource>, CliError> {
        let service = MapService::from_config(config)?;
        info!("Service created successfully");
        Ok(service)
    }
}
