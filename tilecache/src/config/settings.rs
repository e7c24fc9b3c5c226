//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Region store settings
    pub store: StoreSection,
    /// Remote source and fetcher tuning
    pub download: DownloadSection,
    /// Default fetch options for sessions
    pub session: SessionSection,
    /// Logging settings
    pub logging: LoggingSection,
}

/// `[store]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSection {
    /// Directory holding one store file per region
    pub directory: PathBuf,
    /// Store file extension, without the dot
    pub extension: String,
    /// Writer queue capacity in batches
    pub queue_capacity: usize,
    pub enqueue_timeout_ms: u64,
    pub busy_timeout_ms: u64,
    pub shutdown_timeout_secs: u64,
}

/// `[download]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSection {
    /// URL template for unlabeled tiles
    pub plain_url: String,
    /// URL template for labeled tiles
    pub labeled_url: String,
    pub user_agent: String,
    /// Sent as `Referer` when non-empty
    pub referer: String,
    /// Per-request timeout in seconds
    pub timeout: u64,
    /// Concurrent downloads, clamped to `1..=64`
    pub max_concurrent: usize,
    pub max_retries: u32,
    pub progress_batch_size: usize,
    pub progress_interval_ms: u64,
    pub persist_batch_size: usize,
}

/// `[session]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSection {
    /// Serve and persist through the local store
    pub cache_enabled: bool,
    /// Download tiles the store does not hold
    pub online_enabled: bool,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSection {
    /// Log file path
    pub file: PathBuf,
}
