//! Configuration for the tile cache.
//!
//! The user-facing INI file (`~/.tilecache/config.ini`) is split into one
//! struct per section. [`ConfigFile`] derives the typed settings the library
//! components take:
//!
//! - [`StoreSettings`](crate::store::StoreSettings) for writers and reads
//! - [`FetchConfig`](crate::fetch::FetchConfig) for the fetcher
//! - [`FetchOptions`](crate::fetch::FetchOptions) for session defaults
//!
//! # Example
//!
//! ```no_run
//! use tilecache::config::ConfigFile;
//!
//! let config = ConfigFile::load()?;
//! let settings = config.store_settings();
//! # Ok::<(), tilecache::config::ConfigFileError>(())
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::{
    DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_DOWNLOAD_TIMEOUT_SECS, DEFAULT_ENQUEUE_TIMEOUT_MS,
    DEFAULT_LABELED_URL, DEFAULT_PLAIN_URL, DEFAULT_PROGRESS_INTERVAL_MS,
    DEFAULT_SHUTDOWN_TIMEOUT_SECS, MIN_CONCURRENT,
};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{ConfigFile, DownloadSection, LoggingSection, SessionSection, StoreSection};
