//! Runtime settings for stores and their writers.

use super::error::StoreError;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of batches a writer queue holds before enqueues time out.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Default time an enqueue waits for queue space before dropping the batch.
pub const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_millis(250);

/// Default SQLite busy timeout.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time disposal waits for a writer to drain.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default store file extension.
pub const DEFAULT_EXTENSION: &str = "db";

/// Where region stores live and how their writers behave.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    /// Directory holding one store file per region
    pub directory: PathBuf,
    /// Store file extension, without the dot
    pub extension: String,
    /// Bounded writer queue capacity, in batches
    pub queue_capacity: usize,
    /// How long an enqueue waits for queue space
    pub enqueue_timeout: Duration,
    /// SQLite busy timeout for every connection
    pub busy_timeout: Duration,
    /// How long disposal waits for the writer thread
    pub shutdown_timeout: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            directory: default_store_directory(),
            extension: DEFAULT_EXTENSION.to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            enqueue_timeout: DEFAULT_ENQUEUE_TIMEOUT,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl StoreSettings {
    /// Settings rooted at the given directory, everything else default.
    pub fn in_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    /// Resolves the store file for a region name.
    ///
    /// Names must be non-empty and must not contain path separators.
    pub fn store_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(StoreError::InvalidPath("region name is empty".into()));
        }
        if trimmed.contains(&['/', '\\'][..]) || trimmed == "." || trimmed == ".." {
            return Err(StoreError::InvalidPath(format!(
                "region name '{}' must be a plain file name",
                name
            )));
        }

        let file_name = if self.extension.is_empty() {
            trimmed.to_string()
        } else {
            format!("{}.{}", trimmed, self.extension.trim_start_matches('.'))
        };
        Ok(self.directory.join(file_name))
    }
}

/// `~/.tilecache/offline`, or `./.tilecache/offline` without a home directory.
pub fn default_store_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| Path::new(".").to_path_buf())
        .join(".tilecache")
        .join("offline")
}
