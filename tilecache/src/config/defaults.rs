//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants, the concurrency clamp, and the
//! `ConfigFile::default()` implementation.

use super::settings::*;
use crate::fetch::{
    DEFAULT_MAX_CONCURRENT, DEFAULT_MAX_RETRIES, DEFAULT_PERSIST_BATCH_SIZE,
    DEFAULT_PROGRESS_BATCH_SIZE, MAX_CONCURRENT_CEILING,
};
use crate::provider::DEFAULT_USER_AGENT;
use crate::store::{
    default_store_directory, DEFAULT_EXTENSION, DEFAULT_QUEUE_CAPACITY,
};

/// Default template for unlabeled tiles.
pub const DEFAULT_PLAIN_URL: &str =
    "https://{s}.basemaps.cartocdn.com/light_nolabels/{z}/{x}/{y}.png";

/// Default template for labeled tiles.
pub const DEFAULT_LABELED_URL: &str =
    "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}.png";

pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ENQUEUE_TIMEOUT_MS: u64 = 250;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 500;

/// Smallest accepted `max_concurrent`.
pub const MIN_CONCURRENT: usize = 1;

/// Clamps download concurrency to valid range and logs a warning if clamped.
pub(super) fn clamp_concurrent(value: usize) -> usize {
    if value < MIN_CONCURRENT {
        tracing::warn!(
            requested = value,
            min = MIN_CONCURRENT,
            max = MAX_CONCURRENT_CEILING,
            "max_concurrent below minimum, clamping to {}",
            MIN_CONCURRENT
        );
        MIN_CONCURRENT
    } else if value > MAX_CONCURRENT_CEILING {
        tracing::warn!(
            requested = value,
            min = MIN_CONCURRENT,
            max = MAX_CONCURRENT_CEILING,
            "max_concurrent above maximum, clamping to {}",
            MAX_CONCURRENT_CEILING
        );
        MAX_CONCURRENT_CEILING
    } else {
        value
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            store: StoreSection {
                directory: default_store_directory(),
                extension: DEFAULT_EXTENSION.to_string(),
                queue_capacity: DEFAULT_QUEUE_CAPACITY,
                enqueue_timeout_ms: DEFAULT_ENQUEUE_TIMEOUT_MS,
                busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            download: DownloadSection {
                plain_url: DEFAULT_PLAIN_URL.to_string(),
                labeled_url: DEFAULT_LABELED_URL.to_string(),
                user_agent: DEFAULT_USER_AGENT.to_string(),
                referer: String::new(),
                timeout: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
                max_concurrent: DEFAULT_MAX_CONCURRENT,
                max_retries: DEFAULT_MAX_RETRIES,
                progress_batch_size: DEFAULT_PROGRESS_BATCH_SIZE,
                progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
                persist_batch_size: DEFAULT_PERSIST_BATCH_SIZE,
            },
            session: SessionSection {
                cache_enabled: true,
                online_enabled: true,
            },
            logging: LoggingSection {
                file: super::file::config_directory()
                    .join("logs")
                    .join("tilecache.log"),
            },
        }
    }
}
