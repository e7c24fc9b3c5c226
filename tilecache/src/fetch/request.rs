//! Fetch pass inputs, settings and results.

use super::limiter::DEFAULT_MAX_CONCURRENT;
use super::progress::{DEFAULT_PROGRESS_BATCH_SIZE, DEFAULT_PROGRESS_INTERVAL};
use crate::coord::TileCoord;
use crate::store::StoreError;
use crate::tile::TileVariant;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default retries after a failed download.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default per-attempt download timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default base delay between retries; doubles per attempt.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Default number of downloaded tiles handed to the writer at once.
pub const DEFAULT_PERSIST_BATCH_SIZE: usize = 200;

/// Whether a pass may read the store and whether it may go online.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub cache_enabled: bool,
    pub online_enabled: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            online_enabled: true,
        }
    }
}

impl FetchOptions {
    /// Serve from the store only.
    pub fn offline() -> Self {
        Self {
            cache_enabled: true,
            online_enabled: false,
        }
    }

    /// Always download, never read or write the store.
    pub fn no_cache() -> Self {
        Self {
            cache_enabled: false,
            online_enabled: true,
        }
    }
}

/// Tuning for the streaming fetcher.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    /// Concurrent downloads, clamped to `1..=64`
    pub max_concurrent: usize,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Per-attempt timeout
    pub request_timeout: Duration,
    /// Base delay before a retry
    pub retry_backoff: Duration,
    /// Tiles per progress batch
    pub progress_batch_size: usize,
    /// Maximum time between progress batches
    pub progress_interval: Duration,
    /// Downloaded tiles per writer hand-off
    pub persist_batch_size: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            max_retries: DEFAULT_MAX_RETRIES,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            progress_batch_size: DEFAULT_PROGRESS_BATCH_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            persist_batch_size: DEFAULT_PERSIST_BATCH_SIZE,
        }
    }
}

/// One fetch pass: a list of coordinates at one zoom for one variant.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub store_path: PathBuf,
    pub zoom: u8,
    pub variant: TileVariant,
    pub coords: Vec<TileCoord>,
    pub options: FetchOptions,
}

impl FetchRequest {
    pub fn new(
        store_path: impl Into<PathBuf>,
        zoom: u8,
        variant: TileVariant,
        coords: Vec<TileCoord>,
    ) -> Self {
        Self {
            store_path: store_path.into(),
            zoom,
            variant,
            coords,
            options: FetchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    /// Checks the options and that every coordinate is at the pass zoom.
    pub fn validate(&self) -> Result<(), FetchError> {
        if !self.options.cache_enabled && !self.options.online_enabled {
            return Err(FetchError::Configuration(
                "cache and online access are both disabled".into(),
            ));
        }
        if let Some(stray) = self.coords.iter().find(|c| c.zoom != self.zoom) {
            return Err(FetchError::Configuration(format!(
                "tile {} is not at pass zoom {}",
                stray, self.zoom
            )));
        }
        Ok(())
    }
}

/// Counts reported at the end of a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// Distinct coordinates in the request
    pub requested: usize,
    /// Already in the store with the variant
    pub present: usize,
    /// Downloaded successfully
    pub downloaded: usize,
    /// Download failed after retries
    pub failed: usize,
    /// Missing but online access is disabled
    pub skipped: usize,
}

/// Pass-level failures. Per-tile failures are counted in the summary.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid fetch configuration: {0}")]
    Configuration(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
