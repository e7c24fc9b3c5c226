//! Library-level error type.
//!
//! Each module keeps its own error enum. [`TileCacheError`] folds them into
//! the categories callers act on.

use crate::config::ConfigFileError;
use crate::fetch::FetchError;
use crate::provider::ProviderError;
use crate::region::RegionError;
use crate::store::StoreError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by the [`MapService`](crate::service::MapService) facade.
#[derive(Debug, Error)]
pub enum TileCacheError {
    /// Invalid settings, region or request
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Filesystem failure outside the store
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The remote source could not deliver
    #[error("Remote fetch failed: {0}")]
    RemoteFetch(ProviderError),

    /// The store could not be opened, read or written
    #[error("Persistence error: {0}")]
    Persistence(StoreError),

    /// The writer queue stayed full and a batch was dropped
    #[error("Writer queue for {0} is saturated")]
    QueueSaturation(PathBuf),
}

impl TileCacheError {
    /// True for errors a caller can fix by changing its input or config.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

impl From<StoreError> for TileCacheError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidPath(msg) => Self::Configuration(msg),
            other => Self::Persistence(other),
        }
    }
}

impl From<FetchError> for TileCacheError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Configuration(msg) => Self::Configuration(msg),
            FetchError::Store(store) => store.into(),
        }
    }
}

impl From<ProviderError> for TileCacheError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::InvalidTemplate(msg) => Self::Configuration(msg),
            other => Self::RemoteFetch(other),
        }
    }
}

impl From<RegionError> for TileCacheError {
    fn from(e: RegionError) -> Self {
        Self::Configuration(e.to_string())
    }
}

impl From<ConfigFileError> for TileCacheError {
    fn from(e: ConfigFileError) -> Self {
        Self::Configuration(e.to_string())
    }
}
