//! Store error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the tile store, its writer and the read helper.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure while preparing the store location
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The database file could not be opened
    #[error("Failed to open store {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// A statement failed
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The writer no longer accepts work
    #[error("Writer for {0} is closed")]
    WriterClosed(PathBuf),

    /// A read callback panicked on the blocking pool
    #[error("Read query panicked: {0}")]
    QueryPanicked(String),

    /// The store name or path cannot be used
    #[error("Invalid store path: {0}")]
    InvalidPath(String),
}
