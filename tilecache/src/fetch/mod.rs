//! Streaming fetch pipeline
//!
//! A fetch pass takes a list of coordinates at one zoom for one variant and
//! resolves each from the store or the remote source:
//!
//! - [`StreamingFetcher`] runs passes
//! - [`ConcurrencyLimiter`] bounds concurrent downloads
//! - [`ProgressBuffer`] batches completed tiles for the caller

mod fetcher;
mod limiter;
mod progress;
mod request;

pub use fetcher::StreamingFetcher;
pub use limiter::{
    ConcurrencyLimiter, ConcurrencyPermit, DEFAULT_MAX_CONCURRENT, MAX_CONCURRENT_CEILING,
};
pub use progress::{
    ProgressBuffer, ProgressSink, DEFAULT_PROGRESS_BATCH_SIZE, DEFAULT_PROGRESS_INTERVAL,
};
pub use request::{
    FetchConfig, FetchError, FetchOptions, FetchRequest, FetchSummary, DEFAULT_MAX_RETRIES,
    DEFAULT_PERSIST_BATCH_SIZE, DEFAULT_REQUEST_TIMEOUT, DEFAULT_RETRY_BACKOFF,
};
