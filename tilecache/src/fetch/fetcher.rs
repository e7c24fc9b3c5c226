//! Streaming fetch pass.
//!
//! Serves what the store already has, downloads the rest with bounded
//! concurrency, streams completed tiles to the caller in batches, and hands
//! downloads to the store writer as they accumulate.
//!
//! # Flow
//!
//! ```text
//! coords ──► existence check ──► partition ─┬─► present ──────────────► progress (once)
//!            (bulk / chunked)               │
//!                                           └─► download queue
//!                                                   │ permit-bounded spawn
//!                                                   ▼
//!                                              JoinSet ──► ProgressBatcher ──► progress
//!                                                   │
//!                                                   └────► writer (every N tiles)
//! ```

use super::limiter::{ConcurrencyLimiter, ConcurrencyPermit};
use super::progress::{ProgressBatcher, ProgressSink};
use super::request::{FetchConfig, FetchError, FetchRequest, FetchSummary};
use crate::coord::TileCoord;
use crate::provider::{ProviderError, TileSource};
use crate::store::{load_records, run_query, EnqueueOutcome, WriterRegistry};
use crate::tile::{TileRecord, TileVariant};
use std::collections::{HashMap, HashSet, VecDeque};
use std::mem;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Why one tile could not be downloaded.
#[derive(Debug)]
struct TileFailure {
    coord: TileCoord,
    attempts: u32,
    error: String,
}

/// Runs fetch passes against one tile source.
///
/// The limiter is shared by every pass run through the same fetcher, so
/// concurrent passes together stay within `max_concurrent` downloads.
pub struct StreamingFetcher<S: TileSource> {
    source: Arc<S>,
    registry: Arc<WriterRegistry>,
    config: FetchConfig,
    limiter: Arc<ConcurrencyLimiter>,
}

impl<S: TileSource> StreamingFetcher<S> {
    pub fn new(source: Arc<S>, registry: Arc<WriterRegistry>, config: FetchConfig) -> Self {
        let limiter = Arc::new(ConcurrencyLimiter::new(
            config.max_concurrent,
            "tile-download",
        ));
        Self {
            source,
            registry,
            config,
            limiter,
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    pub fn registry(&self) -> &Arc<WriterRegistry> {
        &self.registry
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Runs one pass and returns its counts.
    ///
    /// Tiles already stored are sent to `progress` as a single batch before
    /// any download starts. Downloaded tiles follow in batches of
    /// `progress_batch_size` or every `progress_interval`.
    pub async fn run(
        &self,
        request: FetchRequest,
        progress: &ProgressSink,
    ) -> Result<FetchSummary, FetchError> {
        request.validate()?;

        let FetchRequest {
            store_path,
            zoom,
            variant,
            coords,
            options,
        } = request;

        let coords = unique_in_order(coords);
        let mut summary = FetchSummary {
            requested: coords.len(),
            ..FetchSummary::default()
        };
        if coords.is_empty() {
            return Ok(summary);
        }

        let started = Instant::now();

        let mut existing = if options.cache_enabled {
            // The writer owns schema creation; make sure the file exists first.
            self.registry.get_or_create(&store_path)?;
            let lookup = coords.clone();
            run_query(&store_path, self.registry.settings(), move |conn| {
                load_records(conn, zoom, &lookup)
            })
            .await?
        } else {
            HashMap::new()
        };

        let mut present = Vec::new();
        let mut to_download = VecDeque::new();
        for coord in coords {
            match existing.get(&coord) {
                Some(record) if record.has_payload(variant) => present.push(record.clone()),
                _ if options.online_enabled => to_download.push_back(coord),
                _ => summary.skipped += 1,
            }
        }
        summary.present = present.len();

        debug!(
            zoom = zoom,
            variant = %variant,
            requested = summary.requested,
            present = summary.present,
            to_download = to_download.len(),
            skipped = summary.skipped,
            "Fetch pass partitioned"
        );

        let batcher = Arc::new(ProgressBatcher::new(
            progress.clone(),
            self.config.progress_batch_size,
            self.config.progress_interval,
        ));
        batcher.send_now(present);

        let mut downloads: JoinSet<Result<TileRecord, TileFailure>> = JoinSet::new();
        let mut pending_persist = Vec::new();

        while !to_download.is_empty() || !downloads.is_empty() {
            // Spawn only while permits are free
            while let Some(&coord) = to_download.front() {
                let Some(permit) = self.limiter.try_acquire() else {
                    break;
                };
                to_download.pop_front();
                let base = existing
                    .remove(&coord)
                    .unwrap_or_else(|| TileRecord::placeholder(coord));
                self.spawn_download(&mut downloads, base, variant, permit, &batcher);
            }

            if downloads.is_empty() {
                // Permits are held by another pass; wait for one to free up.
                let Some(&coord) = to_download.front() else {
                    break;
                };
                match self.limiter.acquire().await {
                    Some(permit) => {
                        to_download.pop_front();
                        let base = existing
                            .remove(&coord)
                            .unwrap_or_else(|| TileRecord::placeholder(coord));
                        self.spawn_download(&mut downloads, base, variant, permit, &batcher);
                    }
                    None => {
                        warn!(
                            remaining = to_download.len(),
                            "Download limiter closed, abandoning remaining tiles"
                        );
                        summary.failed += to_download.len();
                        to_download.clear();
                    }
                }
                continue;
            }

            let Some(joined) = downloads.join_next().await else {
                continue;
            };
            match joined {
                Ok(Ok(record)) => {
                    summary.downloaded += 1;
                    if options.cache_enabled {
                        pending_persist.push(record);
                        if pending_persist.len() >= self.config.persist_batch_size.max(1) {
                            self.persist(&store_path, mem::take(&mut pending_persist))
                                .await;
                        }
                    }
                }
                Ok(Err(failure)) => {
                    summary.failed += 1;
                    warn!(
                        tile = %failure.coord,
                        variant = %variant,
                        attempts = failure.attempts,
                        error = %failure.error,
                        "Tile download failed"
                    );
                }
                Err(join_error) => {
                    summary.failed += 1;
                    error!(error = %join_error, "Tile download task panicked");
                }
            }
        }

        batcher.finish();
        if options.cache_enabled {
            self.persist(&store_path, pending_persist).await;
        }

        info!(
            zoom = zoom,
            variant = %variant,
            requested = summary.requested,
            present = summary.present,
            downloaded = summary.downloaded,
            failed = summary.failed,
            skipped = summary.skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fetch pass complete"
        );

        Ok(summary)
    }

    fn spawn_download(
        &self,
        downloads: &mut JoinSet<Result<TileRecord, TileFailure>>,
        base: TileRecord,
        variant: TileVariant,
        permit: ConcurrencyPermit,
        batcher: &Arc<ProgressBatcher>,
    ) {
        let source = Arc::clone(&self.source);
        let batcher = Arc::clone(batcher);
        let attempts = self.config.max_retries + 1;
        let timeout = self.config.request_timeout;
        let backoff = self.config.retry_backoff;

        downloads.spawn(async move {
            let result = download_tile(source, base, variant, attempts, timeout, backoff).await;
            drop(permit);
            if let Ok(record) = &result {
                batcher.append(record.clone());
            }
            result
        });
    }

    /// Hands tiles to the writer without waiting for them to be applied.
    async fn persist(&self, store_path: &Path, tiles: Vec<TileRecord>) {
        if tiles.is_empty() {
            return;
        }
        let count = tiles.len();
        match self.registry.enqueue_batch(store_path, tiles).await {
            Ok(EnqueueOutcome::Accepted) | Ok(EnqueueOutcome::Empty) => {}
            Ok(outcome) => {
                debug!(tiles = count, outcome = ?outcome, "Downloaded tiles not persisted")
            }
            Err(e) => warn!(
                path = %store_path.display(),
                tiles = count,
                error = %e,
                "Failed to hand downloaded tiles to the writer"
            ),
        }
    }
}

/// Downloads one variant and merges it into `base`.
///
/// Remote errors and timeouts are retried with exponential backoff; an empty
/// body is not.
async fn download_tile<S: TileSource>(
    source: Arc<S>,
    mut base: TileRecord,
    variant: TileVariant,
    attempts: u32,
    timeout: Duration,
    backoff: Duration,
) -> Result<TileRecord, TileFailure> {
    let coord = base.coord;
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match tokio::time::timeout(timeout, source.fetch(coord, variant)).await {
            Ok(Ok(data)) if !data.is_empty() => {
                base.set_payload(variant, data);
                return Ok(base);
            }
            Ok(Ok(_)) | Ok(Err(ProviderError::EmptyResponse { .. })) => {
                return Err(TileFailure {
                    coord,
                    attempts: attempt,
                    error: ProviderError::EmptyResponse { coord }.to_string(),
                });
            }
            Ok(Err(e)) => last_error = e.to_string(),
            Err(_) => last_error = format!("timed out after {}ms", timeout.as_millis()),
        }

        if attempt < attempts {
            debug!(tile = %coord, attempt = attempt, error = %last_error, "Retrying tile download");
            let delay = backoff.saturating_mul(1 << (attempt - 1).min(6));
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    Err(TileFailure {
        coord,
        attempts,
        error: last_error,
    })
}

fn unique_in_order(coords: Vec<TileCoord>) -> Vec<TileCoord> {
    let mut seen = HashSet::with_capacity(coords.len());
    coords.into_iter().filter(|c| seen.insert(*c)).collect()
}
