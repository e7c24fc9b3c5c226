//! Region download orchestration.
//!
//! A session runs in four phases:
//!
//! 1. **Baseline**: log what the store already holds per zoom
//! 2. **Coverage**: write placeholders for every tile of the region, then
//!    flush the writer so planning sees them
//! 3. **Fetching**: two chains, one per variant, run concurrently. Each walks
//!    the zoom range in order, counts the tiles still missing that variant
//!    and runs one fetch pass over the zoom's rectangle, which serves the
//!    stored tiles and downloads the rest
//! 4. **Done**: once both chains report completion the writer is flushed and
//!    the final report is sent
//!
//! ```text
//!                          ┌─► Plain chain:   z_min ─► … ─► z_max ─┐
//! baseline ─► coverage ─► ─┤                                       ├─► flush ─► Done
//!                          └─► Labeled chain: z_min ─► … ─► z_max ─┘
//! ```

use super::session::{ChainReport, PassReport, SessionEvent, SessionHandle, SessionReport, SessionSink};
use super::state::{ChainState, SessionState};
use crate::coverage::CoverageInitializer;
use crate::fetch::{FetchOptions, FetchRequest, StreamingFetcher};
use crate::provider::TileSource;
use crate::region::RegionDescriptor;
use crate::store::{missing_in_rect, run_query, zoom_stats, WriterRegistry, ZoomStats};
use crate::tile::TileVariant;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Number of variant chains per session.
const CHAIN_COUNT: usize = TileVariant::ALL.len();

/// Channels a running session reports through.
pub struct SessionContext {
    pub events: SessionSink,
    pub state: watch::Sender<SessionState>,
    pub cancel: CancellationToken,
}

/// Drives region download sessions.
pub struct DownloadOrchestrator<S: TileSource> {
    fetcher: Arc<StreamingFetcher<S>>,
    coverage: CoverageInitializer,
    options: FetchOptions,
}

impl<S: TileSource> DownloadOrchestrator<S> {
    pub fn new(fetcher: Arc<StreamingFetcher<S>>, options: FetchOptions) -> Self {
        let coverage = CoverageInitializer::new(Arc::clone(fetcher.registry()));
        Self {
            fetcher,
            coverage,
            options,
        }
    }

    fn registry(&self) -> &Arc<WriterRegistry> {
        self.fetcher.registry()
    }

    /// Starts a session on the runtime and returns its handle.
    pub fn spawn(self: &Arc<Self>, store_path: PathBuf, region: RegionDescriptor) -> SessionHandle {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let cancel = CancellationToken::new();
        let name = region.name().to_string();

        let context = SessionContext {
            events: events_tx,
            state: state_tx,
            cancel: cancel.clone(),
        };
        let orchestrator = Arc::clone(self);
        let task = tokio::spawn(async move { orchestrator.run(&store_path, &region, context).await });

        SessionHandle::new(name, events_rx, state_rx, cancel, task)
    }

    /// Runs a whole session to completion.
    pub async fn run(
        &self,
        store_path: &Path,
        region: &RegionDescriptor,
        context: SessionContext,
    ) -> SessionReport {
        let started = Instant::now();
        info!(
            region = region.name(),
            path = %store_path.display(),
            min_zoom = region.min_zoom(),
            max_zoom = region.max_zoom(),
            "Download session starting"
        );

        context.state.send_replace(SessionState::ComputingBaseline);
        if let Err(e) = self.registry().get_or_create(store_path) {
            warn!(path = %store_path.display(), error = %e, "Store writer unavailable");
        }
        let baseline = self.read_stats(store_path).await;
        log_zoom_stats(region, &baseline, "baseline");

        context.state.send_replace(SessionState::InitializingCoverage);
        let coverage = self.coverage.initialize(store_path, region).await;
        self.flush(store_path).await;

        context.state.send_replace(SessionState::Fetching);
        let completed = AtomicUsize::new(0);
        let (plain, labeled) = tokio::join!(
            self.run_chain(store_path, region, TileVariant::Plain, &context, &completed),
            self.run_chain(store_path, region, TileVariant::Labeled, &context, &completed),
        );

        let final_stats = self.read_stats(store_path).await;
        log_zoom_stats(region, &final_stats, "final");
        warn_incomplete_rows(region, &final_stats);

        let report = SessionReport {
            region: region.name().to_string(),
            coverage,
            chains: vec![plain, labeled],
            final_stats,
            elapsed: started.elapsed(),
        };

        info!(
            region = region.name(),
            downloaded = report.downloaded(),
            failed = report.failed(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Download session done"
        );
        context.state.send_replace(SessionState::Done);
        let _ = context.events.send(SessionEvent::Completed(report.clone()));
        report
    }

    async fn run_chain(
        &self,
        store_path: &Path,
        region: &RegionDescriptor,
        variant: TileVariant,
        context: &SessionContext,
        completed: &AtomicUsize,
    ) -> ChainReport {
        let mut report = ChainReport::new(variant);

        for zoom in region.zooms() {
            if context.cancel.is_cancelled() {
                info!(variant = %variant, zoom = zoom, "Chain cancelled");
                report.state = ChainState::Cancelled;
                break;
            }

            let rect = match region.rect(zoom) {
                Ok(rect) => rect,
                Err(e) => {
                    error!(variant = %variant, zoom = zoom, error = %e, "Chain planning failed");
                    report.state = ChainState::Stalled { zoom };
                    break;
                }
            };

            let plan = run_query(store_path, self.registry().settings(), move |conn| {
                missing_in_rect(conn, &rect, variant)
            })
            .await;
            let missing = match plan {
                Ok(missing) => missing,
                Err(e) => {
                    error!(variant = %variant, zoom = zoom, error = %e, "Chain planning failed");
                    report.state = ChainState::Stalled { zoom };
                    break;
                }
            };

            let expected = rect.area();
            let planned = missing.len();
            info!(
                "[{}] zoom {}: {}/{} tiles have data, downloading {} missing",
                variant,
                zoom,
                expected.saturating_sub(planned as u64),
                expected,
                planned
            );

            // The pass covers the whole rectangle so stored tiles are served
            // before the missing ones are downloaded.
            report.state = ChainState::Fetching { zoom };
            let _ = context.events.send(SessionEvent::Chain {
                variant,
                state: report.state,
            });

            let request = FetchRequest::new(store_path, zoom, variant, rect.coords().collect())
                .with_options(self.options);

            let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
            let fetch = async {
                let result = self.fetcher.run(request, &progress_tx).await;
                drop(progress_tx);
                result
            };
            let forward = async {
                while let Some(tiles) = progress_rx.recv().await {
                    let _ = context.events.send(SessionEvent::Tiles {
                        variant,
                        zoom,
                        tiles,
                    });
                }
            };
            let (result, ()) = tokio::join!(fetch, forward);

            match result {
                Ok(summary) => report.passes.push(PassReport {
                    zoom,
                    expected,
                    planned,
                    summary,
                }),
                Err(e) => {
                    error!(variant = %variant, zoom = zoom, error = %e, "Fetch pass failed");
                    report.state = ChainState::Stalled { zoom };
                    break;
                }
            }
        }

        if !report.state.is_terminal() {
            report.state = ChainState::Completed;
        }
        let _ = context.events.send(SessionEvent::Chain {
            variant,
            state: report.state,
        });
        info!(variant = %variant, state = %report.state, "Chain finished");

        if completed.fetch_add(1, Ordering::AcqRel) + 1 == CHAIN_COUNT {
            self.flush(store_path).await;
        }
        report
    }

    async fn read_stats(&self, store_path: &Path) -> Vec<ZoomStats> {
        match run_query(store_path, self.registry().settings(), |conn| zoom_stats(conn)).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(path = %store_path.display(), error = %e, "Could not read zoom stats");
                Vec::new()
            }
        }
    }

    async fn flush(&self, store_path: &Path) {
        if let Err(e) = self.registry().flush(store_path).await {
            warn!(path = %store_path.display(), error = %e, "Writer flush failed");
        }
    }
}

fn log_zoom_stats(region: &RegionDescriptor, stats: &[ZoomStats], phase: &str) {
    for zoom in region.zooms() {
        let Ok(rect) = region.rect(zoom) else {
            continue;
        };
        let row = stats.iter().find(|s| s.zoom == zoom).copied().unwrap_or_default();
        info!(
            phase = phase,
            "zoom {}: {}/{} tiles have data (plain {}, labeled {})",
            zoom,
            row.complete,
            rect.area(),
            row.plain,
            row.labeled
        );
    }
}

fn warn_incomplete_rows(region: &RegionDescriptor, stats: &[ZoomStats]) {
    for zoom in region.zooms() {
        let Ok(rect) = region.rect(zoom) else {
            continue;
        };
        let rows = stats
            .iter()
            .find(|s| s.zoom == zoom)
            .map(|s| s.rows)
            .unwrap_or(0);
        if rows < rect.area() {
            warn!(
                region = region.name(),
                zoom = zoom,
                rows = rows,
                expected = rect.area(),
                "Store holds fewer rows than the region needs"
            );
        }
    }
}
