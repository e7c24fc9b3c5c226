//! Coverage initialization.
//!
//! Before a region is downloaded, every coordinate it covers gets a
//! placeholder row, so the store itself records the region's extent. Each
//! zoom level is handled by its own task: count the rows already inside the
//! zoom's rectangle, and if that falls short of the rectangle's area,
//! enumerate every coordinate and submit placeholders in chunks.
//! `INSERT OR IGNORE` takes care of the ones that already exist.

use crate::coord::TileRect;
use crate::region::RegionDescriptor;
use crate::store::{
    count_rows_in_rect, run_query, EnqueueOutcome, StoreError, StoreWriter, WriterRegistry,
};
use crate::tile::TileRecord;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Default placeholders per writer batch.
pub const DEFAULT_PLACEHOLDER_CHUNK: usize = 1000;

/// What coverage initialization did for one zoom level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoomCoverage {
    pub zoom: u8,
    /// Tiles in the zoom's rectangle
    pub expected: u64,
    /// Rows already inside the rectangle before initialization
    pub existing: u64,
    /// Placeholders accepted by the writer
    pub submitted: u64,
    /// Placeholders dropped because the writer queue was saturated
    pub dropped: u64,
    /// Set when this zoom could not be initialized
    pub error: Option<String>,
}

impl ZoomCoverage {
    fn new(zoom: u8) -> Self {
        Self {
            zoom,
            expected: 0,
            existing: 0,
            submitted: 0,
            dropped: 0,
            error: None,
        }
    }

    /// True when the rectangle was already fully covered.
    pub fn was_complete(&self) -> bool {
        self.error.is_none() && self.existing >= self.expected
    }
}

/// Writes placeholder rows for every tile of a region.
pub struct CoverageInitializer {
    registry: Arc<WriterRegistry>,
    chunk_size: usize,
}

impl CoverageInitializer {
    pub fn new(registry: Arc<WriterRegistry>) -> Self {
        Self {
            registry,
            chunk_size: DEFAULT_PLACEHOLDER_CHUNK,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Initializes every zoom of `region` in `store_path`.
    ///
    /// Zoom levels are independent: a failure is logged and reported in that
    /// zoom's entry while the others continue. Results are sorted by zoom.
    pub async fn initialize(
        &self,
        store_path: &Path,
        region: &RegionDescriptor,
    ) -> Vec<ZoomCoverage> {
        let writer = match self.registry.get_or_create(store_path) {
            Ok(writer) => writer,
            Err(e) => {
                warn!(path = %store_path.display(), error = %e, "Coverage initialization skipped");
                return region
                    .zooms()
                    .map(|zoom| ZoomCoverage {
                        error: Some(e.to_string()),
                        ..ZoomCoverage::new(zoom)
                    })
                    .collect();
            }
        };

        let mut tasks = JoinSet::new();
        for zoom in region.zooms() {
            let rect = match region.rect(zoom) {
                Ok(rect) => rect,
                Err(e) => {
                    let report = ZoomCoverage {
                        error: Some(e.to_string()),
                        ..ZoomCoverage::new(zoom)
                    };
                    tasks.spawn(async move { report });
                    continue;
                }
            };

            let registry = Arc::clone(&self.registry);
            let writer = Arc::clone(&writer);
            let path = store_path.to_path_buf();
            let chunk_size = self.chunk_size;

            tasks.spawn(async move {
                match cover_zoom(&registry, &writer, path, rect, chunk_size).await {
                    Ok(report) => report,
                    Err((mut report, e)) => {
                        warn!(zoom = zoom, error = %e, "Coverage initialization failed for zoom");
                        report.error = Some(e.to_string());
                        report
                    }
                }
            });
        }

        let mut reports = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => warn!(error = %e, "Coverage task panicked"),
            }
        }
        reports.sort_by_key(|r| r.zoom);

        let submitted: u64 = reports.iter().map(|r| r.submitted).sum();
        info!(
            region = region.name(),
            zooms = reports.len(),
            placeholders = submitted,
            "Coverage initialization complete"
        );
        reports
    }
}

async fn cover_zoom(
    registry: &WriterRegistry,
    writer: &StoreWriter,
    path: PathBuf,
    rect: TileRect,
    chunk_size: usize,
) -> Result<ZoomCoverage, (ZoomCoverage, StoreError)> {
    let mut report = ZoomCoverage::new(rect.zoom);
    report.expected = rect.area();

    let counted =
        run_query(path, registry.settings(), move |conn| count_rows_in_rect(conn, &rect)).await;
    let existing = match counted {
        Ok(count) => count,
        Err(e) => return Err((report, e)),
    };
    report.existing = existing;

    if report.existing >= report.expected {
        debug!(
            zoom = rect.zoom,
            tiles = report.expected,
            "Zoom already covered"
        );
        return Ok(report);
    }

    let mut chunk = Vec::with_capacity(chunk_size.min(report.expected as usize));
    for coord in rect.coords() {
        chunk.push(TileRecord::placeholder(coord));
        if chunk.len() >= chunk_size {
            if let Err(e) = submit(writer, mem::take(&mut chunk), &mut report).await {
                return Err((report, e));
            }
        }
    }
    if let Err(e) = submit(writer, chunk, &mut report).await {
        return Err((report, e));
    }

    debug!(
        zoom = rect.zoom,
        expected = report.expected,
        existing = report.existing,
        submitted = report.submitted,
        dropped = report.dropped,
        "Placeholders submitted"
    );
    Ok(report)
}

async fn submit(
    writer: &StoreWriter,
    tiles: Vec<TileRecord>,
    report: &mut ZoomCoverage,
) -> Result<(), StoreError> {
    let count = tiles.len() as u64;
    match writer.enqueue(tiles).await {
        EnqueueOutcome::Accepted => report.submitted += count,
        EnqueueOutcome::Dropped => report.dropped += count,
        EnqueueOutcome::Empty => {}
        EnqueueOutcome::Closed => return Err(StoreError::WriterClosed(writer.path().to_path_buf())),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::GeoPoint;
    use crate::store::StoreSettings;
    use tempfile::TempDir;

    fn region(min_zoom: u8, max_zoom: u8) -> RegionDescriptor {
        RegionDescriptor::new(
            "test",
            GeoPoint::new(46.5, 7.5),
            GeoPoint::new(46.0, 8.5),
            min_zoom,
            max_zoom,
        )
        .unwrap()
    }

    async fn row_count(registry: &WriterRegistry, path: &Path) -> i64 {
        run_query(path, registry.settings(), |conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM tiles", [], |row| row.get(0))?)
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_placeholders_cover_every_zoom() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(WriterRegistry::new(StoreSettings::in_directory(dir.path())));
        let path = dir.path().join("coverage.db");
        let region = region(6, 9);

        let reports = CoverageInitializer::new(Arc::clone(&registry))
            .with_chunk_size(7)
            .initialize(&path, &region)
            .await;
        registry.flush(&path).await.unwrap();

        assert_eq!(reports.len(), 4);
        assert_eq!(
            reports.iter().map(|r| r.zoom).collect::<Vec<_>>(),
            vec![6, 7, 8, 9]
        );
        assert!(reports.iter().all(|r| r.error.is_none()));
        assert_eq!(row_count(&registry, &path).await as u64, region.total_tiles());

        registry.shutdown_all().await;
    }

    #[tokio::test]
    async fn test_second_run_submits_nothing() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(WriterRegistry::new(StoreSettings::in_directory(dir.path())));
        let path = dir.path().join("again.db");
        let region = region(7, 8);
        let initializer = CoverageInitializer::new(Arc::clone(&registry));

        initializer.initialize(&path, &region).await;
        registry.flush(&path).await.unwrap();

        let reports = initializer.initialize(&path, &region).await;
        assert!(reports.iter().all(|r| r.was_complete()));
        assert!(reports.iter().all(|r| r.submitted == 0));

        registry.shutdown_all().await;
    }
}
