//! Integration tests for region download sessions.
//!
//! These tests run whole sessions through the service facade:
//! - Coverage initialization leaves one row per tile of every zoom
//! - A small region ends with every tile stored and reported
//! - A warm store is served to the caller without downloading
//! - Failing tiles are counted without stopping the session
//! - Cancellation stops chains before their next pass

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tilecache::coord::{tile_to_lat_lon, GeoPoint, TileCoord};
use tilecache::coverage::CoverageInitializer;
use tilecache::fetch::{FetchConfig, FetchOptions};
use tilecache::orchestrator::{ChainState, SessionEvent, SessionState};
use tilecache::provider::{ProviderError, TileSource};
use tilecache::region::RegionDescriptor;
use tilecache::service::MapService;
use tilecache::store::{count_rows_in_rect, run_query, StoreSettings, WriterRegistry};
use tilecache::tile::TileVariant;

// =============================================================================
// Test Helpers
// =============================================================================

/// Serves 4-byte payloads, failing every tile in `failing_cols`.
#[derive(Default)]
struct FourByteSource {
    failing_cols: HashSet<u32>,
    delay: Duration,
    calls: AtomicUsize,
}

impl TileSource for FourByteSource {
    async fn fetch(&self, coord: TileCoord, variant: TileVariant) -> Result<Vec<u8>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing_cols.contains(&coord.col) {
            return Err(ProviderError::HttpError("HTTP 503".to_string()));
        }
        Ok(match variant {
            TileVariant::Plain => vec![1, 2, 3, 4],
            TileVariant::Labeled => vec![5, 6, 7, 8],
        })
    }

    fn name(&self) -> &str {
        "four-byte"
    }
}

/// Lets a test keep a handle on the source it gives the service.
struct SharedSource(Arc<FourByteSource>);

impl TileSource for SharedSource {
    async fn fetch(&self, coord: TileCoord, variant: TileVariant) -> Result<Vec<u8>, ProviderError> {
        self.0.fetch(coord, variant).await
    }

    fn name(&self) -> &str {
        self.0.name()
    }
}

fn fast_config() -> FetchConfig {
    FetchConfig {
        max_retries: 0,
        retry_backoff: Duration::from_millis(1),
        progress_interval: Duration::from_millis(20),
        ..FetchConfig::default()
    }
}

/// A region spanning exactly `cols x rows` tiles at `zoom`, starting at
/// (`col`, `row`).
fn tile_aligned_region(name: &str, col: u32, row: u32, cols: u32, rows: u32, zoom: u8) -> RegionDescriptor {
    let (north, west) = tile_to_lat_lon(&TileCoord::new(col, row, zoom));
    let (south, east) = tile_to_lat_lon(&TileCoord::new(col + cols, row + rows, zoom));
    let inset_lat = (north - south).abs() / (rows as f64 * 10.0);
    let inset_lon = (east - west).abs() / (cols as f64 * 10.0);
    RegionDescriptor::new(
        name,
        GeoPoint::new(north - inset_lat, west + inset_lon),
        GeoPoint::new(south + inset_lat, east - inset_lon),
        zoom,
        zoom,
    )
    .unwrap()
}

// =============================================================================
// Integration Tests
// =============================================================================

#[tokio::test]
async fn test_coverage_rows_match_rectangle_area() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(WriterRegistry::new(StoreSettings::in_directory(dir.path())));
    let path = dir.path().join("coverage.db");
    let region = RegionDescriptor::new(
        "coverage",
        GeoPoint::new(47.2, 6.8),
        GeoPoint::new(46.1, 8.9),
        4,
        10,
    )
    .unwrap();

    let reports = CoverageInitializer::new(Arc::clone(&registry))
        .initialize(&path, &region)
        .await;
    registry.flush(&path).await.unwrap();

    assert_eq!(reports.len(), 7);
    for zoom in region.zooms() {
        let rect = region.rect(zoom).unwrap();
        let rows = run_query(&path, registry.settings(), move |conn| count_rows_in_rect(conn, &rect))
            .await
            .unwrap();
        assert_eq!(rows, rect.area(), "zoom {zoom} not fully covered");
    }

    registry.shutdown_all().await;
}

#[tokio::test]
async fn test_two_by_two_region_end_to_end() {
    let dir = TempDir::new().unwrap();
    let service = MapService::new(
        FourByteSource::default(),
        StoreSettings::in_directory(dir.path()),
        fast_config(),
        FetchOptions::default(),
    );
    let region = tile_aligned_region("e2e", 530, 355, 2, 2, 10);
    assert_eq!(region.total_tiles(), 4);

    let mut handle = service.download_region(region).unwrap();
    let mut state = handle.watch_state();

    let mut plain_seen = HashSet::new();
    let mut plain_batches = 0;
    let mut report = None;
    while let Some(event) = handle.next_event().await {
        match event {
            SessionEvent::Tiles {
                variant: TileVariant::Plain,
                zoom,
                tiles,
            } => {
                assert_eq!(zoom, 10);
                plain_batches += 1;
                for tile in tiles {
                    assert_eq!(tile.payload(TileVariant::Plain), Some(&[1, 2, 3, 4][..]));
                    plain_seen.insert(tile.coord);
                }
            }
            SessionEvent::Completed(done) => report = Some(done),
            _ => {}
        }
    }

    state.wait_for(|s| s.is_done()).await.unwrap();
    assert_eq!(handle.state(), SessionState::Done);
    assert!(plain_batches >= 1);
    assert_eq!(plain_seen.len(), 4);

    let report = report.unwrap();
    assert_eq!(report.chain(TileVariant::Plain).unwrap().state, ChainState::Completed);
    assert_eq!(report.chain(TileVariant::Labeled).unwrap().state, ChainState::Completed);
    assert_eq!(report.downloaded(), 8);

    let stats = service.zoom_stats("e2e").await.unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].rows, 4);
    assert_eq!(stats[0].plain, 4);
    assert_eq!(stats[0].complete, 4);

    handle.wait().await.unwrap();
    service.shutdown().await;
}

#[tokio::test]
async fn test_second_session_serves_stored_tiles() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(FourByteSource::default());
    let service = MapService::new(
        SharedSource(Arc::clone(&source)),
        StoreSettings::in_directory(dir.path()),
        fast_config(),
        FetchOptions::default(),
    );

    let first = service
        .download_region(tile_aligned_region("again", 100, 200, 3, 2, 9))
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(first.downloaded(), 12);
    let calls_after_first = source.calls.load(Ordering::SeqCst);

    let mut handle = service
        .download_region(tile_aligned_region("again", 100, 200, 3, 2, 9))
        .unwrap();
    let mut served: HashMap<TileVariant, HashSet<TileCoord>> = HashMap::new();
    let mut report = None;
    while let Some(event) = handle.next_event().await {
        match event {
            SessionEvent::Tiles { variant, tiles, .. } => {
                for tile in tiles {
                    assert!(tile.has_payload(variant));
                    served.entry(variant).or_default().insert(tile.coord);
                }
            }
            SessionEvent::Completed(done) => report = Some(done),
            _ => {}
        }
    }

    let second = report.unwrap();
    assert_eq!(second.downloaded(), 0);
    assert_eq!(source.calls.load(Ordering::SeqCst), calls_after_first);
    assert_eq!(served[&TileVariant::Plain].len(), 6);
    assert_eq!(served[&TileVariant::Labeled].len(), 6);
    for chain in &second.chains {
        assert_eq!(chain.state, ChainState::Completed);
        assert_eq!(chain.passes.len(), 1);
        assert_eq!(chain.passes[0].planned, 0);
        assert_eq!(chain.passes[0].summary.present, 6);
    }

    service.shutdown().await;
}

#[tokio::test]
async fn test_failed_tiles_are_counted_and_left_missing() {
    let dir = TempDir::new().unwrap();
    let source = FourByteSource {
        failing_cols: HashSet::from([41]),
        ..FourByteSource::default()
    };
    let service = MapService::new(
        source,
        StoreSettings::in_directory(dir.path()),
        fast_config(),
        FetchOptions::default(),
    );

    let report = service
        .download_region(tile_aligned_region("flaky", 40, 60, 2, 2, 8))
        .unwrap()
        .wait()
        .await
        .unwrap();

    // Column 41 fails for both variants.
    assert_eq!(report.failed(), 4);
    assert_eq!(report.downloaded(), 4);
    assert!(report
        .chains
        .iter()
        .all(|c| c.state == ChainState::Completed));

    let stats = service.zoom_stats("flaky").await.unwrap();
    assert_eq!(stats[0].rows, 4);
    assert_eq!(stats[0].complete, 2);

    service.shutdown().await;
}

#[tokio::test]
async fn test_cancelled_session_still_finishes() {
    let dir = TempDir::new().unwrap();
    let source = FourByteSource {
        delay: Duration::from_millis(5),
        ..FourByteSource::default()
    };
    let service = MapService::new(
        source,
        StoreSettings::in_directory(dir.path()),
        fast_config(),
        FetchOptions::default(),
    );
    let region = RegionDescriptor::new(
        "cancelled",
        GeoPoint::new(46.0, 7.0),
        GeoPoint::new(45.9, 7.1),
        6,
        12,
    )
    .unwrap();

    let handle = service.download_region(region).unwrap();
    handle.cancel();
    assert!(handle.is_cancelled());
    let report = handle.wait().await.unwrap();

    assert!(report
        .chains
        .iter()
        .all(|c| c.state == ChainState::Cancelled));
    assert_eq!(report.downloaded(), 0);

    service.shutdown().await;
}

#[tokio::test]
async fn test_offline_session_downloads_nothing() {
    let dir = TempDir::new().unwrap();
    let service = MapService::new(
        FourByteSource::default(),
        StoreSettings::in_directory(dir.path()),
        fast_config(),
        FetchOptions::offline(),
    );

    let report = service
        .download_region(tile_aligned_region("offline", 10, 10, 2, 2, 6))
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(report.downloaded(), 0);
    assert_eq!(report.failed(), 0);
    let plain = report.chain(TileVariant::Plain).unwrap();
    assert_eq!(plain.state, ChainState::Completed);
    assert_eq!(plain.passes[0].summary.skipped, 4);

    // Coverage is still recorded.
    let stats = service.zoom_stats("offline").await.unwrap();
    assert_eq!(stats[0].rows, 4);
    assert_eq!(stats[0].plain, 0);

    service.shutdown().await;
}
