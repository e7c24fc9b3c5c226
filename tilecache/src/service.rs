//! Service facade.
//!
//! [`MapService`] owns everything a process needs to serve and download
//! tiles: the writer registry, the tile source and the fetcher built on top
//! of it. Nothing is global, so tests and embedders can run several services
//! side by side against different store directories.
//!
//! # Example
//!
//! ```ignore
//! use tilecache::config::ConfigFile;
//! use tilecache::service::MapService;
//!
//! let config = ConfigFile::load()?;
//! let service = MapService::from_config(&config)?;
//!
//! let handle = service.download_region(region)?;
//! let report = handle.wait().await?;
//! service.shutdown().await;
//! ```

use crate::config::ConfigFile;
use crate::coord::TileCoord;
use crate::error::TileCacheError;
use crate::fetch::{
    FetchConfig, FetchOptions, FetchRequest, FetchSummary, ProgressSink, StreamingFetcher,
};
use crate::orchestrator::{DownloadOrchestrator, SessionHandle};
use crate::provider::{AsyncReqwestClient, TileSource, UrlTemplateSource};
use crate::region::RegionDescriptor;
use crate::store::{run_query, zoom_stats, StoreSettings, WriterRegistry, ZoomStats};
use crate::tile::TileVariant;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// The source built from the `[download]` config section.
pub type HttpTileSource = UrlTemplateSource<AsyncReqwestClient>;

/// High-level facade over the store, fetcher and orchestrator.
pub struct MapService<S: TileSource> {
    registry: Arc<WriterRegistry>,
    fetcher: Arc<StreamingFetcher<S>>,
    orchestrator: Arc<DownloadOrchestrator<S>>,
    options: FetchOptions,
}

impl MapService<HttpTileSource> {
    /// Wires a service from the user's configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a URL template is unusable, and a
    /// remote fetch error when the HTTP client cannot be built.
    pub fn from_config(config: &ConfigFile) -> Result<Self, TileCacheError> {
        let client = AsyncReqwestClient::with_timeout(config.download.timeout)?;
        let source = UrlTemplateSource::new(
            client,
            config.download.plain_url.clone(),
            config.download.labeled_url.clone(),
        )?
        .with_user_agent(config.download.user_agent.clone())
        .with_referer(config.download.referer.clone());

        Ok(Self::new(
            source,
            config.store_settings(),
            config.fetch_config(),
            config.fetch_options(),
        ))
    }
}

impl<S: TileSource> MapService<S> {
    pub fn new(
        source: S,
        settings: StoreSettings,
        fetch_config: FetchConfig,
        options: FetchOptions,
    ) -> Self {
        let registry = Arc::new(WriterRegistry::new(settings));
        let fetcher = Arc::new(StreamingFetcher::new(
            Arc::new(source),
            Arc::clone(&registry),
            fetch_config,
        ));
        let orchestrator = Arc::new(DownloadOrchestrator::new(Arc::clone(&fetcher), options));

        info!(
            directory = %registry.settings().directory.display(),
            source = fetcher.source_name(),
            max_concurrent = fetcher.config().max_concurrent,
            "Map service ready"
        );

        Self {
            registry,
            fetcher,
            orchestrator,
            options,
        }
    }

    pub fn registry(&self) -> &Arc<WriterRegistry> {
        &self.registry
    }

    pub fn fetcher(&self) -> &Arc<StreamingFetcher<S>> {
        &self.fetcher
    }

    pub fn settings(&self) -> &StoreSettings {
        self.registry.settings()
    }

    /// Default options for passes started through this service.
    pub fn options(&self) -> FetchOptions {
        self.options
    }

    /// The store file for a region name.
    pub fn store_path(&self, name: &str) -> Result<PathBuf, TileCacheError> {
        Ok(self.settings().store_path(name)?)
    }

    /// Starts a download session for `region` in the background.
    ///
    /// Passes use the service's default options. Offline sessions only serve
    /// what the store holds; sessions without the cache still record
    /// coverage but neither read nor persist payloads.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn download_region(&self, region: RegionDescriptor) -> Result<SessionHandle, TileCacheError> {
        if !self.options.cache_enabled && !self.options.online_enabled {
            return Err(TileCacheError::Configuration(
                "cache and online access are both disabled".into(),
            ));
        }
        let path = self.store_path(region.name())?;
        Ok(self.orchestrator.spawn(path, region))
    }

    /// Runs one fetch pass against a region's store.
    ///
    /// `options` overrides the service defaults for this pass only.
    pub async fn fetch(
        &self,
        name: &str,
        zoom: u8,
        variant: TileVariant,
        coords: Vec<TileCoord>,
        options: Option<FetchOptions>,
        progress: &ProgressSink,
    ) -> Result<FetchSummary, TileCacheError> {
        let path = self.store_path(name)?;
        let request = FetchRequest::new(path, zoom, variant, coords)
            .with_options(options.unwrap_or(self.options));
        Ok(self.fetcher.run(request, progress).await?)
    }

    /// Per-zoom counts for a region's store. A store that does not exist yet
    /// has no rows.
    pub async fn zoom_stats(&self, name: &str) -> Result<Vec<ZoomStats>, TileCacheError> {
        let path = self.store_path(name)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        Ok(run_query(path, self.settings(), |conn| zoom_stats(conn)).await?)
    }

    /// Merges duplicate key rows in a region's store through its writer.
    ///
    /// Returns the number of rows removed.
    pub async fn deduplicate(&self, name: &str) -> Result<usize, TileCacheError> {
        let path = self.store_path(name)?;
        let writer = self.registry.get_or_create(&path)?;
        Ok(writer.deduplicate().await?)
    }

    /// Merges the write-ahead log into a region's store file.
    pub async fn checkpoint(&self, name: &str) -> Result<(), TileCacheError> {
        let path = self.store_path(name)?;
        let writer = self.registry.get_or_create(&path)?;
        Ok(writer.checkpoint().await?)
    }

    /// Drains and stops every writer.
    pub async fn shutdown(&self) {
        self.registry.shutdown_all().await;
        info!("Map service stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::GeoPoint;
    use crate::provider::ProviderError;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    struct FixedSource;

    impl TileSource for FixedSource {
        async fn fetch(&self, _coord: TileCoord, variant: TileVariant) -> Result<Vec<u8>, ProviderError> {
            Ok(match variant {
                TileVariant::Plain => vec![1, 2, 3, 4],
                TileVariant::Labeled => vec![5, 6, 7, 8],
            })
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn service(dir: &TempDir, options: FetchOptions) -> MapService<FixedSource> {
        let config = FetchConfig {
            progress_interval: Duration::from_millis(20),
            ..FetchConfig::default()
        };
        MapService::new(FixedSource, StoreSettings::in_directory(dir.path()), config, options)
    }

    #[test]
    fn test_store_path_rejects_bad_names() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, FetchOptions::default());

        assert_eq!(
            service.store_path("alps").unwrap(),
            dir.path().join("alps.db")
        );
        assert!(service.store_path("../escape").unwrap_err().is_configuration());
    }

    #[tokio::test]
    async fn test_zoom_stats_of_missing_store_is_empty() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, FetchOptions::default());

        assert!(service.zoom_stats("nowhere").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_download_region_rejects_disabled_options() {
        let dir = TempDir::new().unwrap();
        let options = FetchOptions {
            cache_enabled: false,
            online_enabled: false,
        };
        let service = service(&dir, options);
        let region = RegionDescriptor::new(
            "offline",
            GeoPoint::new(46.5, 7.5),
            GeoPoint::new(46.4, 7.6),
            8,
            8,
        )
        .unwrap();

        assert!(service.download_region(region).unwrap_err().is_configuration());
    }

    #[tokio::test]
    async fn test_download_then_stats() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, FetchOptions::default());
        let region = RegionDescriptor::new(
            "small",
            GeoPoint::new(46.5, 7.5),
            GeoPoint::new(46.4, 7.6),
            5,
            6,
        )
        .unwrap();
        let expected = region.total_tiles();

        let handle = service.download_region(region).unwrap();
        let report = handle.wait().await.unwrap();

        assert_eq!(report.downloaded() as u64, expected * 2);
        assert_eq!(report.failed(), 0);

        let stats = service.zoom_stats("small").await.unwrap();
        let complete: u64 = stats.iter().map(|s| s.complete).sum();
        assert_eq!(complete, expected);

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_fetch_uses_override_options() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, FetchOptions::default());
        let (tx, _rx) = mpsc::unbounded_channel();

        let summary = service
            .fetch(
                "direct",
                9,
                TileVariant::Plain,
                vec![TileCoord::new(1, 1, 9)],
                Some(FetchOptions::no_cache()),
                &tx,
            )
            .await
            .unwrap();

        assert_eq!(summary.downloaded, 1);
        assert!(!service.store_path("direct").unwrap().exists());
    }
}
