//! tilecache - Offline tile cache and region downloader
//!
//! Tiles addressed by column, row and zoom are kept in one SQLite store per
//! region. Tiles already stored are served immediately; the rest are fetched
//! from a remote source with bounded concurrency and persisted as they
//! arrive, through a single writer thread per store.
//!
//! # High-Level API
//!
//! For most use cases, the [`service`] module provides a simplified facade:
//!
//! ```ignore
//! use tilecache::config::ConfigFile;
//! use tilecache::coord::GeoPoint;
//! use tilecache::region::RegionDescriptor;
//! use tilecache::service::MapService;
//!
//! let service = MapService::from_config(&ConfigFile::load()?)?;
//! let region = RegionDescriptor::new(
//!     "alps",
//!     GeoPoint::new(47.0, 7.0),
//!     GeoPoint::new(46.0, 9.0),
//!     8,
//!     12,
//! )?;
//!
//! let mut handle = service.download_region(region)?;
//! while let Some(event) = handle.next_event().await {
//!     // render tiles as they arrive
//! }
//! service.shutdown().await;
//! ```

pub mod config;
pub mod coord;
pub mod coverage;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod orchestrator;
pub mod provider;
pub mod region;
pub mod service;
pub mod store;
pub mod tile;

pub use error::TileCacheError;

/// Version of the tilecache library and CLI.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
