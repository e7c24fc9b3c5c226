//! Provider types and traits

use crate::coord::TileCoord;
use crate::tile::TileVariant;
use std::fmt;
use std::future::Future;

/// Errors that can occur while fetching a tile from the remote source.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// HTTP request failed or returned a non-success status
    HttpError(String),
    /// The source answered with a zero-length body
    EmptyResponse { coord: TileCoord },
    /// Zoom level not supported by this source
    UnsupportedZoom(u8),
    /// URL template is unusable
    InvalidTemplate(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::HttpError(msg) => write!(f, "HTTP error: {}", msg),
            ProviderError::EmptyResponse { coord } => {
                write!(f, "Empty response body for tile {}", coord)
            }
            ProviderError::UnsupportedZoom(zoom) => {
                write!(f, "Zoom level {} not supported by source", zoom)
            }
            ProviderError::InvalidTemplate(msg) => write!(f, "Invalid URL template: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Remote source of tile imagery.
///
/// Given a coordinate and a variant, returns the raw encoded image bytes.
/// Implementations must be cheap to share across tasks.
pub trait TileSource: Send + Sync + 'static {
    /// Fetches the bytes for one tile variant.
    fn fetch(
        &self,
        coord: TileCoord,
        variant: TileVariant,
    ) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send;

    /// Returns the source's name for logging and identification.
    fn name(&self) -> &str;

    /// Returns the minimum supported zoom level.
    fn min_zoom(&self) -> u8 {
        0
    }

    /// Returns the maximum supported zoom level.
    fn max_zoom(&self) -> u8 {
        crate::coord::MAX_ZOOM
    }

    /// Checks if this source supports the given zoom level.
    fn supports_zoom(&self, zoom: u8) -> bool {
        zoom >= self.min_zoom() && zoom <= self.max_zoom()
    }
}
