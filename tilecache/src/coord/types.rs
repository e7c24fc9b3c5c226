//! Coordinate type definitions

use std::fmt;
use thiserror::Error;

/// Web Mercator valid latitude range
pub const MIN_LAT: f64 = -85.05112878;
pub const MAX_LAT: f64 = 85.05112878;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Supported zoom levels
pub const MIN_ZOOM: u8 = 0;
pub const MAX_ZOOM: u8 = 22;

/// Tile coordinates in the Web Mercator / Slippy Map grid.
///
/// The `(col, row, zoom)` triple is the identity of a tile everywhere in the
/// crate, including the uniqueness key of the persistent store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    /// X coordinate (east-west), 0 at west
    pub col: u32,
    /// Y coordinate (north-south), 0 at north
    pub row: u32,
    /// Zoom level
    pub zoom: u8,
}

impl TileCoord {
    /// Creates a tile coordinate.
    pub const fn new(col: u32, row: u32, zoom: u8) -> Self {
        Self { col, row, zoom }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.col, self.row)
    }
}

/// A geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Inclusive rectangle of tile indices at a single zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRect {
    pub x_min: u32,
    pub x_max: u32,
    pub y_min: u32,
    pub y_max: u32,
    pub zoom: u8,
}

impl TileRect {
    /// Number of columns covered by the rectangle.
    pub fn width(&self) -> u64 {
        u64::from(self.x_max - self.x_min) + 1
    }

    /// Number of rows covered by the rectangle.
    pub fn height(&self) -> u64 {
        u64::from(self.y_max - self.y_min) + 1
    }

    /// Total number of tiles inside the rectangle.
    pub fn area(&self) -> u64 {
        self.width() * self.height()
    }

    /// Returns true if the coordinate lies inside this rectangle.
    pub fn contains(&self, coord: &TileCoord) -> bool {
        coord.zoom == self.zoom
            && (self.x_min..=self.x_max).contains(&coord.col)
            && (self.y_min..=self.y_max).contains(&coord.row)
    }

    /// Iterates every coordinate of the rectangle in row-major order.
    pub fn coords(&self) -> TileRectIter {
        TileRectIter {
            rect: *self,
            col: self.x_min,
            row: self.y_min,
            done: false,
        }
    }
}

/// Row-major iterator over a [`TileRect`].
#[derive(Debug, Clone)]
pub struct TileRectIter {
    rect: TileRect,
    col: u32,
    row: u32,
    done: bool,
}

impl Iterator for TileRectIter {
    type Item = TileCoord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let coord = TileCoord::new(self.col, self.row, self.rect.zoom);

        if self.col < self.rect.x_max {
            self.col += 1;
        } else if self.row < self.rect.y_max {
            self.col = self.rect.x_min;
            self.row += 1;
        } else {
            self.done = true;
        }

        Some(coord)
    }
}

/// Errors that can occur during coordinate conversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Latitude is outside the Web Mercator range
    #[error("Invalid latitude: {0} (must be between {MIN_LAT} and {MAX_LAT})")]
    InvalidLatitude(f64),
    /// Longitude is outside -180..=180
    #[error("Invalid longitude: {0} (must be between {MIN_LON} and {MAX_LON})")]
    InvalidLongitude(f64),
    /// Zoom level is outside the supported range
    #[error("Invalid zoom level: {0} (must be between {MIN_ZOOM} and {MAX_ZOOM})")]
    InvalidZoom(u8),
}
