//! Named geographic regions downloaded over a zoom range.

use crate::coord::{tile_rectangle_for_bounds, CoordError, GeoPoint, TileRect, MAX_ZOOM};
use std::ops::RangeInclusive;
use thiserror::Error;

/// Errors from building a [`RegionDescriptor`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegionError {
    #[error("Region name is empty")]
    EmptyName,

    #[error("Invalid zoom range {min}..={max} (maximum zoom is {limit})")]
    InvalidZoomRange { min: u8, max: u8, limit: u8 },

    #[error(transparent)]
    Coord(#[from] CoordError),
}

/// A rectangular region and the zoom levels to cover.
///
/// Validated at construction and immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionDescriptor {
    name: String,
    top_left: GeoPoint,
    bottom_right: GeoPoint,
    min_zoom: u8,
    max_zoom: u8,
}

impl RegionDescriptor {
    pub fn new(
        name: impl Into<String>,
        top_left: GeoPoint,
        bottom_right: GeoPoint,
        min_zoom: u8,
        max_zoom: u8,
    ) -> Result<Self, RegionError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(RegionError::EmptyName);
        }
        if min_zoom > max_zoom || max_zoom > MAX_ZOOM {
            return Err(RegionError::InvalidZoomRange {
                min: min_zoom,
                max: max_zoom,
                limit: MAX_ZOOM,
            });
        }
        // Rejects non-finite or out-of-range corners up front.
        tile_rectangle_for_bounds(top_left, bottom_right, min_zoom)?;

        Ok(Self {
            name,
            top_left,
            bottom_right,
            min_zoom,
            max_zoom,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn top_left(&self) -> GeoPoint {
        self.top_left
    }

    pub fn bottom_right(&self) -> GeoPoint {
        self.bottom_right
    }

    pub fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    /// Zoom levels from `min_zoom` to `max_zoom` inclusive.
    pub fn zooms(&self) -> RangeInclusive<u8> {
        self.min_zoom..=self.max_zoom
    }

    /// Tile rectangle covering the region at `zoom`.
    pub fn rect(&self, zoom: u8) -> Result<TileRect, CoordError> {
        tile_rectangle_for_bounds(self.top_left, self.bottom_right, zoom)
    }

    /// Tiles in the region summed over every zoom level.
    pub fn total_tiles(&self) -> u64 {
        self.zooms()
            .filter_map(|z| self.rect(z).ok())
            .map(|r| r.area())
            .sum()
    }
}
