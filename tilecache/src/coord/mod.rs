//! Coordinate conversion module
//!
//! Provides conversions between geographic coordinates (latitude/longitude)
//! and Web Mercator tile coordinates, plus the rectangle math used to turn a
//! geographic region into the set of tiles covering it.

mod types;

pub use types::{
    CoordError, GeoPoint, TileCoord, TileRect, TileRectIter, MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT,
    MIN_LON, MIN_ZOOM,
};

use std::f64::consts::PI;

/// Converts geographic coordinates to tile coordinates.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Zoom level (0 to 22)
#[inline]
pub fn to_tile_coords(lat: f64, lon: f64, zoom: u8) -> Result<TileCoord, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let (col, row) = project(lat, lon, zoom);
    Ok(TileCoord { col, row, zoom })
}

/// Converts tile coordinates back to geographic coordinates.
///
/// Returns the latitude/longitude of the tile's northwest corner.
#[inline]
pub fn tile_to_lat_lon(tile: &TileCoord) -> (f64, f64) {
    let n = 2.0_f64.powi(tile.zoom as i32);

    let lon = tile.col as f64 / n * 360.0 - 180.0;

    let y = tile.row as f64 / n;
    let lat_rad = (PI * (1.0 - 2.0 * y)).sinh().atan();
    let lat = lat_rad * 180.0 / PI;

    (lat, lon)
}

/// Computes the inclusive tile rectangle covering a geographic bound.
///
/// Both corners are projected with `floor` and clamped to `[0, 2^zoom - 1]`,
/// so a point on the antimeridian or the southern edge still maps to a valid
/// index. Latitudes beyond the Web Mercator limit are clamped to it. The
/// corners may be given in any order; the result always has `min <= max`.
pub fn tile_rectangle_for_bounds(
    top_left: GeoPoint,
    bottom_right: GeoPoint,
    zoom: u8,
) -> Result<TileRect, CoordError> {
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }
    for point in [top_left, bottom_right] {
        if !point.lat.is_finite() || !(-90.0..=90.0).contains(&point.lat) {
            return Err(CoordError::InvalidLatitude(point.lat));
        }
        if !point.lon.is_finite() || !(MIN_LON..=MAX_LON).contains(&point.lon) {
            return Err(CoordError::InvalidLongitude(point.lon));
        }
    }

    let (x1, y1) = project(top_left.lat.clamp(MIN_LAT, MAX_LAT), top_left.lon, zoom);
    let (x2, y2) = project(
        bottom_right.lat.clamp(MIN_LAT, MAX_LAT),
        bottom_right.lon,
        zoom,
    );

    Ok(TileRect {
        x_min: x1.min(x2),
        x_max: x1.max(x2),
        y_min: y1.min(y2),
        y_max: y1.max(y2),
        zoom,
    })
}

/// Projects an already-validated position into clamped tile indices.
fn project(lat: f64, lon: f64, zoom: u8) -> (u32, u32) {
    let n = 2.0_f64.powi(zoom as i32);
    let max_index = (n - 1.0).max(0.0);

    let x = ((lon + 180.0) / 360.0 * n).floor().clamp(0.0, max_index);

    let lat_rad = lat * PI / 180.0;
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n)
        .floor()
        .clamp(0.0, max_index);

    (x as u32, y as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_york_city_at_zoom_16() {
        // New York City: 40.7128°N, 74.0060°W
        let tile = to_tile_coords(40.7128, -74.0060, 16).unwrap();
        assert_eq!(tile.row, 24640);
        assert_eq!(tile.col, 19295);
        assert_eq!(tile.zoom, 16);
    }

    #[test]
    fn test_london_at_zoom_10() {
        let tile = to_tile_coords(51.5074, -0.1278, 10).unwrap();
        assert_eq!(tile.col, 511);
        assert_eq!(tile.row, 340);
    }

    #[test]
    fn test_invalid_latitude() {
        let result = to_tile_coords(90.0, 0.0, 10);
        assert!(matches!(result, Err(CoordError::InvalidLatitude(_))));
    }

    #[test]
    fn test_invalid_zoom() {
        let result = to_tile_coords(0.0, 0.0, MAX_ZOOM + 1);
        assert!(matches!(result, Err(CoordError::InvalidZoom(_))));
    }

    #[test]
    fn test_tile_to_lat_lon_at_equator() {
        let tile = TileCoord::new(512, 512, 10);
        let (lat, lon) = tile_to_lat_lon(&tile);
        assert!(lat.abs() < 1.0, "Should be near equator");
        assert!(lon.abs() < 1.0, "Should be near prime meridian");
    }

    #[test]
    fn test_rectangle_matches_corner_tiles() {
        let top_left = GeoPoint::new(40.80, -74.05);
        let bottom_right = GeoPoint::new(40.70, -73.90);
        let rect = tile_rectangle_for_bounds(top_left, bottom_right, 14).unwrap();

        let tl = to_tile_coords(40.80, -74.05, 14).unwrap();
        let br = to_tile_coords(40.70, -73.90, 14).unwrap();
        assert_eq!(rect.x_min, tl.col);
        assert_eq!(rect.y_min, tl.row);
        assert_eq!(rect.x_max, br.col);
        assert_eq!(rect.y_max, br.row);
    }

    #[test]
    fn test_rectangle_corner_order_is_normalised() {
        let a = GeoPoint::new(48.0, 2.0);
        let b = GeoPoint::new(49.0, 3.0);
        let forward = tile_rectangle_for_bounds(b, a, 12).unwrap();
        let reversed = tile_rectangle_for_bounds(a, b, 12).unwrap();
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_rectangle_whole_world_at_zoom_1() {
        let rect =
            tile_rectangle_for_bounds(GeoPoint::new(90.0, -180.0), GeoPoint::new(-90.0, 180.0), 1)
                .unwrap();
        assert_eq!((rect.x_min, rect.x_max, rect.y_min, rect.y_max), (0, 1, 0, 1));
        assert_eq!(rect.area(), 4);
    }

    #[test]
    fn test_rectangle_zoom_zero_is_single_tile() {
        let rect =
            tile_rectangle_for_bounds(GeoPoint::new(10.0, 10.0), GeoPoint::new(-10.0, 20.0), 0)
                .unwrap();
        assert_eq!(rect.area(), 1);
    }

    #[test]
    fn test_rectangle_rejects_nan() {
        let result =
            tile_rectangle_for_bounds(GeoPoint::new(f64::NAN, 0.0), GeoPoint::new(0.0, 1.0), 5);
        assert!(matches!(result, Err(CoordError::InvalidLatitude(_))));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// The rectangle always contains the tiles of both corners.
            #[test]
            fn prop_rectangle_contains_corners(
                lat1 in -85.0f64..85.0f64,
                lon1 in -180.0f64..180.0f64,
                lat2 in -85.0f64..85.0f64,
                lon2 in -180.0f64..180.0f64,
                zoom in 0u8..=18u8,
            ) {
                let rect = tile_rectangle_for_bounds(
                    GeoPoint::new(lat1, lon1),
                    GeoPoint::new(lat2, lon2),
                    zoom,
                ).unwrap();
                let a = to_tile_coords(lat1, lon1, zoom).unwrap();
                let b = to_tile_coords(lat2, lon2, zoom).unwrap();
                prop_assert!(rect.contains(&a));
                prop_assert!(rect.contains(&b));
                prop_assert!(rect.area() >= 1);
            }
        }
    }
}
