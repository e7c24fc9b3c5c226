//! Read primitives over the `tiles` table.
//!
//! These take a borrowed connection so they can run inside
//! [`run_query`](super::run_query) on the blocking pool.

use super::error::StoreError;
use crate::coord::{TileCoord, TileRect};
use crate::tile::{TileRecord, TileVariant};
use rusqlite::{params, params_from_iter, Connection};
use std::collections::{HashMap, HashSet};

/// Candidate lists shorter than this are looked up in one statement.
pub const BULK_LOOKUP_LIMIT: usize = 500;

/// Chunk size for longer candidate lists.
pub const LOOKUP_CHUNK_SIZE: usize = 250;

/// Per-zoom row and payload counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ZoomStats {
    pub zoom: u8,
    /// Rows, placeholders included
    pub rows: u64,
    /// Rows with a non-empty plain payload
    pub plain: u64,
    /// Rows with a non-empty labeled payload
    pub labeled: u64,
    /// Rows with both payloads
    pub complete: u64,
}

impl ZoomStats {
    /// Rows carrying the given variant.
    pub fn with_variant(&self, variant: TileVariant) -> u64 {
        match variant {
            TileVariant::Plain => self.plain,
            TileVariant::Labeled => self.labeled,
        }
    }
}

/// Looks up existing rows for a set of coordinates at one zoom.
///
/// Coordinates with no row are simply absent from the map.
pub fn load_records(
    conn: &Connection,
    zoom: u8,
    coords: &[TileCoord],
) -> Result<HashMap<TileCoord, TileRecord>, StoreError> {
    let mut found = HashMap::with_capacity(coords.len());
    if coords.is_empty() {
        return Ok(found);
    }

    if coords.len() < BULK_LOOKUP_LIMIT {
        lookup_chunk(conn, zoom, coords, &mut found)?;
    } else {
        for chunk in coords.chunks(LOOKUP_CHUNK_SIZE) {
            lookup_chunk(conn, zoom, chunk, &mut found)?;
        }
    }
    Ok(found)
}

fn lookup_chunk(
    conn: &Connection,
    zoom: u8,
    chunk: &[TileCoord],
    found: &mut HashMap<TileCoord, TileRecord>,
) -> Result<(), StoreError> {
    let clauses = vec!["(tile_column = ? AND tile_row = ?)"; chunk.len()].join(" OR ");
    let sql = format!(
        "SELECT tile_column, tile_row, plain_payload, labeled_payload \
         FROM tiles WHERE zoom_level = ? AND ({})",
        clauses
    );

    let mut values: Vec<i64> = Vec::with_capacity(chunk.len() * 2 + 1);
    values.push(i64::from(zoom));
    for coord in chunk {
        values.push(i64::from(coord.col));
        values.push(i64::from(coord.row));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
        Ok(TileRecord {
            coord: TileCoord::new(row.get(0)?, row.get(1)?, zoom),
            plain: row.get(2)?,
            labeled: row.get(3)?,
        })
    })?;

    for record in rows {
        let record = record?;
        found.insert(record.coord, record);
    }
    Ok(())
}

/// Counts rows inside a tile rectangle, placeholders included.
pub fn count_rows_in_rect(conn: &Connection, rect: &TileRect) -> Result<u64, StoreError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM tiles \
         WHERE zoom_level = ?1 AND tile_column BETWEEN ?2 AND ?3 AND tile_row BETWEEN ?4 AND ?5",
        params![rect.zoom, rect.x_min, rect.x_max, rect.y_min, rect.y_max],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as u64)
}

/// Coordinates inside `rect` whose `variant` payload is absent or empty.
///
/// Coordinates without any row count as missing too, so the plan does not
/// depend on placeholders having been written first. Row-major order.
pub fn missing_in_rect(
    conn: &Connection,
    rect: &TileRect,
    variant: TileVariant,
) -> Result<Vec<TileCoord>, StoreError> {
    let present = coords_with_payload(conn, rect, variant)?;
    Ok(rect
        .coords()
        .filter(|coord| !present.contains(&(coord.col, coord.row)))
        .collect())
}

fn coords_with_payload(
    conn: &Connection,
    rect: &TileRect,
    variant: TileVariant,
) -> Result<HashSet<(u32, u32)>, StoreError> {
    let sql = format!(
        "SELECT tile_column, tile_row FROM tiles \
         WHERE zoom_level = ?1 AND tile_column BETWEEN ?2 AND ?3 AND tile_row BETWEEN ?4 AND ?5 \
         AND length({col}) > 0",
        col = variant.column()
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![rect.zoom, rect.x_min, rect.x_max, rect.y_min, rect.y_max],
        |row| Ok((row.get::<_, u32>(0)?, row.get::<_, u32>(1)?)),
    )?;

    let mut present = HashSet::new();
    for row in rows {
        present.insert(row?);
    }
    Ok(present)
}

/// Row and payload counts for every zoom present in the store.
pub fn zoom_stats(conn: &Connection) -> Result<Vec<ZoomStats>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT zoom_level, COUNT(*), \
             SUM(CASE WHEN length(plain_payload) > 0 THEN 1 ELSE 0 END), \
             SUM(CASE WHEN length(labeled_payload) > 0 THEN 1 ELSE 0 END), \
             SUM(CASE WHEN length(plain_payload) > 0 AND length(labeled_payload) > 0 \
                 THEN 1 ELSE 0 END) \
         FROM tiles GROUP BY zoom_level ORDER BY zoom_level",
    )?;

    let rows = stmt.query_map([], |row| {
        let count = |idx: usize| -> rusqlite::Result<u64> {
            Ok(row.get::<_, Option<i64>>(idx)?.unwrap_or(0).max(0) as u64)
        };
        Ok(ZoomStats {
            zoom: row.get(0)?,
            rows: count(1)?,
            plain: count(2)?,
            labeled: count(3)?,
            complete: count(4)?,
        })
    })?;

    let mut stats = Vec::new();
    for row in rows {
        stats.push(row?);
    }
    Ok(stats)
}

/// Stats for one zoom, zeroed when the store has no rows at that level.
pub fn zoom_stats_for(conn: &Connection, zoom: u8) -> Result<ZoomStats, StoreError> {
    Ok(zoom_stats(conn)?
        .into_iter()
        .find(|s| s.zoom == zoom)
        .unwrap_or(ZoomStats {
            zoom,
            ..ZoomStats::default()
        }))
}
