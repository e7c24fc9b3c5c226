//! Administrative rewrites of the `tiles` table.
//!
//! Only the writer runs these, on its own connection, so they never race
//! regular batch writes.

use super::error::StoreError;
use super::schema::CREATE_KEY_INDEX_SQL;
use crate::tile::TileVariant;
use rusqlite::Connection;
use tracing::info;

/// Merges rows sharing a `(column, row, zoom)` key into the oldest one.
///
/// For each payload the keeper row keeps its own bytes when non-empty,
/// otherwise it takes the first non-empty payload among its duplicates. The
/// unique key index is recreated afterwards. Returns the number of rows
/// removed.
pub fn deduplicate(conn: &mut Connection) -> Result<usize, StoreError> {
    let tx = conn.transaction()?;

    tx.execute_batch("DROP INDEX IF EXISTS idx_tiles_key")?;

    for variant in TileVariant::ALL {
        let col = variant.column();
        let sql = format!(
            "UPDATE tiles SET {col} = (
                 SELECT d.{col} FROM tiles d
                 WHERE d.tile_column = tiles.tile_column
                   AND d.tile_row = tiles.tile_row
                   AND d.zoom_level = tiles.zoom_level
                   AND length(d.{col}) > 0
                 ORDER BY d.id LIMIT 1)
             WHERE ({col} IS NULL OR length({col}) = 0)
               AND id IN (
                 SELECT MIN(id) FROM tiles
                 GROUP BY tile_column, tile_row, zoom_level
                 HAVING COUNT(*) > 1)",
            col = col
        );
        tx.execute(&sql, [])?;
    }

    let removed = tx.execute(
        "DELETE FROM tiles WHERE id NOT IN (
             SELECT MIN(id) FROM tiles GROUP BY tile_column, tile_row, zoom_level)",
        [],
    )?;

    tx.execute_batch(CREATE_KEY_INDEX_SQL)?;
    tx.commit()?;

    info!(removed = removed, "Deduplicated tile rows");
    Ok(removed)
}
