//! Store file layout and connection lifecycle.
//!
//! Every region store is a single SQLite file with one `tiles` table. The
//! writer opens it read-write through [`ensure_schema`]; readers open fresh
//! read-only connections through [`open_read_only`].

use super::error::StoreError;
use super::settings::StoreSettings;
use rusqlite::{Connection, OpenFlags};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Table and unique key index.
///
/// The unique index is what makes `INSERT OR IGNORE` a safe upsert for
/// placeholders written concurrently by coverage and fetch passes.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS tiles (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    tile_column     INTEGER NOT NULL,
    tile_row        INTEGER NOT NULL,
    zoom_level      INTEGER NOT NULL,
    plain_payload   BLOB,
    labeled_payload BLOB
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_tiles_key
    ON tiles (tile_column, tile_row, zoom_level);
";

/// Statement recreating the unique key index after maintenance.
pub(crate) const CREATE_KEY_INDEX_SQL: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_tiles_key ON tiles (tile_column, tile_row, zoom_level)";

/// Opens (creating if needed) a store file and makes sure the schema exists.
///
/// Safe to call repeatedly. Pragma and DDL failures are logged and do not
/// abort; the caller still gets a usable connection. Failing to create the
/// parent directory or to open the file is an error.
pub fn ensure_schema(path: &Path, settings: &StoreSettings) -> Result<Connection, StoreError> {
    if path.as_os_str().is_empty() {
        return Err(StoreError::InvalidPath("store path is empty".into()));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let conn = Connection::open(path).map_err(|source| StoreError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    if let Err(e) = conn.busy_timeout(settings.busy_timeout) {
        warn!(path = %path.display(), error = %e, "Failed to set busy timeout");
    }

    match conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
    {
        Ok(mode) if mode.eq_ignore_ascii_case("wal") => {}
        Ok(mode) => {
            warn!(path = %path.display(), mode = %mode, "Store did not switch to WAL journaling")
        }
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to enable WAL journaling"),
    }

    if let Err(e) = conn.pragma_update(None, "synchronous", "NORMAL") {
        warn!(path = %path.display(), error = %e, "Failed to set synchronous mode");
    }

    if let Err(e) = conn.execute_batch(SCHEMA_SQL) {
        warn!(path = %path.display(), error = %e, "Failed to create tile schema");
    }

    debug!(path = %path.display(), "Store schema ready");
    Ok(conn)
}

/// Opens an existing store for reading only. No DDL is run.
pub fn open_read_only(path: &Path, settings: &StoreSettings) -> Result<Connection, StoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(path, flags).map_err(|source| StoreError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    if let Err(e) = conn.busy_timeout(settings.busy_timeout) {
        warn!(path = %path.display(), error = %e, "Failed to set busy timeout");
    }
    Ok(conn)
}

/// Merges the write-ahead log into the main file.
pub fn checkpoint(conn: &Connection) -> Result<(), StoreError> {
    let busy: i64 = conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |row| row.get(0))?;
    if busy != 0 {
        debug!("WAL checkpoint could not complete, readers still active");
    }
    Ok(())
}

/// Closes a connection, optionally checkpointing first. Errors are logged.
pub fn close_connection(conn: Connection, checkpoint_first: bool) {
    if checkpoint_first {
        if let Err(e) = checkpoint(&conn) {
            warn!(error = %e, "WAL checkpoint before close failed");
        }
    }

    if let Err((_conn, e)) = conn.close() {
        warn!(error = %e, "Failed to close store connection");
    }
}
