//! Read helper running store queries on the blocking pool.

use super::error::StoreError;
use super::schema::{close_connection, open_read_only};
use super::settings::StoreSettings;
use rusqlite::Connection;
use std::path::PathBuf;
use tracing::{error, trace, warn};

/// Runs `read_fn` against a fresh read-only connection to `path`.
///
/// The work happens on tokio's blocking pool; the connection is closed
/// before the result is returned. Open failures, errors from `read_fn` and
/// a panicking `read_fn` are logged and come back as `Err`.
///
/// ```ignore
/// let stats = run_query(path, &settings, |conn| read::zoom_stats(conn)).await?;
/// ```
pub async fn run_query<T, F>(
    path: impl Into<PathBuf>,
    settings: &StoreSettings,
    read_fn: F,
) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
{
    let path = path.into();
    let task_path = path.clone();
    let settings = settings.clone();

    let joined = tokio::task::spawn_blocking(move || {
        let conn = open_read_only(&task_path, &settings)?;
        let result = read_fn(&conn);
        close_connection(conn, false);
        result
    })
    .await;

    match joined {
        Ok(Ok(value)) => {
            trace!(path = %path.display(), "Store query completed");
            Ok(value)
        }
        Ok(Err(e)) => {
            warn!(path = %path.display(), error = %e, "Store query failed");
            Err(e)
        }
        Err(join_error) => {
            error!(path = %path.display(), error = %join_error, "Store query panicked");
            Err(StoreError::QueryPanicked(join_error.to_string()))
        }
    }
}
