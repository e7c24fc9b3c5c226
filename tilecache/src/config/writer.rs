//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[store]
; Directory holding one store file per region (default: ~/.tilecache/offline)
directory = {}
; Store file extension, without the dot
extension = {}
; Writer queue capacity in batches. Batches offered to a full queue are dropped
queue_capacity = {}
; How long an enqueue waits for queue space (milliseconds)
enqueue_timeout_ms = {}
; SQLite busy timeout (milliseconds)
busy_timeout_ms = {}
; How long shutdown waits for a writer to drain (seconds)
shutdown_timeout_secs = {}

[download]
; URL templates. Placeholders: {{x}} or {{col}}, {{y}} or {{row}}, {{z}} or {{zoom}},
; and {{s}} for subdomain rotation
plain_url = {}
labeled_url = {}
user_agent = {}
; Sent as Referer when set
referer = {}
; Per-request timeout (seconds)
timeout = {}
; Concurrent downloads (1-64)
max_concurrent = {}
; Retries after a failed download
max_retries = {}
; Tiles per progress batch
progress_batch_size = {}
; Maximum time between progress batches (milliseconds)
progress_interval_ms = {}
; Downloaded tiles per writer hand-off
persist_batch_size = {}

[session]
; Serve and persist tiles through the local store
cache_enabled = {}
; Download tiles the store does not hold
online_enabled = {}

[logging]
file = {}
"#,
        path_to_string(&config.store.directory),
        config.store.extension,
        config.store.queue_capacity,
        config.store.enqueue_timeout_ms,
        config.store.busy_timeout_ms,
        config.store.shutdown_timeout_secs,
        config.download.plain_url,
        config.download.labeled_url,
        config.download.user_agent,
        config.download.referer,
        config.download.timeout,
        config.download.max_concurrent,
        config.download.max_retries,
        config.download.progress_batch_size,
        config.download.progress_interval_ms,
        config.download.persist_batch_size,
        config.session.cache_enabled,
        config.session.online_enabled,
        path_to_string(&config.logging.file),
    )
}

/// Writes paths under the home directory with a `~/` prefix.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
