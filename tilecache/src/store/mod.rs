//! Persistent tile store
//!
//! One SQLite file per region, holding a single `tiles` table keyed by
//! `(column, row, zoom)`. Writes go through exactly one [`StoreWriter`] per
//! file, obtained from the [`WriterRegistry`]; reads use short-lived
//! read-only connections via [`run_query`].
//!
//! # Architecture
//!
//! ```text
//! fetch pass ──┐                          ┌──────────────────┐
//!              ├─► WriterRegistry ──────► │ StoreWriter      │──► region.db
//! coverage ────┘   (one per path)  queue  │ (own OS thread)  │      ▲
//!                                         └──────────────────┘      │
//! planner / stats ──► run_query (blocking pool, read-only) ─────────┘
//! ```

mod error;
mod maintenance;
mod query;
pub mod read;
mod registry;
mod schema;
mod settings;
mod writer;

pub use error::StoreError;
pub use maintenance::deduplicate;
pub use query::run_query;
pub use read::{
    count_rows_in_rect, load_records, missing_in_rect, zoom_stats, zoom_stats_for, ZoomStats,
};
pub use registry::WriterRegistry;
pub use schema::{checkpoint, close_connection, ensure_schema, open_read_only};
pub use settings::{
    default_store_directory, StoreSettings, DEFAULT_BUSY_TIMEOUT, DEFAULT_ENQUEUE_TIMEOUT,
    DEFAULT_EXTENSION, DEFAULT_QUEUE_CAPACITY, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use writer::{EnqueueOutcome, StoreWriter, WriteBatch, WriterState, WriterStats};
