//! Tile data model shared by the store, the fetcher and the orchestrator.

mod record;

pub use record::{TileRecord, TileState, TileVariant};
