//! Single writer per store file.
//!
//! Each store gets one dedicated OS thread owning the only read-write
//! connection. Batches arrive over a bounded queue and are applied in FIFO
//! order, one transaction per batch. Callers never wait on SQLite: an
//! enqueue either lands in the queue within a short timeout or the batch is
//! dropped with a warning.
//!
//! # Lifecycle
//!
//! ```text
//! Created ──start──► Running ──shutdown──► ShuttingDown ──drained──► Stopped
//! ```
//!
//! The connection is wrapped in a guard whose `Drop` checkpoints and closes
//! it, so the file is left consistent even if the worker loop panics.

use super::error::StoreError;
use super::maintenance;
use super::schema::{checkpoint, close_connection, ensure_schema};
use super::settings::StoreSettings;
use crate::tile::{TileRecord, TileVariant};
use rusqlite::{params, CachedStatement, Connection};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Pause after a failed transaction before taking the next batch.
const TRANSACTION_BACKOFF: Duration = Duration::from_millis(200);

/// How often disposal checks whether the worker thread has exited.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Writer lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WriterState {
    Created = 0,
    Running = 1,
    ShuttingDown = 2,
    Stopped = 3,
}

impl WriterState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WriterState::Created,
            1 => WriterState::Running,
            2 => WriterState::ShuttingDown,
            _ => WriterState::Stopped,
        }
    }
}

/// Result of offering a batch to a writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The batch is queued and will be applied
    Accepted,
    /// Nothing to write
    Empty,
    /// The queue stayed full past the enqueue timeout; the batch was dropped
    Dropped,
    /// The writer is shutting down or stopped
    Closed,
}

/// Tiles handed to the writer. Owned by the writer from then on.
#[derive(Debug)]
pub struct WriteBatch {
    pub tiles: Vec<TileRecord>,
    pub enqueued_at: Instant,
}

impl WriteBatch {
    pub fn new(tiles: Vec<TileRecord>) -> Self {
        Self {
            tiles,
            enqueued_at: Instant::now(),
        }
    }
}

/// Snapshot of a writer's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriterStats {
    pub batches_applied: u64,
    pub tiles_written: u64,
    pub tile_failures: u64,
    pub batches_dropped: u64,
    pub transaction_failures: u64,
}

#[derive(Debug, Default)]
struct WriterCounters {
    batches_applied: AtomicU64,
    tiles_written: AtomicU64,
    tile_failures: AtomicU64,
    batches_dropped: AtomicU64,
    transaction_failures: AtomicU64,
}

impl WriterCounters {
    fn snapshot(&self) -> WriterStats {
        WriterStats {
            batches_applied: self.batches_applied.load(Ordering::Relaxed),
            tiles_written: self.tiles_written.load(Ordering::Relaxed),
            tile_failures: self.tile_failures.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
            transaction_failures: self.transaction_failures.load(Ordering::Relaxed),
        }
    }
}

/// Messages processed by the worker, in arrival order.
enum WriterMessage {
    Batch(WriteBatch),
    Flush(oneshot::Sender<()>),
    Checkpoint(oneshot::Sender<Result<(), StoreError>>),
    Deduplicate(oneshot::Sender<Result<usize, StoreError>>),
}

/// Handle to the writer thread of one store file.
pub struct StoreWriter {
    path: PathBuf,
    state: Arc<AtomicU8>,
    sender: Mutex<Option<mpsc::Sender<WriterMessage>>>,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<WriterCounters>,
    enqueue_timeout: Duration,
    shutdown_timeout: Duration,
}

impl StoreWriter {
    /// Opens the store (creating its schema) and starts the writer thread.
    pub fn start(path: impl Into<PathBuf>, settings: &StoreSettings) -> Result<Self, StoreError> {
        let path = path.into();
        let conn = ensure_schema(&path, settings)?;

        let (sender, receiver) = mpsc::channel(settings.queue_capacity.max(1));
        let state = Arc::new(AtomicU8::new(WriterState::Created as u8));
        let counters = Arc::new(WriterCounters::default());

        let worker = Worker {
            path: path.clone(),
            guard: ConnectionGuard {
                conn: Some(conn),
                path: path.clone(),
                state: Arc::clone(&state),
            },
            receiver,
            counters: Arc::clone(&counters),
        };

        let thread_handle = thread::Builder::new()
            .name("store-writer".to_string())
            .spawn(move || worker.run())
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

        let _ = state.compare_exchange(
            WriterState::Created as u8,
            WriterState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        info!(path = %path.display(), "Store writer started");

        Ok(Self {
            path,
            state,
            sender: Mutex::new(Some(sender)),
            thread_handle: Mutex::new(Some(thread_handle)),
            counters,
            enqueue_timeout: settings.enqueue_timeout,
            shutdown_timeout: settings.shutdown_timeout,
        })
    }

    /// Store file this writer owns.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> WriterState {
        WriterState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// True while the writer accepts batches.
    pub fn is_running(&self) -> bool {
        self.state() == WriterState::Running
    }

    pub fn stats(&self) -> WriterStats {
        self.counters.snapshot()
    }

    fn sender(&self) -> Option<mpsc::Sender<WriterMessage>> {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Offers tiles to the queue, waiting at most the enqueue timeout.
    pub async fn enqueue(&self, tiles: Vec<TileRecord>) -> EnqueueOutcome {
        if tiles.is_empty() {
            return EnqueueOutcome::Empty;
        }
        let Some(sender) = self.sender() else {
            return EnqueueOutcome::Closed;
        };

        let count = tiles.len();
        match sender
            .send_timeout(
                WriterMessage::Batch(WriteBatch::new(tiles)),
                self.enqueue_timeout,
            )
            .await
        {
            Ok(()) => EnqueueOutcome::Accepted,
            Err(SendTimeoutError::Timeout(_)) => {
                self.counters.batches_dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    path = %self.path.display(),
                    tiles = count,
                    timeout_ms = self.enqueue_timeout.as_millis() as u64,
                    "Writer queue saturated, dropping batch"
                );
                EnqueueOutcome::Dropped
            }
            Err(SendTimeoutError::Closed(_)) => EnqueueOutcome::Closed,
        }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> WriterMessage,
    ) -> Result<T, StoreError> {
        let closed = || StoreError::WriterClosed(self.path.clone());
        let sender = self.sender().ok_or_else(closed)?;
        let (reply, response) = oneshot::channel();
        sender.send(make(reply)).await.map_err(|_| closed())?;
        response.await.map_err(|_| closed())
    }

    /// Resolves once every batch queued before this call has been applied.
    pub async fn flush(&self) -> Result<(), StoreError> {
        self.request(WriterMessage::Flush).await
    }

    /// Merges the WAL into the main file after earlier batches are applied.
    pub async fn checkpoint(&self) -> Result<(), StoreError> {
        self.request(WriterMessage::Checkpoint).await?
    }

    /// Runs the duplicate-row maintenance pass. Returns rows removed.
    pub async fn deduplicate(&self) -> Result<usize, StoreError> {
        self.request(WriterMessage::Deduplicate).await?
    }

    /// Stops accepting batches and waits for the worker to drain.
    ///
    /// Returns true if the thread exited within the shutdown timeout. On
    /// timeout the thread keeps draining in the background and still closes
    /// the connection when done.
    pub async fn shutdown(&self) -> bool {
        let _ = self.state.compare_exchange(
            WriterState::Running as u8,
            WriterState::ShuttingDown as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        drop(
            self.sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );

        let deadline = Instant::now() + self.shutdown_timeout;
        loop {
            let finished = self
                .thread_handle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
                .map(|h| h.is_finished())
                .unwrap_or(true);

            if finished {
                break;
            }
            if Instant::now() >= deadline {
                warn!(
                    path = %self.path.display(),
                    timeout_secs = self.shutdown_timeout.as_secs(),
                    "Store writer did not stop in time"
                );
                return false;
            }
            tokio::time::sleep(SHUTDOWN_POLL_INTERVAL).await;
        }

        let handle = self
            .thread_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.join() {
                warn!(path = %self.path.display(), "Store writer thread panicked: {:?}", e);
            }
        }
        info!(path = %self.path.display(), stats = ?self.stats(), "Store writer stopped");
        true
    }
}

impl Drop for StoreWriter {
    fn drop(&mut self) {
        // Closing the queue lets the worker drain and exit on its own.
        drop(
            self.sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
    }
}

/// Owns the writer connection. Dropping it checkpoints and closes the file.
struct ConnectionGuard {
    conn: Option<Connection>,
    path: PathBuf,
    state: Arc<AtomicU8>,
}

impl ConnectionGuard {
    fn conn(&mut self) -> Result<&mut Connection, StoreError> {
        self.conn
            .as_mut()
            .ok_or_else(|| StoreError::WriterClosed(self.path.clone()))
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            close_connection(conn, true);
            debug!(path = %self.path.display(), "Writer connection closed");
        }
        self.state
            .store(WriterState::Stopped as u8, Ordering::Release);
    }
}

struct Worker {
    path: PathBuf,
    guard: ConnectionGuard,
    receiver: mpsc::Receiver<WriterMessage>,
    counters: Arc<WriterCounters>,
}

impl Worker {
    fn run(mut self) {
        debug!(path = %self.path.display(), "Store writer loop running");

        while let Some(message) = self.receiver.blocking_recv() {
            match message {
                WriterMessage::Batch(batch) => self.apply(batch),
                WriterMessage::Flush(reply) => {
                    let _ = reply.send(());
                }
                WriterMessage::Checkpoint(reply) => {
                    let result = self.guard.conn().and_then(|conn| checkpoint(conn));
                    let _ = reply.send(result);
                }
                WriterMessage::Deduplicate(reply) => {
                    let result = self.guard.conn().and_then(maintenance::deduplicate);
                    let _ = reply.send(result);
                }
            }
        }

        debug!(path = %self.path.display(), "Store writer queue closed and drained");
    }

    fn apply(&mut self, batch: WriteBatch) {
        let queued_ms = batch.enqueued_at.elapsed().as_millis() as u64;
        let started = Instant::now();

        let result = self
            .guard
            .conn()
            .and_then(|conn| write_batch(conn, &batch.tiles).map_err(StoreError::from));

        match result {
            Ok(report) => {
                self.counters.batches_applied.fetch_add(1, Ordering::Relaxed);
                self.counters
                    .tiles_written
                    .fetch_add(report.written, Ordering::Relaxed);
                self.counters
                    .tile_failures
                    .fetch_add(report.failed, Ordering::Relaxed);
                debug!(
                    path = %self.path.display(),
                    tiles = batch.tiles.len(),
                    failed = report.failed,
                    queued_ms = queued_ms,
                    write_ms = started.elapsed().as_millis() as u64,
                    "Batch applied"
                );
            }
            Err(e) => {
                self.counters
                    .transaction_failures
                    .fetch_add(1, Ordering::Relaxed);
                error!(
                    path = %self.path.display(),
                    tiles = batch.tiles.len(),
                    error = %e,
                    "Batch transaction failed"
                );
                thread::sleep(TRANSACTION_BACKOFF);
            }
        }
    }
}

#[derive(Debug, Default)]
struct BatchReport {
    written: u64,
    failed: u64,
}

/// Writes tiles in list order inside one transaction.
///
/// Placeholders only claim the key. Payloads fill a slot only when it is
/// NULL or empty, so re-applying a batch changes nothing. A failing tile is
/// logged and skipped; the rest of the batch still commits.
fn write_batch(conn: &mut Connection, tiles: &[TileRecord]) -> rusqlite::Result<BatchReport> {
    let tx = conn.transaction()?;
    let mut report = BatchReport::default();

    {
        let mut insert = tx.prepare_cached(
            "INSERT OR IGNORE INTO tiles (tile_column, tile_row, zoom_level) VALUES (?1, ?2, ?3)",
        )?;
        let mut update_plain = tx.prepare_cached(&update_sql(TileVariant::Plain))?;
        let mut update_labeled = tx.prepare_cached(&update_sql(TileVariant::Labeled))?;

        for tile in tiles {
            match write_tile(tile, &mut insert, &mut update_plain, &mut update_labeled) {
                Ok(()) => report.written += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(tile = %tile.coord, error = %e, "Failed to write tile, skipping");
                }
            }
        }
    }

    tx.commit()?;
    Ok(report)
}

fn write_tile(
    tile: &TileRecord,
    insert: &mut CachedStatement<'_>,
    update_plain: &mut CachedStatement<'_>,
    update_labeled: &mut CachedStatement<'_>,
) -> rusqlite::Result<()> {
    let key = tile.coord;
    insert.execute(params![key.col, key.row, key.zoom])?;

    if let Some(data) = tile.payload(TileVariant::Plain) {
        update_plain.execute(params![data, key.col, key.row, key.zoom])?;
    }
    if let Some(data) = tile.payload(TileVariant::Labeled) {
        update_labeled.execute(params![data, key.col, key.row, key.zoom])?;
    }
    Ok(())
}

fn update_sql(variant: TileVariant) -> String {
    format!(
        "UPDATE tiles SET {col} = ?1 \
         WHERE tile_column = ?2 AND tile_row = ?3 AND zoom_level = ?4 \
         AND ({col} IS NULL OR length({col}) = 0)",
        col = variant.column()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileCoord;
    use crate::store::read::load_records;
    use crate::store::schema::open_read_only;
    use tempfile::TempDir;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_store_writer_is_send_sync() {
        assert_send_sync::<StoreWriter>();
    }

    fn setup() -> (TempDir, StoreSettings, PathBuf) {
        let dir = TempDir::new().unwrap();
        let settings = StoreSettings::in_directory(dir.path());
        let path = dir.path().join("writer.db");
        (dir, settings, path)
    }

    fn read_all(path: &Path, settings: &StoreSettings, zoom: u8, coords: &[TileCoord]) -> Vec<TileRecord> {
        let conn = open_read_only(path, settings).unwrap();
        let found = load_records(&conn, zoom, coords).unwrap();
        let mut records: Vec<TileRecord> = found.into_values().collect();
        records.sort_by_key(|r| r.coord);
        records
    }

    #[tokio::test]
    async fn test_writer_applies_batch_and_flushes() {
        let (_dir, settings, path) = setup();
        let writer = StoreWriter::start(&path, &settings).unwrap();
        assert!(writer.is_running());

        let coord = TileCoord::new(3, 4, 10);
        let outcome = writer
            .enqueue(vec![TileRecord::with_payload(coord, TileVariant::Plain, vec![1, 2, 3, 4])])
            .await;
        assert_eq!(outcome, EnqueueOutcome::Accepted);
        writer.flush().await.unwrap();

        let records = read_all(&path, &settings, 10, &[coord]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload(TileVariant::Plain), Some(&[1u8, 2, 3, 4][..]));
        assert_eq!(writer.stats().tiles_written, 1);

        assert!(writer.shutdown().await);
        assert_eq!(writer.state(), WriterState::Stopped);
    }

    #[tokio::test]
    async fn test_existing_payload_is_never_overwritten() {
        let (_dir, settings, path) = setup();
        let writer = StoreWriter::start(&path, &settings).unwrap();
        let coord = TileCoord::new(0, 0, 5);

        writer
            .enqueue(vec![TileRecord::with_payload(coord, TileVariant::Plain, vec![1])])
            .await;
        writer
            .enqueue(vec![TileRecord::with_payload(coord, TileVariant::Plain, vec![2])])
            .await;
        writer.enqueue(vec![TileRecord::placeholder(coord)]).await;
        writer.flush().await.unwrap();

        let records = read_all(&path, &settings, 5, &[coord]);
        assert_eq!(records[0].payload(TileVariant::Plain), Some(&[1u8][..]));
        writer.shutdown().await;
    }

    #[tokio::test]
    async fn test_placeholder_then_payload_fills_slot() {
        let (_dir, settings, path) = setup();
        let writer = StoreWriter::start(&path, &settings).unwrap();
        let coord = TileCoord::new(9, 9, 9);

        writer.enqueue(vec![TileRecord::placeholder(coord)]).await;
        writer
            .enqueue(vec![TileRecord::with_payload(coord, TileVariant::Labeled, vec![4])])
            .await;
        writer.flush().await.unwrap();

        let records = read_all(&path, &settings, 9, &[coord]);
        assert_eq!(records.len(), 1);
        assert!(records[0].has_payload(TileVariant::Labeled));
        assert!(!records[0].has_payload(TileVariant::Plain));
        writer.shutdown().await;
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let (_dir, settings, path) = setup();
        let writer = StoreWriter::start(&path, &settings).unwrap();
        assert_eq!(writer.enqueue(Vec::new()).await, EnqueueOutcome::Empty);
        writer.flush().await.unwrap();
        assert_eq!(writer.stats().batches_applied, 0);
        writer.shutdown().await;
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_is_closed() {
        let (_dir, settings, path) = setup();
        let writer = StoreWriter::start(&path, &settings).unwrap();
        assert!(writer.shutdown().await);

        let outcome = writer
            .enqueue(vec![TileRecord::placeholder(TileCoord::new(1, 1, 1))])
            .await;
        assert_eq!(outcome, EnqueueOutcome::Closed);
        assert!(matches!(
            writer.flush().await,
            Err(StoreError::WriterClosed(_))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_batches() {
        let (_dir, settings, path) = setup();
        let writer = StoreWriter::start(&path, &settings).unwrap();

        let coords: Vec<TileCoord> = (0..50u32).map(|c| TileCoord::new(c, 0, 12)).collect();
        for coord in &coords {
            writer
                .enqueue(vec![TileRecord::with_payload(*coord, TileVariant::Plain, vec![1])])
                .await;
        }
        assert!(writer.shutdown().await);

        assert_eq!(read_all(&path, &settings, 12, &coords).len(), 50);
    }

    #[tokio::test]
    async fn test_checkpoint_and_deduplicate_through_writer() {
        let (_dir, settings, path) = setup();
        let writer = StoreWriter::start(&path, &settings).unwrap();
        writer
            .enqueue(vec![TileRecord::placeholder(TileCoord::new(1, 2, 3))])
            .await;
        writer.checkpoint().await.unwrap();
        assert_eq!(writer.deduplicate().await.unwrap(), 0);
        writer.shutdown().await;
    }

    #[test]
    fn test_write_batch_is_idempotent() {
        let (_dir, settings, path) = setup();
        let mut conn = ensure_schema(&path, &settings).unwrap();
        let tiles = vec![
            TileRecord::with_payload(TileCoord::new(1, 1, 4), TileVariant::Plain, vec![1]),
            TileRecord::placeholder(TileCoord::new(2, 1, 4)),
        ];

        write_batch(&mut conn, &tiles).unwrap();
        write_batch(&mut conn, &tiles).unwrap();

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM tiles", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 2);
    }

    mod proptests {
        use super::*;
        use proptest::collection::vec;
        use proptest::option;
        use proptest::prelude::*;

        type Row = (u32, u32, Option<Vec<u8>>, Option<Vec<u8>>);

        fn arb_record() -> impl Strategy<Value = TileRecord> {
            (
                0u32..4,
                0u32..4,
                option::of(vec(any::<u8>(), 1..4)),
                option::of(vec(any::<u8>(), 1..4)),
            )
                .prop_map(|(col, row, plain, labeled)| TileRecord {
                    coord: TileCoord::new(col, row, 3),
                    plain,
                    labeled,
                })
        }

        fn apply_all(batches: &[Vec<TileRecord>], times: usize) -> Vec<Row> {
            let (_dir, settings, path) = setup();
            let mut conn = ensure_schema(&path, &settings).unwrap();
            for _ in 0..times {
                for batch in batches {
                    write_batch(&mut conn, batch).unwrap();
                }
            }
            let mut stmt = conn
                .prepare(
                    "SELECT tile_column, tile_row, plain_payload, labeled_payload \
                     FROM tiles ORDER BY tile_column, tile_row",
                )
                .unwrap();
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))
                .unwrap()
                .collect::<Result<Vec<Row>, _>>()
                .unwrap();
            rows
        }

        fn filled(rows: &[Row]) -> Vec<(u32, u32, bool, bool)> {
            rows.iter()
                .map(|(col, row, plain, labeled)| (*col, *row, plain.is_some(), labeled.is_some()))
                .collect()
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            /// Applying the same batches a second time changes nothing.
            #[test]
            fn prop_replay_is_idempotent(batches in vec(vec(arb_record(), 0..6), 1..4)) {
                prop_assert_eq!(apply_all(&batches, 1), apply_all(&batches, 2));
            }

            /// Batch order decides which payload wins a slot, never whether
            /// the slot ends up filled.
            #[test]
            fn prop_filled_slots_ignore_batch_order(batches in vec(vec(arb_record(), 0..6), 1..4)) {
                let mut reversed = batches.clone();
                reversed.reverse();
                prop_assert_eq!(
                    filled(&apply_all(&batches, 1)),
                    filled(&apply_all(&reversed, 1))
                );
            }
        }
    }
}
