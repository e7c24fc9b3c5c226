//! Batched progress reporting.
//!
//! Completed tiles are collected and handed to the consumer in batches, so a
//! pass over thousands of tiles produces tens of deliveries instead of
//! thousands. A batch is released when it reaches the size threshold or when
//! the interval since the previous release has elapsed, whichever comes
//! first. Thresholds are checked on append.

use crate::tile::TileRecord;
use std::mem;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::trace;

/// Default number of tiles per progress batch.
pub const DEFAULT_PROGRESS_BATCH_SIZE: usize = 20;

/// Default maximum time between progress batches.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Where progress batches are delivered.
pub type ProgressSink = mpsc::UnboundedSender<Vec<TileRecord>>;

/// Accumulates tiles until a size or time threshold is reached.
#[derive(Debug)]
pub struct ProgressBuffer {
    pending: Vec<TileRecord>,
    last_flush: Instant,
    batch_size: usize,
    interval: Duration,
}

impl ProgressBuffer {
    pub fn new(batch_size: usize, interval: Duration) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            pending: Vec::with_capacity(batch_size),
            last_flush: Instant::now(),
            batch_size,
            interval,
        }
    }

    /// Adds a tile, returning a batch when a threshold is met.
    pub fn push(&mut self, record: TileRecord) -> Option<Vec<TileRecord>> {
        self.pending.push(record);
        if self.pending.len() >= self.batch_size || self.last_flush.elapsed() >= self.interval {
            Some(self.take())
        } else {
            None
        }
    }

    /// Releases whatever is pending, if anything.
    pub fn drain(&mut self) -> Option<Vec<TileRecord>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    fn take(&mut self) -> Vec<TileRecord> {
        self.last_flush = Instant::now();
        mem::replace(&mut self.pending, Vec::with_capacity(self.batch_size))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// A [`ProgressBuffer`] shared by download tasks, wired to a sink.
///
/// Batches are sent while the lock is held, so the consumer sees them in
/// flush order.
pub(crate) struct ProgressBatcher {
    buffer: Mutex<ProgressBuffer>,
    sink: ProgressSink,
}

impl ProgressBatcher {
    pub(crate) fn new(sink: ProgressSink, batch_size: usize, interval: Duration) -> Self {
        Self {
            buffer: Mutex::new(ProgressBuffer::new(batch_size, interval)),
            sink,
        }
    }

    pub(crate) fn append(&self, record: TileRecord) {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(batch) = buffer.push(record) {
            self.deliver(batch);
        }
    }

    pub(crate) fn finish(&self) {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(batch) = buffer.drain() {
            self.deliver(batch);
        }
    }

    /// Sends a batch directly, bypassing the buffer.
    pub(crate) fn send_now(&self, batch: Vec<TileRecord>) {
        if batch.is_empty() {
            return;
        }
        let _buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        self.deliver(batch);
    }

    fn deliver(&self, batch: Vec<TileRecord>) {
        let count = batch.len();
        if self.sink.send(batch).is_err() {
            trace!(tiles = count, "Progress receiver gone, dropping batch");
        }
    }
}
