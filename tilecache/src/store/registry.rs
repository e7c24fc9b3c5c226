//! Registry guaranteeing one writer per store file.
//!
//! Uses `DashMap`'s entry API so two callers racing for the same path never
//! construct two writers. Keys are the lower-cased path, so `Alps.db` and
//! `alps.db` share a writer on case-insensitive filesystems.

use super::error::StoreError;
use super::settings::StoreSettings;
use super::writer::{EnqueueOutcome, StoreWriter, WriterState, WriterStats};
use crate::tile::TileRecord;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owns every live [`StoreWriter`], keyed by store path.
pub struct WriterRegistry {
    writers: DashMap<String, Arc<StoreWriter>>,
    settings: StoreSettings,
    writers_created: AtomicUsize,
}

impl WriterRegistry {
    pub fn new(settings: StoreSettings) -> Self {
        Self {
            writers: DashMap::new(),
            settings,
            writers_created: AtomicUsize::new(0),
        }
    }

    /// Settings new writers are created with.
    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Returns the writer for `path`, constructing it on first use.
    ///
    /// A writer whose thread has stopped is replaced. A writer still draining
    /// after shutdown keeps its slot until its thread exits, so two writers
    /// never hold the same file.
    pub fn get_or_create(&self, path: &Path) -> Result<Arc<StoreWriter>, StoreError> {
        let key = registry_key(path);

        if let Some(writer) = self.writers.get(&key) {
            if writer.is_running() {
                return Ok(Arc::clone(writer.value()));
            }
        }

        // Entry API for atomic check-and-insert
        match self.writers.entry(key) {
            Entry::Occupied(mut entry) => match entry.get().state() {
                WriterState::Stopped => {
                    warn!(path = %path.display(), "Replacing stopped store writer");
                    let writer = Arc::new(StoreWriter::start(path, &self.settings)?);
                    self.writers_created.fetch_add(1, Ordering::Relaxed);
                    entry.insert(Arc::clone(&writer));
                    Ok(writer)
                }
                WriterState::Running => Ok(Arc::clone(entry.get())),
                WriterState::Created | WriterState::ShuttingDown => {
                    debug!(path = %path.display(), "Store writer still draining");
                    Err(StoreError::WriterClosed(path.to_path_buf()))
                }
            },
            Entry::Vacant(entry) => {
                let writer = Arc::new(StoreWriter::start(path, &self.settings)?);
                self.writers_created.fetch_add(1, Ordering::Relaxed);
                debug!(
                    path = %path.display(),
                    created = self.writers_created.load(Ordering::Relaxed),
                    "Registered store writer"
                );
                entry.insert(Arc::clone(&writer));
                Ok(writer)
            }
        }
    }

    /// Existing writer for `path`, if any.
    pub fn get(&self, path: &Path) -> Option<Arc<StoreWriter>> {
        self.writers
            .get(&registry_key(path))
            .map(|w| Arc::clone(w.value()))
    }

    /// Hands tiles to the store's writer. Empty lists are a no-op.
    pub async fn enqueue_batch(
        &self,
        path: &Path,
        tiles: Vec<TileRecord>,
    ) -> Result<EnqueueOutcome, StoreError> {
        if tiles.is_empty() {
            return Ok(EnqueueOutcome::Empty);
        }
        let writer = self.get_or_create(path)?;
        Ok(writer.enqueue(tiles).await)
    }

    /// Waits until everything queued for `path` so far has been applied.
    ///
    /// Succeeds trivially when no writer exists.
    pub async fn flush(&self, path: &Path) -> Result<(), StoreError> {
        match self.get(path) {
            Some(writer) => writer.flush().await,
            None => Ok(()),
        }
    }

    /// Shuts down the writer for `path` and removes it once its thread has
    /// exited.
    ///
    /// Returns whether a writer was registered. A writer that misses the
    /// shutdown timeout stays registered as draining.
    pub async fn dispose(&self, path: &Path) -> bool {
        let key = registry_key(path);
        let Some(writer) = self.writers.get(&key).map(|w| Arc::clone(w.value())) else {
            return false;
        };
        writer.shutdown().await;
        self.remove_if_stopped(&key, &writer);
        true
    }

    /// Disposes every writer.
    pub async fn shutdown_all(&self) {
        let writers: Vec<(String, Arc<StoreWriter>)> = self
            .writers
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        for (key, writer) in &writers {
            writer.shutdown().await;
            self.remove_if_stopped(key, writer);
        }
        if !writers.is_empty() {
            info!(
                count = writers.len(),
                draining = self.writers.len(),
                "All store writers stopped"
            );
        }
    }

    fn remove_if_stopped(&self, key: &str, writer: &Arc<StoreWriter>) {
        let removed = self.writers.remove_if(key, |_, current| {
            Arc::ptr_eq(current, writer) && current.state() == WriterState::Stopped
        });
        if removed.is_none() && writer.state() != WriterState::Stopped {
            warn!(path = %writer.path().display(), "Store writer still draining, kept registered");
        }
    }

    /// Counters of the writer for `path`, if one exists.
    pub fn stats(&self, path: &Path) -> Option<WriterStats> {
        self.get(path).map(|w| w.stats())
    }

    /// Number of registered writers.
    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }

    /// Total writers constructed over the registry's lifetime.
    pub fn writers_created(&self) -> usize {
        self.writers_created.load(Ordering::Relaxed)
    }
}

fn registry_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}
