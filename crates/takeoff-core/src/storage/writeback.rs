//! Debounced write-back of session state to a persistence port.

use super::{CalibrationRecord, PersistencePort, SessionSnapshot, StorageResult, StoredItem};
use crate::debounce::Debouncer;
use crate::items::{ItemId, PageNumber};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default write-back quiet period in milliseconds.
pub const DEFAULT_WRITE_BACK_MS: u64 = 500;

/// Continuous edits are flushed at least this many quiet periods apart.
const MAX_DELAY_FACTOR: u32 = 5;

/// Writes session snapshots back to storage after edits settle.
///
/// Items are upserted in full on every flush; deletions are found by
/// diffing against the ids written by the previous successful flush.
/// Local state stays authoritative: a failed flush keeps the snapshot
/// pending so the next poll retries it.
pub struct WriteBack<S: PersistencePort> {
    /// Storage backend.
    storage: Arc<S>,
    document_id: String,
    debouncer: Debouncer<String, SessionSnapshot>,
    persisted_ids: BTreeSet<ItemId>,
    persisted_pages: BTreeSet<PageNumber>,
    last_flush: Option<Instant>,
}

impl<S: PersistencePort> WriteBack<S> {
    /// Create a write-back with the default quiet period.
    pub fn new(storage: Arc<S>, document_id: impl Into<String>) -> Self {
        Self::with_delay(storage, document_id, Duration::from_millis(DEFAULT_WRITE_BACK_MS))
    }

    pub fn with_delay(storage: Arc<S>, document_id: impl Into<String>, delay: Duration) -> Self {
        Self {
            storage,
            document_id: document_id.into(),
            debouncer: Debouncer::new(delay).with_max_delay(delay * MAX_DELAY_FACTOR),
            persisted_ids: BTreeSet::new(),
            persisted_pages: BTreeSet::new(),
            last_flush: None,
        }
    }

    /// Treat the given state as already stored, e.g. right after loading it.
    pub fn assume_persisted(&mut self, snapshot: &SessionSnapshot) {
        self.persisted_ids = snapshot.item_ids();
        self.persisted_pages = snapshot.calibrations.keys().copied().collect();
    }

    /// Record that `snapshot` needs writing.
    pub fn mark_dirty(&mut self, snapshot: SessionSnapshot, now: Instant) {
        self.debouncer.schedule(self.document_id.clone(), snapshot, now);
    }

    /// Check if there are unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn last_flush(&self) -> Option<Instant> {
        self.last_flush
    }

    /// Get a reference to the storage backend.
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Flush if the quiet period has elapsed.
    /// Returns true if a flush was performed.
    pub async fn maybe_flush(&mut self, now: Instant) -> StorageResult<bool> {
        let Some((_, snapshot)) = self.debouncer.poll(now) else {
            return Ok(false);
        };
        self.write(snapshot, now).await?;
        Ok(true)
    }

    /// Flush any pending snapshot immediately.
    pub async fn flush(&mut self, now: Instant) -> StorageResult<bool> {
        let Some((_, snapshot)) = self.debouncer.flush() else {
            return Ok(false);
        };
        self.write(snapshot, now).await?;
        Ok(true)
    }

    async fn write(&mut self, snapshot: SessionSnapshot, now: Instant) -> StorageResult<()> {
        match self.write_snapshot(&snapshot).await {
            Ok(()) => {
                log::info!(
                    "Wrote {} items for document {}",
                    snapshot.items.len(),
                    self.document_id
                );
                self.persisted_ids = snapshot.item_ids();
                self.persisted_pages = snapshot.calibrations.keys().copied().collect();
                self.last_flush = Some(now);
                Ok(())
            }
            Err(e) => {
                log::error!("Write-back for document {} failed: {}", self.document_id, e);
                // Keep the snapshot unless something newer was scheduled meanwhile
                if !self.debouncer.is_pending() {
                    self.debouncer.schedule(self.document_id.clone(), snapshot, now);
                }
                Err(e)
            }
        }
    }

    async fn write_snapshot(&self, snapshot: &SessionSnapshot) -> StorageResult<()> {
        let id = self.document_id.as_str();

        let records: Vec<StoredItem> = snapshot.items.iter().map(StoredItem::from_item).collect();
        self.storage.upsert_items(id, &records).await?;

        let current = snapshot.item_ids();
        let removed: Vec<ItemId> = self.persisted_ids.difference(&current).copied().collect();
        if !removed.is_empty() {
            self.storage.delete_items(id, &removed).await?;
        }

        for (page, calibration) in &snapshot.calibrations {
            let record = CalibrationRecord {
                page: *page,
                calibration: calibration.clone(),
            };
            self.storage.save_calibration(id, &record).await?;
        }
        for page in self
            .persisted_pages
            .iter()
            .filter(|page| !snapshot.calibrations.contains_key(page))
        {
            self.storage.delete_calibration(id, *page).await?;
        }

        self.storage.save_viewer_state(id, &snapshot.viewer).await
    }
}
