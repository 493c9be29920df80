//! In-memory storage implementation.

use super::{
    BoxFuture, CalibrationRecord, DocumentRecords, LegendUiState, PersistencePort, StorageError,
    StorageResult, StoredItem, ViewerState,
};
use crate::items::{ItemId, PageNumber};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory storage for testing and ephemeral use.
#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, DocumentRecords>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, HashMap<String, DocumentRecords>>> {
        self.documents
            .read()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, HashMap<String, DocumentRecords>>> {
        self.documents
            .write()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))
    }

    /// Copy of everything stored for a document.
    pub fn document(&self, document_id: &str) -> StorageResult<DocumentRecords> {
        self.read()?
            .get(document_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(document_id.to_string()))
    }

    fn update(
        &self,
        document_id: String,
        change: impl FnOnce(&mut DocumentRecords),
    ) -> StorageResult<()> {
        let mut docs = self.write()?;
        change(docs.entry(document_id).or_default());
        Ok(())
    }

    fn query<T>(
        &self,
        document_id: &str,
        select: impl FnOnce(&DocumentRecords) -> T,
    ) -> StorageResult<Option<T>> {
        Ok(self.read()?.get(document_id).map(select))
    }
}

impl PersistencePort for MemoryStore {
    fn upsert_items(
        &self,
        document_id: &str,
        items: &[StoredItem],
    ) -> BoxFuture<'_, StorageResult<()>> {
        let document_id = document_id.to_string();
        let items = items.to_vec();
        Box::pin(async move { self.update(document_id, |doc| doc.upsert_items(&items)) })
    }

    fn delete_items(&self, document_id: &str, ids: &[ItemId]) -> BoxFuture<'_, StorageResult<()>> {
        let document_id = document_id.to_string();
        let ids = ids.to_vec();
        Box::pin(async move { self.update(document_id, |doc| doc.delete_items(&ids)) })
    }

    fn load_items(&self, document_id: &str) -> BoxFuture<'_, StorageResult<Vec<StoredItem>>> {
        let document_id = document_id.to_string();
        Box::pin(async move {
            let items: Option<Vec<StoredItem>> =
                self.query(&document_id, |doc| doc.items.values().cloned().collect())?;
            Ok(items.unwrap_or_default())
        })
    }

    fn save_calibration(
        &self,
        document_id: &str,
        record: &CalibrationRecord,
    ) -> BoxFuture<'_, StorageResult<()>> {
        let document_id = document_id.to_string();
        let record = record.clone();
        Box::pin(async move {
            self.update(document_id, |doc| {
                doc.calibrations.insert(record.page, record.calibration);
            })
        })
    }

    fn delete_calibration(
        &self,
        document_id: &str,
        page: PageNumber,
    ) -> BoxFuture<'_, StorageResult<()>> {
        let document_id = document_id.to_string();
        Box::pin(async move {
            self.update(document_id, |doc| {
                doc.calibrations.remove(&page);
            })
        })
    }

    fn load_calibrations(
        &self,
        document_id: &str,
    ) -> BoxFuture<'_, StorageResult<Vec<CalibrationRecord>>> {
        let document_id = document_id.to_string();
        Box::pin(async move {
            let records = self.query(&document_id, DocumentRecords::calibration_records)?;
            Ok(records.unwrap_or_default())
        })
    }

    fn save_viewer_state(
        &self,
        document_id: &str,
        state: &ViewerState,
    ) -> BoxFuture<'_, StorageResult<()>> {
        let document_id = document_id.to_string();
        let state = *state;
        Box::pin(async move { self.update(document_id, |doc| doc.viewer = Some(state)) })
    }

    fn load_viewer_state(
        &self,
        document_id: &str,
    ) -> BoxFuture<'_, StorageResult<Option<ViewerState>>> {
        let document_id = document_id.to_string();
        Box::pin(async move { Ok(self.query(&document_id, |doc| doc.viewer)?.flatten()) })
    }

    fn save_legend_state(
        &self,
        document_id: &str,
        page: PageNumber,
        state: &LegendUiState,
    ) -> BoxFuture<'_, StorageResult<()>> {
        let document_id = document_id.to_string();
        let state = *state;
        Box::pin(async move {
            self.update(document_id, |doc| {
                doc.legends.insert(page, state);
            })
        })
    }

    fn load_legend_state(
        &self,
        document_id: &str,
        page: PageNumber,
    ) -> BoxFuture<'_, StorageResult<Option<LegendUiState>>> {
        let document_id = document_id.to_string();
        Box::pin(async move {
            Ok(self
                .query(&document_id, |doc| doc.legends.get(&page).copied())?
                .flatten())
        })
    }
}
