//! File-based storage: one JSON file per document.

use super::{
    BoxFuture, CalibrationRecord, DocumentRecords, LegendUiState, PersistencePort, StorageError,
    StorageResult, StoredItem, ViewerState,
};
use crate::items::{ItemId, PageNumber};
use std::fs;
use std::path::{Path, PathBuf};

/// File-based storage for native platforms.
///
/// Every write rewrites the document's JSON file in full.
pub struct FileStore {
    /// Base directory for document storage.
    base_path: PathBuf,
}

impl FileStore {
    /// Create a new file store with the given base directory.
    ///
    /// Creates the directory if it doesn't exist.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StorageError::Io(format!("Failed to create storage directory: {}", e))
            })?;
        }
        Ok(Self { base_path })
    }

    /// Create a file store in the default location.
    ///
    /// On Unix: `~/.local/share/takeoff/documents/`
    /// On Windows: `%LOCALAPPDATA%\takeoff\documents\`
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;

        Self::new(base.join("takeoff").join("documents"))
    }

    /// Get the file path for a document ID.
    fn document_path(&self, id: &str) -> PathBuf {
        // Sanitize ID to be safe for filenames
        let safe_id: String = id
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.base_path.join(format!("{}.json", safe_id))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Read a document's records. A missing file is an empty document.
    pub fn read_document(&self, document_id: &str) -> StorageResult<DocumentRecords> {
        let path = self.document_path(document_id);
        if !path.exists() {
            return Ok(DocumentRecords::default());
        }
        let json = fs::read_to_string(&path).map_err(|e| {
            StorageError::Io(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&json).map_err(|e| {
            StorageError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    fn write_document(&self, document_id: &str, records: &DocumentRecords) -> StorageResult<()> {
        let path = self.document_path(document_id);
        let json = serde_json::to_string_pretty(records)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        fs::write(&path, json)
            .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", path.display(), e)))
    }

    fn update(
        &self,
        document_id: &str,
        change: impl FnOnce(&mut DocumentRecords),
    ) -> StorageResult<()> {
        let mut records = self.read_document(document_id)?;
        change(&mut records);
        self.write_document(document_id, &records)
    }
}

impl PersistencePort for FileStore {
    fn upsert_items(
        &self,
        document_id: &str,
        items: &[StoredItem],
    ) -> BoxFuture<'_, StorageResult<()>> {
        let document_id = document_id.to_string();
        let items = items.to_vec();
        Box::pin(async move { self.update(&document_id, |doc| doc.upsert_items(&items)) })
    }

    fn delete_items(&self, document_id: &str, ids: &[ItemId]) -> BoxFuture<'_, StorageResult<()>> {
        let document_id = document_id.to_string();
        let ids = ids.to_vec();
        Box::pin(async move { self.update(&document_id, |doc| doc.delete_items(&ids)) })
    }

    fn load_items(&self, document_id: &str) -> BoxFuture<'_, StorageResult<Vec<StoredItem>>> {
        let document_id = document_id.to_string();
        Box::pin(async move {
            let records = self.read_document(&document_id)?;
            Ok(records.items.into_values().collect())
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
            self.update(&document_id, |doc| {
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
            self.update(&document_id, |doc| {
                doc.calibrations.remove(&page);
            })
        })
    }

    fn load_calibrations(
        &self,
        document_id: &str,
    ) -> BoxFuture<'_, StorageResult<Vec<CalibrationRecord>>> {
        let document_id = document_id.to_string();
        Box::pin(async move { Ok(self.read_document(&document_id)?.calibration_records()) })
    }

    fn save_viewer_state(
        &self,
        document_id: &str,
        state: &ViewerState,
    ) -> BoxFuture<'_, StorageResult<()>> {
        let document_id = document_id.to_string();
        let state = *state;
        Box::pin(async move { self.update(&document_id, |doc| doc.viewer = Some(state)) })
    }

    fn load_viewer_state(
        &self,
        document_id: &str,
    ) -> BoxFuture<'_, StorageResult<Option<ViewerState>>> {
        let document_id = document_id.to_string();
        Box::pin(async move { Ok(self.read_document(&document_id)?.viewer) })
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
            self.update(&document_id, |doc| {
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
        Box::pin(async move { Ok(self.read_document(&document_id)?.legends.get(&page).copied()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{Calibration, DisplayUnit};
    use crate::items::{Area, Geometry, ItemStyle, TakeoffItem};
    use crate::storage::block_on;
    use kurbo::Point;
    use tempfile::tempdir;

    fn stored_area() -> StoredItem {
        StoredItem::from_item(&TakeoffItem::new(
            1,
            Geometry::Area(Area::rectangle(Point::ZERO, Point::new(10.0, 10.0))),
            ItemStyle::new("blue"),
        ))
    }

    #[test]
    fn test_file_store_upsert_load() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();
        let item = stored_area();

        block_on(store.upsert_items("plan-a", &[item.clone()])).unwrap();

        // A second store over the same directory sees the write
        let reopened = FileStore::new(dir.path().to_path_buf()).unwrap();
        let loaded = block_on(reopened.load_items("plan-a")).unwrap();
        assert_eq!(loaded, vec![item.clone()]);
        assert_eq!(loaded[0].to_item().unwrap().id(), item.id());
    }

    #[test]
    fn test_file_store_missing_document_is_empty() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();
        assert!(block_on(store.load_items("nothing")).unwrap().is_empty());
        assert!(block_on(store.load_calibrations("nothing")).unwrap().is_empty());
    }

    #[test]
    fn test_file_store_delete_and_calibration() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();
        let item = stored_area();
        block_on(store.upsert_items("doc", &[item.clone()])).unwrap();
        block_on(store.delete_items("doc", &[item.id()])).unwrap();
        assert!(block_on(store.load_items("doc")).unwrap().is_empty());

        let record = CalibrationRecord {
            page: 1,
            calibration: Calibration::new(0.05, DisplayUnit::Meters).unwrap(),
        };
        block_on(store.save_calibration("doc", &record)).unwrap();
        assert_eq!(block_on(store.load_calibrations("doc")).unwrap(), vec![record]);
    }

    #[test]
    fn test_file_store_sanitizes_id() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();
        let viewer = ViewerState::default();

        // ID with special characters should be sanitized
        block_on(store.save_viewer_state("plans/level 1:rev*2", &viewer)).unwrap();
        assert!(dir.path().join("plans_level_1_rev_2.json").exists());
        assert_eq!(
            block_on(store.load_viewer_state("plans/level 1:rev*2")).unwrap(),
            Some(viewer)
        );
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();
        fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
        assert!(matches!(
            block_on(store.load_items("bad")),
            Err(StorageError::Serialization(_))
        ));
    }
}
