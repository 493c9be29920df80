//! Persistence port, stored records and the debounced write-back.

mod file;
mod memory;
mod writeback;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use writeback::{DEFAULT_WRITE_BACK_MS, WriteBack};

use crate::calibration::Calibration;
use crate::error::{RejectReason, TakeoffResult};
use crate::items::{
    Area, Count, Geometry, ItemId, ItemKind, ItemStyle, Line, Measure, PageNumber, TakeoffItem,
    TemplateLink,
};
use crate::viewport::Rotation;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// How the points of a stored item are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryType {
    Point,
    Polyline,
    Polygon,
}

/// Points of one item, stored alongside its [`ItemRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryRecord {
    pub item_id: ItemId,
    pub geometry_type: GeometryType,
    pub points: Vec<Point>,
}

/// Everything about an item except its points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: ItemId,
    pub page: PageNumber,
    pub kind: ItemKind,
    pub style: ItemStyle,
    #[serde(default)]
    pub template: Option<TemplateLink>,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub dashed: bool,
    #[serde(default)]
    pub arrow_end: bool,
    #[serde(default)]
    pub stroke_width: Option<f64>,
    /// Count value.
    #[serde(default)]
    pub value: Option<f64>,
}

/// An item record with its parallel geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredItem {
    pub record: ItemRecord,
    pub geometry: GeometryRecord,
}

impl StoredItem {
    pub fn id(&self) -> ItemId {
        self.record.id
    }

    /// Split an item into its stored records.
    pub fn from_item(item: &TakeoffItem) -> Self {
        let mut record = ItemRecord {
            id: item.id(),
            page: item.page,
            kind: item.kind(),
            style: item.style.clone(),
            template: item.template.clone(),
            closed: false,
            dashed: false,
            arrow_end: false,
            stroke_width: None,
            value: None,
        };
        let (geometry_type, points) = match &item.geometry {
            Geometry::Measure(measure) => (GeometryType::Polyline, vec![measure.start, measure.end]),
            Geometry::Line(line) => {
                record.closed = line.closed;
                record.dashed = line.dashed;
                record.arrow_end = line.arrow_end;
                record.stroke_width = Some(line.stroke_width);
                (GeometryType::Polyline, line.points.clone())
            }
            Geometry::Area(area) => (GeometryType::Polygon, area.points.clone()),
            Geometry::Count(count) => {
                record.value = Some(count.value);
                (GeometryType::Point, vec![count.position])
            }
        };
        Self {
            record,
            geometry: GeometryRecord {
                item_id: item.id(),
                geometry_type,
                points,
            },
        }
    }

    /// Rebuild and validate the item.
    pub fn to_item(&self) -> TakeoffResult<TakeoffItem> {
        let record = &self.record;
        let points = &self.geometry.points;
        if self.geometry.item_id != record.id {
            return Err(StorageError::Serialization(format!(
                "geometry for {} stored under item {}",
                self.geometry.item_id, record.id
            ))
            .into());
        }

        let expected = match record.kind {
            ItemKind::Measure | ItemKind::Line => GeometryType::Polyline,
            ItemKind::Area => GeometryType::Polygon,
            ItemKind::Count => GeometryType::Point,
        };
        if self.geometry.geometry_type != expected {
            return Err(StorageError::Serialization(format!(
                "{} item {} stored as {:?}",
                record.kind.label(),
                record.id,
                self.geometry.geometry_type
            ))
            .into());
        }

        let geometry = match record.kind {
            ItemKind::Measure => match points.as_slice() {
                [start, end] => Geometry::Measure(Measure::new(*start, *end)),
                _ => {
                    return Err(RejectReason::PointCount {
                        kind: "Measure",
                        expected: "exactly 2",
                        got: points.len(),
                    }
                    .into());
                }
            },
            ItemKind::Line => {
                let mut line = Line::from_points(points.clone());
                line.closed = record.closed;
                line.dashed = record.dashed;
                line.arrow_end = record.arrow_end;
                if let Some(width) = record.stroke_width {
                    line.stroke_width = width;
                }
                Geometry::Line(line)
            }
            ItemKind::Area => Geometry::Area(Area::new(points.clone())),
            ItemKind::Count => match points.as_slice() {
                [position] => Geometry::Count(
                    Count::new(*position).with_value(record.value.unwrap_or(1.0)),
                ),
                _ => {
                    return Err(RejectReason::PointCount {
                        kind: "Count",
                        expected: "exactly 1",
                        got: points.len(),
                    }
                    .into());
                }
            },
        };
        geometry.validate()?;

        Ok(TakeoffItem::reconstruct(
            record.id,
            record.page,
            geometry,
            record.style.clone(),
            record.template.clone(),
        ))
    }
}

/// Calibration of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub page: PageNumber,
    pub calibration: Calibration,
}

/// Where the user was looking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewerState {
    pub page: PageNumber,
    pub rotation: Rotation,
    pub zoom: f64,
}

impl Default for ViewerState {
    fn default() -> Self {
        Self {
            page: 1,
            rotation: Rotation::Deg0,
            zoom: 1.0,
        }
    }
}

/// Placement of the floating legend panel on a page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegendUiState {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub font_size: f64,
    pub open: bool,
}

impl Default for LegendUiState {
    fn default() -> Self {
        Self {
            x: 24.0,
            y: 24.0,
            w: 280.0,
            h: 200.0,
            font_size: 12.0,
            open: true,
        }
    }
}

/// Everything the write-back persists for one document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub items: Vec<TakeoffItem>,
    pub calibrations: BTreeMap<PageNumber, Calibration>,
    pub viewer: ViewerState,
}

impl SessionSnapshot {
    pub fn item_ids(&self) -> BTreeSet<ItemId> {
        self.items.iter().map(TakeoffItem::id).collect()
    }
}

/// Records of a single document, as held by the bundled stores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecords {
    #[serde(default)]
    pub items: BTreeMap<ItemId, StoredItem>,
    #[serde(default)]
    pub calibrations: BTreeMap<PageNumber, Calibration>,
    #[serde(default)]
    pub viewer: Option<ViewerState>,
    #[serde(default)]
    pub legends: BTreeMap<PageNumber, LegendUiState>,
}

impl DocumentRecords {
    pub fn upsert_items(&mut self, items: &[StoredItem]) {
        for item in items {
            self.items.insert(item.id(), item.clone());
        }
    }

    pub fn delete_items(&mut self, ids: &[ItemId]) {
        for id in ids {
            self.items.remove(id);
        }
    }

    pub fn calibration_records(&self) -> Vec<CalibrationRecord> {
        self.calibrations
            .iter()
            .map(|(page, calibration)| CalibrationRecord {
                page: *page,
                calibration: calibration.clone(),
            })
            .collect()
    }
}

/// Trait for takeoff storage backends.
///
/// Writes are idempotent upserts keyed by item id. Implementations must be
/// Send + Sync.
pub trait PersistencePort: Send + Sync {
    /// Insert or replace items.
    fn upsert_items(&self, document_id: &str, items: &[StoredItem])
    -> BoxFuture<'_, StorageResult<()>>;

    /// Delete items by id. Unknown ids are ignored.
    fn delete_items(&self, document_id: &str, ids: &[ItemId]) -> BoxFuture<'_, StorageResult<()>>;

    /// Load every item of a document.
    fn load_items(&self, document_id: &str) -> BoxFuture<'_, StorageResult<Vec<StoredItem>>>;

    fn save_calibration(
        &self,
        document_id: &str,
        record: &CalibrationRecord,
    ) -> BoxFuture<'_, StorageResult<()>>;

    fn delete_calibration(
        &self,
        document_id: &str,
        page: PageNumber,
    ) -> BoxFuture<'_, StorageResult<()>>;

    fn load_calibrations(
        &self,
        document_id: &str,
    ) -> BoxFuture<'_, StorageResult<Vec<CalibrationRecord>>>;

    fn save_viewer_state(
        &self,
        document_id: &str,
        state: &ViewerState,
    ) -> BoxFuture<'_, StorageResult<()>>;

    fn load_viewer_state(
        &self,
        document_id: &str,
    ) -> BoxFuture<'_, StorageResult<Option<ViewerState>>>;

    fn save_legend_state(
        &self,
        document_id: &str,
        page: PageNumber,
        state: &LegendUiState,
    ) -> BoxFuture<'_, StorageResult<()>>;

    fn load_legend_state(
        &self,
        document_id: &str,
        page: PageNumber,
    ) -> BoxFuture<'_, StorageResult<Option<LegendUiState>>>;
}

#[cfg(test)]
pub(crate) fn block_on<F: std::future::Future>(f: F) -> F::Output {
    // Simple blocking executor for tests
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn dummy_raw_waker() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            dummy_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut f = std::pin::pin!(f);

    loop {
        match f.as_mut().poll(&mut cx) {
            Poll::Ready(result) => return result,
            Poll::Pending => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TakeoffError;

    fn roundtrip(item: TakeoffItem) {
        let stored = StoredItem::from_item(&item);
        assert_eq!(stored.to_item().unwrap(), item);
    }

    #[test]
    fn test_records_rebuild_every_kind() {
        let mut line = Line::from_points(vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 3.0),
        ]);
        line.closed = true;
        line.dashed = true;
        line.stroke_width = 3.5;

        roundtrip(TakeoffItem::new(1, Geometry::Line(line), ItemStyle::new("blue")));
        roundtrip(TakeoffItem::new(
            2,
            Geometry::Measure(Measure::new(Point::ZERO, Point::new(1.0, 1.0))),
            ItemStyle::new("red"),
        ));
        roundtrip(TakeoffItem::new(
            3,
            Geometry::Area(Area::rectangle(Point::ZERO, Point::new(2.0, 2.0))),
            ItemStyle::new("green"),
        ));
        roundtrip(TakeoffItem::new(
            4,
            Geometry::Count(Count::new(Point::new(5.0, 5.0)).with_value(3.0)),
            ItemStyle::new("amber").with_shape(crate::palette::MarkerShape::Diamond),
        ));
    }

    #[test]
    fn test_geometry_type_mapping() {
        let area = TakeoffItem::new(
            1,
            Geometry::Area(Area::rectangle(Point::ZERO, Point::new(2.0, 2.0))),
            ItemStyle::new("green"),
        );
        assert_eq!(
            StoredItem::from_item(&area).geometry.geometry_type,
            GeometryType::Polygon
        );
        let json = serde_json::to_string(&StoredItem::from_item(&area).geometry).unwrap();
        assert!(json.contains("\"polygon\""));
    }

    #[test]
    fn test_invalid_record_rejected() {
        let area = TakeoffItem::new(
            1,
            Geometry::Area(Area::rectangle(Point::ZERO, Point::new(2.0, 2.0))),
            ItemStyle::new("green"),
        );
        let mut stored = StoredItem::from_item(&area);
        stored.geometry.points.truncate(2);
        let err = stored.to_item().unwrap_err();
        assert_eq!(err.reject_reason(), Some(&RejectReason::TooFewAreaPoints(2)));

        let mut mismatched = StoredItem::from_item(&area);
        mismatched.geometry.geometry_type = GeometryType::Point;
        assert!(matches!(
            mismatched.to_item(),
            Err(TakeoffError::Persistence(StorageError::Serialization(_)))
        ));
    }
}
