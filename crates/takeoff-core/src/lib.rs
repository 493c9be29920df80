//! Takeoff Core Library
//!
//! Platform-agnostic geometry, drafting and quantity engine for marking up
//! construction plans with measured takeoff items.

pub mod calibration;
pub mod config;
pub mod debounce;
pub mod edges;
pub mod error;
pub mod history;
pub mod input;
pub mod items;
pub mod legend;
pub mod merge;
pub mod palette;
pub mod selection;
pub mod session;
pub mod snap;
pub mod storage;
pub mod template;
pub mod tools;
pub mod viewport;

pub use calibration::{Calibration, DisplayUnit, PendingCalibration};
pub use config::EngineConfig;
pub use debounce::Debouncer;
pub use edges::{EdgeCache, EdgeSnapshot, EdgeSnapshotKey, RenderPort};
pub use error::{RejectReason, TakeoffError, TakeoffResult};
pub use history::History;
pub use input::{ClickTracker, Key, KeyEvent, Modifiers, MouseButton, PointerEvent};
pub use items::{
    Area, Count, Geometry, ItemId, ItemKind, ItemPatch, ItemStyle, Line, Measure, PageNumber,
    Segment, TakeoffItem, TemplateLink,
};
pub use legend::{DocumentLegend, GroupKey, LegendRow, PageLegend};
pub use merge::{MergePlan, apply_merge, plan_merge};
pub use palette::{MarkerShape, PALETTE, hex_for_token};
pub use selection::{DragMode, DragState, HitTarget, hit_test};
pub use session::{DraftView, Notification, NotificationLevel, SessionView, TakeoffSession};
pub use snap::{SnapContext, SnapEngine, SnapKind, SnapResult};
pub use storage::{FileStore, MemoryStore, PersistencePort, SessionSnapshot, WriteBack};
pub use template::{Template, TemplateCatalog, TemplateId};
pub use tools::{Axis, DraftOutcome, DraftPhase, ToolKind, ToolManager};
pub use viewport::{Rotation, Viewport};
