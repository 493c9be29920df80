//! Vector edge snapshots supplied by the page renderer.

use crate::error::{TakeoffError, TakeoffResult};
use crate::items::{PageNumber, Segment};
use crate::viewport::Rotation;
use kurbo::Size;
use std::fmt;
use std::sync::Arc;

/// Identifies which rendered page a snapshot belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeSnapshotKey {
    pub document_id: String,
    pub page: PageNumber,
    pub rotation: Rotation,
}

impl EdgeSnapshotKey {
    pub fn new(document_id: impl Into<String>, page: PageNumber, rotation: Rotation) -> Self {
        Self {
            document_id: document_id.into(),
            page,
            rotation,
        }
    }
}

impl fmt::Display for EdgeSnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} page {} at {}°",
            self.document_id,
            self.page,
            self.rotation.degrees()
        )
    }
}

/// Immutable flattened vector edges of one page, in document space.
#[derive(Debug, Clone)]
pub struct EdgeSnapshot {
    pub key: EdgeSnapshotKey,
    edges: Arc<[Segment]>,
}

impl EdgeSnapshot {
    pub fn new(key: EdgeSnapshotKey, edges: Vec<Segment>) -> Self {
        Self {
            key,
            edges: edges.into(),
        }
    }

    pub fn edges(&self) -> &[Segment] {
        &self.edges
    }
}

/// Holds the edge snapshot for the page currently on screen.
///
/// Snapshots arrive asynchronously; one whose key no longer matches the
/// expected page is rejected.
#[derive(Debug, Default)]
pub struct EdgeCache {
    expected: Option<EdgeSnapshotKey>,
    current: Option<EdgeSnapshot>,
}

impl EdgeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start expecting edges for `key`, dropping any snapshot for another key.
    pub fn expect(&mut self, key: EdgeSnapshotKey) {
        if self.current.as_ref().is_some_and(|s| s.key != key) {
            self.current = None;
        }
        self.expected = Some(key);
    }

    pub fn expected(&self) -> Option<&EdgeSnapshotKey> {
        self.expected.as_ref()
    }

    /// Install a delivered snapshot if it is still wanted.
    pub fn accept(&mut self, snapshot: EdgeSnapshot) -> TakeoffResult<()> {
        if self.expected.as_ref() != Some(&snapshot.key) {
            log::warn!("Discarding stale edge snapshot for {}", snapshot.key);
            return Err(TakeoffError::StaleResult(snapshot.key.to_string()));
        }
        log::debug!(
            "Accepted {} vector edges for {}",
            snapshot.edges.len(),
            snapshot.key
        );
        self.current = Some(snapshot);
        Ok(())
    }

    /// Edges for the expected page, empty when none have arrived.
    pub fn edges(&self) -> &[Segment] {
        self.current.as_ref().map(|s| s.edges()).unwrap_or(&[])
    }

    pub fn is_available(&self) -> bool {
        self.current.is_some()
    }

    pub fn clear(&mut self) {
        self.expected = None;
        self.current = None;
    }
}

/// Page renderer consumed by the session.
pub trait RenderPort {
    /// Rasterize a page and return its size in document pixels.
    fn render_page(&self, page: PageNumber, rotation: Rotation, scale: f64) -> TakeoffResult<Size>;

    /// Flattened vector edges of a page, if the renderer can extract them.
    fn vector_edges(&self, page: PageNumber, rotation: Rotation) -> Option<Vec<Segment>> {
        let _ = (page, rotation);
        None
    }
}
