//! Selection, hit testing and drag editing of items.

use crate::items::{Geometry, ItemId, PageNumber, TakeoffItem};
use kurbo::{Point, Vec2};

/// What a pointer press landed on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitTarget {
    /// A vertex handle of an item.
    Vertex {
        item_id: ItemId,
        index: usize,
        point: Point,
    },
    /// The body of an item (inside an area, or near a drawn segment).
    Body { item_id: ItemId },
}

impl HitTarget {
    pub fn item_id(&self) -> ItemId {
        match self {
            HitTarget::Vertex { item_id, .. } | HitTarget::Body { item_id } => *item_id,
        }
    }

    /// The drag mode a press on this target starts.
    pub fn drag_mode(&self) -> DragMode {
        match self {
            HitTarget::Vertex { index, .. } => DragMode::Handle { index: *index },
            HitTarget::Body { .. } => DragMode::Move,
        }
    }
}

/// Hit test the items of `page` at `point`.
///
/// Vertices of every item are tried first. Failing that, an area containing
/// the point is hit at distance zero; otherwise the nearest drawn geometry
/// within `tolerance` wins. Later items sit on top and win ties.
pub fn hit_test(
    items: &[TakeoffItem],
    page: PageNumber,
    point: Point,
    tolerance: f64,
) -> Option<HitTarget> {
    let on_page = || items.iter().filter(move |item| item.page == page);

    let mut best_vertex: Option<(f64, HitTarget)> = None;
    for item in on_page() {
        for (index, vertex) in item.geometry.vertices().into_iter().enumerate() {
            let distance = vertex.distance(point);
            if distance > tolerance {
                continue;
            }
            if best_vertex.as_ref().is_none_or(|(d, _)| distance <= *d) {
                best_vertex = Some((
                    distance,
                    HitTarget::Vertex {
                        item_id: item.id(),
                        index,
                        point: vertex,
                    },
                ));
            }
        }
    }
    if let Some((_, target)) = best_vertex {
        return Some(target);
    }

    let inside_area = on_page()
        .filter(|item| matches!(&item.geometry, Geometry::Area(area) if area.contains(point)))
        .last();
    if let Some(item) = inside_area {
        return Some(HitTarget::Body { item_id: item.id() });
    }

    let mut best_body: Option<(f64, ItemId)> = None;
    for item in on_page() {
        let distance = item.geometry.distance_to(point);
        if distance > tolerance {
            continue;
        }
        if best_body.is_none_or(|(d, _)| distance <= d) {
            best_body = Some((distance, item.id()));
        }
    }
    best_body.map(|(_, item_id)| HitTarget::Body { item_id })
}

/// How a drag changes the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    /// Moves a single vertex.
    Handle { index: usize },
    /// Translates the whole item.
    Move,
}

/// State of an active drag on one item.
///
/// The preview is always rebuilt from the captured original plus the
/// cumulative delta.
#[derive(Debug, Clone)]
pub struct DragState {
    pub item_id: ItemId,
    pub mode: DragMode,
    /// Document point where the drag started.
    pub start_point: Point,
    /// Latest document point of the drag.
    pub current_point: Point,
    /// Item as it was when the drag started.
    pub original: TakeoffItem,
    /// Whole item array at drag start, recorded as one history entry on release.
    pub before: Vec<TakeoffItem>,
}

impl DragState {
    pub fn new(
        original: TakeoffItem,
        mode: DragMode,
        start_point: Point,
        before: Vec<TakeoffItem>,
    ) -> Self {
        Self {
            item_id: original.id(),
            mode,
            start_point,
            current_point: start_point,
            original,
            before,
        }
    }

    /// Get the drag delta.
    pub fn delta(&self) -> Vec2 {
        self.current_point - self.start_point
    }

    /// Where the dragged vertex would go without snapping.
    ///
    /// For a move this is the pointer position itself.
    pub fn target(&self) -> Point {
        match self.mode {
            DragMode::Handle { index } => {
                let origin = self
                    .original
                    .geometry
                    .vertices()
                    .get(index)
                    .copied()
                    .unwrap_or(self.start_point);
                origin + self.delta()
            }
            DragMode::Move => self.current_point,
        }
    }

    /// Item with the cumulative delta applied.
    pub fn preview(&self) -> TakeoffItem {
        self.preview_to(self.target())
    }

    /// Item with the dragged vertex placed at `target`.
    ///
    /// For a move, `target` stands in for the pointer position.
    pub fn preview_to(&self, target: Point) -> TakeoffItem {
        let mut item = self.original.clone();
        match self.mode {
            DragMode::Handle { index } => {
                item.geometry.move_vertex(index, target);
            }
            DragMode::Move => item.geometry.translate(target - self.start_point),
        }
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{Area, Count, ItemStyle, Line};

    fn items() -> Vec<TakeoffItem> {
        vec![
            TakeoffItem::new(
                1,
                Geometry::Area(Area::rectangle(Point::new(0.0, 0.0), Point::new(100.0, 100.0))),
                ItemStyle::new("blue"),
            ),
            TakeoffItem::new(
                1,
                Geometry::Line(Line::segment(Point::new(20.0, 50.0), Point::new(80.0, 50.0))),
                ItemStyle::new("red"),
            ),
            TakeoffItem::new(
                2,
                Geometry::Count(Count::new(Point::new(50.0, 50.0))),
                ItemStyle::new("green"),
            ),
        ]
    }

    #[test]
    fn test_vertex_hit_first() {
        let items = items();
        let hit = hit_test(&items, 1, Point::new(21.0, 51.0), 4.0).unwrap();
        assert_eq!(
            hit,
            HitTarget::Vertex {
                item_id: items[1].id(),
                index: 0,
                point: Point::new(20.0, 50.0),
            }
        );
        assert_eq!(hit.drag_mode(), DragMode::Handle { index: 0 });
    }

    #[test]
    fn test_area_interior_beats_nearby_segment() {
        let items = items();
        // 2 px from the line, but inside the area
        let hit = hit_test(&items, 1, Point::new(50.0, 52.0), 4.0).unwrap();
        assert_eq!(hit, HitTarget::Body { item_id: items[0].id() });
        assert_eq!(hit.drag_mode(), DragMode::Move);
    }

    #[test]
    fn test_segment_hit_within_tolerance() {
        let items = vec![TakeoffItem::new(
            1,
            Geometry::Line(Line::segment(Point::new(0.0, 0.0), Point::new(100.0, 0.0))),
            ItemStyle::new("red"),
        )];
        assert!(hit_test(&items, 1, Point::new(50.0, 3.0), 4.0).is_some());
        assert!(hit_test(&items, 1, Point::new(50.0, 5.0), 4.0).is_none());
    }

    #[test]
    fn test_other_pages_ignored() {
        let items = items();
        assert!(hit_test(&items, 3, Point::new(50.0, 50.0), 4.0).is_none());
        let hit = hit_test(&items, 2, Point::new(50.0, 50.0), 4.0).unwrap();
        assert_eq!(hit.item_id(), items[2].id());
    }

    #[test]
    fn test_move_uses_cumulative_delta() {
        let items = items();
        let mut drag = DragState::new(
            items[1].clone(),
            DragMode::Move,
            Point::new(50.0, 50.0),
            items.clone(),
        );
        drag.current_point = Point::new(55.0, 50.0);
        drag.current_point = Point::new(60.0, 45.0);

        let preview = drag.preview();
        assert_eq!(preview.id(), items[1].id());
        assert_eq!(
            preview.geometry.vertices(),
            vec![Point::new(30.0, 45.0), Point::new(90.0, 45.0)]
        );
        // The original snapshot is untouched
        assert_eq!(drag.original, items[1]);
    }

    #[test]
    fn test_handle_drag_moves_one_vertex() {
        let items = items();
        let mut drag = DragState::new(
            items[0].clone(),
            DragMode::Handle { index: 2 },
            Point::new(101.0, 101.0),
            items.clone(),
        );
        drag.current_point = Point::new(121.0, 111.0);
        assert_eq!(drag.target(), Point::new(120.0, 110.0));

        let preview = drag.preview_to(Point::new(120.0, 110.0));
        let vertices = preview.geometry.vertices();
        assert_eq!(vertices[2], Point::new(120.0, 110.0));
        assert_eq!(vertices[0], Point::new(0.0, 0.0));
    }
}
