//! Snapping to existing geometry and renderer vector edges.

use crate::config::EngineConfig;
use crate::items::{
    ItemId, PageNumber, Segment, TakeoffItem, closest_point_on_segment, segment_intersection,
};
use crate::tools::Axis;
use kurbo::Point;

/// Distances below this count as "already on the target".
const SNAP_EPSILON: f64 = 1e-9;

/// Type of snap target, for the cursor indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapKind {
    /// Vertex of an item.
    Vertex,
    /// Point on an item edge or vector edge.
    Edge,
    /// Crossing of two edges.
    Intersection,
}

impl SnapKind {
    /// Order used to break exact distance ties.
    fn rank(self) -> u8 {
        match self {
            SnapKind::Vertex => 0,
            SnapKind::Intersection => 1,
            SnapKind::Edge => 2,
        }
    }
}

/// Result of a snap operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapResult {
    /// The snapped point.
    pub point: Point,
    /// The point before snapping.
    pub raw: Point,
    /// Which kind of candidate won, if any did.
    pub kind: Option<SnapKind>,
}

impl SnapResult {
    /// Create a result with no snapping.
    pub fn none(point: Point) -> Self {
        Self {
            point,
            raw: point,
            kind: None,
        }
    }

    /// Check if a candidate was found.
    pub fn is_snapped(&self) -> bool {
        self.kind.is_some()
    }

    /// Check if snapping moved the point.
    pub fn moved(&self) -> bool {
        self.point != self.raw
    }
}

/// Geometry that points can snap to.
#[derive(Debug, Clone, Default)]
pub struct SnapContext {
    vertices: Vec<Point>,
    edges: Vec<Segment>,
}

impl SnapContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect vertices and edges of the items on `page`, skipping `exclude`.
    pub fn from_items<'a>(
        items: impl IntoIterator<Item = &'a TakeoffItem>,
        page: PageNumber,
        exclude: Option<ItemId>,
    ) -> Self {
        let mut context = Self::new();
        for item in items {
            if item.page != page || Some(item.id()) == exclude {
                continue;
            }
            context.vertices.extend(item.geometry.vertices());
            context.edges.extend(item.geometry.segments());
        }
        context
    }

    /// Add renderer vector edges. They behave exactly like item edges.
    pub fn with_edges(mut self, edges: &[Segment]) -> Self {
        self.edges.extend_from_slice(edges);
        self
    }

    pub fn push_vertex(&mut self, point: Point) {
        self.vertices.push(point);
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn edges(&self) -> &[Segment] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.edges.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    point: Point,
    kind: SnapKind,
    distance: f64,
}

impl Candidate {
    fn beats(&self, other: &Candidate) -> bool {
        if (self.distance - other.distance).abs() > SNAP_EPSILON {
            self.distance < other.distance
        } else {
            self.kind.rank() < other.kind.rank()
        }
    }
}

fn keep_best(best: &mut Option<Candidate>, candidate: Candidate) {
    if best.as_ref().is_none_or(|b| candidate.beats(b)) {
        *best = Some(candidate);
    }
}

/// Finds the nearest snap candidate within a screen-space tolerance.
#[derive(Debug, Clone)]
pub struct SnapEngine {
    pub enabled: bool,
    /// Tolerance in screen pixels.
    pub tolerance_px: f64,
    /// How many nearby edges are paired up when looking for intersections.
    pub intersection_edge_budget: usize,
}

impl Default for SnapEngine {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl SnapEngine {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            enabled: true,
            tolerance_px: config.snap_tolerance_px,
            intersection_edge_budget: config.intersection_edge_budget,
        }
    }

    /// Snap `raw` to the nearest candidate within tolerance.
    ///
    /// Candidates are chosen by proximity alone. Snapping an already snapped
    /// point returns it unchanged.
    pub fn snap(&self, raw: Point, context: &SnapContext, zoom: f64) -> SnapResult {
        if !self.enabled || context.is_empty() {
            return SnapResult::none(raw);
        }
        let tolerance = self.tolerance_px / zoom;
        let mut best: Option<Candidate> = None;

        for &vertex in &context.vertices {
            keep_best(
                &mut best,
                Candidate {
                    point: vertex,
                    kind: SnapKind::Vertex,
                    distance: raw.distance(vertex),
                },
            );
        }

        let mut nearby: Vec<(f64, Point, &Segment)> = context
            .edges
            .iter()
            .filter_map(|edge| {
                let (projection, _) = closest_point_on_segment(raw, edge.p0, edge.p1);
                let distance = raw.distance(projection);
                (distance <= tolerance).then_some((distance, projection, edge))
            })
            .collect();

        for &(distance, projection, _) in &nearby {
            keep_best(
                &mut best,
                Candidate {
                    point: projection,
                    kind: SnapKind::Edge,
                    distance,
                },
            );
        }

        nearby.sort_by(|a, b| a.0.total_cmp(&b.0));
        nearby.truncate(self.intersection_edge_budget);
        for (i, (_, _, a)) in nearby.iter().enumerate() {
            for (_, _, b) in &nearby[i + 1..] {
                if let Some(crossing) = segment_intersection(a, b) {
                    keep_best(
                        &mut best,
                        Candidate {
                            point: crossing,
                            kind: SnapKind::Intersection,
                            distance: raw.distance(crossing),
                        },
                    );
                }
            }
        }

        match best {
            Some(candidate) if candidate.distance <= tolerance => SnapResult {
                point: if candidate.distance <= SNAP_EPSILON {
                    raw
                } else {
                    candidate.point
                },
                raw,
                kind: Some(candidate.kind),
            },
            _ => SnapResult::none(raw),
        }
    }

    /// Snap along an ortho-locked line through `anchor`.
    ///
    /// `raw` is first locked to `axis`; only candidates on the locked line are
    /// considered, so the locked coordinate never moves.
    pub fn snap_on_axis(
        &self,
        raw: Point,
        anchor: Point,
        axis: Axis,
        context: &SnapContext,
        zoom: f64,
    ) -> SnapResult {
        let locked = axis.lock(anchor, raw);
        if !self.enabled || context.is_empty() {
            return SnapResult::none(locked);
        }
        let tolerance = self.tolerance_px / zoom;
        let mut best: Option<Candidate> = None;

        for &vertex in &context.vertices {
            if axis.offset_from_line(anchor, vertex) > tolerance {
                continue;
            }
            let on_line = axis.lock(anchor, vertex);
            if on_line.distance(anchor) < SNAP_EPSILON {
                continue;
            }
            keep_best(
                &mut best,
                Candidate {
                    point: on_line,
                    kind: SnapKind::Vertex,
                    distance: locked.distance(on_line),
                },
            );
        }

        for edge in &context.edges {
            if let Some(crossing) = axis.cross_segment(anchor, edge) {
                if crossing.distance(anchor) < SNAP_EPSILON {
                    continue;
                }
                keep_best(
                    &mut best,
                    Candidate {
                        point: crossing,
                        kind: SnapKind::Edge,
                        distance: locked.distance(crossing),
                    },
                );
            }
        }

        match best {
            Some(candidate) if candidate.distance <= tolerance => SnapResult {
                point: axis.lock(anchor, candidate.point),
                raw: locked,
                kind: Some(candidate.kind),
            },
            _ => SnapResult::none(locked),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{Area, Geometry, ItemStyle, Line};

    fn context() -> SnapContext {
        let items = vec![
            TakeoffItem::new(
                1,
                Geometry::Line(Line::segment(Point::new(0.0, 0.0), Point::new(100.0, 0.0))),
                ItemStyle::new("blue"),
            ),
            TakeoffItem::new(
                1,
                Geometry::Line(Line::segment(Point::new(50.0, -50.0), Point::new(50.0, 50.0))),
                ItemStyle::new("red"),
            ),
        ];
        SnapContext::from_items(&items, 1, None)
    }

    #[test]
    fn test_no_candidate_returns_raw() {
        let engine = SnapEngine::default();
        let raw = Point::new(300.0, 300.0);
        let result = engine.snap(raw, &context(), 1.0);
        assert_eq!(result.point, raw);
        assert!(!result.is_snapped());
    }

    #[test]
    fn test_snaps_to_vertex() {
        let engine = SnapEngine::default();
        // Past the segment end the projection clamps onto the vertex; the tie goes to the vertex
        let result = engine.snap(Point::new(103.0, 2.0), &context(), 1.0);
        assert_eq!(result.point, Point::new(100.0, 0.0));
        assert_eq!(result.kind, Some(SnapKind::Vertex));
    }

    #[test]
    fn test_nearest_candidate_wins_regardless_of_kind() {
        let engine = SnapEngine::default();
        let result = engine.snap(Point::new(96.0, 1.0), &context(), 1.0);
        assert_eq!(result.point, Point::new(96.0, 0.0));
        assert_eq!(result.kind, Some(SnapKind::Edge));
    }

    #[test]
    fn test_snaps_to_edge_projection() {
        let engine = SnapEngine::default();
        let result = engine.snap(Point::new(25.0, 4.0), &context(), 1.0);
        assert_eq!(result.point, Point::new(25.0, 0.0));
        assert_eq!(result.kind, Some(SnapKind::Edge));
        assert!(result.moved());
    }

    #[test]
    fn test_snaps_to_intersection() {
        let engine = SnapEngine::default();
        let result = engine.snap(Point::new(50.0, 0.0), &context(), 1.0);
        assert_eq!(result.point, Point::new(50.0, 0.0));
        assert_eq!(result.kind, Some(SnapKind::Intersection));
        assert!(!result.moved());
    }

    #[test]
    fn test_snap_is_idempotent() {
        let engine = SnapEngine::default();
        let ctx = context();
        for raw in [
            Point::new(53.0, 3.0),
            Point::new(25.0, 4.0),
            Point::new(103.0, 2.0),
            Point::new(48.0, 30.0),
            Point::new(300.0, 1.0),
        ] {
            let once = engine.snap(raw, &ctx, 1.0);
            let twice = engine.snap(once.point, &ctx, 1.0);
            assert_eq!(once.point, twice.point);
        }
    }

    #[test]
    fn test_tolerance_shrinks_with_zoom() {
        let engine = SnapEngine::default();
        // 8 px off the edge: inside at zoom 1, outside at zoom 2 (tolerance 5 doc px)
        let raw = Point::new(25.0, 8.0);
        assert!(engine.snap(raw, &context(), 1.0).is_snapped());
        assert!(!engine.snap(raw, &context(), 2.0).is_snapped());
    }

    #[test]
    fn test_vector_edges_snap_like_item_edges() {
        let engine = SnapEngine::default();
        let edges = [Segment::new(Point::new(0.0, 200.0), Point::new(100.0, 200.0))];
        let ctx = SnapContext::new().with_edges(&edges);
        let result = engine.snap(Point::new(40.0, 205.0), &ctx, 1.0);
        assert_eq!(result.point, Point::new(40.0, 200.0));
    }

    #[test]
    fn test_exclude_item() {
        let item = TakeoffItem::new(
            1,
            Geometry::Area(Area::rectangle(Point::ZERO, Point::new(10.0, 10.0))),
            ItemStyle::new("blue"),
        );
        let items = vec![item.clone()];
        assert!(SnapContext::from_items(&items, 1, Some(item.id())).is_empty());
        assert!(SnapContext::from_items(&items, 2, None).is_empty());
        assert!(!SnapContext::from_items(&items, 1, None).is_empty());
    }

    #[test]
    fn test_axis_snap_keeps_locked_coordinate() {
        let engine = SnapEngine::default();
        let anchor = Point::new(0.0, 20.0);
        // Vertical edge at x = 50 crosses the horizontal lock line y = 20
        let result = engine.snap_on_axis(Point::new(46.0, 23.0), anchor, Axis::Horizontal, &context(), 1.0);
        assert_eq!(result.point, Point::new(50.0, 20.0));
        assert_eq!(result.kind, Some(SnapKind::Edge));
    }

    #[test]
    fn test_axis_snap_without_candidate_returns_locked() {
        let engine = SnapEngine::default();
        let anchor = Point::new(0.0, 0.0);
        let result = engine.snap_on_axis(
            Point::new(5.0, 1.0),
            anchor,
            Axis::Horizontal,
            &SnapContext::new(),
            1.0,
        );
        assert_eq!(result.point, Point::new(5.0, 0.0));
    }
}
