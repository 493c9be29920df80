//! Takeoff item definitions.

mod area;
mod count;
mod line;
mod measure;

pub use area::Area;
pub use count::Count;
pub use line::Line;
pub use measure::Measure;

use crate::error::{RejectReason, TakeoffResult};
use crate::palette::MarkerShape;
use crate::template::TemplateId;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for items.
pub type ItemId = Uuid;

/// One-based page number within a document.
pub type PageNumber = u32;

/// A straight segment in document space.
pub type Segment = kurbo::Line;

/// Lengths below this are treated as zero.
pub const GEOMETRY_EPSILON: f64 = 1e-9;

/// The four kinds of takeoff item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemKind {
    Measure,
    Line,
    Area,
    Count,
}

impl ItemKind {
    pub fn label(self) -> &'static str {
        match self {
            ItemKind::Measure => "Measure",
            ItemKind::Line => "Line",
            ItemKind::Area => "Area",
            ItemKind::Count => "Count",
        }
    }

    /// Unit a new template of this kind starts with.
    pub fn default_unit(self) -> &'static str {
        match self {
            ItemKind::Area => "sq ft",
            ItemKind::Count => "ea",
            ItemKind::Line | ItemKind::Measure => "ft",
        }
    }

    /// Category a new template of this kind starts with.
    pub fn default_category(self) -> &'static str {
        match self {
            ItemKind::Area => "Area",
            ItemKind::Count => "Count",
            ItemKind::Line | ItemKind::Measure => "Linear",
        }
    }

    /// Whether quantities of this kind are lengths.
    pub fn is_linear(self) -> bool {
        matches!(self, ItemKind::Line | ItemKind::Measure)
    }
}

/// Visual style of an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemStyle {
    /// Palette token, e.g. `"blue"`.
    pub color_token: String,
    /// Marker shape, only meaningful for Count items.
    #[serde(default)]
    pub shape: Option<MarkerShape>,
}

impl ItemStyle {
    pub fn new(color_token: impl Into<String>) -> Self {
        Self {
            color_token: color_token.into(),
            shape: None,
        }
    }

    pub fn with_shape(mut self, shape: MarkerShape) -> Self {
        self.shape = Some(shape);
        self
    }
}

/// Denormalized link from an item to the template it was tagged with.
///
/// The fields are copied at tag time so that items stay meaningful after the
/// template itself is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateLink {
    #[serde(default)]
    pub template_id: Option<TemplateId>,
    pub template_name: String,
    pub category: String,
    pub unit: String,
    #[serde(default)]
    pub is_markup: bool,
}

/// Common behaviour of every item geometry.
pub trait ItemGeometry {
    /// Points that can be grabbed as drag handles, in order.
    fn vertices(&self) -> Vec<Point>;

    /// Drawn segments, including the closing edge of closed shapes.
    fn segments(&self) -> Vec<Segment>;

    /// Minimum distance from `point` to the drawn geometry.
    fn distance_to(&self, point: Point) -> f64;

    /// Move every point by `delta`.
    fn translate(&mut self, delta: Vec2);

    /// Move a single vertex. Returns false if the index is out of range.
    fn move_vertex(&mut self, index: usize, to: Point) -> bool;

    /// Check the geometry is committable.
    fn validate(&self) -> Result<(), RejectReason>;

    /// Quantity in document units: pixels, square pixels, or the count value.
    fn raw_quantity(&self) -> f64;
}

/// Geometry of an item, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Geometry {
    Measure(Measure),
    Line(Line),
    Area(Area),
    Count(Count),
}

impl Geometry {
    pub fn kind(&self) -> ItemKind {
        match self {
            Geometry::Measure(_) => ItemKind::Measure,
            Geometry::Line(_) => ItemKind::Line,
            Geometry::Area(_) => ItemKind::Area,
            Geometry::Count(_) => ItemKind::Count,
        }
    }

    fn as_dyn(&self) -> &dyn ItemGeometry {
        match self {
            Geometry::Measure(g) => g,
            Geometry::Line(g) => g,
            Geometry::Area(g) => g,
            Geometry::Count(g) => g,
        }
    }

    fn as_dyn_mut(&mut self) -> &mut dyn ItemGeometry {
        match self {
            Geometry::Measure(g) => g,
            Geometry::Line(g) => g,
            Geometry::Area(g) => g,
            Geometry::Count(g) => g,
        }
    }

    pub fn vertices(&self) -> Vec<Point> {
        self.as_dyn().vertices()
    }

    pub fn segments(&self) -> Vec<Segment> {
        self.as_dyn().segments()
    }

    pub fn distance_to(&self, point: Point) -> f64 {
        self.as_dyn().distance_to(point)
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.as_dyn_mut().translate(delta)
    }

    pub fn move_vertex(&mut self, index: usize, to: Point) -> bool {
        self.as_dyn_mut().move_vertex(index, to)
    }

    pub fn validate(&self) -> Result<(), RejectReason> {
        self.as_dyn().validate()
    }

    pub fn raw_quantity(&self) -> f64 {
        self.as_dyn().raw_quantity()
    }

    pub fn bounds(&self) -> Rect {
        bounds_of(&self.vertices())
    }

    /// A Line made of at most two points, eligible for merging.
    pub fn is_segment(&self) -> bool {
        matches!(self, Geometry::Line(line) if line.points.len() <= 2)
    }
}

/// A quantified annotation on a plan page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakeoffItem {
    id: ItemId,
    pub page: PageNumber,
    pub style: ItemStyle,
    #[serde(default)]
    pub template: Option<TemplateLink>,
    pub geometry: Geometry,
}

impl TakeoffItem {
    /// Create a new item with a fresh id.
    pub fn new(page: PageNumber, geometry: Geometry, style: ItemStyle) -> Self {
        Self {
            id: Uuid::new_v4(),
            page,
            style,
            template: None,
            geometry,
        }
    }

    /// Reconstruct an item with a known id (for storage).
    pub(crate) fn reconstruct(
        id: ItemId,
        page: PageNumber,
        geometry: Geometry,
        style: ItemStyle,
        template: Option<TemplateLink>,
    ) -> Self {
        Self {
            id,
            page,
            style,
            template,
            geometry,
        }
    }

    pub fn with_template(mut self, link: TemplateLink) -> Self {
        self.template = Some(link);
        self
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn kind(&self) -> ItemKind {
        self.geometry.kind()
    }

    pub fn template_id(&self) -> Option<TemplateId> {
        self.template.as_ref().and_then(|link| link.template_id)
    }

    /// Name shown for the item: its template name, else its kind.
    pub fn display_name(&self) -> &str {
        match &self.template {
            Some(link) => &link.template_name,
            None => self.kind().label(),
        }
    }

    /// Return a copy with the patch applied. The original is left untouched.
    pub fn patched(&self, patch: &ItemPatch) -> TakeoffResult<TakeoffItem> {
        let mut next = self.clone();
        if let Some(geometry) = &patch.geometry {
            if geometry.kind() != self.kind() {
                return Err(RejectReason::KindMismatch.into());
            }
            geometry.validate()?;
            next.geometry = geometry.clone();
        }
        if let Some(style) = &patch.style {
            next.style = style.clone();
        }
        if let Some(template) = &patch.template {
            next.template = template.clone();
        }
        Ok(next)
    }
}

/// Partial update for an item. Absent fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub geometry: Option<Geometry>,
    pub style: Option<ItemStyle>,
    /// `Some(None)` unlinks the template.
    pub template: Option<Option<TemplateLink>>,
}

impl ItemPatch {
    pub fn geometry(geometry: Geometry) -> Self {
        Self {
            geometry: Some(geometry),
            ..Default::default()
        }
    }

    pub fn style(style: ItemStyle) -> Self {
        Self {
            style: Some(style),
            ..Default::default()
        }
    }

    pub fn template(template: Option<TemplateLink>) -> Self {
        Self {
            template: Some(template),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.geometry.is_none() && self.style.is_none() && self.template.is_none()
    }
}

/// Bounding box of a set of points.
pub fn bounds_of(points: &[Point]) -> Rect {
    let Some(first) = points.first() else {
        return Rect::ZERO;
    };
    points
        .iter()
        .skip(1)
        .fold(Rect::from_points(*first, *first), |rect, p| rect.union_pt(*p))
}

/// Closest point on segment `a`→`b` to `point`, with its parameter in [0, 1].
pub fn closest_point_on_segment(point: Point, a: Point, b: Point) -> (Point, f64) {
    let seg = b - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return (a, 0.0);
    }
    let t = ((point - a).dot(seg) / len_sq).clamp(0.0, 1.0);
    (a + seg * t, t)
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let (closest, _) = closest_point_on_segment(point, a, b);
    point.distance(closest)
}

/// Minimum distance from a point to a set of segments.
pub fn point_to_segments_dist(point: Point, segments: &[Segment]) -> f64 {
    segments
        .iter()
        .map(|s| point_to_segment_dist(point, s.p0, s.p1))
        .fold(f64::INFINITY, f64::min)
}

/// Length of a polyline, including the closing edge when `closed`.
pub fn polyline_length(points: &[Point], closed: bool) -> f64 {
    let open: f64 = points.windows(2).map(|w| w[0].distance(w[1])).sum();
    match (closed, points.first(), points.last()) {
        (true, Some(first), Some(last)) if points.len() > 2 => open + last.distance(*first),
        _ => open,
    }
}

/// Signed shoelace area. Positive for counter-clockwise winding in a y-up frame.
pub fn signed_polygon_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let n = points.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let p = points[i];
            let q = points[(i + 1) % n];
            p.x * q.y - q.x * p.y
        })
        .sum();
    twice / 2.0
}

/// Unsigned shoelace area.
pub fn polygon_area(points: &[Point]) -> f64 {
    signed_polygon_area(points).abs()
}

/// Ray-casting point-in-polygon test.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[j];
        if (a.y > point.y) != (b.y > point.y) {
            let x_cross = (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x;
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Intersection of two segments, with both parameters restricted to [0, 1].
///
/// Parallel and degenerate segments have no intersection.
pub fn segment_intersection(s1: &Segment, s2: &Segment) -> Option<Point> {
    let r = s1.p1 - s1.p0;
    let s = s2.p1 - s2.p0;
    let denom = r.cross(s);
    if denom.abs() < GEOMETRY_EPSILON {
        return None;
    }
    let qp = s2.p0 - s1.p0;
    let t = qp.cross(s) / denom;
    let u = qp.cross(r) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(s1.p0 + r * t)
    } else {
        None
    }
}

/// Segments joining consecutive points, plus the closing edge when `closed`.
pub(crate) fn segments_of(points: &[Point], closed: bool) -> Vec<Segment> {
    let mut segments: Vec<Segment> = points.windows(2).map(|w| Segment::new(w[0], w[1])).collect();
    if closed && points.len() > 2 {
        if let (Some(first), Some(last)) = (points.first(), points.last()) {
            segments.push(Segment::new(*last, *first));
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ]
    }

    #[test]
    fn test_shoelace_area() {
        assert!((polygon_area(&square()) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shoelace_invariant_under_rotation_and_reversal() {
        let polygon = vec![
            Point::new(1.0, 2.0),
            Point::new(7.5, 0.5),
            Point::new(9.0, 6.0),
            Point::new(4.0, 9.5),
            Point::new(0.0, 5.0),
        ];
        let expected = polygon_area(&polygon);
        for shift in 0..polygon.len() {
            let mut rotated = polygon.clone();
            rotated.rotate_left(shift);
            assert!((polygon_area(&rotated) - expected).abs() < 1e-9);
            rotated.reverse();
            assert!((polygon_area(&rotated) - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_point_to_segment_dist() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert!((point_to_segment_dist(Point::new(5.0, 3.0), a, b) - 3.0).abs() < f64::EPSILON);
        // Beyond the end clamps to the endpoint
        assert!((point_to_segment_dist(Point::new(13.0, 4.0), a, b) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_point_in_polygon() {
        let polygon = square();
        assert!(point_in_polygon(Point::new(5.0, 5.0), &polygon));
        assert!(!point_in_polygon(Point::new(15.0, 5.0), &polygon));
        assert!(!point_in_polygon(Point::new(5.0, 5.0), &polygon[..2]));
    }

    #[test]
    fn test_segment_intersection() {
        let s1 = Segment::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        let s2 = Segment::new(Point::new(0.0, 10.0), Point::new(10.0, 0.0));
        let hit = segment_intersection(&s1, &s2).unwrap();
        assert!((hit.x - 5.0).abs() < 1e-9 && (hit.y - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_segment_intersection_clamped() {
        let s1 = Segment::new(Point::new(0.0, 0.0), Point::new(4.0, 0.0));
        let s2 = Segment::new(Point::new(5.0, -1.0), Point::new(5.0, 1.0));
        assert!(segment_intersection(&s1, &s2).is_none());
        let parallel = Segment::new(Point::new(0.0, 1.0), Point::new(4.0, 1.0));
        assert!(segment_intersection(&s1, &parallel).is_none());
    }

    #[test]
    fn test_polyline_length_closed() {
        assert!((polyline_length(&square(), false) - 30.0).abs() < f64::EPSILON);
        assert!((polyline_length(&square(), true) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_patch_rejects_kind_change() {
        let item = TakeoffItem::new(
            1,
            Geometry::Count(Count::new(Point::new(1.0, 1.0))),
            ItemStyle::new("red"),
        );
        let patch = ItemPatch::geometry(Geometry::Measure(Measure::new(
            Point::ZERO,
            Point::new(1.0, 0.0),
        )));
        let err = item.patched(&patch).unwrap_err();
        assert_eq!(err.reject_reason(), Some(&RejectReason::KindMismatch));
    }

    #[test]
    fn test_patch_keeps_id_and_absent_fields() {
        let item = TakeoffItem::new(
            2,
            Geometry::Measure(Measure::new(Point::ZERO, Point::new(3.0, 4.0))),
            ItemStyle::new("red"),
        );
        let patched = item.patched(&ItemPatch::style(ItemStyle::new("blue"))).unwrap();
        assert_eq!(patched.id(), item.id());
        assert_eq!(patched.style.color_token, "blue");
        assert_eq!(patched.geometry, item.geometry);
    }

    #[test]
    fn test_bounds_of_points() {
        let rect = bounds_of(&square());
        assert!((rect.width() - 10.0).abs() < f64::EPSILON);
        assert!((rect.height() - 10.0).abs() < f64::EPSILON);
        assert_eq!(bounds_of(&[]), Rect::ZERO);
    }
}
