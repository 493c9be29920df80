//! Ortho constraint: lock the next point to a horizontal or vertical line.

use crate::items::{GEOMETRY_EPSILON, Segment};
use kurbo::Point;

/// Axis a point is locked to, relative to an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Keep the anchor's y.
    Horizontal,
    /// Keep the anchor's x.
    Vertical,
}

impl Axis {
    /// Axis with the larger delta from `anchor` to `raw`. Ties go horizontal.
    pub fn dominant(anchor: Point, raw: Point) -> Self {
        let delta = raw - anchor;
        if delta.x.abs() >= delta.y.abs() {
            Axis::Horizontal
        } else {
            Axis::Vertical
        }
    }

    /// Project `point` onto the locked line through `anchor`.
    pub fn lock(self, anchor: Point, point: Point) -> Point {
        match self {
            Axis::Horizontal => Point::new(point.x, anchor.y),
            Axis::Vertical => Point::new(anchor.x, point.y),
        }
    }

    /// Perpendicular distance of `point` from the locked line.
    pub fn offset_from_line(self, anchor: Point, point: Point) -> f64 {
        match self {
            Axis::Horizontal => (point.y - anchor.y).abs(),
            Axis::Vertical => (point.x - anchor.x).abs(),
        }
    }

    /// Where the locked line crosses `segment`, if it does at a single point.
    pub fn cross_segment(self, anchor: Point, segment: &Segment) -> Option<Point> {
        let (a, b) = (segment.p0, segment.p1);
        match self {
            Axis::Horizontal => {
                let dy = b.y - a.y;
                if dy.abs() < GEOMETRY_EPSILON {
                    return None;
                }
                let t = (anchor.y - a.y) / dy;
                (0.0..=1.0)
                    .contains(&t)
                    .then(|| Point::new(a.x + (b.x - a.x) * t, anchor.y))
            }
            Axis::Vertical => {
                let dx = b.x - a.x;
                if dx.abs() < GEOMETRY_EPSILON {
                    return None;
                }
                let t = (anchor.x - a.x) / dx;
                (0.0..=1.0)
                    .contains(&t)
                    .then(|| Point::new(anchor.x, a.y + (b.y - a.y) * t))
            }
        }
    }
}

/// Lock `raw` to the dominant axis from `anchor`.
pub fn constrain(anchor: Point, raw: Point) -> (Point, Axis) {
    let axis = Axis::dominant(anchor, raw);
    (axis.lock(anchor, raw), axis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_lock() {
        let (point, axis) = constrain(Point::new(0.0, 0.0), Point::new(5.0, 1.0));
        assert_eq!(point, Point::new(5.0, 0.0));
        assert_eq!(axis, Axis::Horizontal);
    }

    #[test]
    fn test_vertical_lock() {
        let (point, axis) = constrain(Point::new(2.0, 2.0), Point::new(3.0, -8.0));
        assert_eq!(point, Point::new(2.0, -8.0));
        assert_eq!(axis, Axis::Vertical);
    }

    #[test]
    fn test_cross_segment() {
        let segment = Segment::new(Point::new(10.0, -5.0), Point::new(10.0, 5.0));
        let anchor = Point::new(0.0, 2.0);
        assert_eq!(
            Axis::Horizontal.cross_segment(anchor, &segment),
            Some(Point::new(10.0, 2.0))
        );
        assert_eq!(Axis::Vertical.cross_segment(anchor, &segment), None);

        let far = Point::new(0.0, 20.0);
        assert_eq!(Axis::Horizontal.cross_segment(far, &segment), None);
    }
}
