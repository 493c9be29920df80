//! Linear run: a segment or polyline.

use super::{
    GEOMETRY_EPSILON, ItemGeometry, Segment, point_to_segments_dist, polyline_length, segments_of,
};
use crate::error::RejectReason;
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

fn default_stroke_width() -> f64 {
    2.0
}

/// An ordered run of at least two points.
///
/// Lines are usually drawn as two-point segments and later merged into
/// longer polylines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub points: Vec<Point>,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub dashed: bool,
    #[serde(default)]
    pub arrow_end: bool,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
}

impl Line {
    /// Create a two-point segment.
    pub fn segment(start: Point, end: Point) -> Self {
        Self::from_points(vec![start, end])
    }

    /// Create an open polyline from points.
    pub fn from_points(points: Vec<Point>) -> Self {
        Self {
            points,
            closed: false,
            dashed: false,
            arrow_end: false,
            stroke_width: default_stroke_width(),
        }
    }

    /// Copy the drawing flags of another line.
    pub fn with_flags_of(mut self, other: &Line) -> Self {
        self.dashed = other.dashed;
        self.arrow_end = other.arrow_end;
        self.stroke_width = other.stroke_width;
        self
    }

    pub fn length(&self) -> f64 {
        polyline_length(&self.points, self.closed)
    }
}

impl ItemGeometry for Line {
    fn vertices(&self) -> Vec<Point> {
        self.points.clone()
    }

    fn segments(&self) -> Vec<Segment> {
        segments_of(&self.points, self.closed)
    }

    fn distance_to(&self, point: Point) -> f64 {
        point_to_segments_dist(point, &self.segments())
    }

    fn translate(&mut self, delta: Vec2) {
        for p in &mut self.points {
            *p += delta;
        }
    }

    fn move_vertex(&mut self, index: usize, to: Point) -> bool {
        match self.points.get_mut(index) {
            Some(p) => {
                *p = to;
                true
            }
            None => false,
        }
    }

    fn validate(&self) -> Result<(), RejectReason> {
        if self.points.len() < 2 {
            return Err(RejectReason::PointCount {
                kind: "Line",
                expected: "at least 2",
                got: self.points.len(),
            });
        }
        if self
            .points
            .windows(2)
            .any(|w| w[0].distance(w[1]) < GEOMETRY_EPSILON)
        {
            return Err(RejectReason::ZeroLengthSegment);
        }
        Ok(())
    }

    fn raw_quantity(&self) -> f64 {
        self.length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polyline_length() {
        let line = Line::from_points(vec![
            Point::new(0.0, 0.0),
            Point::new(3.0, 4.0),
            Point::new(3.0, 10.0),
        ]);
        assert!((line.raw_quantity() - 11.0).abs() < f64::EPSILON);
        assert_eq!(line.segments().len(), 2);
    }

    #[test]
    fn test_closed_adds_closing_edge() {
        let mut line = Line::from_points(vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 3.0),
        ]);
        line.closed = true;
        assert!((line.raw_quantity() - 12.0).abs() < f64::EPSILON);
        assert_eq!(line.segments().len(), 3);
    }

    #[test]
    fn test_validate() {
        assert!(Line::segment(Point::ZERO, Point::new(1.0, 0.0)).validate().is_ok());
        assert_eq!(
            Line::segment(Point::ZERO, Point::ZERO).validate(),
            Err(RejectReason::ZeroLengthSegment)
        );
        assert!(matches!(
            Line::from_points(vec![Point::ZERO]).validate(),
            Err(RejectReason::PointCount { got: 1, .. })
        ));
    }

    #[test]
    fn test_translate() {
        let mut line = Line::segment(Point::ZERO, Point::new(1.0, 0.0));
        line.translate(Vec2::new(2.0, 3.0));
        assert_eq!(line.points, vec![Point::new(2.0, 3.0), Point::new(3.0, 3.0)]);
    }
}
