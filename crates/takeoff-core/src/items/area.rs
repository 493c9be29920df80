//! Polygon area.

use super::{
    GEOMETRY_EPSILON, ItemGeometry, Segment, point_in_polygon, point_to_segments_dist,
    polygon_area, segments_of,
};
use crate::error::RejectReason;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// A closed polygon of at least three points. The closing edge is implicit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub points: Vec<Point>,
}

impl Area {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Axis-aligned rectangle spanned by two opposite corners.
    pub fn rectangle(a: Point, b: Point) -> Self {
        let rect = Rect::from_points(a, b);
        Self::new(vec![
            Point::new(rect.x0, rect.y0),
            Point::new(rect.x1, rect.y0),
            Point::new(rect.x1, rect.y1),
            Point::new(rect.x0, rect.y1),
        ])
    }

    pub fn area(&self) -> f64 {
        polygon_area(&self.points)
    }

    pub fn contains(&self, point: Point) -> bool {
        point_in_polygon(point, &self.points)
    }
}

impl ItemGeometry for Area {
    fn vertices(&self) -> Vec<Point> {
        self.points.clone()
    }

    fn segments(&self) -> Vec<Segment> {
        segments_of(&self.points, true)
    }

    fn distance_to(&self, point: Point) -> f64 {
        if self.contains(point) {
            0.0
        } else {
            point_to_segments_dist(point, &self.segments())
        }
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
        if self.points.len() < 3 {
            return Err(RejectReason::TooFewAreaPoints(self.points.len()));
        }
        if self.area() < GEOMETRY_EPSILON {
            return Err(RejectReason::ZeroArea);
        }
        Ok(())
    }

    fn raw_quantity(&self) -> f64 {
        self.area()
    }
}
