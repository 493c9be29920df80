//! Reference measurement between two points.

use super::{GEOMETRY_EPSILON, ItemGeometry, Segment, point_to_segment_dist};
use crate::error::RejectReason;
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// A two-point measurement. Never merged with anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub start: Point,
    pub end: Point,
}

impl Measure {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }

    pub fn midpoint(&self) -> Point {
        self.start.midpoint(self.end)
    }
}

impl ItemGeometry for Measure {
    fn vertices(&self) -> Vec<Point> {
        vec![self.start, self.end]
    }

    fn segments(&self) -> Vec<Segment> {
        vec![Segment::new(self.start, self.end)]
    }

    fn distance_to(&self, point: Point) -> f64 {
        point_to_segment_dist(point, self.start, self.end)
    }

    fn translate(&mut self, delta: Vec2) {
        self.start += delta;
        self.end += delta;
    }

    fn move_vertex(&mut self, index: usize, to: Point) -> bool {
        match index {
            0 => self.start = to,
            1 => self.end = to,
            _ => return false,
        }
        true
    }

    fn validate(&self) -> Result<(), RejectReason> {
        if self.length() < GEOMETRY_EPSILON {
            return Err(RejectReason::ZeroLengthSegment);
        }
        Ok(())
    }

    fn raw_quantity(&self) -> f64 {
        self.length()
    }
}
