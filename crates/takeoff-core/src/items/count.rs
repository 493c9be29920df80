//! Discrete count marker.

use super::{ItemGeometry, Segment};
use crate::error::RejectReason;
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

fn default_value() -> f64 {
    1.0
}

/// A single marker carrying a numeric value, 1 unless edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Count {
    pub position: Point,
    #[serde(default = "default_value")]
    pub value: f64,
}

impl Count {
    pub fn new(position: Point) -> Self {
        Self {
            position,
            value: default_value(),
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }
}

impl ItemGeometry for Count {
    fn vertices(&self) -> Vec<Point> {
        vec![self.position]
    }

    fn segments(&self) -> Vec<Segment> {
        Vec::new()
    }

    fn distance_to(&self, point: Point) -> f64 {
        self.position.distance(point)
    }

    fn translate(&mut self, delta: Vec2) {
        self.position += delta;
    }

    fn move_vertex(&mut self, index: usize, to: Point) -> bool {
        if index == 0 {
            self.position = to;
            true
        } else {
            false
        }
    }

    fn validate(&self) -> Result<(), RejectReason> {
        Ok(())
    }

    fn raw_quantity(&self) -> f64 {
        self.value
    }
}
