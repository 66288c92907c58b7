//! R-tree nodes for spatial indexing.
//!
//! ## Two-Stage Filtering
//!
//! Radius queries first use the R-tree with a Euclidean radius in degrees,
//! then keep only the stops whose Haversine distance is within the radius.

use std::sync::Arc;

use geo::Point;
use rstar::{PointDistance, RTreeObject, AABB};

use crate::models::Stop;

#[derive(Clone)]
pub struct StopNode {
    pub stop: Arc<Stop>,
    pub location: Point,
    point: [f64; 2],
}

impl StopNode {
    pub fn new(location: Point, stop: Arc<Stop>) -> Self {
        Self {
            stop,
            location,
            point: [location.x(), location.y()],
        }
    }
}

impl RTreeObject for StopNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for StopNode {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}
