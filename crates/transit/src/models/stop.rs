//! Stops and the patterns serving them.

use std::sync::Arc;

use geo::Point;

use crate::identifiers::*;
use crate::models::types::Mode;

/// A position on Earth in WGS84 degrees
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// geo uses (x, y) = (longitude, latitude)
    pub fn to_point(self) -> Point {
        Point::new(self.longitude, self.latitude)
    }
}

impl From<Point> for Coordinates {
    fn from(point: Point) -> Self {
        Self::new(point.y(), point.x())
    }
}

/// A route + direction + headsign combination serving a stop
#[derive(Clone, Debug, PartialEq)]
pub struct Pattern {
    pub code: PatternIdentifier,
    pub route_short_name: Arc<str>,
    pub route_long_name: Arc<str>,
    pub mode: Mode,
    pub headsign: Arc<str>,
}

/// A physical stop or station near the queried position
#[derive(Clone, Debug, PartialEq)]
pub struct Stop {
    pub id: StopIdentifier,
    pub name: Arc<str>,
    pub platform: Option<Arc<str>>,
    /// Meters from the position the stops were queried with
    pub distance: f64,
    pub patterns: Vec<Pattern>,
}

impl Stop {
    pub fn serves(&self, mode: Mode) -> bool {
        self.patterns.iter().any(|p| p.mode == mode)
    }

    /// Distinct modes in first-seen order
    pub fn modes(&self) -> Vec<Mode> {
        let mut modes = Vec::with_capacity(self.patterns.len());
        for pattern in &self.patterns {
            if !modes.contains(&pattern.mode) {
                modes.push(pattern.mode);
            }
        }
        modes
    }

    /// Distinct headsigns in first-seen order, empty ones skipped
    pub fn directions(&self) -> Vec<Arc<str>> {
        let mut directions: Vec<Arc<str>> = Vec::new();
        for pattern in &self.patterns {
            if !pattern.headsign.is_empty() && !directions.contains(&pattern.headsign) {
                directions.push(pattern.headsign.clone());
            }
        }
        directions
    }

    /// Adds the patterns of `other` that this stop does not already have
    pub fn absorb_patterns(&mut self, other: &Stop) {
        for pattern in &other.patterns {
            if !self.patterns.iter().any(|p| p.code == pattern.code) {
                self.patterns.push(pattern.clone());
            }
        }
    }
}
