//! Distance calculations on Earth's surface.
//!
//! Uses the Haversine formula for distances reported to the user.

use geo::{HaversineDistance, Point};

const METERS_PER_DEGREE: f64 = 111_320.0;

/// Calculate Haversine distance between two points in meters
pub fn haversine_distance(p1: Point, p2: Point) -> f64 {
    p1.haversine_distance(&p2)
}

/// Convert meters to degrees at the equator
pub fn meters_to_degrees_approx(meters: f64) -> f64 {
    meters / METERS_PER_DEGREE
}

/// Euclidean search radius in degrees that covers `meters` at `latitude`.
///
/// A degree of longitude shrinks towards the poles, so the radius is widened
/// by 1/cos(latitude) to keep the R-tree prefilter from dropping stops.
pub fn search_radius_degrees(meters: f64, latitude: f64) -> f64 {
    let cos = latitude.to_radians().cos().abs().max(0.01);
    meters_to_degrees_approx(meters) / cos
}
