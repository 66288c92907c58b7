//! Spatial indexing and distance utilities.

pub mod index;
pub mod queries;

pub use queries::{haversine_distance, meters_to_degrees_approx};
