//! Pluggable data-source traits.
//!
//! The routing backend, an offline bundle or a test fake implement these to
//! feed the stop list and the departure board.

use std::future::Future;
use std::pin::Pin;

use crate::identifiers::StopIdentifier;
use crate::models::{Coordinates, DepartureBoard, Result, Stop};

/// A radius query around a position
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StopsQuery {
    pub coordinates: Coordinates,
    pub radius_m: u32,
}

/// Fetch stops near a position
pub trait StopsRepository: Send + Sync {
    /// Stops ordered by ascending distance.
    ///
    /// A stop may appear once per serving pattern; callers collapse duplicates.
    fn fetch_stops<'a>(
        &'a self,
        query: StopsQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Stop>>> + Send + 'a>>;
}

/// Fetch upcoming departures for a stop
pub trait DeparturesRepository: Send + Sync {
    fn fetch_departures<'a>(
        &'a self,
        stop_id: &'a StopIdentifier,
    ) -> Pin<Box<dyn Future<Output = Result<DepartureBoard>> + Send + 'a>>;
}
