//! In-memory stops and departures provider.
//!
//! Stores a fixed set of stops in an R-tree and answers radius queries and
//! departure lookups without touching the network. Used for offline bundles,
//! demos and tests.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use geo::Point;
use rstar::RTree;

use crate::identifiers::*;
use crate::models::*;
use crate::network::traits::*;
use crate::spatial::index::StopNode;
use crate::spatial::queries::{haversine_distance, search_radius_degrees};

/// A stop with its fixed location, as stored in a bundle
#[derive(Clone, Debug)]
pub struct StopImpl {
    pub id: StopIdentifier,
    pub name: Arc<str>,
    pub platform: Option<Arc<str>>,
    pub location: Coordinates,
    pub patterns: Vec<Pattern>,
}

impl StopImpl {
    fn at_distance(&self, distance: f64) -> Stop {
        Stop {
            id: self.id.clone(),
            name: self.name.clone(),
            platform: self.platform.clone(),
            distance,
            patterns: self.patterns.clone(),
        }
    }
}

// ============================================================================
// Static Provider
// ============================================================================

/// In-memory stops provider with spatial indexing
///
/// This type is cheap to clone since all data is stored in `Arc`s.
#[derive(Clone)]
pub struct StaticStopsRepository {
    stop_map: HashMap<StopIdentifier, Arc<StopImpl>>,
    stop_tree: Arc<RTree<StopNode>>,
    boards: HashMap<StopIdentifier, DepartureBoard>,

    // Emit one entry per pattern, like the routing API's stopsByRadius edges
    pattern_rows: bool,
}

impl StaticStopsRepository {
    /// Create a new empty provider
    pub fn new() -> Self {
        Self::from_data(Vec::new(), HashMap::new())
    }

    /// Build provider from raw data
    pub fn from_data(stops: Vec<StopImpl>, boards: HashMap<StopIdentifier, DepartureBoard>) -> Self {
        let stops: Vec<Arc<StopImpl>> = stops.into_iter().map(Arc::new).collect();

        let stop_map: HashMap<_, _> = stops.iter().map(|s| (s.id.clone(), s.clone())).collect();

        let stop_tree = RTree::bulk_load(
            stops
                .iter()
                .map(|s| {
                    let stop = Arc::new(s.at_distance(0.0));
                    StopNode::new(s.location.to_point(), stop)
                })
                .collect(),
        );

        Self {
            stop_map,
            stop_tree: Arc::new(stop_tree),
            boards,
            pattern_rows: false,
        }
    }

    /// Report a stop once per pattern instead of once per stop
    pub fn with_pattern_rows(mut self, enabled: bool) -> Self {
        self.pattern_rows = enabled;
        self
    }

    pub fn get_stop(&self, id: &StopIdentifier) -> Option<Arc<StopImpl>> {
        self.stop_map.get(id).cloned()
    }

    /// Stops within `radius_m` meters, nearest first
    pub fn stops_near(&self, point: Point, radius_m: f64) -> Vec<Stop> {
        // Validate radius is positive
        if radius_m <= 0.0 || !radius_m.is_finite() {
            return Vec::new();
        }

        let search = search_radius_degrees(radius_m, point.y());

        let mut found: Vec<Stop> = self
            .stop_tree
            .locate_within_distance([point.x(), point.y()], search * search)
            .filter_map(|node| {
                let distance = haversine_distance(point, node.location);
                (distance <= radius_m).then(|| Stop {
                    distance,
                    ..(*node.stop).clone()
                })
            })
            .collect();

        found.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        if !self.pattern_rows {
            return found;
        }

        found
            .into_iter()
            .flat_map(|stop| {
                let rows: Vec<Stop> = stop
                    .patterns
                    .iter()
                    .map(|pattern| Stop {
                        patterns: vec![pattern.clone()],
                        ..stop.clone()
                    })
                    .collect();
                if rows.is_empty() {
                    vec![stop]
                } else {
                    rows
                }
            })
            .collect()
    }
}

impl Default for StaticStopsRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl StopsRepository for StaticStopsRepository {
    fn fetch_stops<'a>(
        &'a self,
        query: StopsQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Stop>>> + Send + 'a>> {
        Box::pin(async move {
            Ok(self.stops_near(query.coordinates.to_point(), f64::from(query.radius_m)))
        })
    }
}

impl DeparturesRepository for StaticStopsRepository {
    fn fetch_departures<'a>(
        &'a self,
        stop_id: &'a StopIdentifier,
    ) -> Pin<Box<dyn Future<Output = Result<DepartureBoard>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(board) = self.boards.get(stop_id) {
                return Ok(board.clone());
            }

            match self.stop_map.get(stop_id) {
                Some(stop) => Ok(DepartureBoard {
                    stop_name: stop.name.clone(),
                    departures: Vec::new(),
                }),
                None => Err(FetchError::InvalidData(format!("Stop not found: {stop_id}"))),
            }
        })
    }
}
