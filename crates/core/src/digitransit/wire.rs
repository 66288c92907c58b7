//! Response shapes of the routing API and their conversion into domain models.

use chrono::DateTime;
use nearby_transit::{
    Departure, DepartureBoard, FetchError, Mode, Pattern, PatternIdentifier, RealtimeState, Stop,
    StopIdentifier,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

impl<T> GraphQlResponse<T> {
    /// The `data` member, or the first reported error
    pub fn into_data(self) -> Result<T, FetchError> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(FetchError::InvalidData(error.message));
        }
        self.data
            .ok_or_else(|| FetchError::InvalidData("response has no data".to_string()))
    }
}

// ============================================================================
// Nearby stops
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopsByRadiusData {
    pub stops_by_radius: Option<StopConnection>,
}

#[derive(Debug, Deserialize)]
pub struct StopConnection {
    #[serde(default)]
    pub edges: Vec<StopEdge>,
}

#[derive(Debug, Deserialize)]
pub struct StopEdge {
    pub node: Option<StopAtDistance>,
}

#[derive(Debug, Deserialize)]
pub struct StopAtDistance {
    pub distance: f64,
    pub stop: Option<WireStop>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireStop {
    pub gtfs_id: String,
    pub name: String,
    pub platform_code: Option<String>,
    #[serde(default)]
    pub patterns: Vec<WirePattern>,
}

#[derive(Debug, Deserialize)]
pub struct WirePattern {
    pub code: String,
    pub headsign: Option<String>,
    pub route: Option<WireRoute>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRoute {
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub mode: Option<String>,
}

impl StopsByRadiusData {
    /// Stops in response order; edges without a stop are skipped
    pub fn into_stops(self) -> Vec<Stop> {
        self.stops_by_radius
            .map(|connection| connection.edges)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|edge| edge.node)
            .filter_map(|node| Some(node.stop?.into_stop(node.distance)))
            .collect()
    }
}

impl WireStop {
    fn into_stop(self, distance: f64) -> Stop {
        let patterns = self
            .patterns
            .into_iter()
            .filter_map(|pattern| {
                let route = pattern.route?;
                let Some(mode) = route.mode.as_deref().and_then(Mode::from_wire) else {
                    tracing::trace!(code = %pattern.code, mode = ?route.mode, "skipping pattern with unsupported mode");
                    return None;
                };

                Some(Pattern {
                    code: PatternIdentifier::new(&pattern.code),
                    route_short_name: route.short_name.unwrap_or_default().into(),
                    route_long_name: route.long_name.unwrap_or_default().into(),
                    mode,
                    headsign: pattern.headsign.unwrap_or_default().into(),
                })
            })
            .collect();

        Stop {
            id: StopIdentifier::new(&self.gtfs_id),
            name: self.name.into(),
            platform: self.platform_code.filter(|p| !p.is_empty()).map(Into::into),
            distance,
            patterns,
        }
    }
}

// ============================================================================
// Departures
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StopData {
    pub stop: Option<WireStopTimes>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireStopTimes {
    pub name: String,
    #[serde(default)]
    pub stoptimes_without_patterns: Vec<WireStoptime>,
}

/// Times are seconds since `service_day`, itself a unix timestamp
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireStoptime {
    pub scheduled_departure: i64,
    pub realtime_departure: Option<i64>,
    #[serde(default)]
    pub realtime: bool,
    pub realtime_state: Option<String>,
    pub service_day: i64,
    pub headsign: Option<String>,
    pub trip: Option<WireTrip>,
}

#[derive(Debug, Deserialize)]
pub struct WireTrip {
    pub route: Option<WireRoute>,
}

impl StopData {
    pub fn into_board(self, stop_id: &StopIdentifier) -> Result<DepartureBoard, FetchError> {
        let stop = self
            .stop
            .ok_or_else(|| FetchError::InvalidData(format!("unknown stop {stop_id}")))?;

        let mut departures = stop
            .stoptimes_without_patterns
            .into_iter()
            .map(WireStoptime::into_departure)
            .collect::<Result<Vec<_>, _>>()?;
        departures.sort_by_key(|departure| departure.expected_departure);

        Ok(DepartureBoard {
            stop_name: stop.name.into(),
            departures,
        })
    }
}

impl WireStoptime {
    fn into_departure(self) -> Result<Departure, FetchError> {
        let instant = |offset: i64| {
            DateTime::from_timestamp(self.service_day + offset, 0)
                .ok_or_else(|| FetchError::InvalidData(format!("departure time out of range: {offset}")))
        };

        let scheduled_departure = instant(self.scheduled_departure)?;
        let expected_departure = instant(self.realtime_departure.unwrap_or(self.scheduled_departure))?;

        let route = self.trip.and_then(|trip| trip.route);
        let (short_name, long_name, mode) = match route {
            Some(route) => (
                route.short_name.unwrap_or_default(),
                route.long_name.unwrap_or_default(),
                route.mode.as_deref().and_then(Mode::from_wire),
            ),
            None => Default::default(),
        };

        Ok(Departure {
            route_short_name: short_name.into(),
            route_long_name: long_name.into(),
            mode,
            headsign: self.headsign.unwrap_or_default().into(),
            scheduled_departure,
            expected_departure,
            is_realtime: self.realtime,
            realtime_state: self
                .realtime_state
                .as_deref()
                .and_then(RealtimeState::from_wire)
                .unwrap_or_default(),
        })
    }
}
