//! Display-ready projection of [`AppState`].
//!
//! Everything a screen needs is precomputed here so platform UIs only lay
//! out strings and flags.

use chrono::{DateTime, FixedOffset};
use nearby_transit::{Coordinates, Departure, Mode, Stop, StopIdentifier};
use unicode_segmentation::UnicodeSegmentation;

use crate::config::ControllerConfig;
use crate::state::{AppState, ErrorCategory, Lifecycle, ModeFilter};

const DESTINATION_MAX_GRAPHEMES: usize = 25;
const DESTINATION_KEEP_GRAPHEMES: usize = 22;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    Loading,
    LocationDenied,
    Board,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PositionStatus {
    Locating,
    Located(Coordinates),
    /// No live fix; showing results for a previous position
    Approximate(Coordinates),
    Unavailable,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StopRow {
    pub id: StopIdentifier,
    pub name: String,
    pub platform: Option<String>,
    /// Kilometers with one decimal, e.g. "0.3 km"
    pub distance_text: String,
    pub modes: Vec<Mode>,
    pub directions: String,
    pub is_selected: bool,
    pub is_favorite: bool,
}

impl StopRow {
    fn new(stop: &Stop, state: &AppState) -> Self {
        let directions = stop.directions().iter().map(|d| &**d).collect::<Vec<_>>().join(", ");
        Self {
            id: stop.id.clone(),
            name: stop.name.to_string(),
            platform: stop.platform.as_deref().map(str::to_string),
            distance_text: format_distance(stop.distance),
            modes: stop.modes(),
            directions,
            is_selected: state.selected_stop_id.as_ref() == Some(&stop.id),
            is_favorite: state.is_favorite(&stop.id),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DepartureTime {
    /// Whole minutes until departure, never negative
    Minutes(i64),
    /// Local wall-clock time, e.g. "7:05"
    Clock(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct DepartureRow {
    pub route_short_name: String,
    pub mode: Option<Mode>,
    pub destination: String,
    pub time: DepartureTime,
    /// Weekday name when the departure is on another local day
    pub day_label: Option<String>,
    pub is_realtime: bool,
    pub is_canceled: bool,
}

impl DepartureRow {
    fn new(departure: &Departure, now: DateTime<FixedOffset>, clock_threshold_minutes: i64) -> Self {
        let at = departure.expected_departure.with_timezone(&now.timezone());
        let minutes = (at - now).num_minutes().max(0);

        let time = if minutes > clock_threshold_minutes {
            DepartureTime::Clock(at.format("%-H:%M").to_string())
        } else {
            DepartureTime::Minutes(minutes)
        };

        let day_label = (at.date_naive() != now.date_naive()).then(|| at.format("%A").to_string());

        Self {
            route_short_name: departure.route_short_name.to_string(),
            mode: departure.mode,
            destination: truncate_destination(departure.destination()),
            time,
            day_label,
            is_realtime: departure.is_realtime,
            is_canceled: departure.is_canceled(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Banner {
    pub category: ErrorCategory,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ViewModel {
    pub screen: Screen,
    pub position: PositionStatus,
    pub mode_filter: Option<ModeFilter>,
    /// The first `show` stops of the active view
    pub stops: Vec<StopRow>,
    pub has_more_stops: bool,
    pub stops_loading: bool,
    pub selected_stop_id: Option<StopIdentifier>,
    /// Name from the departures response, falling back to the stop list
    pub stop_name: Option<String>,
    pub departures: Vec<DepartureRow>,
    pub departures_loading: bool,
    pub banners: Vec<Banner>,
}

impl ViewModel {
    pub fn project(state: &AppState, config: &ControllerConfig, now: DateTime<FixedOffset>) -> Self {
        let screen = match state.lifecycle {
            Lifecycle::LocationPermissionDenied => Screen::LocationDenied,
            _ if !state.loaded => Screen::Loading,
            _ => Screen::Board,
        };

        let position = match (state.position.coordinates, state.position.last_known) {
            _ if state.position.loading => PositionStatus::Locating,
            (Some(coordinates), _) if !state.position.failed => PositionStatus::Located(coordinates),
            (_, Some(last_known)) => PositionStatus::Approximate(last_known),
            (Some(coordinates), None) => PositionStatus::Approximate(coordinates),
            (None, None) => PositionStatus::Unavailable,
        };

        let view = state.active_view();
        let stops = view
            .iter()
            .take(state.stops.show)
            .map(|stop| StopRow::new(stop, state))
            .collect();

        // Only show a board that belongs to the current selection
        let board = state
            .departures
            .board
            .as_ref()
            .filter(|_| state.departures.for_stop_id == state.selected_stop_id);

        let stop_name = board
            .map(|board| board.stop_name.to_string())
            .filter(|name| !name.is_empty())
            .or_else(|| {
                let id = state.selected_stop_id.as_ref()?;
                let stop = state.stops.views.as_ref()?.get(id)?;
                Some(stop.name.to_string())
            });

        let departures = board
            .map(|board| {
                board
                    .departures
                    .iter()
                    .map(|departure| DepartureRow::new(departure, now, config.clock_threshold_minutes))
                    .collect()
            })
            .unwrap_or_default();

        let banners = state
            .banners
            .iter()
            .map(|(category, message)| Banner {
                category: *category,
                message: message.clone(),
            })
            .collect();

        Self {
            screen,
            position,
            mode_filter: state.mode_filter,
            stops,
            has_more_stops: state.stops.show < view.len(),
            stops_loading: state.stops.loading,
            selected_stop_id: state.selected_stop_id.clone(),
            stop_name,
            departures,
            departures_loading: state.departures.loading,
            banners,
        }
    }
}

/// "0.3 km" style distance from meters
pub fn format_distance(meters: f64) -> String {
    format!("{:.1} km", meters / 1000.0)
}

/// Destinations longer than 25 graphemes keep the first 22 plus "..."
pub fn truncate_destination(destination: &str) -> String {
    let graphemes: Vec<&str> = destination.graphemes(true).collect();
    if graphemes.len() > DESTINATION_MAX_GRAPHEMES {
        format!("{}...", graphemes[..DESTINATION_KEEP_GRAPHEMES].concat())
    } else {
        destination.to_string()
    }
}
