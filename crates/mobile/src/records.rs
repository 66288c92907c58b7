//! Plain records handed across the FFI boundary.
//!
//! These mirror the core view model with types foreign code can hold.

use nearby_core::state::view_model::{
    Banner, DepartureRow, DepartureTime, PositionStatus, Screen, StopRow,
};
use nearby_core::state::{ModeFilter, ViewModel};
use nearby_core::transit::{Coordinates, Mode};

#[derive(Debug, Clone, Copy, uniffi::Record)]
pub struct FfiCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<FfiCoordinates> for Coordinates {
    fn from(value: FfiCoordinates) -> Self {
        Coordinates::new(value.latitude, value.longitude)
    }
}

impl From<Coordinates> for FfiCoordinates {
    fn from(value: Coordinates) -> Self {
        Self {
            latitude: value.latitude,
            longitude: value.longitude,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum TransitMode {
    Bus,
    Tram,
    Rail,
    Subway,
}

impl From<Mode> for TransitMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Bus => Self::Bus,
            Mode::Tram => Self::Tram,
            Mode::Rail => Self::Rail,
            Mode::Subway => Self::Subway,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum StopFilter {
    Bus,
    Tram,
    Rail,
    Subway,
    Favorites,
}

impl From<StopFilter> for ModeFilter {
    fn from(filter: StopFilter) -> Self {
        match filter {
            StopFilter::Bus => Self::Bus,
            StopFilter::Tram => Self::Tram,
            StopFilter::Rail => Self::Rail,
            StopFilter::Subway => Self::Subway,
            StopFilter::Favorites => Self::Favorites,
        }
    }
}

impl From<ModeFilter> for StopFilter {
    fn from(filter: ModeFilter) -> Self {
        match filter {
            ModeFilter::Bus => Self::Bus,
            ModeFilter::Tram => Self::Tram,
            ModeFilter::Rail => Self::Rail,
            ModeFilter::Subway => Self::Subway,
            ModeFilter::Favorites => Self::Favorites,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum ScreenKind {
    Loading,
    LocationDenied,
    Board,
}

#[derive(Debug, Clone, uniffi::Enum)]
pub enum PositionRecord {
    Locating,
    Located { coordinates: FfiCoordinates },
    Approximate { coordinates: FfiCoordinates },
    Unavailable,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct StopRowRecord {
    pub id: String,
    pub name: String,
    pub platform: Option<String>,
    pub distance_text: String,
    pub modes: Vec<TransitMode>,
    pub directions: String,
    pub is_selected: bool,
    pub is_favorite: bool,
}

#[derive(Debug, Clone, uniffi::Enum)]
pub enum DepartureTimeRecord {
    Minutes { minutes: i64 },
    Clock { time: String },
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct DepartureRowRecord {
    pub route_short_name: String,
    pub mode: Option<TransitMode>,
    pub destination: String,
    pub time: DepartureTimeRecord,
    pub day_label: Option<String>,
    pub is_realtime: bool,
    pub is_canceled: bool,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct BannerRecord {
    /// "LOCATION" or "NETWORK"
    pub category: String,
    pub message: String,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct BoardViewModel {
    pub screen: ScreenKind,
    pub position: PositionRecord,
    pub mode_filter: Option<StopFilter>,
    pub stops: Vec<StopRowRecord>,
    pub has_more_stops: bool,
    pub stops_loading: bool,
    pub selected_stop_id: Option<String>,
    pub stop_name: Option<String>,
    pub departures: Vec<DepartureRowRecord>,
    pub departures_loading: bool,
    pub banners: Vec<BannerRecord>,
}

impl From<ViewModel> for BoardViewModel {
    fn from(vm: ViewModel) -> Self {
        Self {
            screen: match vm.screen {
                Screen::Loading => ScreenKind::Loading,
                Screen::LocationDenied => ScreenKind::LocationDenied,
                Screen::Board => ScreenKind::Board,
            },
            position: match vm.position {
                PositionStatus::Locating => PositionRecord::Locating,
                PositionStatus::Located(c) => PositionRecord::Located {
                    coordinates: c.into(),
                },
                PositionStatus::Approximate(c) => PositionRecord::Approximate {
                    coordinates: c.into(),
                },
                PositionStatus::Unavailable => PositionRecord::Unavailable,
            },
            mode_filter: vm.mode_filter.map(Into::into),
            stops: vm.stops.into_iter().map(Into::into).collect(),
            has_more_stops: vm.has_more_stops,
            stops_loading: vm.stops_loading,
            selected_stop_id: vm.selected_stop_id.map(|id| id.to_string()),
            stop_name: vm.stop_name,
            departures: vm.departures.into_iter().map(Into::into).collect(),
            departures_loading: vm.departures_loading,
            banners: vm.banners.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<StopRow> for StopRowRecord {
    fn from(row: StopRow) -> Self {
        Self {
            id: row.id.to_string(),
            name: row.name,
            platform: row.platform,
            distance_text: row.distance_text,
            modes: row.modes.into_iter().map(Into::into).collect(),
            directions: row.directions,
            is_selected: row.is_selected,
            is_favorite: row.is_favorite,
        }
    }
}

impl From<DepartureRow> for DepartureRowRecord {
    fn from(row: DepartureRow) -> Self {
        Self {
            route_short_name: row.route_short_name,
            mode: row.mode.map(Into::into),
            destination: row.destination,
            time: match row.time {
                DepartureTime::Minutes(minutes) => DepartureTimeRecord::Minutes { minutes },
                DepartureTime::Clock(time) => DepartureTimeRecord::Clock { time },
            },
            day_label: row.day_label,
            is_realtime: row.is_realtime,
            is_canceled: row.is_canceled,
        }
    }
}

impl From<Banner> for BannerRecord {
    fn from(banner: Banner) -> Self {
        Self {
            category: banner.category.to_string(),
            message: banner.message,
        }
    }
}
