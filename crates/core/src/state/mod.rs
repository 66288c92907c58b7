//! Application state owned by the controller.
//!
//! The state is a plain value. It changes only through [`update`], which
//! applies one [`Event`] and returns the [`Effect`]s the runtime must carry
//! out, so every transition can be tested without a runtime.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use nearby_transit::{Coordinates, DepartureBoard, Mode, Stop, StopIdentifier};
use serde::{Deserialize, Serialize};

use crate::location::LocationError;
use crate::snapshot::Snapshot;

pub mod update;
pub mod view_model;
pub mod views;

pub use update::{Effect, Event, Intent, update};
pub use view_model::ViewModel;
pub use views::{DuplicatePatterns, StopViews};

/// The stop list filter chosen by the user; `None` in state means "all stops"
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ModeFilter {
    Bus,
    Tram,
    Rail,
    Subway,
    Favorites,
}

impl ModeFilter {
    pub fn mode(self) -> Option<Mode> {
        match self {
            Self::Bus => Some(Mode::Bus),
            Self::Tram => Some(Mode::Tram),
            Self::Rail => Some(Mode::Rail),
            Self::Subway => Some(Mode::Subway),
            Self::Favorites => None,
        }
    }
}

impl From<Mode> for ModeFilter {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Bus => Self::Bus,
            Mode::Tram => Self::Tram,
            Mode::Rail => Self::Rail,
            Mode::Subway => Self::Subway,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Location,
    Network,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Lifecycle {
    /// Restoring the snapshot and running the first refresh chain
    #[default]
    Initializing,
    Ready,
    /// Terminal for the session; no further provider calls are made
    LocationPermissionDenied,
    Stopped,
}

/// Identifies one departures fetch so late responses can be recognised
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleKind {
    Startup,
    Poll,
    /// Pull-to-refresh
    Manual,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleStage {
    Position,
    Stops,
    Departures(RequestId),
}

/// A position → stops → departures refresh chain in progress.
///
/// At most one runs at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cycle {
    pub kind: CycleKind,
    pub stage: CycleStage,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PositionState {
    /// Live fix from this session
    pub coordinates: Option<Coordinates>,
    /// Newest fix including previous sessions
    pub last_known: Option<Coordinates>,
    pub loading: bool,
    pub failed: bool,
    pub permission_denied: bool,
    pub error: Option<LocationError>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StopsState {
    pub loading: bool,
    /// `None` until the first successful fetch
    pub views: Option<StopViews>,
    /// Pagination cursor into the active view
    pub show: usize,
    pub last_fetch_radius: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeparturesState {
    pub loading: bool,
    pub board: Option<DepartureBoard>,
    pub for_stop_id: Option<StopIdentifier>,
    /// The only request whose response may still be applied
    pub pending: Option<RequestId>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AppState {
    pub lifecycle: Lifecycle,
    /// Set once the startup chain settles, successfully or not
    pub loaded: bool,
    pub position: PositionState,
    pub stops: StopsState,
    pub departures: DeparturesState,
    pub mode_filter: Option<ModeFilter>,
    pub favorites: BTreeSet<StopIdentifier>,
    pub selected_stop_id: Option<StopIdentifier>,
    pub banners: BTreeMap<ErrorCategory, String>,
    pub cycle: Option<Cycle>,
    pub polling: bool,
    next_request: u64,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stop list the user currently sees, before pagination
    pub fn active_view(&self) -> &[Arc<Stop>] {
        self.stops
            .views
            .as_ref()
            .map(|views| views.view(self.mode_filter))
            .unwrap_or_default()
    }

    /// The persisted subset of this state
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            mode_filter: self.mode_filter,
            favorite_stop_ids: self.favorites.clone(),
            last_known_coordinates: self.position.last_known,
        }
    }

    pub fn is_favorite(&self, id: &StopIdentifier) -> bool {
        self.favorites.contains(id)
    }

    pub(crate) fn next_request_id(&mut self) -> RequestId {
        self.next_request += 1;
        RequestId(self.next_request)
    }
}
