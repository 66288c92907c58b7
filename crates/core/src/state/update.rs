//! State transitions.
//!
//! [`update`] is the only place [`AppState`] is mutated. Provider calls and
//! timers are requested through [`Effect`]s; their outcomes come back as
//! [`Event`]s.

use nearby_transit::{Coordinates, DepartureBoard, FetchError, Stop, StopIdentifier, StopsQuery};

use crate::config::ControllerConfig;
use crate::location::{LocationError, PermissionStatus, PositionOptions};
use crate::snapshot::Snapshot;
use crate::state::{
    AppState, Cycle, CycleKind, CycleStage, ErrorCategory, Lifecycle, ModeFilter, RequestId,
    StopViews,
};

/// Something the user asked for
#[derive(Clone, Debug, PartialEq)]
pub enum Intent {
    ChooseStop(StopIdentifier),
    ToggleModeFilter(ModeFilter),
    ToggleFavorite(StopIdentifier),
    ShowMore,
    Refresh,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Started,
    SnapshotLoaded(Option<Snapshot>),
    PermissionResolved(PermissionStatus),
    PositionResolved {
        high_accuracy: bool,
        result: Result<Coordinates, LocationError>,
    },
    StopsResolved(Result<Vec<Stop>, FetchError>),
    DeparturesResolved {
        request: RequestId,
        stop_id: StopIdentifier,
        result: Result<DepartureBoard, FetchError>,
    },
    DebounceElapsed(RequestId),
    Tick,
    Intent(Intent),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    LoadSnapshot,
    RequestPermission,
    GetPosition(PositionOptions),
    FetchStops(StopsQuery),
    FetchDepartures {
        request: RequestId,
        stop_id: StopIdentifier,
    },
    /// Fire [`Event::DebounceElapsed`] after the debounce delay, replacing any running timer
    StartDebounce(RequestId),
    CancelDebounce,
    SaveSnapshot(Snapshot),
    StartPolling,
    StopPolling,
}

pub fn update(state: &mut AppState, config: &ControllerConfig, event: Event) -> Vec<Effect> {
    match event {
        Event::Started => vec![Effect::LoadSnapshot],
        Event::SnapshotLoaded(snapshot) => {
            if let Some(snapshot) = snapshot {
                state.mode_filter = snapshot.mode_filter;
                state.favorites = snapshot.favorite_stop_ids;
                state.position.last_known = snapshot.last_known_coordinates;
            }
            vec![Effect::RequestPermission]
        }
        Event::PermissionResolved(PermissionStatus::Denied) => {
            tracing::info!("location permission denied");
            deny_location(state)
        }
        Event::PermissionResolved(PermissionStatus::Granted) => {
            state.cycle = Some(Cycle {
                kind: CycleKind::Startup,
                stage: CycleStage::Position,
            });
            begin_position(state)
        }
        Event::PositionResolved {
            high_accuracy,
            result,
        } => position_resolved(state, config, high_accuracy, result),
        Event::StopsResolved(result) => stops_resolved(state, config, result),
        Event::DeparturesResolved {
            request,
            stop_id,
            result,
        } => departures_resolved(state, request, stop_id, result),
        Event::DebounceElapsed(request) => {
            if state.departures.pending == Some(request) {
                state.departures.loading = true;
            }
            vec![]
        }
        Event::Tick => tick(state, config),
        Event::Intent(intent) => handle_intent(state, config, intent),
    }
}

// ============================================================================
// Refresh chain
// ============================================================================

fn deny_location(state: &mut AppState) -> Vec<Effect> {
    state.position.permission_denied = true;
    state.position.loading = false;
    state.position.error = Some(LocationError::PermissionDenied);
    state.lifecycle = Lifecycle::LocationPermissionDenied;
    state.loaded = true;
    state.cycle = None;

    if state.polling {
        state.polling = false;
        vec![Effect::StopPolling]
    } else {
        vec![]
    }
}

fn begin_position(state: &mut AppState) -> Vec<Effect> {
    state.position.loading = true;
    if let Some(cycle) = state.cycle.as_mut() {
        cycle.stage = CycleStage::Position;
    }
    vec![Effect::GetPosition(PositionOptions {
        high_accuracy: true,
    })]
}

fn position_resolved(
    state: &mut AppState,
    config: &ControllerConfig,
    high_accuracy: bool,
    result: Result<Coordinates, LocationError>,
) -> Vec<Effect> {
    let mut effects = Vec::new();

    match result {
        Ok(coordinates) => {
            state.position.coordinates = Some(coordinates);
            state.position.last_known = Some(coordinates);
            state.position.loading = false;
            state.position.failed = false;
            state.position.error = None;
            state.banners.remove(&ErrorCategory::Location);
            effects.push(Effect::SaveSnapshot(state.snapshot()));
        }
        Err(LocationError::Timeout) if high_accuracy => {
            tracing::debug!("high accuracy fix timed out, retrying with low accuracy");
            return vec![Effect::GetPosition(PositionOptions {
                high_accuracy: false,
            })];
        }
        Err(LocationError::PermissionDenied) => {
            tracing::info!("location permission revoked");
            return deny_location(state);
        }
        Err(error) => {
            tracing::warn!(%error, "failed to get position");
            state.position.loading = false;
            state.position.failed = true;
            state.banners.insert(ErrorCategory::Location, error.to_string());
            state.position.error = Some(error);
        }
    }

    let Some(cycle) = state.cycle else {
        return effects;
    };

    let next = match cycle.kind {
        CycleKind::Poll if state.stops.views.is_some() => after_stops(state),
        _ => begin_stops_stage(state, config),
    };
    effects.extend(next);
    effects
}

fn begin_stops_stage(state: &mut AppState, config: &ControllerConfig) -> Vec<Effect> {
    let Some(coordinates) = state.position.coordinates.or(state.position.last_known) else {
        return after_stops(state);
    };

    state.stops.loading = true;
    state.stops.last_fetch_radius = Some(config.stops_radius_m);
    if let Some(cycle) = state.cycle.as_mut() {
        cycle.stage = CycleStage::Stops;
    }

    vec![Effect::FetchStops(StopsQuery {
        coordinates,
        radius_m: config.stops_radius_m,
    })]
}

fn stops_resolved(
    state: &mut AppState,
    config: &ControllerConfig,
    result: Result<Vec<Stop>, FetchError>,
) -> Vec<Effect> {
    state.stops.loading = false;

    match result {
        Ok(raw) => {
            let views = StopViews::build(raw, &state.favorites, config.duplicate_patterns);
            state.stops.views = Some(views);
            clamp_show(state, config);
            state.banners.remove(&ErrorCategory::Network);
        }
        Err(error) => {
            tracing::warn!(%error, "failed to fetch stops");
            state.banners.insert(ErrorCategory::Network, error.to_string());
        }
    }

    match state.cycle {
        Some(Cycle {
            stage: CycleStage::Stops,
            ..
        }) => after_stops(state),
        _ => vec![],
    }
}

/// Stop selection and the departures stage of the running cycle
fn after_stops(state: &mut AppState) -> Vec<Effect> {
    let Some(cycle) = state.cycle else {
        return vec![];
    };

    let mut effects = Vec::new();

    let keep_selection = match cycle.kind {
        CycleKind::Startup | CycleKind::Manual => state
            .selected_stop_id
            .as_ref()
            .is_some_and(|id| state.active_view().iter().any(|stop| &stop.id == id)),
        CycleKind::Poll => state.selected_stop_id.is_some() || state.stops.views.is_none(),
    };

    if !keep_selection {
        effects.extend(select_first_stop(state));
    }

    match begin_departures(state) {
        Some((request, fetch)) => {
            if let Some(cycle) = state.cycle.as_mut() {
                cycle.stage = CycleStage::Departures(request);
            }
            effects.extend(fetch);
        }
        None => effects.extend(finish_cycle(state)),
    }

    effects
}

/// Point the selection at the first stop of the active view, or clear it
fn select_first_stop(state: &mut AppState) -> Vec<Effect> {
    let first = state.active_view().first().map(|stop| stop.id.clone());

    if first != state.selected_stop_id {
        state.departures.board = None;
        state.departures.for_stop_id = None;
    }
    state.selected_stop_id = first;

    if state.selected_stop_id.is_none() && state.departures.pending.take().is_some() {
        state.departures.loading = false;
        return vec![Effect::CancelDebounce];
    }

    vec![]
}

fn begin_departures(state: &mut AppState) -> Option<(RequestId, Vec<Effect>)> {
    let stop_id = state.selected_stop_id.clone()?;
    let request = state.next_request_id();
    state.departures.pending = Some(request);

    Some((
        request,
        vec![
            Effect::FetchDepartures { request, stop_id },
            Effect::StartDebounce(request),
        ],
    ))
}

/// chooseFirstStop outside a cycle: reselect and refetch
fn choose_first_stop(state: &mut AppState) -> Vec<Effect> {
    let mut effects = select_first_stop(state);
    if let Some((_, fetch)) = begin_departures(state) {
        effects.extend(fetch);
    }
    effects
}

fn departures_resolved(
    state: &mut AppState,
    request: RequestId,
    stop_id: StopIdentifier,
    result: Result<DepartureBoard, FetchError>,
) -> Vec<Effect> {
    let mut effects = Vec::new();

    let current = state.departures.pending == Some(request)
        && state.selected_stop_id.as_ref() == Some(&stop_id);

    if current {
        state.departures.pending = None;
        state.departures.loading = false;
        effects.push(Effect::CancelDebounce);

        match result {
            Ok(board) => {
                state.departures.board = Some(board);
                state.departures.for_stop_id = Some(stop_id);
                state.banners.remove(&ErrorCategory::Network);
            }
            Err(error) => {
                tracing::warn!(%error, stop = %stop_id, "failed to fetch departures");
                state.banners.insert(ErrorCategory::Network, error.to_string());
            }
        }
    } else {
        tracing::debug!(stop = %stop_id, ?request, "discarding stale departures response");
    }

    if state.cycle.is_some_and(|cycle| cycle.stage == CycleStage::Departures(request)) {
        effects.extend(finish_cycle(state));
    }

    effects
}

fn finish_cycle(state: &mut AppState) -> Vec<Effect> {
    let Some(cycle) = state.cycle.take() else {
        return vec![];
    };

    match cycle.kind {
        CycleKind::Startup => {
            state.loaded = true;
            state.lifecycle = Lifecycle::Ready;
            state.polling = true;
            tracing::info!("startup refresh settled");
            vec![Effect::StartPolling]
        }
        CycleKind::Poll | CycleKind::Manual => vec![],
    }
}

fn tick(state: &mut AppState, config: &ControllerConfig) -> Vec<Effect> {
    if state.lifecycle != Lifecycle::Ready {
        return vec![];
    }
    if state.cycle.is_some() {
        tracing::debug!("previous refresh still running, skipping poll tick");
        return vec![];
    }

    state.cycle = Some(Cycle {
        kind: CycleKind::Poll,
        stage: CycleStage::Position,
    });

    if state.position.failed {
        begin_position(state)
    } else if state.stops.views.is_none() {
        begin_stops_stage(state, config)
    } else {
        after_stops(state)
    }
}

// ============================================================================
// User intents
// ============================================================================

fn handle_intent(state: &mut AppState, config: &ControllerConfig, intent: Intent) -> Vec<Effect> {
    match intent {
        Intent::ChooseStop(id) => {
            if !accepts_selection(state) {
                tracing::debug!(stop = %id, lifecycle = ?state.lifecycle, "ignoring stop choice");
                return vec![];
            }
            if state.selected_stop_id.as_ref() == Some(&id) {
                return vec![];
            }

            state.departures.board = None;
            state.departures.for_stop_id = None;
            state.selected_stop_id = Some(id);

            begin_departures(state)
                .map(|(_, effects)| effects)
                .unwrap_or_default()
        }
        Intent::ToggleModeFilter(filter) => {
            state.mode_filter = if state.mode_filter == Some(filter) {
                None
            } else {
                Some(filter)
            };
            state.stops.show = config.page_size.min(state.active_view().len());

            let mut effects = vec![Effect::SaveSnapshot(state.snapshot())];
            if accepts_selection(state) {
                effects.extend(choose_first_stop(state));
            }
            effects
        }
        Intent::ToggleFavorite(id) => {
            if !state.favorites.remove(&id) {
                state.favorites.insert(id);
            }

            if let Some(views) = state.stops.views.as_mut() {
                views.refresh_favorites(&state.favorites);
            }
            clamp_show(state, config);

            vec![Effect::SaveSnapshot(state.snapshot())]
        }
        Intent::ShowMore => {
            let len = state.active_view().len();
            state.stops.show = (state.stops.show + config.page_size).min(len).max(state.stops.show);
            vec![]
        }
        Intent::Refresh => {
            if state.lifecycle != Lifecycle::Ready || state.cycle.is_some() {
                tracing::debug!("refresh already running or unavailable");
                return vec![];
            }

            state.cycle = Some(Cycle {
                kind: CycleKind::Manual,
                stage: CycleStage::Position,
            });
            begin_position(state)
        }
    }
}

/// Whether the selection may change and trigger a departures fetch.
///
/// During startup this opens once the position stage is over.
fn accepts_selection(state: &AppState) -> bool {
    match state.lifecycle {
        Lifecycle::Ready => true,
        Lifecycle::Initializing => state
            .cycle
            .is_some_and(|cycle| cycle.kind == CycleKind::Startup && cycle.stage != CycleStage::Position),
        Lifecycle::LocationPermissionDenied | Lifecycle::Stopped => false,
    }
}

/// Keep `show` within the active view, at least one page when the view allows
fn clamp_show(state: &mut AppState, config: &ControllerConfig) {
    let len = state.active_view().len();
    state.stops.show = state.stops.show.max(config.page_size).min(len);
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use nearby_transit::{Mode, Pattern, PatternIdentifier};

    use super::*;

    fn config() -> ControllerConfig {
        ControllerConfig {
            page_size: 2,
            ..ControllerConfig::default()
        }
    }

    fn stop(id: &str, modes: &[Mode]) -> Stop {
        Stop {
            id: StopIdentifier::new(id),
            name: id.into(),
            platform: None,
            distance: 0.0,
            patterns: modes
                .iter()
                .enumerate()
                .map(|(i, mode)| Pattern {
                    code: PatternIdentifier::new(format!("{id}:{i}")),
                    route_short_name: "1".into(),
                    route_long_name: "A-B".into(),
                    mode: *mode,
                    headsign: "B".into(),
                })
                .collect(),
        }
    }

    fn board(name: &str) -> DepartureBoard {
        DepartureBoard {
            stop_name: name.into(),
            departures: vec![],
        }
    }

    fn id(s: &str) -> StopIdentifier {
        StopIdentifier::new(s)
    }

    fn here() -> Coordinates {
        Coordinates::new(60.17, 24.94)
    }

    fn fetched_departures(effects: &[Effect]) -> Vec<(RequestId, StopIdentifier)> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::FetchDepartures { request, stop_id } => Some((*request, stop_id.clone())),
                _ => None,
            })
            .collect()
    }

    /// Drive startup up to the point where the departures fetch for the first stop is issued
    fn start(
        state: &mut AppState,
        config: &ControllerConfig,
        snapshot: Option<Snapshot>,
        stops: Vec<Stop>,
    ) -> Vec<Effect> {
        assert_eq!(update(state, config, Event::Started), vec![Effect::LoadSnapshot]);
        assert_eq!(
            update(state, config, Event::SnapshotLoaded(snapshot)),
            vec![Effect::RequestPermission]
        );
        update(state, config, Event::PermissionResolved(PermissionStatus::Granted));
        update(
            state,
            config,
            Event::PositionResolved {
                high_accuracy: true,
                result: Ok(here()),
            },
        );
        update(state, config, Event::StopsResolved(Ok(stops)))
    }

    /// A ready state with stops A..E (A/B bus, C rail, D tram, E bus) and A's board loaded
    fn ready(config: &ControllerConfig) -> AppState {
        let mut state = AppState::new();
        let effects = start(
            &mut state,
            config,
            None,
            vec![
                stop("A", &[Mode::Bus]),
                stop("B", &[Mode::Bus]),
                stop("C", &[Mode::Rail]),
                stop("D", &[Mode::Tram]),
                stop("E", &[Mode::Bus]),
            ],
        );
        let (request, stop_id) = fetched_departures(&effects)[0].clone();
        let effects = update(
            &mut state,
            config,
            Event::DeparturesResolved {
                request,
                stop_id,
                result: Ok(board("A")),
            },
        );
        assert!(effects.contains(&Effect::StartPolling));
        state
    }

    #[test]
    fn startup_chain_runs_in_order() {
        let config = config();
        let mut state = AppState::new();

        update(&mut state, &config, Event::Started);
        update(&mut state, &config, Event::SnapshotLoaded(None));

        let effects = update(
            &mut state,
            &config,
            Event::PermissionResolved(PermissionStatus::Granted),
        );
        assert_eq!(
            effects,
            vec![Effect::GetPosition(PositionOptions {
                high_accuracy: true
            })]
        );
        assert!(state.position.loading);

        let effects = update(
            &mut state,
            &config,
            Event::PositionResolved {
                high_accuracy: true,
                result: Ok(here()),
            },
        );
        assert_eq!(
            effects,
            vec![
                Effect::SaveSnapshot(Snapshot {
                    last_known_coordinates: Some(here()),
                    ..Snapshot::default()
                }),
                Effect::FetchStops(StopsQuery {
                    coordinates: here(),
                    radius_m: 500,
                }),
            ]
        );
        assert!(state.stops.loading);
        assert!(!state.loaded);

        let effects = update(
            &mut state,
            &config,
            Event::StopsResolved(Ok(vec![stop("A", &[Mode::Bus])])),
        );
        assert_eq!(state.selected_stop_id, Some(id("A")));
        assert_eq!(fetched_departures(&effects).len(), 1);
        assert!(!state.loaded);

        let (request, stop_id) = fetched_departures(&effects)[0].clone();
        let effects = update(
            &mut state,
            &config,
            Event::DeparturesResolved {
                request,
                stop_id,
                result: Ok(board("A")),
            },
        );
        assert!(state.loaded);
        assert_eq!(state.lifecycle, Lifecycle::Ready);
        assert_eq!(effects, vec![Effect::CancelDebounce, Effect::StartPolling]);
        assert_eq!(state.departures.for_stop_id, Some(id("A")));
    }

    #[test]
    fn restored_snapshot_drives_first_selection() {
        let config = config();
        let mut state = AppState::new();
        let snapshot = Snapshot {
            mode_filter: Some(ModeFilter::Rail),
            favorite_stop_ids: BTreeSet::from([id("S1")]),
            last_known_coordinates: None,
        };

        let effects = start(
            &mut state,
            &config,
            Some(snapshot),
            vec![
                stop("S1", &[Mode::Bus]),
                stop("S2", &[Mode::Rail]),
                stop("S3", &[Mode::Rail]),
            ],
        );

        let view: Vec<&str> = state.active_view().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(view, vec!["S2", "S3"]);
        assert_eq!(state.selected_stop_id, Some(id("S2")));
        assert_eq!(fetched_departures(&effects)[0].1, id("S2"));
        assert!(state.is_favorite(&id("S1")));
    }

    #[test]
    fn permission_denied_is_terminal() {
        let config = config();
        let mut state = AppState::new();
        update(&mut state, &config, Event::Started);
        update(&mut state, &config, Event::SnapshotLoaded(None));

        let effects = update(
            &mut state,
            &config,
            Event::PermissionResolved(PermissionStatus::Denied),
        );
        assert!(effects.is_empty());
        assert!(state.loaded);
        assert!(state.position.permission_denied);
        assert_eq!(state.lifecycle, Lifecycle::LocationPermissionDenied);

        assert!(update(&mut state, &config, Event::Tick).is_empty());
        assert!(update(&mut state, &config, Event::Intent(Intent::Refresh)).is_empty());
    }

    #[test]
    fn stop_choice_before_permission_fetches_nothing() {
        let config = config();
        let mut state = AppState::new();
        update(&mut state, &config, Event::Started);

        let effects = update(&mut state, &config, Event::Intent(Intent::ChooseStop(id("X"))));
        assert!(effects.is_empty());
        assert_eq!(state.selected_stop_id, None);

        update(&mut state, &config, Event::SnapshotLoaded(None));
        let effects = update(
            &mut state,
            &config,
            Event::PermissionResolved(PermissionStatus::Granted),
        );
        assert!(fetched_departures(&effects).is_empty());

        // Still locating
        let effects = update(&mut state, &config, Event::Intent(Intent::ChooseStop(id("X"))));
        assert!(effects.is_empty());

        let effects = update(
            &mut state,
            &config,
            Event::Intent(Intent::ToggleModeFilter(ModeFilter::Bus)),
        );
        assert_eq!(effects.len(), 1);
        assert!(matches!(effects[0], Effect::SaveSnapshot(_)));
    }

    #[test]
    fn stop_choice_after_denial_fetches_nothing() {
        let config = config();
        let mut state = AppState::new();
        update(&mut state, &config, Event::Started);
        update(&mut state, &config, Event::SnapshotLoaded(None));
        update(
            &mut state,
            &config,
            Event::PermissionResolved(PermissionStatus::Denied),
        );

        let effects = update(&mut state, &config, Event::Intent(Intent::ChooseStop(id("X"))));
        assert!(effects.is_empty());
        assert_eq!(state.selected_stop_id, None);

        let effects = update(
            &mut state,
            &config,
            Event::Intent(Intent::ToggleModeFilter(ModeFilter::Rail)),
        );
        assert!(fetched_departures(&effects).is_empty());
        assert_eq!(state.mode_filter, Some(ModeFilter::Rail));
    }

    #[test]
    fn stop_chosen_while_startup_stops_load_is_kept() {
        let config = config();
        let mut state = AppState::new();
        update(&mut state, &config, Event::Started);
        update(&mut state, &config, Event::SnapshotLoaded(None));
        update(
            &mut state,
            &config,
            Event::PermissionResolved(PermissionStatus::Granted),
        );
        update(
            &mut state,
            &config,
            Event::PositionResolved {
                high_accuracy: true,
                result: Ok(here()),
            },
        );
        assert!(state.stops.loading);

        let effects = update(&mut state, &config, Event::Intent(Intent::ChooseStop(id("B"))));
        assert_eq!(fetched_departures(&effects)[0].1, id("B"));

        let effects = update(
            &mut state,
            &config,
            Event::StopsResolved(Ok(vec![stop("A", &[Mode::Bus]), stop("B", &[Mode::Bus])])),
        );
        assert_eq!(state.selected_stop_id, Some(id("B")));
        let (request, stop_id) = fetched_departures(&effects)[0].clone();
        assert_eq!(stop_id, id("B"));

        update(
            &mut state,
            &config,
            Event::DeparturesResolved {
                request,
                stop_id,
                result: Ok(board("B")),
            },
        );
        assert!(state.loaded);
        assert_eq!(state.departures.for_stop_id, Some(id("B")));
    }

    #[test]
    fn stop_chosen_during_startup_outside_the_view_is_replaced() {
        let config = config();
        let mut state = AppState::new();
        update(&mut state, &config, Event::Started);
        update(&mut state, &config, Event::SnapshotLoaded(None));
        update(
            &mut state,
            &config,
            Event::PermissionResolved(PermissionStatus::Granted),
        );
        update(
            &mut state,
            &config,
            Event::PositionResolved {
                high_accuracy: true,
                result: Ok(here()),
            },
        );
        update(&mut state, &config, Event::Intent(Intent::ChooseStop(id("Z"))));

        let effects = update(
            &mut state,
            &config,
            Event::StopsResolved(Ok(vec![stop("A", &[Mode::Bus])])),
        );
        assert_eq!(state.selected_stop_id, Some(id("A")));
        assert_eq!(fetched_departures(&effects)[0].1, id("A"));
    }

    #[test]
    fn high_accuracy_timeout_retries_with_low_accuracy() {
        let config = config();
        let mut state = AppState::new();
        update(&mut state, &config, Event::SnapshotLoaded(None));
        update(
            &mut state,
            &config,
            Event::PermissionResolved(PermissionStatus::Granted),
        );

        let effects = update(
            &mut state,
            &config,
            Event::PositionResolved {
                high_accuracy: true,
                result: Err(LocationError::Timeout),
            },
        );
        assert_eq!(
            effects,
            vec![Effect::GetPosition(PositionOptions {
                high_accuracy: false
            })]
        );
        assert!(state.position.loading);

        let low = Coordinates::new(60.2, 24.9);
        update(
            &mut state,
            &config,
            Event::PositionResolved {
                high_accuracy: false,
                result: Ok(low),
            },
        );
        assert!(!state.position.failed);
        assert!(!state.position.loading);
        assert_eq!(state.position.coordinates, Some(low));
    }

    #[test]
    fn low_accuracy_timeout_fails_and_falls_back_to_last_known() {
        let config = config();
        let mut state = AppState::new();
        let last_known = Coordinates::new(60.1, 24.8);
        update(
            &mut state,
            &config,
            Event::SnapshotLoaded(Some(Snapshot {
                last_known_coordinates: Some(last_known),
                ..Snapshot::default()
            })),
        );
        update(
            &mut state,
            &config,
            Event::PermissionResolved(PermissionStatus::Granted),
        );

        let effects = update(
            &mut state,
            &config,
            Event::PositionResolved {
                high_accuracy: false,
                result: Err(LocationError::Timeout),
            },
        );

        assert!(state.position.failed);
        assert!(!state.position.loading);
        assert!(state.banners.contains_key(&ErrorCategory::Location));
        assert_eq!(
            effects,
            vec![Effect::FetchStops(StopsQuery {
                coordinates: last_known,
                radius_m: 500,
            })]
        );
    }

    #[test]
    fn no_coordinates_at_all_settles_startup_without_fetches() {
        let config = config();
        let mut state = AppState::new();
        update(&mut state, &config, Event::SnapshotLoaded(None));
        update(
            &mut state,
            &config,
            Event::PermissionResolved(PermissionStatus::Granted),
        );

        let effects = update(
            &mut state,
            &config,
            Event::PositionResolved {
                high_accuracy: true,
                result: Err(LocationError::PositionUnavailable("no gps".into())),
            },
        );

        assert_eq!(effects, vec![Effect::StartPolling]);
        assert!(state.loaded);
        assert!(state.position.failed);
        assert_eq!(state.selected_stop_id, None);
    }

    #[test]
    fn stops_failure_keeps_previous_data() {
        let config = config();
        let mut state = ready(&config);
        let before = state.stops.views.clone();

        state.cycle = Some(Cycle {
            kind: CycleKind::Manual,
            stage: CycleStage::Stops,
        });
        update(
            &mut state,
            &config,
            Event::StopsResolved(Err(FetchError::Timeout)),
        );

        assert_eq!(state.stops.views, before);
        assert!(!state.stops.loading);
        assert!(state.banners.contains_key(&ErrorCategory::Network));
    }

    #[test]
    fn stale_departures_are_discarded() {
        let config = config();
        let mut state = ready(&config);

        let a = update(&mut state, &config, Event::Intent(Intent::ChooseStop(id("B"))));
        let (request_b, _) = fetched_departures(&a)[0].clone();
        let c = update(&mut state, &config, Event::Intent(Intent::ChooseStop(id("C"))));
        let (request_c, _) = fetched_departures(&c)[0].clone();

        // B resolves late
        update(
            &mut state,
            &config,
            Event::DeparturesResolved {
                request: request_b,
                stop_id: id("B"),
                result: Ok(board("B")),
            },
        );
        assert_eq!(state.departures.board, None);
        assert_eq!(state.departures.pending, Some(request_c));

        update(
            &mut state,
            &config,
            Event::DeparturesResolved {
                request: request_c,
                stop_id: id("C"),
                result: Ok(board("C")),
            },
        );
        assert_eq!(state.departures.board, Some(board("C")));
        assert_eq!(state.departures.for_stop_id, Some(id("C")));
    }

    #[test]
    fn older_response_for_reselected_stop_is_discarded() {
        let config = config();
        let mut state = ready(&config);

        let first = update(&mut state, &config, Event::Intent(Intent::ChooseStop(id("B"))));
        update(&mut state, &config, Event::Intent(Intent::ChooseStop(id("C"))));
        let again = update(&mut state, &config, Event::Intent(Intent::ChooseStop(id("B"))));

        let (old, _) = fetched_departures(&first)[0].clone();
        let (new, _) = fetched_departures(&again)[0].clone();

        update(
            &mut state,
            &config,
            Event::DeparturesResolved {
                request: old,
                stop_id: id("B"),
                result: Ok(board("old")),
            },
        );
        assert_eq!(state.departures.board, None);

        update(
            &mut state,
            &config,
            Event::DeparturesResolved {
                request: new,
                stop_id: id("B"),
                result: Ok(board("new")),
            },
        );
        assert_eq!(state.departures.board, Some(board("new")));
    }

    #[test]
    fn choosing_the_selected_stop_is_a_no_op() {
        let config = config();
        let mut state = ready(&config);
        let effects = update(&mut state, &config, Event::Intent(Intent::ChooseStop(id("A"))));
        assert!(effects.is_empty());
        assert_eq!(state.departures.board, Some(board("A")));
    }

    #[test]
    fn choosing_a_stop_clears_the_old_board() {
        let config = config();
        let mut state = ready(&config);
        let effects = update(&mut state, &config, Event::Intent(Intent::ChooseStop(id("D"))));

        assert_eq!(state.departures.board, None);
        assert_eq!(state.selected_stop_id, Some(id("D")));
        assert!(matches!(effects[1], Effect::StartDebounce(_)));
    }

    #[test]
    fn departures_failure_keeps_board_and_sets_banner() {
        let config = config();
        let mut state = ready(&config);

        let effects = update(&mut state, &config, Event::Tick);
        let (request, stop_id) = fetched_departures(&effects)[0].clone();
        update(
            &mut state,
            &config,
            Event::DeparturesResolved {
                request,
                stop_id,
                result: Err(FetchError::Network("offline".into())),
            },
        );

        assert_eq!(state.departures.board, Some(board("A")));
        assert!(state.banners.contains_key(&ErrorCategory::Network));
        assert_eq!(state.cycle, None);
    }

    #[test]
    fn debounce_only_flags_loading_for_the_pending_request() {
        let config = config();
        let mut state = ready(&config);

        let b = update(&mut state, &config, Event::Intent(Intent::ChooseStop(id("B"))));
        let (request_b, _) = fetched_departures(&b)[0].clone();
        assert!(!state.departures.loading);

        update(&mut state, &config, Event::Intent(Intent::ChooseStop(id("C"))));
        update(&mut state, &config, Event::DebounceElapsed(request_b));
        assert!(!state.departures.loading);

        let pending = state.departures.pending.unwrap();
        update(&mut state, &config, Event::DebounceElapsed(pending));
        assert!(state.departures.loading);
    }

    #[test]
    fn show_more_is_monotonic_and_capped() {
        let config = config();
        let mut state = ready(&config);
        assert_eq!(state.stops.show, 2);

        let mut previous = state.stops.show;
        for _ in 0..5 {
            update(&mut state, &config, Event::Intent(Intent::ShowMore));
            assert!(state.stops.show >= previous);
            assert!(state.stops.show <= state.active_view().len());
            previous = state.stops.show;
        }
        assert_eq!(state.stops.show, 5);
    }

    #[test]
    fn toggling_a_filter_twice_restores_defaults() {
        let config = config();
        let mut state = ready(&config);
        update(&mut state, &config, Event::Intent(Intent::ShowMore));
        assert_eq!(state.stops.show, 4);

        update(
            &mut state,
            &config,
            Event::Intent(Intent::ToggleModeFilter(ModeFilter::Bus)),
        );
        assert_eq!(state.mode_filter, Some(ModeFilter::Bus));

        update(
            &mut state,
            &config,
            Event::Intent(Intent::ToggleModeFilter(ModeFilter::Bus)),
        );
        assert_eq!(state.mode_filter, None);
        assert_eq!(state.stops.show, config.page_size);
    }

    #[test]
    fn filter_change_reselects_first_stop_and_persists() {
        let config = config();
        let mut state = ready(&config);

        let effects = update(
            &mut state,
            &config,
            Event::Intent(Intent::ToggleModeFilter(ModeFilter::Rail)),
        );

        assert!(matches!(
            effects[0],
            Effect::SaveSnapshot(Snapshot {
                mode_filter: Some(ModeFilter::Rail),
                ..
            })
        ));
        assert_eq!(state.selected_stop_id, Some(id("C")));
        assert_eq!(fetched_departures(&effects)[0].1, id("C"));
        assert_eq!(state.stops.show, 1);
    }

    #[test]
    fn filter_with_empty_view_clears_selection() {
        let config = config();
        let mut state = ready(&config);

        let effects = update(
            &mut state,
            &config,
            Event::Intent(Intent::ToggleModeFilter(ModeFilter::Subway)),
        );

        assert_eq!(state.selected_stop_id, None);
        assert_eq!(state.departures.board, None);
        assert!(fetched_departures(&effects).is_empty());
        assert_eq!(state.stops.show, 0);
    }

    #[test]
    fn favorites_toggle_updates_view_without_reselecting() {
        let config = config();
        let mut state = ready(&config);
        update(
            &mut state,
            &config,
            Event::Intent(Intent::ToggleModeFilter(ModeFilter::Favorites)),
        );
        assert_eq!(state.selected_stop_id, None);

        let effects = update(
            &mut state,
            &config,
            Event::Intent(Intent::ToggleFavorite(id("D"))),
        );
        assert_eq!(
            effects,
            vec![Effect::SaveSnapshot(Snapshot {
                mode_filter: Some(ModeFilter::Favorites),
                favorite_stop_ids: BTreeSet::from([id("D")]),
                last_known_coordinates: Some(here()),
            })]
        );
        assert_eq!(state.active_view().len(), 1);
        assert_eq!(state.selected_stop_id, None);
        assert_eq!(state.stops.show, 1);

        update(
            &mut state,
            &config,
            Event::Intent(Intent::ToggleFavorite(id("D"))),
        );
        assert!(state.active_view().is_empty());
        assert_eq!(state.stops.show, 0);
    }

    #[test]
    fn ticks_do_not_overlap() {
        let config = config();
        let mut state = ready(&config);

        let first = update(&mut state, &config, Event::Tick);
        assert_eq!(fetched_departures(&first).len(), 1);
        assert!(update(&mut state, &config, Event::Tick).is_empty());

        let (request, stop_id) = fetched_departures(&first)[0].clone();
        update(
            &mut state,
            &config,
            Event::DeparturesResolved {
                request,
                stop_id,
                result: Ok(board("A")),
            },
        );
        assert_eq!(fetched_departures(&update(&mut state, &config, Event::Tick)).len(), 1);
    }

    #[test]
    fn tick_retries_failed_position_then_missing_stops() {
        let config = config();
        let mut state = AppState::new();
        update(&mut state, &config, Event::SnapshotLoaded(None));
        update(
            &mut state,
            &config,
            Event::PermissionResolved(PermissionStatus::Granted),
        );
        update(
            &mut state,
            &config,
            Event::PositionResolved {
                high_accuracy: true,
                result: Err(LocationError::PositionUnavailable("indoors".into())),
            },
        );
        assert!(state.loaded);

        let effects = update(&mut state, &config, Event::Tick);
        assert_eq!(
            effects,
            vec![Effect::GetPosition(PositionOptions {
                high_accuracy: true
            })]
        );

        let effects = update(
            &mut state,
            &config,
            Event::PositionResolved {
                high_accuracy: true,
                result: Ok(here()),
            },
        );
        assert!(effects.iter().any(|e| matches!(e, Effect::FetchStops(_))));
        assert!(state.banners.is_empty());

        let effects = update(
            &mut state,
            &config,
            Event::StopsResolved(Ok(vec![stop("A", &[Mode::Bus])])),
        );
        assert_eq!(state.selected_stop_id, Some(id("A")));
        assert_eq!(fetched_departures(&effects).len(), 1);
    }

    #[test]
    fn manual_refresh_keeps_visible_selection() {
        let config = config();
        let mut state = ready(&config);
        let effects = update(&mut state, &config, Event::Intent(Intent::ChooseStop(id("C"))));
        let (request, stop_id) = fetched_departures(&effects)[0].clone();
        update(
            &mut state,
            &config,
            Event::DeparturesResolved {
                request,
                stop_id,
                result: Ok(board("C")),
            },
        );

        update(&mut state, &config, Event::Intent(Intent::Refresh));
        update(
            &mut state,
            &config,
            Event::PositionResolved {
                high_accuracy: true,
                result: Ok(here()),
            },
        );
        let effects = update(
            &mut state,
            &config,
            Event::StopsResolved(Ok(vec![stop("A", &[Mode::Bus]), stop("C", &[Mode::Rail])])),
        );

        assert_eq!(state.selected_stop_id, Some(id("C")));
        assert_eq!(fetched_departures(&effects)[0].1, id("C"));
        assert_eq!(state.departures.board, Some(board("C")));
    }

    #[test]
    fn permission_revoked_mid_session_stops_polling() {
        let config = config();
        let mut state = ready(&config);
        state.position.failed = true;

        update(&mut state, &config, Event::Tick);
        let effects = update(
            &mut state,
            &config,
            Event::PositionResolved {
                high_accuracy: true,
                result: Err(LocationError::PermissionDenied),
            },
        );

        assert_eq!(effects, vec![Effect::StopPolling]);
        assert_eq!(state.lifecycle, Lifecycle::LocationPermissionDenied);
        assert_eq!(state.cycle, None);
    }
}
