//! The runtime side of the app: executes [`Effect`]s and feeds their outcomes
//! back into [`update`].
//!
//! One task owns the [`AppState`]. Intents from the UI, provider completions
//! and timer firings all arrive over channels and are applied one at a time,
//! so every transition sees a consistent state. Each new state is published
//! on a watch channel.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use nearby_transit::{DeparturesRepository, FetchError, StopIdentifier, StopsRepository};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::ControllerConfig;
use crate::location::{LocationError, LocationProvider};
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::state::{AppState, Effect, Event, Intent, Lifecycle, ModeFilter, ViewModel, update};

/// The external collaborators the controller talks to
#[derive(Clone)]
pub struct Providers {
    pub location: Arc<dyn LocationProvider>,
    pub stops: Arc<dyn StopsRepository>,
    pub departures: Arc<dyn DeparturesRepository>,
    pub snapshots: Arc<dyn SnapshotStore>,
}

/// Handle to a running controller.
///
/// Dropping the handle stops the controller; [`AppController::shutdown`]
/// additionally waits for pending snapshot writes.
pub struct AppController {
    intents: mpsc::UnboundedSender<Intent>,
    state: watch::Receiver<Arc<AppState>>,
    config: Arc<ControllerConfig>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl AppController {
    /// Start on the current tokio runtime
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn(config: ControllerConfig, providers: Providers) -> Self {
        Self::spawn_on(&Handle::current(), config, providers)
    }

    pub fn spawn_on(handle: &Handle, config: ControllerConfig, providers: Providers) -> Self {
        let config = Arc::new(config);
        let (intents_tx, intents_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (publisher, state) = watch::channel(Arc::new(AppState::new()));

        let runtime = ControllerRuntime {
            config: Arc::clone(&config),
            providers,
            state: AppState::new(),
            publisher,
            events: events_tx,
            tasks: JoinSet::new(),
            debounce: None,
            poller: None,
            snapshot_writes: None,
            writer: None,
        };

        let task = handle.spawn(runtime.run(intents_rx, events_rx, shutdown_rx));

        Self {
            intents: intents_tx,
            state,
            config,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }

    fn send(&self, intent: Intent) {
        if self.intents.send(intent).is_err() {
            tracing::debug!("controller stopped, dropping intent");
        }
    }

    pub fn choose_stop(&self, id: StopIdentifier) {
        self.send(Intent::ChooseStop(id));
    }

    pub fn toggle_mode_filter(&self, filter: ModeFilter) {
        self.send(Intent::ToggleModeFilter(filter));
    }

    pub fn toggle_favorite(&self, id: StopIdentifier) {
        self.send(Intent::ToggleFavorite(id));
    }

    pub fn show_more(&self) {
        self.send(Intent::ShowMore);
    }

    /// Pull-to-refresh; ignored while another refresh is running
    pub fn refresh(&self) {
        self.send(Intent::Refresh);
    }

    /// The latest published state
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<AppState>> {
        self.state.clone()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn view_model(&self, now: DateTime<FixedOffset>) -> ViewModel {
        ViewModel::project(&self.state.borrow(), &self.config, now)
    }

    /// Stop the controller and wait until it has torn down
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                tracing::error!(%error, "controller task failed");
            }
        }
    }
}

impl Drop for AppController {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

// ============================================================================
// Runtime
// ============================================================================

struct ControllerRuntime {
    config: Arc<ControllerConfig>,
    providers: Providers,
    state: AppState,
    publisher: watch::Sender<Arc<AppState>>,
    events: mpsc::UnboundedSender<Event>,
    /// In-flight provider calls
    tasks: JoinSet<()>,
    debounce: Option<JoinHandle<()>>,
    poller: Option<JoinHandle<()>>,
    snapshot_writes: Option<mpsc::UnboundedSender<Snapshot>>,
    writer: Option<JoinHandle<()>>,
}

impl ControllerRuntime {
    async fn run(
        mut self,
        mut intents: mpsc::UnboundedReceiver<Intent>,
        mut events: mpsc::UnboundedReceiver<Event>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        tracing::info!("controller started");
        self.dispatch(Event::Started);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                intent = intents.recv() => match intent {
                    Some(intent) => self.dispatch(Event::Intent(intent)),
                    None => break,
                },
                Some(event) = events.recv() => self.dispatch(event),
            }
        }

        self.teardown().await;
    }

    fn dispatch(&mut self, event: Event) {
        tracing::trace!(?event, "dispatch");
        for effect in update(&mut self.state, &self.config, event) {
            self.perform(effect);
        }
        self.publisher.send_replace(Arc::new(self.state.clone()));
        self.reap_tasks();
    }

    fn reap_tasks(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            if let Err(error) = joined {
                if error.is_panic() {
                    tracing::error!(%error, "provider task panicked");
                }
            }
        }
    }

    fn perform(&mut self, effect: Effect) {
        let events = self.events.clone();

        match effect {
            Effect::LoadSnapshot => {
                let snapshots = Arc::clone(&self.providers.snapshots);
                self.tasks.spawn(async move {
                    let snapshot = match snapshots.load().await {
                        Ok(snapshot) => snapshot,
                        Err(error) => {
                            tracing::warn!(%error, "failed to load snapshot");
                            None
                        }
                    };
                    let _ = events.send(Event::SnapshotLoaded(snapshot));
                });
            }
            Effect::RequestPermission => {
                let location = Arc::clone(&self.providers.location);
                self.tasks.spawn(async move {
                    let status = location.request_permission().await;
                    let _ = events.send(Event::PermissionResolved(status));
                });
            }
            Effect::GetPosition(options) => {
                let location = Arc::clone(&self.providers.location);
                let limit = if options.high_accuracy {
                    self.config.high_accuracy_timeout
                } else {
                    self.config.low_accuracy_timeout
                };
                self.tasks.spawn(async move {
                    let result = tokio::time::timeout(limit, location.get_position(options))
                        .await
                        .unwrap_or(Err(LocationError::Timeout));
                    let _ = events.send(Event::PositionResolved {
                        high_accuracy: options.high_accuracy,
                        result,
                    });
                });
            }
            Effect::FetchStops(query) => {
                let stops = Arc::clone(&self.providers.stops);
                let limit = self.config.stops_timeout;
                self.tasks.spawn(async move {
                    let result = tokio::time::timeout(limit, stops.fetch_stops(query))
                        .await
                        .unwrap_or(Err(FetchError::Timeout));
                    let _ = events.send(Event::StopsResolved(result));
                });
            }
            Effect::FetchDepartures { request, stop_id } => {
                let departures = Arc::clone(&self.providers.departures);
                self.tasks.spawn(async move {
                    let result = departures.fetch_departures(&stop_id).await;
                    let _ = events.send(Event::DeparturesResolved {
                        request,
                        stop_id,
                        result,
                    });
                });
            }
            Effect::StartDebounce(request) => {
                let delay = self.config.departures_debounce;
                self.cancel_debounce();
                self.debounce = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = events.send(Event::DebounceElapsed(request));
                }));
            }
            Effect::CancelDebounce => self.cancel_debounce(),
            Effect::SaveSnapshot(snapshot) => self.save_snapshot(snapshot),
            Effect::StartPolling => {
                if let Some(poller) = self.poller.take() {
                    poller.abort();
                }
                self.poller = Some(tokio::spawn(poll(self.config.poll_interval, events)));
            }
            Effect::StopPolling => {
                if let Some(poller) = self.poller.take() {
                    poller.abort();
                }
            }
        }
    }

    fn cancel_debounce(&mut self) {
        if let Some(debounce) = self.debounce.take() {
            debounce.abort();
        }
    }

    /// Queue a write; the writer task applies them in order
    fn save_snapshot(&mut self, snapshot: Snapshot) {
        if self.snapshot_writes.is_none() {
            let (tx, rx) = mpsc::unbounded_channel();
            let store = Arc::clone(&self.providers.snapshots);
            self.writer = Some(tokio::spawn(write_snapshots(store, rx)));
            self.snapshot_writes = Some(tx);
        }

        let sent = self
            .snapshot_writes
            .as_ref()
            .is_some_and(|writes| writes.send(snapshot).is_ok());
        if !sent {
            tracing::warn!("snapshot writer stopped, dropping write");
        }
    }

    async fn teardown(mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
        self.cancel_debounce();
        self.tasks.shutdown().await;

        // Let queued writes land before reporting stopped
        self.snapshot_writes = None;
        if let Some(writer) = self.writer.take() {
            let _ = writer.await;
        }

        self.state.lifecycle = Lifecycle::Stopped;
        self.state.cycle = None;
        self.state.polling = false;
        self.publisher.send_replace(Arc::new(self.state.clone()));
        tracing::info!("controller stopped");
    }
}

async fn poll(period: Duration, events: mpsc::UnboundedSender<Event>) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        if events.send(Event::Tick).is_err() {
            break;
        }
    }
}

/// Saves snapshots one at a time, skipping to the newest when writes pile up
async fn write_snapshots(store: Arc<dyn SnapshotStore>, mut writes: mpsc::UnboundedReceiver<Snapshot>) {
    while let Some(mut snapshot) = writes.recv().await {
        while let Ok(newer) = writes.try_recv() {
            snapshot = newer;
        }

        if let Err(error) = store.save(&snapshot).await {
            tracing::warn!(%error, "failed to save snapshot");
        }
    }
}
