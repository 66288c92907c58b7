use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use nearby_core::controller::{AppController, Providers};
use nearby_core::digitransit::DigitransitClient;
use nearby_core::snapshot::{SnapshotError, SqliteSnapshotStore};
use nearby_core::state::{AppState, ViewModel};
use nearby_core::transit::{FetchError, StopIdentifier};
use nearby_core::{ConfigError, ControllerConfig};
use tokio::runtime::Runtime;
use tokio::sync::watch;

use crate::location::{LocationSource, PlatformLocation};
use crate::logging::setup_logging;
use crate::records::{BoardViewModel, StopFilter};

const SNAPSHOT_FILE: &str = "snapshot.sqlite3";

#[derive(Debug, thiserror::Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum AppError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("failed to open snapshot store: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("failed to create transit client: {0}")]
    Client(#[from] FetchError),
}

/// Notified whenever the view model may have changed
#[uniffi::export(with_foreign)]
pub trait StateObserver: Send + Sync {
    fn on_change(&self);
}

#[derive(uniffi::Object)]
pub struct NearbyApp {
    runtime: Runtime,
    controller: Mutex<Option<AppController>>,
    state: watch::Receiver<Arc<AppState>>,
    config: ControllerConfig,
}

impl NearbyApp {
    fn with_controller(&self, f: impl FnOnce(&AppController)) {
        let guard = self.controller.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(controller) => f(controller),
            None => tracing::debug!("app already shut down"),
        }
    }
}

#[uniffi::export]
impl NearbyApp {
    /// Start the app, keeping the persisted snapshot under `base_path`
    #[uniffi::constructor]
    pub fn new(base_path: String, location: Arc<dyn LocationSource>) -> Result<Arc<Self>, AppError> {
        setup_logging();

        let config = ControllerConfig::from_env()?;
        let runtime = Runtime::new()?;
        let snapshots = SqliteSnapshotStore::open(Path::new(&base_path).join(SNAPSHOT_FILE))?;
        let client = Arc::new(DigitransitClient::new(&config)?);

        let providers = Providers {
            location: Arc::new(PlatformLocation::new(location)),
            stops: client.clone(),
            departures: client,
            snapshots: Arc::new(snapshots),
        };

        let controller = AppController::spawn_on(runtime.handle(), config.clone(), providers);
        let state = controller.subscribe();
        tracing::info!(%base_path, "nearby app started");

        Ok(Arc::new(Self {
            runtime,
            controller: Mutex::new(Some(controller)),
            state,
            config,
        }))
    }

    pub fn choose_stop(&self, stop_id: String) {
        self.with_controller(|c| c.choose_stop(StopIdentifier::new(stop_id)));
    }

    pub fn toggle_mode_filter(&self, filter: StopFilter) {
        self.with_controller(|c| c.toggle_mode_filter(filter.into()));
    }

    pub fn toggle_favorite(&self, stop_id: String) {
        self.with_controller(|c| c.toggle_favorite(StopIdentifier::new(stop_id)));
    }

    pub fn show_more(&self) {
        self.with_controller(AppController::show_more);
    }

    pub fn refresh(&self) {
        self.with_controller(AppController::refresh);
    }

    pub fn view_model(&self) -> BoardViewModel {
        let now = chrono::Local::now().fixed_offset();
        ViewModel::project(&self.state.borrow(), &self.config, now).into()
    }

    /// Call `observer` after every state change until the app shuts down
    pub fn observe(&self, observer: Arc<dyn StateObserver>) {
        let mut state = self.state.clone();
        self.runtime.spawn(async move {
            while state.changed().await.is_ok() {
                observer.on_change();
            }
        });
    }

    /// Stop polling and flush the snapshot; further intents are ignored
    pub fn shutdown(&self) {
        let controller = self
            .controller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(controller) = controller {
            self.runtime.block_on(controller.shutdown());
        }
    }
}
