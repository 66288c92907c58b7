//! Durable subset of session state restored at startup.

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use nearby_transit::{Coordinates, StopIdentifier};
use serde::{Deserialize, Serialize};

use crate::state::ModeFilter;

pub mod sqlite;

pub use sqlite::SqliteSnapshotStore;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub mode_filter: Option<ModeFilter>,
    #[serde(default)]
    pub favorite_stop_ids: BTreeSet<StopIdentifier>,
    #[serde(default)]
    pub last_known_coordinates: Option<Coordinates>,
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// `None` for documents written by an incompatible version or corrupted on disk
    pub fn from_json(document: &str) -> Option<Self> {
        match serde_json::from_str(document) {
            Ok(snapshot) => Some(snapshot),
            Err(error) => {
                tracing::warn!(%error, "ignoring malformed snapshot");
                None
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("snapshot store unavailable: {0}")]
    Unavailable(String),
}

/// Best-effort persistence of the [`Snapshot`]
pub trait SnapshotStore: Send + Sync {
    fn load<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<Option<Snapshot>, SnapshotError>> + Send + 'a>>;

    fn save<'a>(
        &'a self,
        snapshot: &'a Snapshot,
    ) -> Pin<Box<dyn Future<Output = Result<(), SnapshotError>> + Send + 'a>>;
}

/// Keeps the encoded snapshot in memory
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    document: Mutex<Option<String>>,
    saves: AtomicUsize,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a raw document, which need not be valid
    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            document: Mutex::new(Some(document.into())),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn with_snapshot(snapshot: &Snapshot) -> Result<Self, SnapshotError> {
        Ok(Self::with_document(snapshot.to_json()?))
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> Option<Snapshot> {
        let guard = self.document.lock().ok()?;
        guard.as_deref().and_then(Snapshot::from_json)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<Option<Snapshot>, SnapshotError>> + Send + 'a>> {
        Box::pin(async move {
            let guard = self
                .document
                .lock()
                .map_err(|e| SnapshotError::Unavailable(e.to_string()))?;
            Ok(guard.as_deref().and_then(Snapshot::from_json))
        })
    }

    fn save<'a>(
        &'a self,
        snapshot: &'a Snapshot,
    ) -> Pin<Box<dyn Future<Output = Result<(), SnapshotError>> + Send + 'a>> {
        Box::pin(async move {
            let document = snapshot.to_json()?;
            let mut guard = self
                .document
                .lock()
                .map_err(|e| SnapshotError::Unavailable(e.to_string()))?;
            *guard = Some(document);
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}
