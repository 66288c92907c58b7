//! SQLite-backed snapshot store.
//!
//! The snapshot lives in a single-row table as a JSON document, so a schema
//! change in [`Snapshot`] never needs a migration: an unreadable document is
//! simply treated as no snapshot.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OptionalExtension, params};

use super::{Snapshot, SnapshotError, SnapshotStore};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS snapshot (
    id       INTEGER PRIMARY KEY CHECK (id = 0),
    document TEXT NOT NULL,
    saved_at TEXT NOT NULL
);
";

#[derive(Clone)]
pub struct SqliteSnapshotStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteSnapshotStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, SnapshotError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(connection: Connection) -> Result<Self, SnapshotError> {
        connection.execute_batch(SCHEMA)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn read_document(connection: &Connection) -> Result<Option<String>, SnapshotError> {
        let document = connection
            .query_row("SELECT document FROM snapshot WHERE id = 0", [], |row| row.get(0))
            .optional()?;
        Ok(document)
    }

    fn write_document(connection: &Connection, document: &str) -> Result<(), SnapshotError> {
        let saved_at = chrono::Utc::now().to_rfc3339();
        connection.execute(
            "INSERT INTO snapshot (id, document, saved_at) VALUES (0, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET document = excluded.document, saved_at = excluded.saved_at",
            params![document, saved_at],
        )?;
        Ok(())
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_connection<T, F>(&self, f: F) -> Result<T, SnapshotError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, SnapshotError> + Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let guard = connection
                .lock()
                .map_err(|e| SnapshotError::Unavailable(e.to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| SnapshotError::Unavailable(e.to_string()))?
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn load<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<Option<Snapshot>, SnapshotError>> + Send + 'a>> {
        Box::pin(async move {
            let document = self.with_connection(Self::read_document).await?;
            Ok(document.as_deref().and_then(Snapshot::from_json))
        })
    }

    fn save<'a>(
        &'a self,
        snapshot: &'a Snapshot,
    ) -> Pin<Box<dyn Future<Output = Result<(), SnapshotError>> + Send + 'a>> {
        Box::pin(async move {
            let document = snapshot.to_json()?;
            self.with_connection(move |connection| Self::write_document(connection, &document))
                .await
        })
    }
}
