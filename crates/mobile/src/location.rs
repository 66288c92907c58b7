//! Device location supplied by the host app.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use nearby_core::location::{LocationError, LocationProvider, PermissionStatus, PositionOptions};
use nearby_core::transit::Coordinates;

use crate::records::FfiCoordinates;

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum LocationFailure {
    #[error("position request timed out")]
    Timeout,
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable: {reason}")]
    Unavailable { reason: String },
}

impl From<uniffi::UnexpectedUniFFICallbackError> for LocationFailure {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::Unavailable {
            reason: error.reason,
        }
    }
}

impl From<LocationFailure> for LocationError {
    fn from(failure: LocationFailure) -> Self {
        match failure {
            LocationFailure::Timeout => Self::Timeout,
            LocationFailure::PermissionDenied => Self::PermissionDenied,
            LocationFailure::Unavailable { reason } => Self::PositionUnavailable(reason),
        }
    }
}

/// Implemented in Kotlin/Swift on top of the platform location APIs.
///
/// Calls may block; they run on a blocking thread.
#[uniffi::export(with_foreign)]
pub trait LocationSource: Send + Sync {
    /// Prompt for the location permission if needed and report whether it is granted
    fn request_permission(&self) -> bool;

    fn get_position(&self, high_accuracy: bool) -> Result<FfiCoordinates, LocationFailure>;
}

pub(crate) struct PlatformLocation {
    source: Arc<dyn LocationSource>,
}

impl PlatformLocation {
    pub(crate) fn new(source: Arc<dyn LocationSource>) -> Self {
        Self { source }
    }
}

impl LocationProvider for PlatformLocation {
    fn request_permission<'a>(&'a self) -> Pin<Box<dyn Future<Output = PermissionStatus> + Send + 'a>> {
        let source = Arc::clone(&self.source);
        Box::pin(async move {
            match tokio::task::spawn_blocking(move || source.request_permission()).await {
                Ok(true) => PermissionStatus::Granted,
                Ok(false) => PermissionStatus::Denied,
                Err(error) => {
                    tracing::error!(%error, "permission request failed");
                    PermissionStatus::Denied
                }
            }
        })
    }

    fn get_position<'a>(
        &'a self,
        options: PositionOptions,
    ) -> Pin<Box<dyn Future<Output = Result<Coordinates, LocationError>> + Send + 'a>> {
        let source = Arc::clone(&self.source);
        Box::pin(async move {
            let reading = tokio::task::spawn_blocking(move || source.get_position(options.high_accuracy))
                .await
                .map_err(|error| LocationError::PositionUnavailable(error.to_string()))?;

            reading.map(Coordinates::from).map_err(LocationError::from)
        })
    }
}
