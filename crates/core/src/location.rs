//! Device location source.

use std::future::Future;
use std::pin::Pin;

use nearby_transit::Coordinates;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("position request timed out")]
    Timeout,

    #[error("location permission denied")]
    PermissionDenied,

    #[error("position unavailable: {0}")]
    PositionUnavailable(String),
}

/// Platform geolocation (GPS, network location, a test fake)
pub trait LocationProvider: Send + Sync {
    /// Check the location permission, prompting the user if the platform allows it
    fn request_permission<'a>(&'a self) -> Pin<Box<dyn Future<Output = PermissionStatus> + Send + 'a>>;

    /// A single position reading
    fn get_position<'a>(
        &'a self,
        options: PositionOptions,
    ) -> Pin<Box<dyn Future<Output = Result<Coordinates, LocationError>> + Send + 'a>>;
}
