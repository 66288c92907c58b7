pub mod config;
pub mod controller;
pub mod digitransit;
pub mod location;
pub mod snapshot;
pub mod state;

pub use config::{ConfigError, ControllerConfig};
pub use controller::{AppController, Providers};

// Re-export transit from the transit crate
pub use nearby_transit as transit;
