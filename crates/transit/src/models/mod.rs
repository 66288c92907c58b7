//! Transit data models and errors.

pub mod departure;
pub mod stop;
pub mod types;

// Re-exports for convenience
pub use departure::{Departure, DepartureBoard};
pub use stop::{Coordinates, Pattern, Stop};
pub use types::{FetchError, Mode, RealtimeState, Result};
