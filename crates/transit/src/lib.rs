//! # nearby-transit
//!
//! Transit data model for the nearby departures app.
//!
//! ## Features
//!
//! - **Typed model**: stops, serving patterns, departures and transit modes
//! - **Pluggable data sources**: implement [`StopsRepository`] and
//!   [`DeparturesRepository`] for the routing backend of your choice
//! - **Offline provider**: R-tree backed [`StaticStopsRepository`]
//!
//! ## Example
//!
//! ```
//! use nearby_transit::prelude::*;
//! use geo::Point;
//! use std::collections::HashMap;
//!
//! let stop = StopImpl {
//!     id: StopIdentifier::new("HSL:1020453"),
//!     name: "Rautatientori".into(),
//!     platform: None,
//!     location: Coordinates::new(60.1709, 24.9414),
//!     patterns: vec![],
//! };
//!
//! let provider = StaticStopsRepository::from_data(vec![stop], HashMap::new());
//!
//! let nearby = provider.stops_near(Point::new(24.9410, 60.1700), 500.0);
//! assert_eq!(nearby.len(), 1);
//! ```

pub mod identifiers;
pub mod models;
pub mod network;
pub mod provider;
pub mod spatial;

// Re-exports for convenience
pub mod prelude {
    pub use crate::identifiers::*;
    pub use crate::models::{departure::*, stop::*, types::*};
    pub use crate::network::traits::*;
    pub use crate::provider::{StaticStopsRepository, StopImpl};
}

pub use prelude::*;
