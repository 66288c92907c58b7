//! Upcoming departures at a stop.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::types::{Mode, RealtimeState};

/// A single predicted or scheduled vehicle departure
#[derive(Clone, Debug, PartialEq)]
pub struct Departure {
    pub route_short_name: Arc<str>,
    pub route_long_name: Arc<str>,
    pub mode: Option<Mode>,
    pub headsign: Arc<str>,
    pub scheduled_departure: DateTime<Utc>,
    /// Equal to `scheduled_departure` unless realtime data moved it
    pub expected_departure: DateTime<Utc>,
    pub is_realtime: bool,
    pub realtime_state: RealtimeState,
}

impl Departure {
    /// Headsign, or the last segment of "Origin-Destination" when the headsign is blank
    pub fn destination(&self) -> &str {
        if !self.headsign.trim().is_empty() {
            return &self.headsign;
        }

        self.route_long_name
            .rsplit('-')
            .next()
            .map(str::trim)
            .unwrap_or_default()
    }

    pub fn is_canceled(&self) -> bool {
        self.realtime_state == RealtimeState::Canceled
    }

    /// Delay against the timetable in seconds (negative when early)
    pub fn delay_seconds(&self) -> i64 {
        (self.expected_departure - self.scheduled_departure).num_seconds()
    }
}

/// Departures for one stop, ordered by expected departure
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DepartureBoard {
    pub stop_name: Arc<str>,
    pub departures: Vec<Departure>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn departure(headsign: &str, long_name: &str) -> Departure {
        let at = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
        Departure {
            route_short_name: "550".into(),
            route_long_name: long_name.into(),
            mode: Some(Mode::Bus),
            headsign: headsign.into(),
            scheduled_departure: at,
            expected_departure: at + chrono::Duration::seconds(90),
            is_realtime: true,
            realtime_state: RealtimeState::Updated,
        }
    }

    #[test]
    fn test_destination_prefers_headsign() {
        let d = departure("Westendinasema", "Itäkeskus-Westendinasema");
        assert_eq!(d.destination(), "Westendinasema");
    }

    #[test]
    fn test_destination_falls_back_to_route_name() {
        let d = departure("", "Itäkeskus - Westendinasema");
        assert_eq!(d.destination(), "Westendinasema");

        let d = departure(" ", "Kamppi");
        assert_eq!(d.destination(), "Kamppi");
    }

    #[test]
    fn test_delay_seconds() {
        let d = departure("x", "y");
        assert_eq!(d.delay_seconds(), 90);
        assert!(!d.is_canceled());
    }
}
