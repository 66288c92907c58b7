//! Core enums and errors for transit data.

use std::fmt;

// ============================================================================
// Enums
// ============================================================================

/// Transit vehicle category served by a pattern
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
#[repr(u8)]
pub enum Mode {
    Bus = 0,
    Tram = 1,
    Rail = 2,
    Subway = 3,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Bus, Mode::Tram, Mode::Rail, Mode::Subway];

    /// Parse the mode string used by the routing API ("BUS", "TRAM", ...)
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "BUS" => Some(Self::Bus),
            "TRAM" => Some(Self::Tram),
            "RAIL" => Some(Self::Rail),
            "SUBWAY" => Some(Self::Subway),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bus => "BUS",
            Self::Tram => "TRAM",
            Self::Rail => "RAIL",
            Self::Subway => "SUBWAY",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How trustworthy a departure time is
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum RealtimeState {
    #[default]
    Scheduled,
    Updated,
    Canceled,
    Added,
    Modified,
}

impl RealtimeState {
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "SCHEDULED" => Some(Self::Scheduled),
            "UPDATED" => Some(Self::Updated),
            "CANCELED" => Some(Self::Canceled),
            "ADDED" => Some(Self::Added),
            "MODIFIED" => Some(Self::Modified),
            _ => None,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Failure of a stops or departures fetch
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected HTTP status: {0}")]
    Status(u16),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_wire() {
        assert_eq!(Mode::from_wire("RAIL"), Some(Mode::Rail));
        assert_eq!(Mode::from_wire("SUBWAY"), Some(Mode::Subway));
        assert_eq!(Mode::from_wire("FERRY"), None);
        assert_eq!(Mode::from_wire("bus"), None);
    }

    #[test]
    fn test_mode_display_matches_wire() {
        for mode in Mode::ALL {
            assert_eq!(Mode::from_wire(&mode.to_string()), Some(mode));
        }
    }

    #[test]
    fn test_realtime_state_from_wire() {
        assert_eq!(RealtimeState::from_wire("CANCELED"), Some(RealtimeState::Canceled));
        assert_eq!(RealtimeState::from_wire("???"), None);
    }
}
