//! Controller configuration.
//!
//! Defaults are the values the app ships with. Every field can be
//! overridden through a `NEARBY_*` environment variable.

use std::time::Duration;

use crate::state::views::DuplicatePatterns;

pub const DEFAULT_ENDPOINT: &str = "https://api.digitransit.fi/routing/v1/routers/hsl/index/graphql";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ControllerConfig {
    /// Radius of the nearby stops query in meters
    pub stops_radius_m: u32,
    pub poll_interval: Duration,
    /// How long a departures fetch may run before the board shows a spinner
    pub departures_debounce: Duration,
    pub page_size: usize,
    pub high_accuracy_timeout: Duration,
    pub low_accuracy_timeout: Duration,
    pub stops_timeout: Duration,
    /// Departures further away than this are shown as a clock time
    pub clock_threshold_minutes: i64,
    pub departures_per_stop: u32,
    pub duplicate_patterns: DuplicatePatterns,
    pub endpoint: String,
    pub subscription_key: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            stops_radius_m: 500,
            poll_interval: Duration::from_secs(15),
            departures_debounce: Duration::from_secs(1),
            page_size: 20,
            high_accuracy_timeout: Duration::from_secs(10),
            low_accuracy_timeout: Duration::from_secs(10),
            stops_timeout: Duration::from_secs(5),
            clock_threshold_minutes: 20,
            departures_per_stop: 12,
            duplicate_patterns: DuplicatePatterns::KeepFirst,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            subscription_key: None,
        }
    }
}

impl ControllerConfig {
    /// Defaults overridden by the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnvVar`] if a set variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `NEARBY_*` key.
    ///
    /// Decoupled from the real environment so tests can pass a plain map.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnvVar`] if a value does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let parse_u64 = |var: &str, default: u64| -> Result<u64, ConfigError> {
            match lookup(var) {
                None => Ok(default),
                Some(raw) => raw.trim().parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
                    var: var.to_string(),
                    reason: e.to_string(),
                }),
            }
        };

        let millis = |var: &str, default: Duration| -> Result<Duration, ConfigError> {
            let default = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
            parse_u64(var, default).map(Duration::from_millis)
        };

        let positive = |var: &str, value: u64| -> Result<u64, ConfigError> {
            if value == 0 {
                return Err(ConfigError::InvalidEnvVar {
                    var: var.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
            Ok(value)
        };

        let out_of_range = |var: &str| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: "out of range".to_string(),
        };

        let stops_radius_m = positive(
            "NEARBY_STOPS_RADIUS_M",
            parse_u64("NEARBY_STOPS_RADIUS_M", u64::from(defaults.stops_radius_m))?,
        )?;
        let page_size = positive(
            "NEARBY_PAGE_SIZE",
            parse_u64("NEARBY_PAGE_SIZE", defaults.page_size as u64)?,
        )?;
        let poll_interval = millis("NEARBY_POLL_INTERVAL_MS", defaults.poll_interval)?;
        if poll_interval.is_zero() {
            return Err(ConfigError::InvalidEnvVar {
                var: "NEARBY_POLL_INTERVAL_MS".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let clock_threshold_minutes = parse_u64(
            "NEARBY_CLOCK_THRESHOLD_MINUTES",
            defaults.clock_threshold_minutes.unsigned_abs(),
        )?;

        let duplicate_patterns = match lookup("NEARBY_DUPLICATE_PATTERNS").as_deref() {
            None => defaults.duplicate_patterns,
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidEnvVar {
                var: "NEARBY_DUPLICATE_PATTERNS".to_string(),
                reason: format!("expected keep_first or union, got '{raw}'"),
            })?,
        };

        Ok(Self {
            stops_radius_m: u32::try_from(stops_radius_m)
                .map_err(|_| out_of_range("NEARBY_STOPS_RADIUS_M"))?,
            poll_interval,
            departures_debounce: millis("NEARBY_DEBOUNCE_MS", defaults.departures_debounce)?,
            page_size: usize::try_from(page_size).map_err(|_| out_of_range("NEARBY_PAGE_SIZE"))?,
            high_accuracy_timeout: millis(
                "NEARBY_HIGH_ACCURACY_TIMEOUT_MS",
                defaults.high_accuracy_timeout,
            )?,
            low_accuracy_timeout: millis(
                "NEARBY_LOW_ACCURACY_TIMEOUT_MS",
                defaults.low_accuracy_timeout,
            )?,
            stops_timeout: millis("NEARBY_STOPS_TIMEOUT_MS", defaults.stops_timeout)?,
            clock_threshold_minutes: i64::try_from(clock_threshold_minutes)
                .map_err(|_| out_of_range("NEARBY_CLOCK_THRESHOLD_MINUTES"))?,
            departures_per_stop: u32::try_from(parse_u64(
                "NEARBY_DEPARTURES_PER_STOP",
                u64::from(defaults.departures_per_stop),
            )?)
            .map_err(|_| out_of_range("NEARBY_DEPARTURES_PER_STOP"))?,
            duplicate_patterns,
            endpoint: lookup("NEARBY_ENDPOINT").unwrap_or(defaults.endpoint),
            subscription_key: lookup("NEARBY_SUBSCRIPTION_KEY").filter(|key| !key.is_empty()),
        })
    }
}
