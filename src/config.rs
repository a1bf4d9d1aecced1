//! Dispatch configuration.

use std::env;
use std::str::FromStr;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::solver::OptimizeOptions;
use crate::waypoint::Location;

pub const DEPOT_LAT_ENV: &str = "DISPATCH_DEPOT_LAT";
pub const DEPOT_LNG_ENV: &str = "DISPATCH_DEPOT_LNG";
pub const LATE_PRIORITY_FACTOR_ENV: &str = "DISPATCH_LATE_PRIORITY_FACTOR";
pub const DAY_ROLLOVER_HOUR_ENV: &str = "DISPATCH_DAY_ROLLOVER_HOUR";
pub const UTC_OFFSET_HOURS_ENV: &str = "DISPATCH_UTC_OFFSET_HOURS";

/// The store every run departs from and returns to.
pub const DEFAULT_DEPOT: Location = Location::new(-23.265772537179835, -51.05287288263555);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub depot: Location,
    pub optimize: OptimizeOptions,
    /// Local hour at which the business day rolls over.
    pub day_rollover_hour: u32,
    pub utc_offset_hours: i32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            depot: DEFAULT_DEPOT,
            optimize: OptimizeOptions::default(),
            day_rollover_hour: 3,
            utc_offset_hours: -3,
        }
    }
}

impl DispatchConfig {
    /// Defaults overridden by any `DISPATCH_*` variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`DispatchConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(lat) = parse_var(&lookup, DEPOT_LAT_ENV)? {
            config.depot.lat = lat;
        }
        if let Some(lng) = parse_var(&lookup, DEPOT_LNG_ENV)? {
            config.depot.lng = lng;
        }
        if let Some(factor) = parse_var(&lookup, LATE_PRIORITY_FACTOR_ENV)? {
            config.optimize.late_priority_factor = factor;
        }
        if let Some(hour) = parse_var(&lookup, DAY_ROLLOVER_HOUR_ENV)? {
            config.day_rollover_hour = hour;
        }
        if let Some(offset) = parse_var(&lookup, UTC_OFFSET_HOURS_ENV)? {
            config.utc_offset_hours = offset;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.depot.is_valid() {
            return Err(ConfigError::Invalid {
                key: "depot",
                value: format!("{:?}", self.depot),
            });
        }
        let factor = self.optimize.late_priority_factor;
        if !(factor.is_finite() && factor > 0.0) {
            return Err(ConfigError::Invalid {
                key: LATE_PRIORITY_FACTOR_ENV,
                value: factor.to_string(),
            });
        }
        if self.day_rollover_hour > 23 {
            return Err(ConfigError::Invalid {
                key: DAY_ROLLOVER_HOUR_ENV,
                value: self.day_rollover_hour.to_string(),
            });
        }
        if self.utc_offset().is_none() {
            return Err(ConfigError::Invalid {
                key: UTC_OFFSET_HOURS_ENV,
                value: self.utc_offset_hours.to_string(),
            });
        }
        Ok(())
    }

    pub fn utc_offset(&self) -> Option<FixedOffset> {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
