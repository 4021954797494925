//! Monitor configuration, read from environment variables.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::coordinator::{CoordinatorConfig, DEFAULT_TIME_WINDOW_MINS};
use crate::domain::StationCode;
use crate::rasp::{DEFAULT_BASE_URL, DEFAULT_LANG, DEFAULT_TRANSPORT_TYPES, RaspConfig};

pub const API_KEY_VAR: &str = "RASP_API_KEY";
pub const FROM_VAR: &str = "RASP_FROM";
pub const TO_VAR: &str = "RASP_TO";
pub const BASE_URL_VAR: &str = "RASP_BASE_URL";
pub const LANG_VAR: &str = "RASP_LANG";
pub const TRANSPORT_TYPES_VAR: &str = "RASP_TRANSPORT_TYPES";
pub const LIMIT_VAR: &str = "RASP_LIMIT";
pub const TIME_OFFSET_VAR: &str = "RASP_TIME_OFFSET";
pub const TIME_WINDOW_VAR: &str = "RASP_TIME_WINDOW";
pub const REFRESH_SECS_VAR: &str = "RASP_REFRESH_SECS";
pub const LISTEN_ADDR_VAR: &str = "RASP_LISTEN_ADDR";

/// Default polling period.
pub const DEFAULT_REFRESH_SECS: u64 = 60;

/// Default address for the read API.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";

/// Errors from reading the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is unset or blank
    #[error("{0} is not set")]
    Missing(&'static str),

    /// A variable is set but unusable
    #[error("{var} is invalid: {message}")]
    Invalid { var: &'static str, message: String },
}

/// Everything the monitor binary needs to run.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// API key sent with every request.
    pub api_key: String,

    /// Station to watch for departures.
    pub origin: StationCode,

    /// Destination to filter by.
    pub destination: StationCode,

    /// Search endpoint.
    pub base_url: String,

    /// Response language.
    pub lang: String,

    /// Transport type filter.
    pub transport_types: String,

    /// Maximum number of segments to request.
    pub limit: Option<u32>,

    /// Offset from now in minutes (may be negative).
    pub time_offset_mins: i64,

    /// Time window in minutes.
    pub time_window_mins: i64,

    /// How often to refresh.
    pub refresh_interval: Duration,

    /// Where to serve the read API.
    pub listen_addr: SocketAddr,
}

impl MonitorConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = get(API_KEY_VAR).ok_or(ConfigError::Missing(API_KEY_VAR))?;
        let origin = station(get(FROM_VAR), FROM_VAR)?;
        let destination = station(get(TO_VAR), TO_VAR)?;

        let time_window_mins: i64 =
            parse_or(get(TIME_WINDOW_VAR), TIME_WINDOW_VAR, DEFAULT_TIME_WINDOW_MINS)?;
        if time_window_mins < 0 {
            return Err(ConfigError::Invalid {
                var: TIME_WINDOW_VAR,
                message: "must not be negative".to_string(),
            });
        }

        let time_offset_mins: i64 = parse_or(get(TIME_OFFSET_VAR), TIME_OFFSET_VAR, 0)?;
        if chrono::Duration::try_minutes(time_offset_mins).is_none() {
            return Err(ConfigError::Invalid {
                var: TIME_OFFSET_VAR,
                message: "out of range".to_string(),
            });
        }

        let refresh_secs: u64 = parse_or(get(REFRESH_SECS_VAR), REFRESH_SECS_VAR, DEFAULT_REFRESH_SECS)?;
        if refresh_secs == 0 {
            return Err(ConfigError::Invalid {
                var: REFRESH_SECS_VAR,
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            api_key,
            origin,
            destination,
            base_url: get(BASE_URL_VAR).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            lang: get(LANG_VAR).unwrap_or_else(|| DEFAULT_LANG.to_string()),
            transport_types: get(TRANSPORT_TYPES_VAR)
                .unwrap_or_else(|| DEFAULT_TRANSPORT_TYPES.to_string()),
            limit: get(LIMIT_VAR)
                .map(|v| parse(&v, LIMIT_VAR))
                .transpose()?,
            time_offset_mins,
            time_window_mins,
            refresh_interval: Duration::from_secs(refresh_secs),
            listen_addr: parse(
                get(LISTEN_ADDR_VAR).as_deref().unwrap_or(DEFAULT_LISTEN_ADDR),
                LISTEN_ADDR_VAR,
            )?,
        })
    }

    /// Settings for the HTTP client.
    pub fn rasp_config(&self) -> RaspConfig {
        RaspConfig::new(&self.api_key).with_base_url(&self.base_url)
    }

    /// Settings for the refresh coordinator.
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig::new(self.origin.clone(), self.destination.clone())
            .with_lang(&self.lang)
            .with_transport_types(&self.transport_types)
            .with_limit(self.limit)
            .with_time_offset(self.time_offset_mins)
            .with_time_window(self.time_window_mins)
    }
}

fn station(value: Option<String>, var: &'static str) -> Result<StationCode, ConfigError> {
    let value = value.ok_or(ConfigError::Missing(var))?;
    StationCode::parse_normalized(&value).map_err(|e| ConfigError::Invalid {
        var,
        message: e.to_string(),
    })
}

fn parse<T>(value: &str, var: &'static str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        message: e.to_string(),
    })
}

fn parse_or<T>(value: Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) => parse(&v, var),
        None => Ok(default),
    }
}
