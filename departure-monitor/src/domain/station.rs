//! Station code types.

use std::fmt;

use serde::Serialize;

/// Error returned when parsing an invalid station code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid station code: {reason}")]
pub struct InvalidStationCode {
    reason: &'static str,
}

/// A station code as understood by the timetable API.
///
/// Codes are opaque identifiers (Yandex uses `s9600213`-style ids, Darwin
/// payloads use 3-letter CRS codes), so the only guarantees are that a
/// `StationCode` is non-empty and contains no whitespace or control
/// characters.
///
/// # Examples
///
/// ```
/// use departure_monitor::domain::StationCode;
///
/// let code = StationCode::parse("s9600213").unwrap();
/// assert_eq!(code.as_str(), "s9600213");
///
/// // Empty codes are rejected
/// assert!(StationCode::parse("").is_err());
///
/// // Embedded whitespace is rejected
/// assert!(StationCode::parse("s96 00213").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct StationCode(String);

impl StationCode {
    /// Parse a station code from a string.
    ///
    /// The input must be non-empty and free of whitespace and control
    /// characters.
    pub fn parse(s: &str) -> Result<Self, InvalidStationCode> {
        if s.is_empty() {
            return Err(InvalidStationCode {
                reason: "must not be empty",
            });
        }

        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(InvalidStationCode {
                reason: "must not contain whitespace or control characters",
            });
        }

        Ok(StationCode(s.to_string()))
    }

    /// Parse a station code, trimming surrounding whitespace first.
    ///
    /// Useful for values read from environment variables or forms.
    pub fn parse_normalized(s: &str) -> Result<Self, InvalidStationCode> {
        Self::parse(s.trim())
    }

    /// Returns the station code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StationCode({})", self.0)
    }
}

impl fmt::Display for StationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for StationCode {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}
