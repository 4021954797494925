//! Timetable API response DTOs.
//!
//! These types map onto the parts of the search response we read. They use
//! `Option` liberally because upstream omits fields rather than sending
//! nulls, and records that are lists in one response may collapse to a single
//! object in the next (see [`OneOrMany`]).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// A field rendered either as a single record or as a list of records.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        value.into_vec()
    }
}

/// One entry of the top-level `segments` array.
///
/// Every field is read on its own: a field of the wrong shape reads as absent
/// and never costs the rest of the segment.
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentRecord {
    /// Scheduled departure (ISO 8601 with offset).
    #[serde(default, deserialize_with = "lenient")]
    pub departure: Option<String>,

    /// Origin station.
    #[serde(default, deserialize_with = "lenient")]
    pub from: Option<TitledRecord>,

    /// Destination station.
    #[serde(default, deserialize_with = "lenient")]
    pub to: Option<TitledRecord>,

    /// Per-destination service board, if the provider includes one.
    #[serde(default, deserialize_with = "lenient")]
    pub departures: Option<DestinationBoard>,
}

/// Any record carrying a human-readable `title`.
#[derive(Debug, Clone, Deserialize)]
pub struct TitledRecord {
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
}

/// Destinations served by a segment.
///
/// Entries are kept as raw JSON here and parsed one by one, so a single
/// malformed destination does not hide the others.
#[derive(Debug, Clone, Deserialize)]
pub struct DestinationBoard {
    pub destination: Option<OneOrMany<Value>>,
}

/// A destination entry, keyed by station code.
#[derive(Debug, Clone, Deserialize)]
pub struct DestinationRecord {
    #[serde(rename = "@crs")]
    pub crs: String,

    #[serde(default, deserialize_with = "lenient")]
    pub service: Option<ServiceRecord>,
}

/// A destination's service record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    /// Stations still to visit after the origin.
    #[serde(default, deserialize_with = "lenient")]
    pub subsequent_calling_points: Option<SubsequentCallingPoints>,

    /// Everything else in the record.
    #[serde(flatten)]
    pub detail: ServiceDetail,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsequentCallingPoints {
    #[serde(default, deserialize_with = "lenient")]
    pub calling_point_list: Option<CallingPointList>,
}

/// Calling points in order. Unreadable entries are dropped individually.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallingPointList {
    #[serde(default, deserialize_with = "readable_items")]
    pub calling_point: Vec<CallingPoint>,
}

/// Service record without its calling points, for compact summaries.
///
/// Only the service-type marker is typed; every other upstream field is kept
/// verbatim in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDetail {
    /// Service type marker (e.g. "train", "bus", "suburban").
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub service_type: Option<String>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ServiceDetail {
    /// Whether the record carries a usable service-type marker.
    pub fn has_service_type(&self) -> bool {
        self.service_type
            .as_deref()
            .is_some_and(|kind| !kind.trim().is_empty())
    }
}

/// A single calling point (intermediate stop).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallingPoint {
    /// Human-readable station name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,

    /// Station code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,

    /// Scheduled time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub st: Option<String>,

    /// Estimated time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub et: Option<String>,

    /// Actual time (only present after the train has called).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<String>,

    /// Remaining upstream fields (cancellation flags, length, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Read a `T`, treating a value of the wrong shape like a missing one.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Read one-or-many `T`, keeping the entries that parse.
fn readable_items<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Some(items) = Option::<OneOrMany<Value>>::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };

    Ok(items
        .into_vec()
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .collect())
}
