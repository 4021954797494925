//! Data transfer objects for web requests and responses.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::coordinator::RefreshOutcome;
use crate::rasp::{CallingPoint, ServiceDetail};
use crate::store::{DepartureStore, StoreState, StoreView};

/// Everything known about the next departure.
#[derive(Debug, Serialize)]
pub struct DepartureView {
    /// Whether the store has data and a qualifying departure
    pub state: StoreState,

    /// Origin station name
    pub origin_name: Option<String>,

    /// Destination name of the departing segment
    pub destination_name: Option<String>,

    /// Scheduled departure as HH:MM, or "None"
    pub departure_time: String,

    /// Whole minutes until departure
    pub minutes_until_departure: Option<i64>,

    /// When the store was last populated
    pub last_update: Option<DateTime<FixedOffset>>,

    /// Service record for the watched destination, without its stops
    pub service: Option<ServiceDetail>,

    /// Stops after the origin
    pub calling_points: Option<Vec<CallingPoint>>,
}

impl DepartureView {
    /// Read the view from the store, looking up the service to `destination`.
    pub async fn collect(store: &DepartureStore, destination: &str) -> Self {
        Self::from(store.view(destination).await)
    }
}

impl From<StoreView> for DepartureView {
    fn from(view: StoreView) -> Self {
        let calling_points = view
            .service
            .as_ref()
            .map(|service| service.calling_points().to_vec())
            .filter(|points| !points.is_empty());

        Self {
            state: view.state,
            origin_name: view.origin_name,
            destination_name: view.destination_name,
            departure_time: view.departure_time,
            minutes_until_departure: view.minutes_until_departure,
            last_update: view.last_update,
            service: view.service.map(|service| service.detail().clone()),
            calling_points,
        }
    }
}

/// Request to change a live setting.
#[derive(Debug, Deserialize)]
pub struct ConfigRequest {
    /// "time_offset" or "time_window"
    pub key: String,

    /// New value in minutes
    pub value: i64,
}

/// Response to an accepted setting change.
#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub applied: bool,
}

/// Result of a manual refresh.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// Whether this request wrote the store
    pub updated: bool,

    /// Why the refresh failed, if it did
    pub error: Option<String>,
}

impl From<&RefreshOutcome> for RefreshResponse {
    fn from(outcome: &RefreshOutcome) -> Self {
        Self {
            updated: outcome.is_update(),
            error: outcome.error().map(ToString::to_string),
        }
    }
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}
