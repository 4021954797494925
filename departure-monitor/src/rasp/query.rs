//! Query parameters for the timetable search endpoint.

use chrono::NaiveDate;

use crate::domain::StationCode;

/// Response format requested from the API.
pub const FORMAT_JSON: &str = "json";

/// Default `lang` parameter.
pub const DEFAULT_LANG: &str = "ru_RU";

/// Default `transport_types` filter.
pub const DEFAULT_TRANSPORT_TYPES: &str = "suburban";

/// Everything that shapes one upstream search request.
///
/// Rebuilt from the coordinator's configuration on every refresh. Equality
/// covers every field, so two refreshes only share an upstream call when they
/// would have sent the same request for the same time policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryParameters {
    /// Station to watch for departures.
    pub origin: StationCode,

    /// Configured destination.
    pub destination: StationCode,

    /// Destination filter list; always contains `destination`.
    pub filters: Vec<StationCode>,

    /// Response format (always "json").
    pub format: &'static str,

    /// Response language.
    pub lang: String,

    /// Transport type filter.
    pub transport_types: String,

    /// Offset from now (minutes) applied when choosing the next departure.
    pub time_offset_mins: i64,

    /// Window (minutes) of interest after the offset.
    pub time_window_mins: i64,

    /// Schedule date, if the request is pinned to a day.
    pub date: Option<NaiveDate>,

    /// Maximum number of segments to return.
    pub limit: Option<u32>,
}

impl QueryParameters {
    /// URL query pairs for the search endpoint.
    ///
    /// The time offset and window select among returned segments on our side;
    /// the search endpoint has no parameters for them.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("format", self.format.to_string()),
            ("from", self.origin.to_string()),
            ("to", self.destination.to_string()),
            ("lang", self.lang.clone()),
            ("transport_types", self.transport_types.clone()),
        ];

        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }

        if let Some(date) = self.date {
            pairs.push(("date", date.format("%Y-%m-%d").to_string()));
        }

        pairs
    }
}
