//! Normalized view of a stored payload.
//!
//! Built once per payload. Every single-record-or-list ambiguity in the
//! upstream document is resolved here, so accessors only ever see lists.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use tracing::debug;

use crate::rasp::{CallingPoint, DestinationRecord, SegmentRecord, ServiceDetail};

/// A stored payload together with its parsed segments.
#[derive(Debug)]
pub struct Timetable {
    raw: Arc<Value>,
    segments: Vec<Arc<Segment>>,
}

impl Timetable {
    /// Normalize a payload. Never fails: anything unreadable is skipped.
    pub fn from_payload(raw: Arc<Value>) -> Self {
        let segments = match raw.get("segments").and_then(Value::as_array) {
            Some(records) => records
                .iter()
                .enumerate()
                .filter_map(|(idx, record)| match Segment::from_record(record) {
                    Some(segment) => Some(Arc::new(segment)),
                    None => {
                        debug!(index = idx, "skipping unreadable segment");
                        None
                    }
                })
                .collect(),
            None => Vec::new(),
        };

        Self { raw, segments }
    }

    /// The payload exactly as received.
    pub fn raw(&self) -> &Arc<Value> {
        &self.raw
    }

    pub fn segments(&self) -> &[Arc<Segment>] {
        &self.segments
    }

    /// The earliest segment departing strictly after `threshold`.
    ///
    /// Ties keep payload order. Segments without a readable departure never
    /// qualify.
    pub fn nearest_after(&self, threshold: DateTime<FixedOffset>) -> Option<Arc<Segment>> {
        self.segments
            .iter()
            .filter_map(|segment| segment.departure.map(|dep| (dep, segment)))
            .filter(|(dep, _)| *dep > threshold)
            .min_by_key(|(dep, _)| *dep)
            .map(|(_, segment)| Arc::clone(segment))
    }
}

/// One candidate departure.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    departure: Option<DateTime<FixedOffset>>,
    origin_title: Option<String>,
    destination_title: Option<String>,
    destinations: Vec<Destination>,
    raw: Value,
}

impl Segment {
    fn from_record(record: &Value) -> Option<Self> {
        let parsed: SegmentRecord = serde_json::from_value(record.clone()).ok()?;

        let departure = parsed.departure.as_deref().and_then(parse_timestamp);

        let destinations = parsed
            .departures
            .and_then(|board| board.destination)
            .map(|entries| {
                entries
                    .into_vec()
                    .into_iter()
                    .filter_map(Destination::from_value)
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            departure,
            origin_title: parsed.from.and_then(|r| r.title),
            destination_title: parsed.to.and_then(|r| r.title),
            destinations,
            raw: record.clone(),
        })
    }

    /// Scheduled departure, if upstream gave a readable one.
    pub fn departure(&self) -> Option<DateTime<FixedOffset>> {
        self.departure
    }

    /// Title of the origin station.
    pub fn origin_title(&self) -> Option<&str> {
        non_blank(self.origin_title.as_deref())
    }

    /// Title of the destination station.
    pub fn destination_title(&self) -> Option<&str> {
        non_blank(self.destination_title.as_deref())
    }

    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    /// The segment record exactly as received.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Service to `station_code`, if one carries a service-type marker.
    ///
    /// The first matching entry with a marker wins; matching entries without
    /// one are passed over.
    pub fn service_to(&self, station_code: &str) -> Option<&Service> {
        self.destinations
            .iter()
            .filter(|dest| dest.code == station_code)
            .find_map(|dest| {
                dest.service
                    .as_ref()
                    .filter(|service| service.detail.has_service_type())
            })
    }
}

/// A destination entry within a segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Destination {
    code: String,
    service: Option<Service>,
}

impl Destination {
    fn from_value(value: Value) -> Option<Self> {
        match serde_json::from_value::<DestinationRecord>(value) {
            Ok(record) => Some(Self {
                code: record.crs,
                service: record.service.map(|service| Service {
                    detail: service.detail,
                    calling_points: service
                        .subsequent_calling_points
                        .and_then(|s| s.calling_point_list)
                        .map(|l| l.calling_point)
                        .unwrap_or_default(),
                }),
            }),
            Err(e) => {
                debug!(error = %e, "skipping unreadable destination");
                None
            }
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn service(&self) -> Option<&Service> {
        self.service.as_ref()
    }
}

/// A destination's service: summary fields plus calling points.
#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    detail: ServiceDetail,
    calling_points: Vec<CallingPoint>,
}

impl Service {
    /// The service record without its calling points.
    pub fn detail(&self) -> &ServiceDetail {
        &self.detail
    }

    /// Stops after the origin, in order. Empty when upstream gave none.
    pub fn calling_points(&self) -> &[CallingPoint] {
        &self.calling_points
    }
}

/// Parse an ISO 8601 timestamp with offset (`+03:00` or `+0300`).
pub fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use serde_json::json;

    fn base() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-01-01T00:00:00+00:00").unwrap()
    }

    proptest! {
        /// The nearest segment is the minimum of all strictly-later departures
        #[test]
        fn nearest_is_minimum_of_future(
            offsets in proptest::collection::vec(0i64..1440, 0..20),
            now_offset in 0i64..1440,
        ) {
            let segments: Vec<Value> = offsets
                .iter()
                .map(|m| json!({"departure": (base() + Duration::minutes(*m)).to_rfc3339()}))
                .collect();
            let table = Timetable::from_payload(Arc::new(json!({"segments": segments})));
            let now = base() + Duration::minutes(now_offset);

            let expected = offsets
                .iter()
                .filter(|m| **m > now_offset)
                .min()
                .map(|m| base() + Duration::minutes(*m));

            let actual = table.nearest_after(now).and_then(|s| s.departure());
            prop_assert_eq!(actual, expected);
        }

        /// A calling point given bare or as a one-element list reads the same
        #[test]
        fn calling_point_shape_is_normalized(name in "[A-Za-z ]{1,20}", crs in "[A-Z]{3}") {
            let point = json!({"locationName": name, "crs": crs});
            let make = |points: Value| {
                Timetable::from_payload(Arc::new(json!({"segments": [{
                    "departure": "2024-01-01T10:00:00+00:00",
                    "departures": {"destination": {"@crs": "DST", "service": {
                        "serviceType": "train",
                        "subsequentCallingPoints": {"callingPointList": {"callingPoint": points}}
                    }}}
                }]})))
            };

            let single = make(point.clone());
            let listed = make(json!([point]));
            let a = single.segments()[0].service_to("DST").map(|s| s.calling_points().to_vec());
            let b = listed.segments()[0].service_to("DST").map(|s| s.calling_points().to_vec());
            prop_assert_eq!(a, b);
        }
    }
}
