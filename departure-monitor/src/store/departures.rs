//! The departure store: last payload plus its memoized projection.

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Duration, FixedOffset};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::rasp::{CallingPoint, ServiceDetail};

use super::timetable::{Segment, Service, Timetable};

/// Label shown when there is no upcoming departure.
pub const NO_DEPARTURE_LABEL: &str = "None";

/// Coarse state of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreState {
    /// No payload received yet.
    Empty,
    /// A payload is stored but nothing in it departs after now + offset.
    StaleValid,
    /// A payload is stored and has an upcoming departure.
    Fresh,
}

/// One stored payload. Replaced wholesale, never mutated.
#[derive(Debug)]
struct Snapshot {
    timetable: Arc<Timetable>,
    received_at: DateTime<FixedOffset>,
    /// Projection memo; set on first read.
    projection: OnceLock<Option<Arc<Segment>>>,
}

impl Snapshot {
    fn new(timetable: Arc<Timetable>, received_at: DateTime<FixedOffset>) -> Self {
        Self {
            timetable,
            received_at,
            projection: OnceLock::new(),
        }
    }

    fn projection(&self, threshold: Option<DateTime<FixedOffset>>) -> Option<Arc<Segment>> {
        self.projection
            .get_or_init(|| threshold.and_then(|t| self.timetable.nearest_after(t)))
            .clone()
    }
}

#[derive(Debug)]
struct Inner {
    time_offset: Duration,
    snapshot: Option<Arc<Snapshot>>,
}

/// Holds the last successful payload and answers read queries about it.
///
/// `populate` swaps in a new snapshot (payload, freshness stamp and an empty
/// projection memo) under one write lock, so a reader never sees a new payload
/// paired with an old projection or the reverse. Readers clone the snapshot
/// `Arc` and do their work outside the lock.
pub struct DepartureStore {
    clock: Arc<dyn Clock>,
    inner: RwLock<Inner>,
    /// Origin title, kept once seen.
    origin_name: OnceLock<String>,
}

impl DepartureStore {
    /// Create an empty store.
    ///
    /// Offsets that do not fit a `chrono::Duration` are treated as zero.
    pub fn new(time_offset_mins: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: RwLock::new(Inner {
                time_offset: Duration::try_minutes(time_offset_mins).unwrap_or_else(Duration::zero),
                snapshot: None,
            }),
            origin_name: OnceLock::new(),
        }
    }

    /// Create an empty store reading the system clock.
    pub fn with_system_clock(time_offset_mins: i64) -> Self {
        Self::new(time_offset_mins, Arc::new(SystemClock))
    }

    /// The clock this store evaluates "now" with.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Replace the stored payload.
    ///
    /// Clears the projection memo and stamps the freshness time. The payload
    /// is stored verbatim.
    pub async fn populate(&self, payload: Arc<Value>) {
        let timetable = Arc::new(Timetable::from_payload(payload));
        let segments = timetable.segments().len();
        let snapshot = Arc::new(Snapshot::new(timetable, self.clock.now()));

        self.inner.write().await.snapshot = Some(snapshot);
        info!(segments, "stored new timetable payload");
    }

    /// Update the time offset. The projection is recomputed on the next read.
    ///
    /// Returns `false` (and changes nothing) if the offset is out of range.
    pub async fn set_time_offset(&self, minutes: i64) -> bool {
        let Some(offset) = Duration::try_minutes(minutes) else {
            return false;
        };

        let mut inner = self.inner.write().await;
        inner.time_offset = offset;
        if let Some(old) = inner.snapshot.take() {
            inner.snapshot = Some(Arc::new(Snapshot::new(
                Arc::clone(&old.timetable),
                old.received_at,
            )));
        }
        debug!(minutes, "time offset changed; projection invalidated");
        true
    }

    /// Current time offset in minutes.
    pub async fn time_offset_mins(&self) -> i64 {
        self.inner.read().await.time_offset.num_minutes()
    }

    /// The nearest departure after now + offset.
    pub async fn current_departure(&self) -> Option<Arc<Segment>> {
        self.current_departure_at(self.clock.now()).await
    }

    /// The nearest departure after `now` + offset.
    ///
    /// The result is memoized until the next `populate` or offset change;
    /// while memoized, `now` is not consulted.
    pub async fn current_departure_at(&self, now: DateTime<FixedOffset>) -> Option<Arc<Segment>> {
        self.read_at(now).await?.1
    }

    /// True unless a non-empty projection is currently memoized.
    pub async fn is_empty(&self) -> bool {
        let inner = self.inner.read().await;
        !matches!(
            inner.snapshot.as_ref().and_then(|s| s.projection.get()),
            Some(Some(_))
        )
    }

    /// Service to `station_code` on the current departure.
    pub async fn get_destination_service(&self, station_code: &str) -> Option<Service> {
        let departure = self.current_departure().await?;
        departure.service_to(station_code).cloned()
    }

    /// The service record without its calling points.
    pub async fn get_service_summary(&self, station_code: &str) -> Option<ServiceDetail> {
        self.get_destination_service(station_code)
            .await
            .map(|service| service.detail().clone())
    }

    /// Intermediate stops of the service to `station_code`, in order.
    pub async fn get_calling_points(&self, station_code: &str) -> Option<Vec<CallingPoint>> {
        let service = self.get_destination_service(station_code).await?;
        if service.calling_points().is_empty() {
            return None;
        }
        Some(service.calling_points().to_vec())
    }

    /// Name of the origin station.
    ///
    /// Kept once found, since the origin does not change for a given store.
    pub async fn origin_name(&self) -> Option<String> {
        if let Some(name) = self.origin_name.get() {
            return Some(name.clone());
        }

        let departure = self.current_departure().await;
        self.remember_origin(departure.as_deref())
    }

    fn remember_origin(&self, departure: Option<&Segment>) -> Option<String> {
        if let Some(name) = self.origin_name.get() {
            return Some(name.clone());
        }
        let name = departure?.origin_title()?;
        Some(self.origin_name.get_or_init(|| name.to_string()).clone())
    }

    /// Name of the current departure's destination.
    pub async fn destination_name(&self) -> Option<String> {
        let departure = self.current_departure().await?;
        departure.destination_title().map(str::to_string)
    }

    /// When the last payload was stored.
    pub async fn last_update(&self) -> Option<DateTime<FixedOffset>> {
        let inner = self.inner.read().await;
        inner.snapshot.as_ref().map(|s| s.received_at)
    }

    /// Scheduled departure as `HH:MM`, or `"None"` without a departure.
    pub async fn departure_time_label(&self) -> String {
        time_label(self.current_departure().await.as_deref())
    }

    /// Whole minutes from now until the current departure (rounded down).
    pub async fn minutes_until_departure(&self) -> Option<i64> {
        let departure = self.current_departure().await;
        minutes_until(departure.as_deref(), self.clock.now())
    }

    /// Whether a payload is stored and whether it has an upcoming departure.
    pub async fn state(&self) -> StoreState {
        let now = self.clock.now();
        match self.read_at(now).await {
            None => StoreState::Empty,
            Some((_, Some(_))) => StoreState::Fresh,
            Some((_, None)) => StoreState::StaleValid,
        }
    }

    /// Every read-side value at once, taken from a single snapshot.
    ///
    /// `station_code` selects the service, as in
    /// [`get_destination_service`](Self::get_destination_service).
    pub async fn view(&self, station_code: &str) -> StoreView {
        let now = self.clock.now();
        let Some((snapshot, departure)) = self.read_at(now).await else {
            return StoreView {
                state: StoreState::Empty,
                origin_name: self.origin_name.get().cloned(),
                destination_name: None,
                departure_time: NO_DEPARTURE_LABEL.to_string(),
                minutes_until_departure: None,
                last_update: None,
                service: None,
            };
        };

        let departure = departure.as_deref();
        StoreView {
            state: match departure {
                Some(_) => StoreState::Fresh,
                None => StoreState::StaleValid,
            },
            origin_name: self.remember_origin(departure),
            destination_name: departure
                .and_then(Segment::destination_title)
                .map(str::to_string),
            departure_time: time_label(departure),
            minutes_until_departure: minutes_until(departure, now),
            last_update: Some(snapshot.received_at),
            service: departure
                .and_then(|segment| segment.service_to(station_code))
                .cloned(),
        }
    }

    /// The current snapshot and its projection for `now`.
    async fn read_at(
        &self,
        now: DateTime<FixedOffset>,
    ) -> Option<(Arc<Snapshot>, Option<Arc<Segment>>)> {
        let (snapshot, offset) = {
            let inner = self.inner.read().await;
            (inner.snapshot.clone()?, inner.time_offset)
        };

        let departure = snapshot.projection(now.checked_add_signed(offset));
        Some((snapshot, departure))
    }

    /// The stored payload exactly as received.
    pub async fn raw_payload(&self) -> Option<Arc<Value>> {
        let inner = self.inner.read().await;
        inner
            .snapshot
            .as_ref()
            .map(|s| Arc::clone(s.timetable.raw()))
    }
}

/// The store's read-side values, all from one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreView {
    pub state: StoreState,
    pub origin_name: Option<String>,
    pub destination_name: Option<String>,
    /// `HH:MM`, or `"None"` without a departure.
    pub departure_time: String,
    pub minutes_until_departure: Option<i64>,
    pub last_update: Option<DateTime<FixedOffset>>,
    /// Service to the requested station on the current departure.
    pub service: Option<Service>,
}

fn time_label(departure: Option<&Segment>) -> String {
    departure
        .and_then(Segment::departure)
        .map(|dep| dep.format("%H:%M").to_string())
        .unwrap_or_else(|| NO_DEPARTURE_LABEL.to_string())
}

fn minutes_until(departure: Option<&Segment>, now: DateTime<FixedOffset>) -> Option<i64> {
    let seconds = (departure?.departure()? - now).num_seconds();
    Some(seconds.div_euclid(60))
}
