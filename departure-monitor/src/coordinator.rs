//! Single-flight refresh of the departure store.
//!
//! Refreshes are keyed by their [`QueryParameters`]. Concurrent refreshes with
//! the same parameters share one upstream request, and a successful response
//! is kept for a short debounce window so a burst of refreshes (several
//! entities polling on the same tick) costs one API call. Failures are never
//! kept: the next refresh tries again.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache as MokaCache;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::domain::StationCode;
use crate::rasp::{DEFAULT_LANG, DEFAULT_TRANSPORT_TYPES, FORMAT_JSON, FetchError, QueryParameters};
use crate::store::DepartureStore;

/// Hard bound on one upstream request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Default time window in minutes.
pub const DEFAULT_TIME_WINDOW_MINS: i64 = 120;

/// Config key for the departure time offset.
pub const TIME_OFFSET_KEY: &str = "time_offset";

/// Config key for the time window.
pub const TIME_WINDOW_KEY: &str = "time_window";

/// Source of timetable payloads.
///
/// This abstraction allows the coordinator to be tested with mock data.
pub trait TimetableSource: Send + Sync {
    /// Run one search and return the decoded document.
    fn fetch(
        &self,
        query: &QueryParameters,
    ) -> impl Future<Output = Result<Value, FetchError>> + Send;
}

impl<T: TimetableSource> TimetableSource for Arc<T> {
    fn fetch(
        &self,
        query: &QueryParameters,
    ) -> impl Future<Output = Result<Value, FetchError>> + Send {
        (**self).fetch(query)
    }
}

/// Configuration for the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Station to watch for departures.
    pub origin: StationCode,

    /// Destination to filter departures by.
    pub destination: StationCode,

    /// Response language.
    pub lang: String,

    /// Transport type filter.
    pub transport_types: String,

    /// Maximum number of segments to request.
    pub limit: Option<u32>,

    /// Pin each request to the current date.
    pub include_date: bool,

    /// Initial offset from now, in minutes (may be negative).
    pub time_offset_mins: i64,

    /// Initial time window, in minutes.
    pub time_window_mins: i64,

    /// How long a successful response answers identical refreshes.
    pub debounce: Duration,
}

impl CoordinatorConfig {
    /// Create a config for one origin/destination pair with defaults.
    pub fn new(origin: StationCode, destination: StationCode) -> Self {
        Self {
            origin,
            destination,
            lang: DEFAULT_LANG.to_string(),
            transport_types: DEFAULT_TRANSPORT_TYPES.to_string(),
            limit: None,
            include_date: true,
            time_offset_mins: 0,
            time_window_mins: DEFAULT_TIME_WINDOW_MINS,
            debounce: Duration::from_secs(5),
        }
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    pub fn with_transport_types(mut self, types: impl Into<String>) -> Self {
        self.transport_types = types.into();
        self
    }

    pub fn with_limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_include_date(mut self, include: bool) -> Self {
        self.include_date = include;
        self
    }

    pub fn with_time_offset(mut self, mins: i64) -> Self {
        self.time_offset_mins = mins;
        self
    }

    pub fn with_time_window(mut self, mins: i64) -> Self {
        self.time_window_mins = mins;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

/// Live-tunable query settings.
#[derive(Debug, Clone, Copy)]
struct Tunables {
    time_offset_mins: i64,
    time_window_mins: i64,
}

/// Result of one refresh.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// This call fetched the payload and stored it.
    Updated(Arc<Value>),

    /// This call joined an in-flight fetch or reused one from the debounce
    /// window. The store was not written again.
    Shared(Arc<Value>),

    /// No payload; the store keeps its previous contents.
    Failed(Arc<FetchError>),
}

impl RefreshOutcome {
    /// The payload, if the refresh produced one.
    pub fn payload(&self) -> Option<&Arc<Value>> {
        match self {
            RefreshOutcome::Updated(payload) | RefreshOutcome::Shared(payload) => Some(payload),
            RefreshOutcome::Failed(_) => None,
        }
    }

    /// Whether this call wrote the store.
    pub fn is_update(&self) -> bool {
        matches!(self, RefreshOutcome::Updated(_))
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            RefreshOutcome::Failed(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// Builds queries, runs them, and hands successful payloads to the store.
///
/// Callers should still serialize refreshes per store (one per polling tick):
/// refreshes with *different* parameters are not coalesced, and whichever
/// completes last wins.
pub struct RequestCoordinator<S> {
    source: S,
    config: CoordinatorConfig,
    tunables: RwLock<Tunables>,
    store: Arc<DepartureStore>,
    clock: Arc<dyn Clock>,
    /// Successful payloads by query, for the debounce window. Concurrent
    /// initialization of one key is coalesced by moka.
    pending: MokaCache<QueryParameters, Arc<Value>>,
}

impl<S: TimetableSource> RequestCoordinator<S> {
    /// Create a coordinator and its store.
    pub fn new(source: S, config: CoordinatorConfig, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(DepartureStore::new(
            config.time_offset_mins,
            Arc::clone(&clock),
        ));

        let pending = MokaCache::builder()
            .time_to_live(config.debounce)
            .max_capacity(16)
            .build();

        Self {
            source,
            tunables: RwLock::new(Tunables {
                time_offset_mins: config.time_offset_mins,
                time_window_mins: config.time_window_mins,
            }),
            config,
            store,
            clock,
            pending,
        }
    }

    /// Create a coordinator reading the system clock.
    pub fn with_system_clock(source: S, config: CoordinatorConfig) -> Self {
        Self::new(source, config, Arc::new(SystemClock))
    }

    /// The store refreshed by this coordinator.
    pub fn store(&self) -> &Arc<DepartureStore> {
        &self.store
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Update a live setting: `time_offset` (minutes, signed) or
    /// `time_window` (minutes, not negative).
    ///
    /// Returns `false` for unknown keys and rejected values. Changes apply to
    /// the next query; an offset change also makes the store recompute its
    /// projection on the next read.
    pub async fn set_config(&self, key: &str, value: i64) -> bool {
        match key {
            TIME_OFFSET_KEY => {
                if !self.store.set_time_offset(value).await {
                    return false;
                }
                self.tunables.write().await.time_offset_mins = value;
                true
            }
            TIME_WINDOW_KEY if value >= 0 => {
                self.tunables.write().await.time_window_mins = value;
                true
            }
            _ => {
                debug!(key, value, "ignoring config update");
                false
            }
        }
    }

    /// Build the parameters for the next request.
    pub async fn build_query(&self) -> QueryParameters {
        let tunables = *self.tunables.read().await;

        QueryParameters {
            origin: self.config.origin.clone(),
            destination: self.config.destination.clone(),
            filters: self.filter_list(),
            format: FORMAT_JSON,
            lang: self.config.lang.clone(),
            transport_types: self.config.transport_types.clone(),
            time_offset_mins: tunables.time_offset_mins,
            time_window_mins: tunables.time_window_mins,
            date: self
                .config
                .include_date
                .then(|| self.clock.now().date_naive()),
            limit: self.config.limit,
        }
    }

    fn filter_list(&self) -> Vec<StationCode> {
        vec![self.config.destination.clone()]
    }

    /// Fetch the timetable and hand it to the store.
    ///
    /// Never fails: errors are logged and reported in the outcome, and the
    /// store keeps what it had.
    pub async fn refresh(&self) -> RefreshOutcome {
        let query = self.build_query().await;
        debug!(from = %query.origin, to = %query.destination, "refreshing departures");

        let result = self
            .pending
            .entry(query.clone())
            .or_try_insert_with(self.fetch_and_store(&query))
            .await;

        match result {
            Ok(entry) if entry.is_fresh() => RefreshOutcome::Updated(entry.into_value()),
            Ok(entry) => {
                debug!("reusing in-flight or recent response");
                RefreshOutcome::Shared(entry.into_value())
            }
            Err(err) => {
                warn!(error = %err, "departure refresh failed; keeping previous data");
                RefreshOutcome::Failed(err)
            }
        }
    }

    async fn fetch_and_store(&self, query: &QueryParameters) -> Result<Arc<Value>, FetchError> {
        let payload = tokio::time::timeout(REQUEST_TIMEOUT, self.source.fetch(query))
            .await
            .map_err(|_| FetchError::Timeout(REQUEST_TIMEOUT))??;

        if payload.is_null() {
            return Err(FetchError::EmptyBody);
        }

        let payload = Arc::new(payload);
        self.store.populate(Arc::clone(&payload)).await;
        Ok(payload)
    }

    /// Forget debounced responses so the next refresh goes upstream.
    pub fn invalidate_pending(&self) {
        self.pending.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::rasp::mock::{MockReply, MockTimetableSource};
    use crate::store::StoreState;
    use futures::future::join_all;
    use serde_json::json;

    fn code(s: &str) -> StationCode {
        StationCode::parse(s).unwrap()
    }

    fn payload() -> Value {
        json!({
            "segments": [
                {
                    "departure": "2024-01-01T10:00:00+00:00",
                    "from": {"title": "A Station"},
                    "to": {"title": "B Station"}
                },
                {
                    "departure": "2024-01-01T09:00:00+00:00",
                    "from": {"title": "A Station"},
                    "to": {"title": "B Station"}
                }
            ]
        })
    }

    fn setup(
        reply: MockReply,
    ) -> (
        RequestCoordinator<Arc<MockTimetableSource>>,
        Arc<MockTimetableSource>,
    ) {
        let mock = Arc::new(MockTimetableSource::new(reply));
        let clock = Arc::new(FixedClock::parse("2024-01-01T09:30:00+00:00").unwrap());
        let config = CoordinatorConfig::new(code("A"), code("B"));
        (
            RequestCoordinator::new(Arc::clone(&mock), config, clock),
            mock,
        )
    }

    #[test]
    fn config_defaults() {
        let config = CoordinatorConfig::new(code("A"), code("B"));

        assert_eq!(config.lang, "ru_RU");
        assert_eq!(config.transport_types, "suburban");
        assert_eq!(config.limit, None);
        assert!(config.include_date);
        assert_eq!(config.time_offset_mins, 0);
        assert_eq!(config.time_window_mins, 120);
        assert_eq!(config.debounce, Duration::from_secs(5));
    }

    #[test]
    fn config_builder() {
        let config = CoordinatorConfig::new(code("A"), code("B"))
            .with_lang("en_US")
            .with_transport_types("train")
            .with_limit(Some(10))
            .with_include_date(false)
            .with_time_offset(-15)
            .with_time_window(60)
            .with_debounce(Duration::from_secs(1));

        assert_eq!(config.lang, "en_US");
        assert_eq!(config.transport_types, "train");
        assert_eq!(config.limit, Some(10));
        assert!(!config.include_date);
        assert_eq!(config.time_offset_mins, -15);
        assert_eq!(config.time_window_mins, 60);
        assert_eq!(config.debounce, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn build_query_from_config() {
        let (coordinator, _) = setup(MockReply::Empty);
        let query = coordinator.build_query().await;

        assert_eq!(query.origin, code("A"));
        assert_eq!(query.destination, code("B"));
        assert_eq!(query.filters, vec![code("B")]);
        assert_eq!(query.format, "json");
        assert_eq!(query.time_offset_mins, 0);
        assert_eq!(query.time_window_mins, 120);
        assert_eq!(query.date, chrono::NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(query.limit, None);
    }

    #[tokio::test]
    async fn set_config_applies_to_next_query() {
        let (coordinator, _) = setup(MockReply::Empty);
        let before = coordinator.build_query().await;

        assert!(coordinator.set_config("time_offset", -10).await);
        assert!(coordinator.set_config("time_window", 30).await);

        // Already-built queries are not touched
        assert_eq!(before.time_offset_mins, 0);
        assert_eq!(before.time_window_mins, 120);

        let after = coordinator.build_query().await;
        assert_eq!(after.time_offset_mins, -10);
        assert_eq!(after.time_window_mins, 30);
        assert_eq!(after.filters, vec![code("B")]);
        assert_eq!(coordinator.store().time_offset_mins().await, -10);
    }

    #[tokio::test]
    async fn set_config_rejects_unknown_and_invalid() {
        let (coordinator, _) = setup(MockReply::Empty);

        assert!(!coordinator.set_config("refresh_interval", 5).await);
        assert!(!coordinator.set_config("time_window", -1).await);
        assert!(!coordinator.set_config("time_offset", i64::MAX).await);

        let query = coordinator.build_query().await;
        assert_eq!(query.time_offset_mins, 0);
        assert_eq!(query.time_window_mins, 120);
    }

    #[tokio::test]
    async fn refresh_populates_store() {
        let (coordinator, mock) = setup(MockReply::Payload(payload()));

        let outcome = coordinator.refresh().await;

        assert!(outcome.is_update());
        assert_eq!(outcome.payload().map(|p| p.as_ref()), Some(&payload()));
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.last_query(), Some(coordinator.build_query().await));

        let store = coordinator.store();
        assert_eq!(store.departure_time_label().await, "10:00");
        assert_eq!(store.state().await, StoreState::Fresh);
    }

    #[tokio::test]
    async fn failed_refresh_on_empty_store_stays_empty() {
        let (coordinator, _) = setup(MockReply::Status {
            status: 500,
            message: "boom".into(),
        });

        let outcome = coordinator.refresh().await;

        assert!(outcome.payload().is_none());
        assert!(matches!(
            outcome.error(),
            Some(FetchError::Api { status: 500, .. })
        ));
        assert_eq!(coordinator.store().state().await, StoreState::Empty);
        assert!(coordinator.store().last_update().await.is_none());
    }

    #[tokio::test]
    async fn empty_body_does_not_populate() {
        let (coordinator, _) = setup(MockReply::Empty);
        assert!(matches!(
            coordinator.refresh().await.error(),
            Some(FetchError::EmptyBody)
        ));

        let (coordinator, _) = setup(MockReply::Payload(Value::Null));
        assert!(matches!(
            coordinator.refresh().await.error(),
            Some(FetchError::EmptyBody)
        ));
        assert!(coordinator.store().raw_payload().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_keeps_previous_data() {
        let (coordinator, mock) = setup(MockReply::Payload(json!({"segments": []})));
        let store = coordinator.store();
        store.populate(Arc::new(payload())).await;

        let label = store.departure_time_label().await;
        let origin = store.origin_name().await;
        let destination = store.destination_name().await;
        let updated = store.last_update().await;

        mock.set_reply(MockReply::Payload(json!({"segments": []})).after(Duration::from_secs(60)));
        let outcome = coordinator.refresh().await;

        assert!(outcome.error().is_some_and(FetchError::is_timeout));
        assert_eq!(mock.call_count(), 1);
        assert_eq!(store.departure_time_label().await, label);
        assert_eq!(store.origin_name().await, origin);
        assert_eq!(store.destination_name().await, destination);
        assert_eq!(store.last_update().await, updated);
        assert_eq!(store.state().await, StoreState::Fresh);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_response_inside_timeout_succeeds() {
        let (coordinator, _) = setup(
            MockReply::Payload(payload()).after(Duration::from_secs(14)),
        );

        assert!(coordinator.refresh().await.is_update());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_refreshes_share_one_request() {
        let (coordinator, mock) =
            setup(MockReply::Payload(payload()).after(Duration::from_secs(2)));

        let outcomes = join_all((0..4).map(|_| coordinator.refresh())).await;

        assert_eq!(mock.call_count(), 1);
        assert!(outcomes.iter().all(|o| o.payload().is_some()));
        assert_eq!(outcomes.iter().filter(|o| o.is_update()).count(), 1);
        assert_eq!(coordinator.store().departure_time_label().await, "10:00");
    }

    #[tokio::test]
    async fn recent_success_is_reused() {
        let (coordinator, mock) = setup(MockReply::Payload(payload()));

        assert!(coordinator.refresh().await.is_update());
        let second = coordinator.refresh().await;

        assert!(matches!(second, RefreshOutcome::Shared(_)));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn changed_parameters_go_upstream() {
        let (coordinator, mock) = setup(MockReply::Payload(payload()));

        assert!(coordinator.refresh().await.is_update());
        assert!(coordinator.set_config("time_window", 60).await);
        assert!(coordinator.refresh().await.is_update());

        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn failures_are_not_reused() {
        let (coordinator, mock) = setup(MockReply::Status {
            status: 503,
            message: "maintenance".into(),
        });

        assert!(coordinator.refresh().await.error().is_some());
        mock.set_reply(MockReply::Payload(payload()));
        assert!(coordinator.refresh().await.is_update());

        assert_eq!(mock.call_count(), 2);
        assert_eq!(coordinator.store().state().await, StoreState::Fresh);
    }

    /// A live offset change is visible to the next read of the cached
    /// projection, without waiting for a refresh.
    #[tokio::test]
    async fn offset_change_reaches_cached_projection() {
        let (coordinator, _) = setup(MockReply::Payload(payload()));
        coordinator.refresh().await;
        assert_eq!(coordinator.store().departure_time_label().await, "10:00");

        assert!(coordinator.set_config("time_offset", -60).await);
        assert_eq!(coordinator.store().departure_time_label().await, "09:00");
    }

    #[tokio::test]
    async fn date_can_be_omitted() {
        let mock = Arc::new(MockTimetableSource::with_payload(payload()));
        let clock = Arc::new(FixedClock::parse("2024-01-01T09:30:00+00:00").unwrap());
        let config = CoordinatorConfig::new(code("A"), code("B"))
            .with_include_date(false)
            .with_limit(Some(5));
        let coordinator = RequestCoordinator::new(Arc::clone(&mock), config, clock);

        let query = coordinator.build_query().await;
        assert_eq!(query.date, None);
        assert_eq!(query.limit, Some(5));
    }
}
