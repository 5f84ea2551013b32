//! Non-paginated lookups.
//!
//! The dashboard summary and the salesman reference endpoints return one
//! value instead of a page. Each [`Lookup`] keeps its own loading and error
//! state and applies the same rule as the fetch orchestrator: only the
//! most recently issued request may land.

use crate::cache::{FetchApplied, FetchStatus};
use crate::error::{EngineError, EngineResult, ErrorInfo};
use crate::orchestrator::QueryId;
use crate::transport::Transport;
use pagesync_protocol::{
    decode_record_list, salesmen_by_city_request, ApiRequest, DashboardData, Period,
    ProtocolResult, Resource, SalesmanAreas,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Observable state of one lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupState<V> {
    /// Fetch status.
    pub status: FetchStatus,
    /// Last successfully fetched value. Kept across failures.
    pub value: Option<V>,
    /// Error of the latest fetch, if it failed.
    pub error: Option<ErrorInfo>,
}

impl<V> LookupState<V> {
    /// Whether a fetch is in flight.
    pub fn is_loading(&self) -> bool {
        self.status == FetchStatus::Loading
    }
}

impl<V> Default for LookupState<V> {
    fn default() -> Self {
        Self {
            status: FetchStatus::Idle,
            value: None,
            error: None,
        }
    }
}

#[derive(Debug)]
struct LookupInner<V> {
    state: LookupState<V>,
    in_flight: Option<QueryId>,
}

/// One non-paginated value fetched on demand.
pub struct Lookup<T: Transport, V> {
    label: &'static str,
    transport: Arc<T>,
    inner: RwLock<LookupInner<V>>,
    version: watch::Sender<u64>,
}

impl<T: Transport, V: Clone + Send + Sync> Lookup<T, V> {
    /// Creates an idle lookup. `label` names it in logs and in the
    /// fallback error message.
    pub fn new(label: &'static str, transport: Arc<T>) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            label,
            transport,
            inner: RwLock::new(LookupInner {
                state: LookupState::default(),
                in_flight: None,
            }),
            version,
        }
    }

    /// Name used in logs and messages.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> LookupState<V> {
        self.inner.read().state.clone()
    }

    /// Last fetched value.
    pub fn value(&self) -> Option<V> {
        self.inner.read().state.value.clone()
    }

    /// Subscribes to change notifications. The value is a version counter.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Sends `request` and stores the decoded body.
    ///
    /// Returns `Ok(Stale)` if another fetch was issued, or the lookup was
    /// cleared, while this one was in flight.
    pub async fn fetch<F>(&self, request: ApiRequest, decode: F) -> EngineResult<FetchApplied>
    where
        F: FnOnce(&[u8]) -> ProtocolResult<V> + Send,
    {
        let query_id = QueryId::new();
        {
            let mut inner = self.inner.write();
            inner.in_flight = Some(query_id);
            inner.state.status = FetchStatus::Loading;
            inner.state.error = None;
        }
        self.bump();
        debug!(lookup = self.label, %query_id, request = %request, "lookup issued");

        let fallback = format!("Failed to fetch {}", self.label);
        let outcome = self
            .transport
            .send(request)
            .await
            .map_err(|e| e.into_engine_error(&fallback))
            .and_then(|body| decode(&body).map_err(EngineError::from));

        let mut inner = self.inner.write();
        if inner.in_flight != Some(query_id) {
            debug!(lookup = self.label, %query_id, "stale lookup dropped");
            return Ok(FetchApplied::Stale);
        }
        inner.in_flight = None;
        let result = match outcome {
            Ok(value) => {
                inner.state.value = Some(value);
                inner.state.status = FetchStatus::Loaded;
                Ok(FetchApplied::Applied)
            }
            Err(err) => {
                warn!(lookup = self.label, %query_id, error = %err, "lookup failed");
                inner.state.status = FetchStatus::Errored;
                inner.state.error = Some(ErrorInfo::from(&err));
                Err(err)
            }
        };
        drop(inner);
        self.bump();
        result
    }

    /// Drops the value and any in-flight fetch.
    pub fn clear(&self) {
        {
            let mut inner = self.inner.write();
            inner.state = LookupState::default();
            inner.in_flight = None;
        }
        self.bump();
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }
}

/// Dashboard summary for a selectable period.
pub struct Dashboard<T: Transport> {
    lookup: Lookup<T, DashboardData>,
    period: Mutex<Period>,
}

impl<T: Transport> Dashboard<T> {
    /// Creates the dashboard on the default (monthly) period.
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            lookup: Lookup::new("dashboard data", transport),
            period: Mutex::new(Period::default()),
        }
    }

    /// Selected period.
    pub fn period(&self) -> Period {
        *self.period.lock()
    }

    /// Underlying lookup.
    pub fn lookup(&self) -> &Lookup<T, DashboardData> {
        &self.lookup
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> LookupState<DashboardData> {
        self.lookup.snapshot()
    }

    /// Fetches the summary for the selected period.
    pub async fn load(&self) -> EngineResult<FetchApplied> {
        let period = self.period();
        self.lookup
            .fetch(DashboardData::request(period), DashboardData::decode)
            .await
    }

    /// Selects `period` and re-fetches. Returns `None` if it was already
    /// selected and the data is loaded or loading.
    pub async fn set_period(&self, period: Period) -> EngineResult<Option<FetchApplied>> {
        {
            let mut current = self.period.lock();
            let settled = matches!(
                self.lookup.snapshot().status,
                FetchStatus::Loading | FetchStatus::Loaded
            );
            if *current == period && settled {
                debug!(%period, "dashboard period unchanged");
                return Ok(None);
            }
            *current = period;
        }
        self.load().await.map(Some)
    }

    /// Re-fetches the selected period.
    pub async fn retry(&self) -> EngineResult<FetchApplied> {
        self.load().await
    }
}

/// Salesmen working in one city, for assigning a client.
pub struct SalesmenByCity<T: Transport> {
    lookup: Lookup<T, Vec<Resource>>,
    city: Mutex<Option<String>>,
}

impl<T: Transport> SalesmenByCity<T> {
    /// Creates an empty lookup.
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            lookup: Lookup::new("salesmen", transport),
            city: Mutex::new(None),
        }
    }

    /// City of the latest fetch.
    pub fn city(&self) -> Option<String> {
        self.city.lock().clone()
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> LookupState<Vec<Resource>> {
        self.lookup.snapshot()
    }

    /// Fetched salesmen, empty before the first fetch.
    pub fn salesmen(&self) -> Vec<Resource> {
        self.lookup.value().unwrap_or_default()
    }

    /// Fetches the salesmen of `city`.
    pub async fn fetch(&self, city: &str) -> EngineResult<FetchApplied> {
        let city = city.trim();
        if city.is_empty() {
            return Err(EngineError::Validation("a city is required".into()));
        }
        *self.city.lock() = Some(city.to_string());
        self.lookup
            .fetch(salesmen_by_city_request(city), decode_record_list)
            .await
    }

    /// Forgets the city and its salesmen.
    pub fn clear(&self) {
        *self.city.lock() = None;
        self.lookup.clear();
    }
}

/// Areas a salesman may file clients under.
pub struct SalesmanAreaPicker<T: Transport> {
    lookup: Lookup<T, SalesmanAreas>,
}

impl<T: Transport> SalesmanAreaPicker<T> {
    /// Creates an empty lookup.
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            lookup: Lookup::new("areas", transport),
        }
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> LookupState<SalesmanAreas> {
        self.lookup.snapshot()
    }

    /// Fetches the salesman's areas.
    pub async fn load(&self) -> EngineResult<FetchApplied> {
        self.lookup
            .fetch(SalesmanAreas::request(), SalesmanAreas::decode)
            .await
    }

    /// Fetched areas, empty before the first fetch.
    pub fn areas(&self) -> Vec<Resource> {
        self.lookup.value().map(|v| v.areas).unwrap_or_default()
    }

    /// The salesman's own area, if the server sent one.
    pub fn salesman_area(&self) -> Option<Value> {
        self.lookup.value().and_then(|v| v.salesman_area)
    }
}
