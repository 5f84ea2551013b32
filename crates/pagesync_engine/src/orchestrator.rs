//! Fetch orchestrator.
//!
//! Issues list requests for one collection and decides which responses
//! are allowed to land in the cache. Every fetch gets a fresh [`QueryId`];
//! only the most recently issued one may be applied, so a slow response
//! for an old query can never overwrite a newer one.

use crate::cache::{FetchApplied, FetchStatus, ResourceCache};
use crate::error::{EngineError, EngineResult};
use crate::query::{compose, QueryChange, QueryDescriptor};
use crate::transport::{Transport, TransportResult};
use pagesync_protocol::{ApiRequest, CollectionSpec, PageResponse};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identifier of one issued fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId(Uuid);

impl QueryId {
    /// Generates a fresh id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QueryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fetch that has been issued but not completed.
#[derive(Debug, Clone)]
pub struct PendingFetch {
    /// Id the response must be completed with.
    pub query_id: QueryId,
    /// Descriptor being fetched.
    pub query: QueryDescriptor,
    /// Request to hand to the transport.
    pub request: ApiRequest,
}

/// Counters about fetches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Fetches issued.
    pub issued: u64,
    /// Responses applied to the cache.
    pub applied: u64,
    /// Responses dropped because a newer fetch superseded them.
    pub stale_dropped: u64,
    /// Applied responses that were failures.
    pub failures: u64,
    /// Message of the last applied failure.
    pub last_error: Option<String>,
}

/// Drives list fetches for one collection.
pub struct FetchOrchestrator<T: Transport> {
    spec: CollectionSpec,
    transport: Arc<T>,
    cache: Arc<ResourceCache>,
    current: RwLock<QueryDescriptor>,
    stats: RwLock<FetchStats>,
}

impl<T: Transport> FetchOrchestrator<T> {
    /// Creates an orchestrator. Nothing is fetched until asked.
    pub fn new(
        spec: CollectionSpec,
        transport: Arc<T>,
        cache: Arc<ResourceCache>,
        initial: QueryDescriptor,
    ) -> Self {
        Self {
            spec,
            transport,
            cache,
            current: RwLock::new(initial),
            stats: RwLock::new(FetchStats::default()),
        }
    }

    /// Collection being fetched.
    pub fn spec(&self) -> &CollectionSpec {
        &self.spec
    }

    /// Cache receiving the results.
    pub fn cache(&self) -> &Arc<ResourceCache> {
        &self.cache
    }

    /// Transport used for requests.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Most recently issued descriptor (or the initial one).
    pub fn current_query(&self) -> QueryDescriptor {
        self.current.read().clone()
    }

    /// Fetch counters.
    pub fn stats(&self) -> FetchStats {
        self.stats.read().clone()
    }

    /// Issues a fetch: records `query` as current and marks the cache
    /// loading. Any previously issued fetch becomes stale.
    pub fn begin(&self, query: QueryDescriptor) -> PendingFetch {
        let mut current = self.current.write();
        self.issue(&mut current, query)
    }

    /// Composes `change` onto the current descriptor and issues the result,
    /// unless it equals the current query and that query is loading or
    /// loaded. Compose and issue happen under one lock, so concurrent
    /// changes never overwrite each other.
    pub fn begin_if_changed(&self, change: &QueryChange) -> Option<PendingFetch> {
        let mut current = self.current.write();
        let next = compose(&current, change);
        let settled = matches!(self.cache.status(), FetchStatus::Loading | FetchStatus::Loaded);
        if next == *current && settled {
            debug!(collection = self.spec.label(), "query unchanged; no fetch");
            return None;
        }
        Some(self.issue(&mut current, next))
    }

    fn issue(&self, current: &mut QueryDescriptor, query: QueryDescriptor) -> PendingFetch {
        let query_id = QueryId::new();
        let request = query.list_request(&self.spec);
        *current = query.clone();
        self.cache.begin_fetch(query_id);
        self.stats.write().issued += 1;
        debug!(collection = self.spec.label(), %query_id, request = %request, "fetch issued");
        PendingFetch {
            query_id,
            query,
            request,
        }
    }

    /// Completes a fetch with the transport outcome.
    ///
    /// Returns `Ok(Stale)` if the fetch was superseded, whatever the
    /// outcome. An applied failure is stored in the cache and returned.
    pub fn complete(&self, query_id: QueryId, result: TransportResult) -> EngineResult<FetchApplied> {
        let fallback = format!("Failed to fetch {}", self.spec.label());
        let outcome = result
            .map_err(|e| e.into_engine_error(&fallback))
            .and_then(|body| PageResponse::decode(&body).map_err(EngineError::from));
        let failure = outcome.as_ref().err().cloned();

        let page_size = self.current.read().page_size();
        let applied = self.cache.apply_fetch_result(query_id, page_size, outcome);

        let mut stats = self.stats.write();
        match applied {
            FetchApplied::Stale => {
                stats.stale_dropped += 1;
                debug!(collection = self.spec.label(), %query_id, "stale response dropped");
                Ok(FetchApplied::Stale)
            }
            FetchApplied::Applied => {
                stats.applied += 1;
                match failure {
                    Some(err) => {
                        stats.failures += 1;
                        stats.last_error = Some(err.user_message());
                        warn!(collection = self.spec.label(), %query_id, error = %err, "fetch failed");
                        Err(err)
                    }
                    None => Ok(FetchApplied::Applied),
                }
            }
        }
    }

    /// Fetches `query` end to end.
    pub async fn run(&self, query: QueryDescriptor) -> EngineResult<FetchApplied> {
        let pending = self.begin(query);
        self.finish(pending).await
    }

    /// Sends an issued fetch and completes it.
    pub async fn finish(&self, pending: PendingFetch) -> EngineResult<FetchApplied> {
        let result = self.transport.send(pending.request).await;
        self.complete(pending.query_id, result)
    }

    /// Composes `change` onto the current descriptor and fetches it unless
    /// nothing changed (see [`FetchOrchestrator::begin_if_changed`]).
    ///
    /// Returns `Ok(None)` when no request was made.
    pub async fn run_if_changed(&self, change: &QueryChange) -> EngineResult<Option<FetchApplied>> {
        match self.begin_if_changed(change) {
            Some(pending) => self.finish(pending).await.map(Some),
            None => Ok(None),
        }
    }

    /// Re-runs the current descriptor.
    pub async fn refresh(&self) -> EngineResult<FetchApplied> {
        self.run(self.current_query()).await
    }

    /// Re-runs the current descriptor after a failure.
    pub async fn retry(&self) -> EngineResult<FetchApplied> {
        info!(collection = self.spec.label(), "retrying fetch");
        self.refresh().await
    }

    /// Fetches another page of the current descriptor.
    pub async fn run_page(&self, page: u32) -> EngineResult<FetchApplied> {
        let query = self.current_query().with_page(page);
        self.run(query).await
    }

    /// Forgets the in-flight fetch. Its response, if it ever arrives, is
    /// dropped.
    pub fn invalidate(&self) {
        if let Some(query_id) = self.cache.invalidate() {
            debug!(collection = self.spec.label(), %query_id, "in-flight fetch invalidated");
        }
    }
}
