//! Per-collection wiring.
//!
//! A [`Collection`] owns one cache, one orchestrator, one reconciler and
//! the search debouncer of a single API collection. Nothing is shared
//! between collections.

use crate::cache::{FetchApplied, FetchState, ResourceCache};
use crate::config::EngineConfig;
use crate::debounce::Debouncer;
use crate::error::EngineResult;
use crate::notifications::UnreadCounter;
use crate::orchestrator::FetchOrchestrator;
use crate::query::{compose, QueryChange, QueryDescriptor};
use crate::reconciler::{DeleteFlow, MutationIntent, MutationOutcome, MutationReconciler};
use crate::stats::LeadSummary;
use crate::transport::Transport;
use pagesync_protocol::{ApiRequest, CollectionSpec, FilterKey, ResourceId};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// One synchronized API collection.
pub struct Collection<T: Transport> {
    orchestrator: Arc<FetchOrchestrator<T>>,
    reconciler: MutationReconciler<T>,
    search: Debouncer<String>,
    delete_flow: DeleteFlow,
}

impl<T: Transport> Collection<T> {
    /// Creates a collection using the configured list page size.
    pub fn new(spec: CollectionSpec, transport: Arc<T>, config: &EngineConfig) -> Self {
        let initial = QueryDescriptor::new(config.page_size);
        Self::build(spec, transport, config, initial, config.search_debounce, None)
    }

    /// Creates a collection starting from `initial`.
    pub fn with_query(
        spec: CollectionSpec,
        transport: Arc<T>,
        config: &EngineConfig,
        initial: QueryDescriptor,
        search_debounce: Duration,
    ) -> Self {
        Self::build(spec, transport, config, initial, search_debounce, None)
    }

    pub(crate) fn with_unread_counter(
        spec: CollectionSpec,
        transport: Arc<T>,
        config: &EngineConfig,
        page_size: u32,
        counter: Arc<UnreadCounter>,
    ) -> Self {
        let initial = QueryDescriptor::new(page_size);
        Self::build(spec, transport, config, initial, config.search_debounce, Some(counter))
    }

    fn build(
        spec: CollectionSpec,
        transport: Arc<T>,
        config: &EngineConfig,
        initial: QueryDescriptor,
        search_debounce: Duration,
        counter: Option<Arc<UnreadCounter>>,
    ) -> Self {
        let cache = Arc::new(ResourceCache::new(initial.page_size()));
        let search = Debouncer::new(search_debounce, initial.search_term().to_string());
        let orchestrator = Arc::new(FetchOrchestrator::new(spec, transport, cache, initial));
        let mut reconciler = MutationReconciler::new(Arc::clone(&orchestrator), config.unread_reconcile);
        if let Some(counter) = counter {
            reconciler = reconciler.with_unread_counter(counter);
        }
        Self {
            orchestrator,
            reconciler,
            search,
            delete_flow: DeleteFlow::new(),
        }
    }

    /// Clients list.
    pub fn clients(transport: Arc<T>, config: &EngineConfig) -> Self {
        Self::new(CollectionSpec::clients(), transport, config)
    }

    /// Inquiries list.
    pub fn inquiries(transport: Arc<T>, config: &EngineConfig) -> Self {
        Self::new(CollectionSpec::inquiries(), transport, config)
    }

    /// Active areas, fetched as reference data.
    ///
    /// The area picker filters the loaded list locally through
    /// [`crate::ReferenceList`]; nothing here searches the server.
    pub fn areas(transport: Arc<T>, config: &EngineConfig) -> Self {
        let initial = compose(
            &QueryDescriptor::new(config.reference_page_size),
            &QueryChange::filter(FilterKey::Active, "true"),
        );
        Self::with_query(
            CollectionSpec::areas(),
            transport,
            config,
            initial,
            config.search_debounce,
        )
    }

    /// Salesmen, active or not, fetched as reference data.
    pub fn salesmen(transport: Arc<T>, config: &EngineConfig) -> Self {
        let initial = compose(
            &QueryDescriptor::new(config.reference_page_size),
            &QueryChange::filter(FilterKey::Role, "salesman"),
        );
        Self::with_query(
            CollectionSpec::users(),
            transport,
            config,
            initial,
            config.search_debounce,
        )
    }

    /// Collection description.
    pub fn spec(&self) -> &CollectionSpec {
        self.orchestrator.spec()
    }

    /// Transport shared with the orchestrator.
    pub fn transport(&self) -> &Arc<T> {
        self.orchestrator.transport()
    }

    /// Underlying cache.
    pub fn cache(&self) -> &Arc<ResourceCache> {
        self.orchestrator.cache()
    }

    /// Underlying orchestrator.
    pub fn orchestrator(&self) -> &Arc<FetchOrchestrator<T>> {
        &self.orchestrator
    }

    /// Underlying reconciler.
    pub fn reconciler(&self) -> &MutationReconciler<T> {
        &self.reconciler
    }

    /// Delete confirmation flow.
    pub fn delete_flow(&self) -> &DeleteFlow {
        &self.delete_flow
    }

    /// Read-only snapshot for rendering.
    pub fn snapshot(&self) -> FetchState {
        self.cache().project()
    }

    /// Last issued query.
    pub fn current_query(&self) -> QueryDescriptor {
        self.orchestrator.current_query()
    }

    /// Whether a typed search term is waiting for its debounce delay.
    pub fn is_searching(&self) -> bool {
        self.search.is_pending()
    }

    /// Fetches the current query.
    pub async fn load(&self) -> EngineResult<FetchApplied> {
        self.orchestrator.refresh().await
    }

    /// Re-fetches the current query.
    pub async fn refresh(&self) -> EngineResult<FetchApplied> {
        self.orchestrator.refresh().await
    }

    /// Re-fetches the current query after a failure.
    pub async fn retry(&self) -> EngineResult<FetchApplied> {
        self.orchestrator.retry().await
    }

    /// Applies a query change. Returns `Ok(None)` if nothing was fetched.
    pub async fn apply(&self, change: QueryChange) -> EngineResult<Option<FetchApplied>> {
        self.orchestrator.run_if_changed(&change).await
    }

    /// Moves to another page.
    pub async fn set_page(&self, page: u32) -> EngineResult<Option<FetchApplied>> {
        self.apply(QueryChange::page(page)).await
    }

    /// Sets or clears (`"all"`) one filter.
    pub async fn set_filter(
        &self,
        key: FilterKey,
        value: impl Into<String>,
    ) -> EngineResult<Option<FetchApplied>> {
        self.apply(QueryChange::filter(key, value)).await
    }

    /// Records raw search input. The term is committed by
    /// [`Collection::drive_search`] once typing pauses.
    pub fn set_search_input(&self, raw: impl Into<String>) {
        self.search.submit(raw.into());
    }

    /// Drops pending search input and searches for nothing right away.
    pub async fn clear_search(&self) -> EngineResult<Option<FetchApplied>> {
        self.search.commit_now(String::new());
        self.apply(QueryChange::search("")).await
    }

    /// Clears the search term and every filter.
    pub async fn clear_filters(&self) -> EngineResult<Option<FetchApplied>> {
        self.search.commit_now(String::new());
        self.apply(QueryChange::clear_filters()).await
    }

    /// Commits debounced search terms until teardown.
    ///
    /// Each committed term is composed into the current query and issued
    /// at once, even while an earlier search fetch is still in flight. The
    /// earlier response then arrives stale and is dropped. Failures land in
    /// the cache; the loop keeps running.
    pub async fn drive_search(&self)
    where
        T: 'static,
    {
        let mut fetches = JoinSet::new();
        loop {
            tokio::select! {
                term = self.search.next() => {
                    let Some(term) = term else { break };
                    debug!(collection = self.spec().label(), term = %term, "search committed");
                    if let Some(pending) = self.orchestrator.begin_if_changed(&QueryChange::search(term)) {
                        let orchestrator = Arc::clone(&self.orchestrator);
                        fetches.spawn(async move { orchestrator.finish(pending).await });
                    }
                }
                Some(joined) = fetches.join_next(), if !fetches.is_empty() => {
                    if let Ok(Err(e)) = joined {
                        debug!(collection = self.spec().label(), error = %e, "search fetch failed");
                    }
                }
            }
        }
        debug!(
            collection = self.spec().label(),
            abandoned = fetches.len(),
            "search driver stopped"
        );
    }

    /// Sends a mutation.
    pub async fn dispatch(&self, intent: MutationIntent) -> EngineResult<MutationOutcome> {
        self.reconciler.dispatch(intent).await
    }

    /// Asks for confirmation to delete `id`.
    pub fn request_delete(&self, id: impl Into<ResourceId>) -> EngineResult<()> {
        self.delete_flow.request(id)
    }

    /// Dismisses the delete confirmation.
    pub fn cancel_delete(&self) -> EngineResult<()> {
        self.delete_flow.cancel()
    }

    /// Confirms the requested delete.
    pub async fn confirm_delete(&self) -> EngineResult<MutationOutcome> {
        self.delete_flow.confirm(&self.reconciler).await
    }

    /// Export request for the current search and filters.
    pub fn export_request(&self) -> ApiRequest {
        self.current_query().export_request(self.spec())
    }

    /// Downloads the export (CSV bytes). Not cached.
    pub async fn export(&self) -> EngineResult<Vec<u8>> {
        self.send_export(self.export_request()).await
    }

    /// Downloads the export for the current query with `change` composed
    /// on top. The listed page and the current query stay as they are.
    pub async fn export_matching(&self, change: &QueryChange) -> EngineResult<Vec<u8>> {
        let request = compose(&self.current_query(), change).export_request(self.spec());
        self.send_export(request).await
    }

    async fn send_export(&self, request: ApiRequest) -> EngineResult<Vec<u8>> {
        debug!(collection = self.spec().label(), request = %request, "export requested");
        let fallback = format!("Failed to export {}", self.spec().label());
        let bytes = self
            .transport()
            .send(request)
            .await
            .map_err(|e| e.into_engine_error(&fallback))?;
        info!(collection = self.spec().label(), bytes = bytes.len(), "export downloaded");
        Ok(bytes)
    }

    /// Lead counts of the current page.
    pub fn lead_summary(&self) -> LeadSummary {
        self.cache().with_items(LeadSummary::from_items)
    }

    /// Stops search and drops the in-flight fetch. The cache stays valid.
    pub fn teardown(&self) {
        self.search.close();
        self.orchestrator.invalidate();
        if self.reconciler.pending_count() > 0 {
            warn!(
                collection = self.spec().label(),
                pending = self.reconciler.pending_count(),
                "teardown with mutations still pending"
            );
        }
    }
}
