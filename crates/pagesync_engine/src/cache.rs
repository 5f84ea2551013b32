//! Resource cache: the authoritative in-memory state of one collection.

use crate::error::{EngineError, ErrorInfo};
use crate::orchestrator::QueryId;
use pagesync_protocol::{PageResponse, Resource, ResourceId};
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;

/// Fetch status of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// Nothing requested yet.
    Idle,
    /// A query is in flight.
    Loading,
    /// The latest query resolved successfully.
    Loaded,
    /// The latest query failed.
    Errored,
}

/// Pagination metadata of the cached page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Page currently cached (1-based).
    pub current_page: u32,
    /// Total number of pages for the query.
    pub total_pages: u32,
    /// Total number of records matching the query.
    pub total_items: u64,
    /// Items per page.
    pub page_size: u32,
}

impl Pagination {
    /// Pagination of an empty first page.
    pub fn empty(page_size: u32) -> Self {
        Self {
            current_page: 1,
            total_pages: 1,
            total_items: 0,
            page_size,
        }
    }

    fn recompute_total_pages(&mut self) {
        let size = u64::from(self.page_size.max(1));
        let pages = self.total_items.div_ceil(size).max(1);
        self.total_pages = u32::try_from(pages).unwrap_or(u32::MAX);
    }
}

/// Read-only snapshot of a collection.
///
/// Invariant: `status == Loading` iff `in_flight.is_some()`.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchState {
    /// Fetch status.
    pub status: FetchStatus,
    /// Records of the current page.
    pub items: Vec<Resource>,
    /// Pagination of the current page.
    pub pagination: Pagination,
    /// Error of the latest failed fetch.
    pub error: Option<ErrorInfo>,
    /// Query currently in flight.
    pub in_flight: Option<QueryId>,
}

impl FetchState {
    /// Whether a query is in flight.
    pub fn is_loading(&self) -> bool {
        self.status == FetchStatus::Loading
    }
}

/// Structural patch applied after a mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum CachePatch {
    /// Put a new record at the head of the current page.
    Insert(Resource),
    /// Replace the record with the given id.
    Replace(ResourceId, Resource),
    /// Remove the record with the given id.
    Remove(ResourceId),
}

/// Follow-up the orchestrator must perform after a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchEffect {
    /// Nothing to do.
    None,
    /// Totals may have shifted; re-run the current query.
    Resync,
    /// The current page became empty; fetch this page instead.
    RefetchPage(u32),
}

/// Whether a fetch outcome was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchApplied {
    /// The outcome matched the in-flight query and was applied.
    Applied,
    /// The outcome belonged to a superseded query and was dropped.
    Stale,
}

#[derive(Debug)]
struct CacheInner {
    status: FetchStatus,
    status_before_fetch: FetchStatus,
    items: Vec<Resource>,
    pagination: Pagination,
    error: Option<ErrorInfo>,
    in_flight: Option<QueryId>,
    has_loaded: bool,
}

/// In-memory store for one resource collection.
///
/// The cache exclusively owns the items and pagination of its collection.
/// Every change bumps a version observable through [`ResourceCache::changes`].
pub struct ResourceCache {
    inner: RwLock<CacheInner>,
    version: watch::Sender<u64>,
}

impl ResourceCache {
    /// Creates an idle, empty cache.
    pub fn new(page_size: u32) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: RwLock::new(CacheInner {
                status: FetchStatus::Idle,
                status_before_fetch: FetchStatus::Idle,
                items: Vec::new(),
                pagination: Pagination::empty(page_size),
                error: None,
                in_flight: None,
                has_loaded: false,
            }),
            version,
        }
    }

    /// Returns a read-only snapshot.
    pub fn project(&self) -> FetchState {
        let inner = self.inner.read();
        FetchState {
            status: inner.status,
            items: inner.items.clone(),
            pagination: inner.pagination,
            error: inner.error.clone(),
            in_flight: inner.in_flight,
        }
    }

    /// Subscribes to change notifications. The value is a version counter.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Current fetch status.
    pub fn status(&self) -> FetchStatus {
        self.inner.read().status
    }

    /// Current pagination.
    pub fn pagination(&self) -> Pagination {
        self.inner.read().pagination
    }

    /// Whether any fetch ever succeeded.
    pub fn has_loaded(&self) -> bool {
        self.inner.read().has_loaded
    }

    /// Returns a cached record.
    pub fn get(&self, id: &ResourceId) -> Option<Resource> {
        self.inner.read().items.iter().find(|r| r.id() == id).cloned()
    }

    /// Runs `f` over the items of the current page.
    pub fn with_items<R>(&self, f: impl FnOnce(&[Resource]) -> R) -> R {
        f(&self.inner.read().items)
    }

    /// Counts items of the **current page** matching a predicate.
    ///
    /// This is a page-local statistic, not a collection-wide one.
    pub fn count_where(&self, predicate: impl Fn(&Resource) -> bool) -> usize {
        self.inner.read().items.iter().filter(|r| predicate(r)).count()
    }

    /// Clears the stored fetch error.
    pub fn clear_error(&self) {
        let mut inner = self.inner.write();
        inner.error = None;
        if inner.status == FetchStatus::Errored {
            inner.status = if inner.has_loaded {
                FetchStatus::Loaded
            } else {
                FetchStatus::Idle
            };
        }
        drop(inner);
        self.bump();
    }

    /// Marks the fetch identified by `query_id` as in flight.
    pub(crate) fn begin_fetch(&self, query_id: QueryId) {
        let mut inner = self.inner.write();
        if inner.in_flight.is_none() {
            inner.status_before_fetch = inner.status;
        }
        inner.in_flight = Some(query_id);
        inner.status = FetchStatus::Loading;
        inner.error = None;
        drop(inner);
        self.bump();
    }

    /// Applies the outcome of a fetch if it is still the in-flight one.
    pub(crate) fn apply_fetch_result(
        &self,
        query_id: QueryId,
        page_size: u32,
        outcome: Result<PageResponse, EngineError>,
    ) -> FetchApplied {
        let mut inner = self.inner.write();
        if inner.in_flight != Some(query_id) {
            return FetchApplied::Stale;
        }
        inner.in_flight = None;
        match outcome {
            Ok(page) => {
                inner.items = page.items;
                inner.pagination = Pagination {
                    current_page: page.current_page.max(1),
                    total_pages: page.total_pages.max(1),
                    total_items: page.total,
                    page_size,
                };
                inner.status = FetchStatus::Loaded;
                inner.error = None;
                inner.has_loaded = true;
            }
            Err(err) => {
                inner.status = FetchStatus::Errored;
                inner.error = Some(ErrorInfo::from(&err));
                if !inner.has_loaded {
                    inner.items.clear();
                    inner.pagination = Pagination::empty(page_size);
                }
            }
        }
        drop(inner);
        self.bump();
        FetchApplied::Applied
    }

    /// Forgets the in-flight query and restores the previous status.
    pub(crate) fn invalidate(&self) -> Option<QueryId> {
        let mut inner = self.inner.write();
        let dropped = inner.in_flight.take();
        if dropped.is_some() {
            inner.status = inner.status_before_fetch;
        }
        drop(inner);
        if dropped.is_some() {
            self.bump();
        }
        dropped
    }

    /// Applies a structural patch and reports the required follow-up.
    pub fn apply_mutation(&self, patch: CachePatch) -> PatchEffect {
        let mut inner = self.inner.write();
        let effect = match patch {
            CachePatch::Insert(item) => {
                if let Some(existing) = inner.items.iter_mut().find(|r| r.id() == item.id()) {
                    *existing = item;
                } else {
                    inner.items.insert(0, item);
                    inner.pagination.total_items += 1;
                    inner.pagination.recompute_total_pages();
                }
                PatchEffect::None
            }
            CachePatch::Replace(id, item) => {
                if let Some(existing) = inner.items.iter_mut().find(|r| *r.id() == id) {
                    *existing = item;
                } else {
                    debug!(target_id = %id, "replace for a record not on the cached page");
                }
                PatchEffect::None
            }
            CachePatch::Remove(id) => {
                let before = inner.items.len();
                inner.items.retain(|r| *r.id() != id);
                if inner.items.len() < before {
                    inner.pagination.total_items = inner.pagination.total_items.saturating_sub(1);
                    inner.pagination.recompute_total_pages();
                }
                let current = inner.pagination.current_page;
                if inner.items.is_empty() && current > 1 {
                    let target = (current - 1).min(inner.pagination.total_pages).max(1);
                    PatchEffect::RefetchPage(target)
                } else {
                    PatchEffect::Resync
                }
            }
        };
        drop(inner);
        self.bump();
        effect
    }

    /// Sets the read flag of one record.
    ///
    /// Returns true only if the record was on the page and unread.
    pub fn mark_read(&self, id: &ResourceId) -> bool {
        let mut inner = self.inner.write();
        let flipped = match inner.items.iter_mut().find(|r| r.id() == id) {
            Some(item) if !item.is_read() => {
                item.set_read(true);
                true
            }
            _ => false,
        };
        drop(inner);
        if flipped {
            self.bump();
        }
        flipped
    }

    /// Sets the read flag of every record on the page.
    ///
    /// Returns the number of records that were unread.
    pub fn mark_all_read(&self) -> usize {
        let mut inner = self.inner.write();
        let mut flipped = 0;
        for item in inner.items.iter_mut().filter(|r| !r.is_read()) {
            item.set_read(true);
            flipped += 1;
        }
        drop(inner);
        if flipped > 0 {
            self.bump();
        }
        flipped
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn item(id: &str) -> Resource {
        Resource::new(id, Map::new())
    }

    fn loaded(cache: &ResourceCache, items: Vec<Resource>, page: u32, pages: u32, total: u64) {
        let id = QueryId::new();
        cache.begin_fetch(id);
        let applied =
            cache.apply_fetch_result(id, 20, Ok(PageResponse::new(items, page, pages, total)));
        assert_eq!(applied, FetchApplied::Applied);
    }

    #[test]
    fn loading_iff_in_flight() {
        let cache = ResourceCache::new(20);
        assert_eq!(cache.status(), FetchStatus::Idle);

        let id = QueryId::new();
        cache.begin_fetch(id);
        let state = cache.project();
        assert!(state.is_loading());
        assert_eq!(state.in_flight, Some(id));

        cache.apply_fetch_result(id, 20, Ok(PageResponse::new(vec![item("a")], 1, 1, 1)));
        let state = cache.project();
        assert_eq!(state.status, FetchStatus::Loaded);
        assert_eq!(state.in_flight, None);
    }

    #[test]
    fn stale_result_dropped() {
        let cache = ResourceCache::new(20);
        let old = QueryId::new();
        let new = QueryId::new();
        cache.begin_fetch(old);
        cache.begin_fetch(new);

        let applied =
            cache.apply_fetch_result(old, 20, Ok(PageResponse::new(vec![item("x")], 1, 1, 1)));
        assert_eq!(applied, FetchApplied::Stale);
        assert!(cache.project().items.is_empty());
        assert_eq!(cache.project().in_flight, Some(new));
    }

    #[test]
    fn first_load_failure_is_empty() {
        let cache = ResourceCache::new(20);
        let id = QueryId::new();
        cache.begin_fetch(id);
        cache.apply_fetch_result(id, 20, Err(EngineError::Network("offline".into())));

        let state = cache.project();
        assert_eq!(state.status, FetchStatus::Errored);
        assert!(state.items.is_empty());
        assert_eq!(state.error.unwrap().message, "offline");
    }

    #[test]
    fn later_failure_keeps_stale_items() {
        let cache = ResourceCache::new(20);
        loaded(&cache, vec![item("a"), item("b")], 1, 1, 2);

        let id = QueryId::new();
        cache.begin_fetch(id);
        cache.apply_fetch_result(id, 20, Err(EngineError::rejected(Some(500), "boom")));

        let state = cache.project();
        assert_eq!(state.status, FetchStatus::Errored);
        assert_eq!(state.items.len(), 2);
        assert!(state.error.is_some());
    }

    #[test]
    fn insert_goes_to_head() {
        let cache = ResourceCache::new(20);
        loaded(&cache, vec![item("a")], 1, 1, 20);

        assert_eq!(cache.apply_mutation(CachePatch::Insert(item("new"))), PatchEffect::None);
        let state = cache.project();
        assert_eq!(state.items[0].id().as_str(), "new");
        assert_eq!(state.pagination.total_items, 21);
        assert_eq!(state.pagination.total_pages, 2);
    }

    #[test]
    fn replace_in_place() {
        let cache = ResourceCache::new(20);
        loaded(&cache, vec![item("a"), item("b")], 1, 1, 2);

        let mut fields = Map::new();
        fields.insert("name".into(), json!("Renamed"));
        cache.apply_mutation(CachePatch::Replace("b".into(), Resource::new("b", fields)));
        assert_eq!(cache.get(&"b".into()).unwrap().text("name"), Some("Renamed"));
        assert_eq!(cache.project().items[1].id().as_str(), "b");
    }

    #[test]
    fn removing_last_item_requests_previous_page() {
        let cache = ResourceCache::new(20);
        loaded(&cache, vec![item("only")], 3, 3, 41);

        let effect = cache.apply_mutation(CachePatch::Remove("only".into()));
        assert_eq!(effect, PatchEffect::RefetchPage(2));
        assert_eq!(cache.pagination().total_items, 40);
        assert_eq!(cache.pagination().total_pages, 2);
    }

    #[test]
    fn removing_last_item_falls_back_to_first_page() {
        let cache = ResourceCache::new(20);
        // Server reported page 3 but the collection shrank elsewhere.
        loaded(&cache, vec![item("only")], 3, 3, 5);

        let effect = cache.apply_mutation(CachePatch::Remove("only".into()));
        assert_eq!(effect, PatchEffect::RefetchPage(1));
    }

    #[test]
    fn removing_from_non_empty_page_resyncs() {
        let cache = ResourceCache::new(20);
        loaded(&cache, vec![item("a"), item("b")], 1, 1, 2);

        assert_eq!(cache.apply_mutation(CachePatch::Remove("a".into())), PatchEffect::Resync);
        assert_eq!(cache.pagination().total_items, 1);

        // Empty first page is the true empty result.
        assert_eq!(cache.apply_mutation(CachePatch::Remove("b".into())), PatchEffect::Resync);
        assert_eq!(cache.pagination().total_items, 0);
    }

    #[test]
    fn mark_read_only_flips_unread() {
        let cache = ResourceCache::new(20);
        let mut read = item("r");
        read.set_read(true);
        loaded(&cache, vec![item("u"), read], 1, 1, 2);

        assert!(cache.mark_read(&"u".into()));
        assert!(!cache.mark_read(&"u".into()));
        assert!(!cache.mark_read(&"r".into()));
        assert!(!cache.mark_read(&"missing".into()));
        assert_eq!(cache.mark_all_read(), 0);
    }

    #[test]
    fn invalidate_restores_previous_status() {
        let cache = ResourceCache::new(20);
        loaded(&cache, vec![item("a")], 1, 1, 1);

        let id = QueryId::new();
        cache.begin_fetch(id);
        assert_eq!(cache.invalidate(), Some(id));
        assert_eq!(cache.status(), FetchStatus::Loaded);

        let applied = cache.apply_fetch_result(id, 20, Ok(PageResponse::new(vec![], 1, 1, 0)));
        assert_eq!(applied, FetchApplied::Stale);
        assert_eq!(cache.project().items.len(), 1);
    }

    #[test]
    fn changes_are_observable() {
        let cache = ResourceCache::new(20);
        let rx = cache.changes();
        let before = *rx.borrow();
        cache.apply_mutation(CachePatch::Insert(item("a")));
        assert!(*rx.borrow() > before);
    }

    #[test]
    fn count_is_page_local() {
        let cache = ResourceCache::new(20);
        let mut read = item("r");
        read.set_read(true);
        loaded(&cache, vec![item("u1"), item("u2"), read], 1, 5, 100);
        assert_eq!(cache.count_where(|r| !r.is_read()), 2);
    }
}
