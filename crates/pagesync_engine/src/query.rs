//! Query descriptors and the query composer.

use pagesync_protocol::{is_unfiltered, ApiRequest, CollectionSpec, FilterKey};
use std::collections::BTreeMap;
use tracing::debug;

/// Canonical description of the page/filter/search state being requested.
///
/// Descriptors are immutable values. Two descriptors are equivalent iff all
/// fields are equal; equivalence drives request deduplication. Filters are
/// normalized: a key set to `"all"` or to the empty string is absent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryDescriptor {
    page: u32,
    page_size: u32,
    search_term: String,
    filters: BTreeMap<FilterKey, String>,
    sort: Option<String>,
}

impl QueryDescriptor {
    /// First page, no search, no filters.
    ///
    /// A zero page size is bumped to 1.
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            search_term: String::new(),
            filters: BTreeMap::new(),
            sort: None,
        }
    }

    /// Requested page (1-based).
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Items per page.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Committed search term.
    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    /// Active filters.
    pub fn filters(&self) -> &BTreeMap<FilterKey, String> {
        &self.filters
    }

    /// Value of one filter, if set.
    pub fn filter(&self, key: FilterKey) -> Option<&str> {
        self.filters.get(&key).map(String::as_str)
    }

    /// Opaque sort token.
    pub fn sort(&self) -> Option<&str> {
        self.sort.as_deref()
    }

    /// Whether any search term or filter narrows the result.
    pub fn has_active_filters(&self) -> bool {
        !self.search_term.is_empty() || !self.filters.is_empty()
    }

    /// Same descriptor on another page. Equivalent to composing a pure
    /// page change.
    pub fn with_page(&self, page: u32) -> Self {
        compose(self, &QueryChange::page(page))
    }

    /// List request for a collection.
    ///
    /// Filters the collection does not support are left out.
    pub fn list_request(&self, spec: &CollectionSpec) -> ApiRequest {
        for key in self.filters.keys().filter(|key| !spec.supports(**key)) {
            debug!(collection = spec.label(), filter = %key, "filter not supported; dropped");
        }
        let request = spec.list_request(self.page, self.page_size, &self.search_term, &self.filters);
        match &self.sort {
            Some(sort) => request.with_param("sort", sort.clone()),
            None => request,
        }
    }

    /// Export request for a collection (same filters, no paging).
    pub fn export_request(&self, spec: &CollectionSpec) -> ApiRequest {
        spec.export_request(&self.search_term, &self.filters)
    }
}

/// A partial change to a [`QueryDescriptor`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryChange {
    page: Option<u32>,
    page_size: Option<u32>,
    search_term: Option<String>,
    filters: Vec<(FilterKey, String)>,
    sort: Option<Option<String>>,
    clear: bool,
}

impl QueryChange {
    /// Pure pagination change.
    pub fn page(page: u32) -> Self {
        Self {
            page: Some(page),
            ..Self::default()
        }
    }

    /// Search term change.
    pub fn search(term: impl Into<String>) -> Self {
        Self::default().and_search(term)
    }

    /// Single filter change. `"all"` or `""` clears the filter.
    pub fn filter(key: FilterKey, value: impl Into<String>) -> Self {
        Self::default().and_filter(key, value)
    }

    /// Page size change.
    pub fn page_size(size: u32) -> Self {
        Self {
            page_size: Some(size),
            ..Self::default()
        }
    }

    /// Sort change. `None` removes the sort.
    pub fn sort(sort: Option<String>) -> Self {
        Self {
            sort: Some(sort),
            ..Self::default()
        }
    }

    /// Clears the search term and every filter.
    pub fn clear_filters() -> Self {
        Self {
            clear: true,
            ..Self::default()
        }
    }

    /// Adds a search term change.
    pub fn and_search(mut self, term: impl Into<String>) -> Self {
        self.search_term = Some(term.into());
        self
    }

    /// Adds a filter change.
    pub fn and_filter(mut self, key: FilterKey, value: impl Into<String>) -> Self {
        self.filters.push((key, value.into()));
        self
    }

    /// Adds a page change. Ignored if the change also touches criteria.
    pub fn and_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Whether the change touches anything besides the page.
    pub fn touches_criteria(&self) -> bool {
        self.clear
            || self.search_term.is_some()
            || !self.filters.is_empty()
            || self.page_size.is_some()
            || self.sort.is_some()
    }

    /// Whether the change is empty.
    pub fn is_empty(&self) -> bool {
        self.page.is_none() && !self.touches_criteria()
    }
}

/// Merges a change into a descriptor.
///
/// Any change that touches the search term, a filter, the page size or the
/// sort resets the page to 1, whatever page the change carries. A pure page
/// change leaves every other field untouched. A change with no effective
/// difference yields a descriptor equal to `current`.
pub fn compose(current: &QueryDescriptor, change: &QueryChange) -> QueryDescriptor {
    let mut next = current.clone();

    if change.clear {
        next.search_term.clear();
        next.filters.clear();
    }
    if let Some(term) = &change.search_term {
        next.search_term = term.clone();
    }
    for (key, value) in &change.filters {
        if is_unfiltered(value) {
            next.filters.remove(key);
        } else {
            next.filters.insert(*key, value.clone());
        }
    }
    if let Some(size) = change.page_size.filter(|size| *size > 0) {
        next.page_size = size;
    }
    if let Some(sort) = &change.sort {
        next.sort = sort.clone();
    }

    if change.touches_criteria() {
        next.page = 1;
    } else if let Some(page) = change.page {
        next.page = page.max(1);
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn on_page(page: u32) -> QueryDescriptor {
        QueryDescriptor::new(20).with_page(page)
    }

    #[test]
    fn search_resets_page() {
        let q = on_page(7);
        assert_eq!(q.page(), 7);
        let next = compose(&q, &QueryChange::search("a"));
        assert_eq!(next.page(), 1);
        assert_eq!(next.search_term(), "a");
    }

    #[test]
    fn search_wins_over_explicit_page() {
        let next = compose(&on_page(3), &QueryChange::search("a").and_page(5));
        assert_eq!(next.page(), 1);
    }

    #[test]
    fn page_change_keeps_criteria() {
        let q = compose(
            &QueryDescriptor::new(20),
            &QueryChange::search("acme").and_filter(FilterKey::Area, "a1"),
        );
        let next = compose(&q, &QueryChange::page(2));
        assert_eq!(next.page(), 2);
        assert_eq!(next.search_term(), "acme");
        assert_eq!(next.filter(FilterKey::Area), Some("a1"));
    }

    #[test]
    fn no_effective_difference_is_equal() {
        let q = compose(&QueryDescriptor::new(20), &QueryChange::search("acme"));
        assert_eq!(compose(&q, &QueryChange::search("acme")), q);
        assert_eq!(compose(&q, &QueryChange::default()), q);
        assert_eq!(compose(&q, &QueryChange::page(1)), q);
    }

    #[test]
    fn all_sentinel_removes_filter() {
        let q = compose(&QueryDescriptor::new(20), &QueryChange::filter(FilterKey::Owner, "u1"));
        assert!(q.has_active_filters());
        let cleared = compose(&q, &QueryChange::filter(FilterKey::Owner, "all"));
        assert_eq!(cleared, QueryDescriptor::new(20));
        assert!(!cleared.has_active_filters());
    }

    #[test]
    fn clear_filters_resets_everything_but_size() {
        let q = compose(
            &QueryDescriptor::new(50),
            &QueryChange::search("x")
                .and_filter(FilterKey::Area, "a1")
                .and_filter(FilterKey::DateRange, "week"),
        )
        .with_page(4);
        let cleared = compose(&q, &QueryChange::clear_filters());
        assert_eq!(cleared, QueryDescriptor::new(50));
    }

    #[test]
    fn page_size_change_resets_page_and_rejects_zero() {
        let q = on_page(3);
        let bigger = compose(&q, &QueryChange::page_size(50));
        assert_eq!((bigger.page(), bigger.page_size()), (1, 50));
        let zero = compose(&q, &QueryChange::page_size(0));
        assert_eq!(zero.page_size(), 20);
    }

    #[test]
    fn page_zero_clamped() {
        assert_eq!(on_page(0).page(), 1);
    }

    #[test]
    fn list_request_params() {
        let q = compose(&QueryDescriptor::new(20), &QueryChange::search("acme"));
        let req = q.list_request(&CollectionSpec::clients());
        assert_eq!(req.to_string(), "GET clients?page=1&limit=20&search=acme");

        let sorted = compose(&q, &QueryChange::sort(Some("-createdAt".into())));
        assert_eq!(sorted.list_request(&CollectionSpec::clients()).param("sort"), Some("-createdAt"));
    }

    proptest! {
        #[test]
        fn criteria_changes_always_reset_page(start in 1u32..100, term in "[a-z]{0,6}") {
            let next = compose(&on_page(start), &QueryChange::search(term));
            prop_assert_eq!(next.page(), 1);
        }
    }
}
