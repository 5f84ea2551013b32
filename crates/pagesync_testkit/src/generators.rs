//! Property-based test generators using proptest.

use pagesync_engine::{QueryChange, QueryDescriptor};
use pagesync_protocol::{FilterKey, Resource, ResourceId};
use proptest::prelude::*;
use serde_json::json;

/// Strategy for record ids.
pub fn resource_id_strategy() -> impl Strategy<Value = ResourceId> {
    "[a-f0-9]{24}".prop_map(ResourceId::new)
}

/// Strategy for records with a name and a read flag.
pub fn resource_strategy() -> impl Strategy<Value = Resource> {
    (resource_id_strategy(), "[A-Za-z ]{1,16}", any::<bool>()).prop_map(|(id, name, read)| {
        let mut resource = Resource::new(id, serde_json::Map::new());
        resource.set("name", json!(name));
        resource.set_read(read);
        resource
    })
}

/// Strategy for filter keys.
pub fn filter_key_strategy() -> impl Strategy<Value = FilterKey> {
    prop::sample::select(FilterKey::ALL.to_vec())
}

/// Strategy for filter values, sentinels included.
pub fn filter_value_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("all".to_string()),
        Just(String::new()),
        "[a-z0-9]{1,8}",
    ]
}

/// Strategy for search terms, including the empty term.
pub fn search_term_strategy() -> impl Strategy<Value = String> {
    "[a-z ]{0,10}"
}

/// Strategy for query changes mixing page, search and filter updates.
pub fn query_change_strategy() -> impl Strategy<Value = QueryChange> {
    (
        prop::option::of(1u32..100),
        prop::option::of(search_term_strategy()),
        prop::collection::vec((filter_key_strategy(), filter_value_strategy()), 0..4),
    )
        .prop_map(|(page, search, filters)| {
            let mut change = QueryChange::default();
            if let Some(page) = page {
                change = change.and_page(page);
            }
            if let Some(search) = search {
                change = change.and_search(search);
            }
            for (key, value) in filters {
                change = change.and_filter(key, value);
            }
            change
        })
}

/// Strategy for descriptors reachable from the first page.
pub fn query_descriptor_strategy() -> impl Strategy<Value = QueryDescriptor> {
    (1u32..=100, prop::collection::vec(query_change_strategy(), 0..4)).prop_map(
        |(page_size, changes)| {
            changes
                .iter()
                .fold(QueryDescriptor::new(page_size), |query, change| {
                    pagesync_engine::compose(&query, change)
                })
        },
    )
}
