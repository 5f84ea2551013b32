//! Integration tests for collection synchronization flows.

use pagesync_engine::{
    Collection, Dashboard, EngineConfig, EngineError, FetchApplied, FetchState, FetchStatus,
    MutationIntent, MutationOutcome, NotificationCenter, PatchEffect,
};
use pagesync_protocol::{FilterKey, Period};
use pagesync_testkit::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn clients(transport: &Arc<ScriptedTransport>) -> Arc<Collection<ScriptedTransport>> {
    Arc::new(Collection::clients(Arc::clone(transport), &EngineConfig::default()))
}

/// Waits until no fetch is in flight.
async fn settle(collection: &Collection<ScriptedTransport>) -> FetchState {
    let mut changes = collection.cache().changes();
    loop {
        let state = collection.snapshot();
        if !state.is_loading() {
            return state;
        }
        changes.changed().await.unwrap();
    }
}

#[tokio::test]
async fn stale_page_response_is_dropped() {
    let transport = Arc::new(ScriptedTransport::new());
    let slow = transport.push_gate();
    let fast = transport.push_gate();
    let collection = clients(&transport);

    let first = {
        let collection = Arc::clone(&collection);
        tokio::spawn(async move { collection.load().await })
    };
    transport.wait_for_calls(1).await;
    let second = {
        let collection = Arc::clone(&collection);
        tokio::spawn(async move { collection.set_page(2).await })
    };
    transport.wait_for_calls(2).await;

    // Page 2 resolves first, then page 1.
    fast.respond_json(clients_page(2, 20, 45));
    assert_eq!(second.await.unwrap().unwrap(), Some(FetchApplied::Applied));
    slow.respond_json(clients_page(1, 20, 45));
    assert_eq!(first.await.unwrap().unwrap(), FetchApplied::Stale);

    let state = collection.snapshot();
    assert_eq!(state.status, FetchStatus::Loaded);
    assert_eq!(state.pagination.current_page, 2);
    assert_eq!(state.items[0].id().as_str(), "client-21");
    assert_eq!(collection.orchestrator().stats().stale_dropped, 1);
}

#[tokio::test(start_paused = true)]
async fn typing_a_search_fetches_once_after_the_pause() {
    let transport = Arc::new(ScriptedTransport::new());
    let collection = clients(&transport);

    transport.push_json(clients_page(1, 20, 45));
    collection.load().await.unwrap();
    assert_eq!(transport.calls()[0].to_string(), "GET clients?page=1&limit=20");
    assert_eq!(collection.snapshot().pagination.total_pages, 3);

    transport.push_json(clients_page(3, 20, 45));
    collection.set_page(3).await.unwrap();

    transport.push_json(page_body(
        &[client("c7", "Acme Corp"), client("c9", "Acme Labs")],
        1,
        1,
        2,
    ));
    let driver = {
        let collection = Arc::clone(&collection);
        tokio::spawn(async move { collection.drive_search().await })
    };

    collection.set_search_input("a");
    tokio::time::sleep(Duration::from_millis(100)).await;
    collection.set_search_input("ac");
    tokio::time::sleep(Duration::from_millis(100)).await;
    collection.set_search_input("acme");
    assert!(collection.is_searching());

    tokio::time::sleep(Duration::from_millis(499)).await;
    assert_eq!(transport.call_count(), 2);

    transport.wait_for_calls(3).await;
    let state = settle(&collection).await;
    assert_eq!(
        transport.calls()[2].to_string(),
        "GET clients?page=1&limit=20&search=acme"
    );
    assert_eq!(state.items.len(), 2);
    assert_eq!(state.pagination.current_page, 1);
    assert_eq!(state.pagination.total_pages, 1);
    assert!(!collection.is_searching());

    collection.teardown();
    driver.await.unwrap();
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn newer_search_is_issued_while_older_one_is_in_flight() {
    let transport = Arc::new(ScriptedTransport::new());
    let collection = clients(&transport);
    let short_term = transport.push_gate();
    let full_term = transport.push_gate();

    let driver = {
        let collection = Arc::clone(&collection);
        tokio::spawn(async move { collection.drive_search().await })
    };

    collection.set_search_input("a");
    transport.wait_for_calls(1).await;
    assert_eq!(transport.calls()[0].param("search"), Some("a"));

    // The "a" response is still held back.
    collection.set_search_input("acme");
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(transport.call_count(), 2);
    assert_eq!(
        transport.last_call().unwrap().to_string(),
        "GET clients?page=1&limit=20&search=acme"
    );

    short_term.respond_json(clients_page(1, 20, 45));
    while collection.orchestrator().stats().stale_dropped == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    let state = collection.snapshot();
    assert!(state.is_loading());
    assert!(state.items.is_empty());

    full_term.respond_json(page_body(&[client("c7", "Acme Corp")], 1, 1, 1));
    let state = settle(&collection).await;
    assert_eq!(state.status, FetchStatus::Loaded);
    assert_eq!(state.items.len(), 1);
    assert_eq!(state.items[0].id().as_str(), "c7");
    assert_eq!(collection.current_query().search_term(), "acme");

    collection.teardown();
    driver.await.unwrap();
}

#[tokio::test]
async fn deleting_the_last_item_on_a_page_loads_the_previous_page() {
    let transport = Arc::new(ScriptedTransport::new());
    let collection = clients(&transport);

    transport.push_json(clients_page(3, 20, 41));
    collection.set_page(3).await.unwrap();
    assert_eq!(collection.snapshot().items.len(), 1);

    transport.push_json(json!({"message": "Client deleted"}));
    transport.push_json(clients_page(2, 20, 40));
    collection.request_delete("client-41").unwrap();
    let outcome = collection.confirm_delete().await.unwrap();

    assert_eq!(
        outcome,
        MutationOutcome::Deleted {
            id: "client-41".into(),
            effect: PatchEffect::RefetchPage(2)
        }
    );
    assert_eq!(transport.last_call().unwrap().param("page"), Some("2"));
    let state = collection.snapshot();
    assert_eq!(state.pagination.current_page, 2);
    assert_eq!(state.items.len(), 20);
}

#[tokio::test]
async fn deleting_the_last_item_falls_back_to_page_one() {
    let transport = Arc::new(ScriptedTransport::new());
    let collection = clients(&transport);

    transport.push_json(page_body(&[client("x", "Last")], 3, 3, 21));
    collection.set_page(3).await.unwrap();

    transport.push_json(json!({"message": "Client deleted"}));
    transport.push_json(clients_page(1, 20, 20));
    let outcome = collection.dispatch(MutationIntent::delete("x")).await.unwrap();

    assert!(matches!(
        outcome,
        MutationOutcome::Deleted {
            effect: PatchEffect::RefetchPage(1),
            ..
        }
    ));
    assert_eq!(collection.snapshot().pagination.current_page, 1);
}

#[tokio::test]
async fn second_delete_on_pending_target_is_busy() {
    let transport = Arc::new(ScriptedTransport::new());
    let collection = clients(&transport);
    transport.push_json(clients_page(1, 20, 3));
    collection.load().await.unwrap();

    let gate = transport.push_gate();
    let first = {
        let collection = Arc::clone(&collection);
        tokio::spawn(async move { collection.dispatch(MutationIntent::delete("client-1")).await })
    };
    transport.wait_for_calls(2).await;

    let err = collection
        .dispatch(MutationIntent::delete("client-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Busy { .. }));
    assert_eq!(transport.call_count(), 2);

    assert!(collection.reconciler().is_pending(&"client-1".into()));

    transport.push_json(clients_page(1, 20, 2));
    gate.respond_json(json!({"message": "Client deleted"}));
    first.await.unwrap().unwrap();
    assert!(!collection.reconciler().is_pending(&"client-1".into()));
    assert_eq!(collection.snapshot().items.len(), 2);
}

#[tokio::test]
async fn mark_read_never_drives_the_counter_negative() {
    let transport = Arc::new(ScriptedTransport::new());
    let center = NotificationCenter::new(Arc::clone(&transport), &EngineConfig::default());

    transport.push_json(page_body(
        &[notification("n1", false), notification("n2", true)],
        1,
        1,
        2,
    ));
    center.collection().load().await.unwrap();
    transport.push_json(json!({"count": 1}));
    assert_eq!(center.refresh_unread().await.unwrap(), 1);

    // Already read: no local decrement, server count confirms.
    transport.push_json(json!({"message": "ok"}));
    transport.push_json(json!({"count": 1}));
    center.mark_read("n2").await.unwrap();
    assert_eq!(center.unread_count(), 1);

    transport.push_json(json!({"message": "ok"}));
    transport.push_json(json!({"count": 0}));
    center.mark_read("n1").await.unwrap();
    assert_eq!(center.unread_count(), 0);

    transport.push_json(json!({"message": "ok"}));
    transport.push_json(json!({"count": 0}));
    let outcome = center.mark_read("n1").await.unwrap();
    assert!(matches!(outcome, MutationOutcome::MarkedRead { was_unread: false, .. }));
    assert_eq!(center.unread_count(), 0);
}

#[tokio::test]
async fn mark_all_read_failure_reconciles_from_server() {
    let transport = Arc::new(ScriptedTransport::new());
    let center = NotificationCenter::new(Arc::clone(&transport), &EngineConfig::default());

    transport.push_json(page_body(
        &[notification("n1", false), notification("n2", false)],
        1,
        1,
        2,
    ));
    center.collection().load().await.unwrap();

    transport.push_rejection(500, None);
    transport.push_json(json!({"count": 2}));
    let err = center.mark_all_read().await.unwrap_err();
    assert_eq!(err.user_message(), "Failed to mark all as read");

    // Flags stay flipped; the counter is the server's.
    assert!(center.collection().snapshot().items.iter().all(|n| n.is_read()));
    assert_eq!(center.unread_count(), 2);
    assert_eq!(transport.last_call().unwrap().path, "notifications/unread-count");
}

#[tokio::test(start_paused = true)]
async fn teardown_drops_late_response_and_pending_search() {
    let transport = Arc::new(ScriptedTransport::new());
    let collection = clients(&transport);
    let gate = transport.push_gate();

    let load = {
        let collection = Arc::clone(&collection);
        tokio::spawn(async move { collection.load().await })
    };
    transport.wait_for_calls(1).await;
    let driver = {
        let collection = Arc::clone(&collection);
        tokio::spawn(async move { collection.drive_search().await })
    };
    collection.set_search_input("pending");

    collection.teardown();
    gate.respond_json(clients_page(1, 20, 45));
    assert_eq!(load.await.unwrap().unwrap(), FetchApplied::Stale);
    driver.await.unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;
    let state = collection.snapshot();
    assert_eq!(state.status, FetchStatus::Idle);
    assert!(state.items.is_empty());
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn failures_keep_stale_data_after_first_load() {
    let transport = Arc::new(ScriptedTransport::new());
    let collection = clients(&transport);

    transport.push_rejection(500, None);
    assert!(collection.load().await.is_err());
    let state = collection.snapshot();
    assert_eq!(state.status, FetchStatus::Errored);
    assert!(state.items.is_empty());
    let error = state.error.unwrap();
    assert_eq!(error.message, "Failed to fetch clients");
    assert!(error.retryable);

    transport.push_json(clients_page(1, 20, 45));
    collection.retry().await.unwrap();
    assert_eq!(collection.snapshot().items.len(), 20);

    transport.push_rejection(503, Some("Server exploded"));
    assert!(collection.set_page(2).await.is_err());
    let state = collection.snapshot();
    assert_eq!(state.status, FetchStatus::Errored);
    assert_eq!(state.items.len(), 20);
    assert_eq!(state.items[0].id().as_str(), "client-1");
    assert_eq!(state.error.unwrap().message, "Server exploded");
}

#[tokio::test]
async fn filters_map_to_collection_parameters() {
    let transport = Arc::new(ScriptedTransport::new());
    let inquiries = Collection::inquiries(Arc::clone(&transport), &EngineConfig::default());

    transport.push_json(json!({"feedbacks": [], "currentPage": 1, "totalPages": 1, "total": 0}));
    transport.push_json(json!({"feedbacks": [], "currentPage": 1, "totalPages": 1, "total": 0}));
    inquiries.set_filter(FilterKey::Owner, "u1").await.unwrap();
    inquiries.set_filter(FilterKey::Status, "open").await.unwrap();

    let calls = transport.calls();
    assert_eq!(calls[0].param("salesmanId"), Some("u1"));
    assert!(calls
        .iter()
        .all(|call| call.param("status").is_none() && call.params.iter().all(|(_, v)| v != "all")));
}

#[tokio::test]
async fn dashboard_keeps_the_latest_period() {
    let transport = Arc::new(ScriptedTransport::new());
    let monthly = transport.push_gate();
    let weekly = transport.push_gate();
    let dashboard = Arc::new(Dashboard::new(Arc::clone(&transport)));

    let first = {
        let dashboard = Arc::clone(&dashboard);
        tokio::spawn(async move { dashboard.load().await })
    };
    transport.wait_for_calls(1).await;
    let second = {
        let dashboard = Arc::clone(&dashboard);
        tokio::spawn(async move { dashboard.set_period(Period::Week).await })
    };
    transport.wait_for_calls(2).await;

    weekly.respond_json(json!({"stats": {"totalInquiries": 7}}));
    assert_eq!(second.await.unwrap().unwrap(), Some(FetchApplied::Applied));
    monthly.respond_json(json!({"stats": {"totalInquiries": 31}}));
    assert_eq!(first.await.unwrap().unwrap(), FetchApplied::Stale);

    let state = dashboard.snapshot();
    assert_eq!(state.status, FetchStatus::Loaded);
    assert_eq!(state.value.unwrap().stats.total_inquiries, 7);
    assert_eq!(dashboard.period(), Period::Week);
}
