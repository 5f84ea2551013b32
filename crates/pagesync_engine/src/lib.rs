//! # pagesync Engine
//!
//! Paginated resource synchronization for the CRM admin console.
//!
//! This crate provides:
//! - Debounced search input (`Debouncer`)
//! - Canonical query descriptors and the page-reset law (`compose`)
//! - A fetch orchestrator that drops stale responses (last issued wins)
//! - A per-collection resource cache with mutation patches
//! - A mutation reconciler with per-target exclusion and a delete
//!   confirmation flow
//! - Unread notification counting
//! - Reference lists filtered locally, and non-paginated lookups
//!   (dashboard, salesmen by city) with their own loading state
//! - A transport abstraction with an HTTP adapter
//!
//! ## Architecture
//!
//! ```text
//! intent -> Debouncer -> compose -> FetchOrchestrator -> Transport
//!                                         |
//!                                    ResourceCache -> snapshot
//! mutation -> MutationReconciler -> Transport -> CachePatch (+ resync)
//! ```
//!
//! ## Key Invariants
//!
//! - A collection is `Loading` iff a query is in flight
//! - Only the response to the most recently issued query reaches the cache
//! - Any query change other than the page resets to page 1
//! - At most one pending mutation per target
//! - An empty page other than page 1 is never shown
//! - Locks are never held across an `.await`

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod cache;
mod collection;
mod config;
mod debounce;
mod error;
mod http;
mod lookup;
mod notifications;
mod orchestrator;
mod query;
mod reconciler;
mod reference;
mod stats;
mod transport;

pub use cache::{
    CachePatch, FetchApplied, FetchState, FetchStatus, Pagination, PatchEffect, ResourceCache,
};
pub use collection::Collection;
pub use config::{EngineConfig, UnreadReconcile};
pub use debounce::{DebounceState, Debouncer};
pub use error::{EngineError, EngineResult, ErrorInfo};
pub use http::{HttpClient, HttpResponse, HttpTransport};
pub use lookup::{Dashboard, Lookup, LookupState, SalesmanAreaPicker, SalesmenByCity};
pub use notifications::{refresh_unread, NotificationCenter, UnreadCounter};
pub use orchestrator::{FetchOrchestrator, FetchStats, PendingFetch, QueryId};
pub use query::{compose, QueryChange, QueryDescriptor};
pub use reconciler::{
    DeleteFlow, DeletePhase, MutationIntent, MutationKind, MutationOutcome, MutationReconciler,
};
pub use reference::ReferenceList;
pub use stats::{filter_reference, LeadSummary};
pub use transport::{MockTransport, Transport, TransportError, TransportResult};

/// Engine version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
