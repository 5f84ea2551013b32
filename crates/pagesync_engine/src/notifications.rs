//! Unread notification counter and the notification facade.

use crate::collection::Collection;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::reconciler::{MutationIntent, MutationOutcome};
use crate::transport::Transport;
use pagesync_protocol::{CollectionSpec, ResourceId, UnreadCount};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Shared unread counter.
///
/// Updated optimistically by mark-read intents and overwritten by the
/// server value on refresh. It never goes below zero.
#[derive(Debug, Default)]
pub struct UnreadCounter {
    count: AtomicU64,
}

impl UnreadCounter {
    /// Creates a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value.
    pub fn get(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    /// Overwrites the value.
    pub fn set(&self, count: u64) {
        self.count.store(count, Ordering::SeqCst);
    }

    /// Decrements by one, saturating at zero. Returns the new value.
    pub fn decrement(&self) -> u64 {
        let previous = self
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        previous.saturating_sub(1)
    }
}

/// Fetches the server unread count and stores it in `counter`.
pub async fn refresh_unread<T: Transport>(
    transport: &T,
    spec: &CollectionSpec,
    counter: &UnreadCounter,
) -> EngineResult<u64> {
    let body = transport
        .send(spec.unread_count_request())
        .await
        .map_err(|e| e.into_engine_error("Failed to fetch unread count"))?;
    let UnreadCount { count } = UnreadCount::decode(&body).map_err(EngineError::from)?;
    counter.set(count);
    debug!(collection = spec.label(), count, "unread count refreshed");
    Ok(count)
}

/// Notification list plus unread counter.
pub struct NotificationCenter<T: Transport> {
    collection: Collection<T>,
    unread: Arc<UnreadCounter>,
}

impl<T: Transport> NotificationCenter<T> {
    /// Creates the notification collection with its counter.
    pub fn new(transport: Arc<T>, config: &EngineConfig) -> Self {
        let unread = Arc::new(UnreadCounter::new());
        let collection = Collection::with_unread_counter(
            CollectionSpec::notifications(),
            transport,
            config,
            config.notification_page_size,
            Arc::clone(&unread),
        );
        Self { collection, unread }
    }

    /// Underlying collection.
    pub fn collection(&self) -> &Collection<T> {
        &self.collection
    }

    /// Locally known unread count.
    pub fn unread_count(&self) -> u64 {
        self.unread.get()
    }

    /// Re-fetches the unread count from the server.
    pub async fn refresh_unread(&self) -> EngineResult<u64> {
        refresh_unread(
            self.collection.transport().as_ref(),
            self.collection.spec(),
            &self.unread,
        )
        .await
    }

    /// Marks one notification read.
    pub async fn mark_read(&self, id: impl Into<ResourceId>) -> EngineResult<MutationOutcome> {
        self.collection.dispatch(MutationIntent::mark_read(id)).await
    }

    /// Marks every notification read.
    pub async fn mark_all_read(&self) -> EngineResult<MutationOutcome> {
        self.collection.dispatch(MutationIntent::mark_all_read()).await
    }
}
