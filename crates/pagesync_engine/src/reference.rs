//! Reference lists (areas, salesmen) with a local, debounced filter.
//!
//! A reference list is loaded once with a large page size. Typing into its
//! picker never reaches the server: the committed term narrows the cached
//! items through [`filter_reference`].

use crate::cache::FetchApplied;
use crate::collection::Collection;
use crate::config::EngineConfig;
use crate::debounce::Debouncer;
use crate::error::EngineResult;
use crate::stats::filter_reference;
use crate::transport::Transport;
use pagesync_protocol::Resource;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// A reference collection plus its local filter.
pub struct ReferenceList<T: Transport> {
    collection: Collection<T>,
    filter: Debouncer<String>,
    committed: watch::Sender<String>,
}

impl<T: Transport> ReferenceList<T> {
    /// Active areas. The filter uses the shorter picker debounce.
    pub fn areas(transport: Arc<T>, config: &EngineConfig) -> Self {
        Self::new(Collection::areas(transport, config), config)
    }

    /// Salesmen.
    pub fn salesmen(transport: Arc<T>, config: &EngineConfig) -> Self {
        Self::new(Collection::salesmen(transport, config), config)
    }

    fn new(collection: Collection<T>, config: &EngineConfig) -> Self {
        let (committed, _) = watch::channel(String::new());
        Self {
            collection,
            filter: Debouncer::new(config.filter_search_debounce, String::new()),
            committed,
        }
    }

    /// Underlying collection.
    pub fn collection(&self) -> &Collection<T> {
        &self.collection
    }

    /// Fetches the list.
    pub async fn load(&self) -> EngineResult<FetchApplied> {
        self.collection.load().await
    }

    /// Records raw filter input; it commits after the debounce delay.
    pub fn set_filter_input(&self, raw: impl Into<String>) {
        self.filter.submit(raw.into());
    }

    /// Commits `term` immediately.
    pub fn set_filter_now(&self, term: impl Into<String>) {
        if let Some(term) = self.filter.commit_now(term.into()) {
            self.publish(term);
        }
    }

    /// Whether filter input is waiting for its deadline.
    pub fn is_filtering(&self) -> bool {
        self.filter.is_pending()
    }

    /// Last committed filter term.
    pub fn filter_term(&self) -> String {
        self.filter.committed()
    }

    /// Receiver that changes whenever a filter term commits.
    pub fn filter_changes(&self) -> watch::Receiver<String> {
        self.committed.subscribe()
    }

    /// Cached records matching the committed term (active only).
    pub fn matches(&self) -> Vec<Resource> {
        let term = self.filter.committed();
        self.collection
            .cache()
            .with_items(|items| filter_reference(items, &term).into_iter().cloned().collect())
    }

    /// Commits debounced filter terms until teardown.
    pub async fn drive_filter(&self) {
        while let Some(term) = self.filter.next().await {
            self.publish(term);
        }
        debug!(collection = self.collection.spec().label(), "filter driver stopped");
    }

    fn publish(&self, term: String) {
        debug!(collection = self.collection.spec().label(), term = %term, "reference filter committed");
        self.committed.send_replace(term);
    }

    /// Stops the filter and the collection.
    pub fn teardown(&self) {
        self.filter.close();
        self.collection.teardown();
    }
}
