//! Configuration for the engine.

use crate::error::{EngineError, EngineResult};
use serde::Deserialize;
use std::time::Duration;

/// When the unread counter is re-fetched after a mark-read intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnreadReconcile {
    /// Re-fetch only when the server rejected the mark-read.
    OnFailure,
    /// Re-fetch after every mark-read, success or failure.
    Always,
}

/// Configuration for a set of collections talking to one API.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// API base URL.
    pub base_url: String,
    /// Request timeout handed to the HTTP client.
    pub timeout: Duration,
    /// Page size for regular list views.
    pub page_size: u32,
    /// Page size for the notification list.
    pub notification_page_size: u32,
    /// Page size for reference data (areas, users).
    pub reference_page_size: u32,
    /// Debounce delay for free-text search.
    pub search_debounce: Duration,
    /// Debounce delay for secondary filter search (area picker).
    pub filter_search_debounce: Duration,
    /// Unread counter reconciliation policy.
    pub unread_reconcile: UnreadReconcile,
}

impl EngineConfig {
    /// Creates a configuration for the given API base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            page_size: 20,
            notification_page_size: 50,
            reference_page_size: 1000,
            search_debounce: Duration::from_millis(500),
            filter_search_debounce: Duration::from_millis(300),
            unread_reconcile: UnreadReconcile::Always,
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the list page size.
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    /// Sets the notification page size.
    pub fn with_notification_page_size(mut self, size: u32) -> Self {
        self.notification_page_size = size;
        self
    }

    /// Sets the search debounce delay.
    pub fn with_search_debounce(mut self, delay: Duration) -> Self {
        self.search_debounce = delay;
        self
    }

    /// Sets the filter search debounce delay.
    pub fn with_filter_search_debounce(mut self, delay: Duration) -> Self {
        self.filter_search_debounce = delay;
        self
    }

    /// Sets the unread reconciliation policy.
    pub fn with_unread_reconcile(mut self, policy: UnreadReconcile) -> Self {
        self.unread_reconcile = policy;
        self
    }

    /// Loads a configuration from JSON.
    ///
    /// Durations are given in milliseconds (`timeout_ms`,
    /// `search_debounce_ms`, ...). Missing keys keep their defaults.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let file: ConfigFile =
            serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))?;
        file.into_config()
    }

    /// Checks that sizes are usable.
    pub fn validate(&self) -> EngineResult<()> {
        if self.page_size == 0 || self.notification_page_size == 0 || self.reference_page_size == 0 {
            return Err(EngineError::Config("page sizes must be positive".into()));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("http://localhost:5000/api")
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    base_url: Option<String>,
    timeout_ms: Option<u64>,
    page_size: Option<u32>,
    notification_page_size: Option<u32>,
    reference_page_size: Option<u32>,
    search_debounce_ms: Option<u64>,
    filter_search_debounce_ms: Option<u64>,
    unread_reconcile: Option<UnreadReconcile>,
}

impl ConfigFile {
    fn into_config(self) -> EngineResult<EngineConfig> {
        let mut config = match self.base_url {
            Some(url) => EngineConfig::new(url),
            None => EngineConfig::default(),
        };
        if let Some(ms) = self.timeout_ms {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(size) = self.page_size {
            config.page_size = size;
        }
        if let Some(size) = self.notification_page_size {
            config.notification_page_size = size;
        }
        if let Some(size) = self.reference_page_size {
            config.reference_page_size = size;
        }
        if let Some(ms) = self.search_debounce_ms {
            config.search_debounce = Duration::from_millis(ms);
        }
        if let Some(ms) = self.filter_search_debounce_ms {
            config.filter_search_debounce = Duration::from_millis(ms);
        }
        if let Some(policy) = self.unread_reconcile {
            config.unread_reconcile = policy;
        }
        config.validate()?;
        Ok(config)
    }
}
