//! CLI command implementations.

pub mod areas;
pub mod dashboard;
pub mod delete;
pub mod export;
pub mod list;
pub mod notifications;

use clap::ValueEnum;
use pagesync_engine::{Collection, EngineConfig, QueryChange, QueryDescriptor, Transport};
use pagesync_protocol::{CollectionSpec, FilterKey, Resource};
use std::sync::Arc;

/// Result type of every command.
pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Collections reachable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Target {
    /// Clients
    Clients,
    /// Inquiries (feedback)
    Inquiries,
    /// Notifications
    Notifications,
    /// Areas (active only)
    Areas,
    /// Salesmen
    Users,
}

impl Target {
    /// Builds the collection for this target.
    pub fn collection<T: Transport>(self, transport: Arc<T>, config: &EngineConfig) -> Collection<T> {
        match self {
            Target::Clients => Collection::clients(transport, config),
            Target::Inquiries => Collection::inquiries(transport, config),
            Target::Notifications => Collection::with_query(
                CollectionSpec::notifications(),
                transport,
                config,
                QueryDescriptor::new(config.notification_page_size),
                config.search_debounce,
            ),
            Target::Areas => Collection::areas(transport, config),
            Target::Users => Collection::salesmen(transport, config),
        }
    }
}

/// Parses a `key=value` filter argument.
pub fn parse_filter(arg: &str) -> Result<(FilterKey, String), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{arg}`"))?;
    let key = FilterKey::from_name(key.trim()).ok_or_else(|| {
        let names: Vec<_> = FilterKey::ALL.iter().map(FilterKey::name).collect();
        format!("unknown filter `{key}` (expected one of: {})", names.join(", "))
    })?;
    Ok((key, value.trim().to_string()))
}

/// Change carrying a search term and filters.
pub fn criteria(search: Option<&str>, filters: &[(FilterKey, String)]) -> QueryChange {
    let mut change = QueryChange::default();
    if let Some(term) = search {
        change = change.and_search(term);
    }
    for (key, value) in filters {
        change = change.and_filter(*key, value.clone());
    }
    change
}

/// One-line description of a record.
pub fn describe(item: &Resource) -> String {
    let title = ["name", "clientName", "message", "title"]
        .iter()
        .find_map(|field| item.text(field))
        .unwrap_or("-");
    let mut line = format!("{:<26} {}", item.id().as_str(), title);
    if let Some(lead) = item.lead() {
        line.push_str(&format!(" [{}]", lead.label()));
    }
    if item.get("isRead").is_some() && !item.is_read() {
        line.push_str(" (unread)");
    }
    if !item.is_active() {
        line.push_str(" (inactive)");
    }
    line
}
