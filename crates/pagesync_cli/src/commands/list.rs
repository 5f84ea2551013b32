//! List command implementation.

use super::{criteria, describe, CommandResult, Target};
use pagesync_engine::{compose, EngineConfig, FetchState, Transport};
use pagesync_protocol::{FilterKey, Resource};
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;

/// Listing result.
#[derive(Debug, Serialize)]
pub struct ListOutput<'a> {
    /// Collection label.
    pub collection: &'static str,
    /// Page shown.
    pub page: u32,
    /// Total number of pages.
    pub total_pages: u32,
    /// Total number of records.
    pub total: u64,
    /// Records on the page.
    pub items: &'a [Resource],
}

/// Options of the list command.
#[derive(Debug, Clone)]
pub struct ListOptions {
    /// Page to show.
    pub page: u32,
    /// Search term.
    pub search: Option<String>,
    /// Filters.
    pub filters: Vec<(FilterKey, String)>,
    /// Output format (text, json).
    pub format: String,
}

/// Runs the list command.
pub async fn run<T: Transport>(
    transport: Arc<T>,
    config: &EngineConfig,
    target: Target,
    options: &ListOptions,
    out: &mut impl Write,
) -> CommandResult {
    let collection = target.collection(transport, config);
    let change = criteria(options.search.as_deref(), &options.filters);
    let query = compose(&collection.current_query(), &change).with_page(options.page);
    collection.orchestrator().run(query).await?;

    let state = collection.snapshot();
    match options.format.as_str() {
        "json" => print_json(collection.spec().label(), &state, out)?,
        _ => {
            print_text(collection.spec().label(), &state, out)?;
            if target == Target::Inquiries {
                let leads = collection.lead_summary();
                writeln!(
                    out,
                    "Leads on this page: {} red, {} green, {} orange, {} with audio",
                    leads.red, leads.green, leads.orange, leads.with_audio
                )?;
            }
        }
    }
    Ok(())
}

fn print_text(label: &str, state: &FetchState, out: &mut impl Write) -> std::io::Result<()> {
    let p = state.pagination;
    writeln!(
        out,
        "{label}: page {} of {} ({} total)",
        p.current_page, p.total_pages, p.total_items
    )?;
    if state.items.is_empty() {
        writeln!(out, "  (no records)")?;
    }
    for item in &state.items {
        writeln!(out, "  {}", describe(item))?;
    }
    Ok(())
}

fn print_json(
    label: &'static str,
    state: &FetchState,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = ListOutput {
        collection: label,
        page: state.pagination.current_page,
        total_pages: state.pagination.total_pages,
        total: state.pagination.total_items,
        items: &state.items,
    };
    writeln!(out, "{}", serde_json::to_string_pretty(&output)?)?;
    Ok(())
}
