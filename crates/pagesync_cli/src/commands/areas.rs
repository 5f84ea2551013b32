//! Areas command: loads active areas and filters them locally.

use super::{describe, CommandResult};
use pagesync_engine::{EngineConfig, ReferenceList, Transport};
use std::io::Write;
use std::sync::Arc;

/// Runs the areas command.
pub async fn run<T: Transport>(
    transport: Arc<T>,
    config: &EngineConfig,
    search: Option<&str>,
    out: &mut impl Write,
) -> CommandResult {
    let areas = ReferenceList::areas(transport, config);
    areas.load().await?;
    areas.set_filter_now(search.unwrap_or(""));

    let matches = areas.matches();
    writeln!(out, "{} matching areas", matches.len())?;
    for area in &matches {
        let city = area.text("city").unwrap_or("-");
        let state = area.text("state").unwrap_or("-");
        writeln!(out, "  {} ({city}, {state})", describe(area))?;
    }
    Ok(())
}
