//! Export command implementation.

use super::{criteria, CommandResult, Target};
use pagesync_engine::{EngineConfig, Transport};
use pagesync_protocol::FilterKey;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Runs the export command, writing the CSV to `path`.
pub async fn run<T: Transport>(
    transport: Arc<T>,
    config: &EngineConfig,
    target: Target,
    search: Option<&str>,
    filters: &[(FilterKey, String)],
    path: &Path,
    out: &mut impl Write,
) -> CommandResult {
    let collection = target.collection(transport, config);
    // Criteria only; nothing is listed.
    let bytes = collection.export_matching(&criteria(search, filters)).await?;
    std::fs::write(path, &bytes)?;
    writeln!(out, "Exported {} bytes to {}", bytes.len(), path.display())?;
    Ok(())
}
