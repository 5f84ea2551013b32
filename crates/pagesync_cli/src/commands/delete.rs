//! Delete command implementation.

use super::{CommandResult, Target};
use pagesync_engine::{EngineConfig, MutationOutcome, Transport};
use std::io::{BufRead, Write};
use std::sync::Arc;

/// Runs the delete command.
///
/// Without `yes` the user is asked to confirm on `input`.
pub async fn run<T: Transport>(
    transport: Arc<T>,
    config: &EngineConfig,
    target: Target,
    id: &str,
    yes: bool,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> CommandResult {
    let collection = target.collection(transport, config);
    let noun = collection.spec().noun();
    collection.request_delete(id)?;

    if !yes {
        write!(out, "Delete {noun} {id}? [y/N] ")?;
        out.flush()?;
        let mut answer = String::new();
        input.read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            collection.cancel_delete()?;
            writeln!(out, "Cancelled.")?;
            return Ok(());
        }
    }

    match collection.confirm_delete().await? {
        MutationOutcome::Deleted { id, .. } => writeln!(out, "Deleted {noun} {id}.")?,
        other => writeln!(out, "Unexpected outcome: {other:?}")?,
    }
    Ok(())
}
