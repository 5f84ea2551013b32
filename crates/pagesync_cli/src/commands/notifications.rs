//! Notification commands.

use super::CommandResult;
use pagesync_engine::{EngineConfig, MutationOutcome, NotificationCenter, Transport};
use std::io::Write;
use std::sync::Arc;

/// Prints the unread notification count.
pub async fn unread<T: Transport>(
    transport: Arc<T>,
    config: &EngineConfig,
    out: &mut impl Write,
) -> CommandResult {
    let center = NotificationCenter::new(transport, config);
    let count = center.refresh_unread().await?;
    writeln!(out, "{count} unread")?;
    Ok(())
}

/// Marks one notification read.
pub async fn mark_read<T: Transport>(
    transport: Arc<T>,
    config: &EngineConfig,
    id: &str,
    out: &mut impl Write,
) -> CommandResult {
    let center = NotificationCenter::new(transport, config);
    center.refresh_unread().await?;
    center.mark_read(id).await?;
    writeln!(out, "Marked {id} as read; {} unread", center.unread_count())?;
    Ok(())
}

/// Marks every notification read.
pub async fn mark_all_read<T: Transport>(
    transport: Arc<T>,
    config: &EngineConfig,
    out: &mut impl Write,
) -> CommandResult {
    let center = NotificationCenter::new(transport, config);
    center.collection().load().await?;
    if let MutationOutcome::MarkedAllRead { count } = center.mark_all_read().await? {
        writeln!(out, "Marked {count} listed notifications as read; {} unread", center.unread_count())?;
    }
    Ok(())
}
