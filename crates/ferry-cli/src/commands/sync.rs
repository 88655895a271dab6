use std::path::Path;

use ferry_core::{EngineState, SyncEvent};

use crate::commands::common::open_engine;
use crate::error::CliError;

pub async fn run_sync(db_path: &Path, profile: Option<&str>) -> Result<(), CliError> {
    let session = open_engine(db_path, profile).await?;
    if !session.sync_configured {
        return Err(CliError::SyncNotConfigured);
    }

    let engine = session.engine;
    let mut events = engine.subscribe();
    let summary = engine.sync().await;

    while let Ok(event) = events.try_recv() {
        match event {
            SyncEvent::SyncFailed { reason } => return Err(CliError::SyncFailed(reason)),
            SyncEvent::OperationFailed {
                collection,
                item_id,
                reason,
                ..
            } => eprintln!("Dropped change to {collection}/{item_id}: {reason}"),
            SyncEvent::ConflictDetected {
                collection,
                item_id,
                ..
            } => eprintln!("Conflict on {collection}/{item_id} needs a decision"),
            _ => {}
        }
    }

    match summary {
        Some(summary) => {
            println!(
                "Sync completed: {} synced, {} conflicts, {} dropped, {} requeued, {} waiting",
                summary.synced,
                summary.conflicts,
                summary.failed,
                summary.requeued,
                summary.retried + summary.deferred
            );
        }
        None if engine.queue_size() == 0 => println!("Nothing to sync"),
        None => println!("Sync skipped (state: {})", engine.state()),
    }

    if engine.state() == EngineState::Conflict {
        println!(
            "{} conflicts pending. Run `ferry conflicts` to review.",
            engine.pending_conflicts().len()
        );
    }
    Ok(())
}
