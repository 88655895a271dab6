use std::path::Path;

use serde::Serialize;

use crate::commands::common::open_engine;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub profile: String,
    pub device_id: String,
    pub state: String,
    pub pending_operations: usize,
    pub pending_conflicts: usize,
    pub sync_configured: bool,
}

pub async fn run_status(
    as_json: bool,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let session = open_engine(db_path, profile).await?;
    let engine = &session.engine;
    let report = StatusReport {
        profile: session.profile_name.clone(),
        device_id: engine.device_id().to_string(),
        state: engine.state().to_string(),
        pending_operations: engine.queue_size(),
        pending_conflicts: engine.pending_conflicts().len(),
        sync_configured: session.sync_configured,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Profile:   {}", report.profile);
    println!("Device:    {}", report.device_id);
    println!("State:     {}", report.state);
    println!("Pending:   {} changes", report.pending_operations);
    println!("Conflicts: {}", report.pending_conflicts);
    if !report.sync_configured {
        println!("Sync endpoint not configured; changes stay local.");
    }
    Ok(())
}
