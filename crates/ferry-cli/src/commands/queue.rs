use std::path::Path;

use chrono::Utc;

use crate::commands::common::{
    format_operation_lines, open_engine, operation_to_list_item, OperationListItem,
};
use crate::error::CliError;

pub async fn run_queue(
    as_json: bool,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let session = open_engine(db_path, profile).await?;
    let operations = session.engine.pending_operations();

    if as_json {
        let json_items = operations
            .iter()
            .map(operation_to_list_item)
            .collect::<Vec<OperationListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if operations.is_empty() {
        println!("No pending changes.");
        return Ok(());
    }

    for line in format_operation_lines(&operations, Utc::now().timestamp_millis()) {
        println!("{line}");
    }
    Ok(())
}
