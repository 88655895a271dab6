use std::path::Path;

use crate::commands::common::{
    conflict_to_list_item, format_conflict_lines, open_engine, ConflictListItem,
};
use crate::error::CliError;

pub async fn run_conflicts(
    as_json: bool,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let session = open_engine(db_path, profile).await?;
    let conflicts = session.engine.pending_conflicts();

    if as_json {
        let json_items = conflicts
            .iter()
            .map(conflict_to_list_item)
            .collect::<Vec<ConflictListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No pending conflicts.");
        return Ok(());
    }

    for line in format_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}
