use std::path::Path;

use crate::commands::common::{open_engine, parse_json_value};
use crate::error::CliError;

pub async fn run_create(
    collection: &str,
    item_id: Option<&str>,
    raw_json: &str,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let payload = parse_json_value(raw_json)?;
    let session = open_engine(db_path, profile).await?;
    let operation_id = session
        .engine
        .create(collection, item_id, &payload)
        .await?;

    let item_id = session
        .engine
        .pending_operation(operation_id)
        .map_or_else(String::new, |operation| operation.item_id);
    println!("{operation_id} {item_id}");
    Ok(())
}

pub async fn run_update(
    collection: &str,
    item_id: &str,
    raw_json: &str,
    base_revision: Option<String>,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let payload = parse_json_value(raw_json)?;
    let session = open_engine(db_path, profile).await?;
    let operation_id = session
        .engine
        .update(collection, item_id, &payload, base_revision)
        .await?;

    println!("{operation_id}");
    Ok(())
}

pub async fn run_delete(
    collection: &str,
    item_id: &str,
    base_revision: Option<String>,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let session = open_engine(db_path, profile).await?;
    let operation_id = session
        .engine
        .delete(collection, item_id, base_revision)
        .await?;

    println!("{operation_id}");
    Ok(())
}
