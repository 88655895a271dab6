use std::path::Path;

use ferry_core::ConflictChoice;

use crate::cli::ChoiceArg;
use crate::commands::common::{open_engine, parse_json_value};
use crate::error::CliError;

pub fn conflict_choice(choice: ChoiceArg, value: Option<&str>) -> Result<ConflictChoice, CliError> {
    match choice {
        ChoiceArg::Local => Ok(ConflictChoice::Local),
        ChoiceArg::Remote => Ok(ConflictChoice::Remote),
        ChoiceArg::Custom => {
            let raw = value.ok_or(CliError::MissingCustomValue)?;
            Ok(ConflictChoice::Custom(parse_json_value(raw)?))
        }
    }
}

pub async fn run_resolve(
    collection: &str,
    item_id: &str,
    choice: ChoiceArg,
    value: Option<&str>,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let choice = conflict_choice(choice, value)?;
    let session = open_engine(db_path, profile).await?;
    let operation_id = session
        .engine
        .resolve_conflict(collection, item_id, choice)
        .await?;

    println!("{operation_id}");
    Ok(())
}
