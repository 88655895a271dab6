//! Ferry CLI - queue changes locally and sync them from the command line

mod cli;
mod commands;
mod config_profiles;
mod credentials;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::conflicts::run_conflicts;
use crate::commands::mutate::{run_create, run_delete, run_update};
use crate::commands::queue::run_queue;
use crate::commands::resolve::run_resolve;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "ferry=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let profile = cli.profile.as_deref();

    match cli.command {
        Commands::Create {
            collection,
            json,
            id,
        } => run_create(&collection, id.as_deref(), &json, &db_path, profile).await?,
        Commands::Update {
            collection,
            id,
            json,
            base_revision,
        } => run_update(&collection, &id, &json, base_revision, &db_path, profile).await?,
        Commands::Delete {
            collection,
            id,
            base_revision,
        } => run_delete(&collection, &id, base_revision, &db_path, profile).await?,
        Commands::Sync => run_sync(&db_path, profile).await?,
        Commands::Status { json } => run_status(json, &db_path, profile).await?,
        Commands::Queue { json } => run_queue(json, &db_path, profile).await?,
        Commands::Conflicts { json } => run_conflicts(json, &db_path, profile).await?,
        Commands::Resolve {
            collection,
            id,
            choice,
            value,
        } => run_resolve(&collection, &id, choice, value.as_deref(), &db_path, profile).await?,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
        Commands::Config { command } => run_config(command, profile)?,
    }

    Ok(())
}
