use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use ferry_core::{ConflictMode, ResolutionStrategy};

#[derive(Parser)]
#[command(name = "ferry")]
#[command(about = "Queue changes offline and ship them when the network allows")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name for endpoint and engine settings
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Queue creation of an item
    #[command(alias = "new")]
    Create {
        /// Collection name
        collection: String,
        /// Item value as JSON
        json: String,
        /// Item id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
    },
    /// Queue a new value for an item
    Update {
        /// Collection name
        collection: String,
        /// Item id
        id: String,
        /// Item value as JSON
        json: String,
        /// Revision the change was made against
        #[arg(long, value_name = "REV")]
        base_revision: Option<String>,
    },
    /// Queue removal of an item
    Delete {
        /// Collection name
        collection: String,
        /// Item id
        id: String,
        /// Revision the change was made against
        #[arg(long, value_name = "REV")]
        base_revision: Option<String>,
    },
    /// Push pending changes to the configured endpoint
    Sync,
    /// Show engine state, queue size and conflict count
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List pending operations
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List conflicts waiting for a decision
    Conflicts {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Settle a pending conflict
    Resolve {
        /// Collection name
        collection: String,
        /// Item id
        id: String,
        /// Which value to keep
        #[arg(value_enum)]
        choice: ChoiceArg,
        /// Replacement value as JSON (required for `custom`)
        #[arg(long, value_name = "JSON")]
        value: Option<String>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ChoiceArg {
    Local,
    Remote,
    Custom,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum StrategyArg {
    Lww,
    Merge,
}

impl From<StrategyArg> for ResolutionStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Lww => Self::LastWriteWins,
            StrategyArg::Merge => Self::ThreeWayMerge,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ConflictModeArg {
    Auto,
    Manual,
}

impl From<ConflictModeArg> for ConflictMode {
    fn from(value: ConflictModeArg) -> Self {
        match value {
            ConflictModeArg::Auto => Self::Auto,
            ConflictModeArg::Manual => Self::Manual,
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Sync endpoint (e.g. <https://api.example.com/v1/sync>)
        #[arg(long, value_name = "URL")]
        endpoint: Option<String>,
        /// Bearer token, stored in the system keychain
        #[arg(long, value_name = "TOKEN")]
        auth_token: Option<String>,
        /// Request timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,
        /// Operations per request
        #[arg(long, value_name = "N")]
        batch_size: Option<usize>,
        /// Retry ceiling before an operation is dropped
        #[arg(long, value_name = "N")]
        max_retries: Option<u32>,
        /// Conflict resolution strategy
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,
        /// Whether resolved conflicts still wait for confirmation
        #[arg(long, value_enum)]
        conflict_mode: Option<ConflictModeArg>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved profile
    Show {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
    /// Remove the stored auth token for a profile
    ClearToken {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
}
