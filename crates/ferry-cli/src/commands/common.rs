use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use ferry_core::db::LibSqlStore;
use ferry_core::transport::{
    HttpTransport, SyncBatch, SyncTransport, TransportError, TransportResult,
};
use ferry_core::{NetworkGate, PendingConflict, SyncEngine, SyncOperation, SyncOutcome};
use serde::Serialize;
use serde_json::Value;

use crate::config_profiles::CliProfilesConfig;
use crate::credentials::load_auth_token;
use crate::error::CliError;

const PREVIEW_CHARS: usize = 48;

/// Engine opened for one CLI invocation
pub struct EngineSession {
    pub engine: SyncEngine,
    pub profile_name: String,
    /// Whether a sync endpoint is configured for the profile
    pub sync_configured: bool,
}

/// Stand-in transport for profiles without an endpoint.
///
/// The engine is kept offline in that case, so this is never called.
struct UnconfiguredTransport;

#[async_trait]
impl SyncTransport for UnconfiguredTransport {
    async fn push(&self, _batch: &SyncBatch) -> TransportResult<Vec<SyncOutcome>> {
        Err(TransportError::InvalidConfiguration(
            "no sync endpoint configured".to_string(),
        ))
    }
}

pub async fn open_engine(
    db_path: &Path,
    profile_override: Option<&str>,
) -> Result<EngineSession, CliError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_override);
    let profile = config.profile(&profile_name).cloned().unwrap_or_default();

    let transport_config = if profile.resolved_endpoint().is_some() {
        profile.transport_config(load_auth_token(&profile_name)?)
    } else {
        None
    };
    let sync_configured = transport_config.is_some();
    let transport: Arc<dyn SyncTransport> = match transport_config {
        Some(transport_config) => Arc::new(HttpTransport::new(transport_config)?),
        None => Arc::new(UnconfiguredTransport),
    };

    let store = Arc::new(LibSqlStore::open(db_path).await?);
    let engine = SyncEngine::builder(store, transport)
        .config(profile.engine)
        .network(NetworkGate::new(sync_configured))
        .build()
        .await?;

    Ok(EngineSession {
        engine,
        profile_name,
        sync_configured,
    })
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("FERRY_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| panic!("Failed to resolve CLI data directory"))
        .join("ferry")
        .join("ferry.db")
}

pub fn parse_json_value(raw: &str) -> Result<Value, CliError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CliError::InvalidJson("value must not be empty".to_string()));
    }
    serde_json::from_str(trimmed).map_err(|error| CliError::InvalidJson(error.to_string()))
}

#[derive(Debug, Serialize)]
pub struct OperationListItem {
    pub id: String,
    pub kind: String,
    pub collection: String,
    pub item_id: String,
    pub payload: Option<Value>,
    pub created_at: i64,
    pub retry_count: u32,
    pub base_revision: Option<String>,
    pub not_before: Option<i64>,
}

pub fn operation_to_list_item(operation: &SyncOperation) -> OperationListItem {
    OperationListItem {
        id: operation.id.to_string(),
        kind: operation.kind.to_string(),
        collection: operation.collection.clone(),
        item_id: operation.item_id.clone(),
        payload: operation
            .payload
            .as_ref()
            .and_then(|payload| payload.to_value().ok()),
        created_at: operation.created_at,
        retry_count: operation.retry_count,
        base_revision: operation.base_revision.clone(),
        not_before: operation.not_before,
    }
}

pub fn format_operation_lines(operations: &[SyncOperation], now_ms: i64) -> Vec<String> {
    operations
        .iter()
        .map(|operation| {
            let payload = operation
                .payload
                .as_ref()
                .map_or_else(String::new, |payload| preview(payload.as_str(), PREVIEW_CHARS));
            let retries = if operation.retry_count == 0 {
                String::new()
            } else {
                format!("  retries={}", operation.retry_count)
            };
            format!(
                "{}  {:<6}  {}/{}  {}{}  {}",
                short_id(&operation.id.to_string()),
                operation.kind,
                operation.collection,
                operation.item_id,
                format_relative_time(operation.created_at, now_ms),
                retries,
                payload
            )
            .trim_end()
            .to_string()
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct ConflictListItem {
    pub collection: String,
    pub item_id: String,
    pub operation_id: String,
    pub detected_at: i64,
    pub detected_at_iso: String,
    pub base: Option<Value>,
    pub local: Value,
    pub remote: Value,
    pub remote_revision: Option<String>,
    pub suggestion: Option<Value>,
}

pub fn conflict_to_list_item(pending: &PendingConflict) -> ConflictListItem {
    ConflictListItem {
        collection: pending.collection.clone(),
        item_id: pending.item_id.clone(),
        operation_id: pending.operation_id.to_string(),
        detected_at: pending.detected_at,
        detected_at_iso: format_timestamp(pending.detected_at),
        base: pending.conflict.base.clone(),
        local: pending.conflict.local.clone(),
        remote: pending.conflict.remote.clone(),
        remote_revision: pending.conflict.remote_revision.clone(),
        suggestion: pending.suggestion.clone(),
    }
}

pub fn format_conflict_lines(conflicts: &[PendingConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|pending| {
            let suggestion = pending
                .suggestion
                .as_ref()
                .map_or_else(String::new, |value| {
                    format!("  suggested={}", preview(&value.to_string(), PREVIEW_CHARS))
                });
            format!(
                "{}  {}/{}  local={} remote={}{}",
                format_timestamp(pending.detected_at),
                pending.collection,
                pending.item_id,
                preview(&pending.conflict.local.to_string(), PREVIEW_CHARS),
                preview(&pending.conflict.remote.to_string(), PREVIEW_CHARS),
                suggestion
            )
        })
        .collect()
}

pub fn preview(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else {
        format!("{}d ago", diff / day)
    }
}
