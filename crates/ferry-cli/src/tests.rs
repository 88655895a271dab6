use clap::Parser;
use ferry_core::db::LibSqlStore;
use ferry_core::{
    Conflict, ConflictChoice, ConflictMode, OperationId, OperationKind, Payload, PendingConflict,
    ResolutionStrategy, SyncOperation,
};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::cli::{ChoiceArg, Cli, Commands, CompletionShell, ConflictModeArg, StrategyArg};
use crate::commands::common::{
    conflict_to_list_item, format_conflict_lines, format_operation_lines, format_relative_time,
    format_timestamp, open_engine, operation_to_list_item, parse_json_value, preview,
};
use crate::commands::completions::run_completions;
use crate::commands::config::{apply_profile_init, normalize_endpoint, ProfileInit};
use crate::commands::mutate::{run_create, run_delete, run_update};
use crate::commands::resolve::conflict_choice;
use crate::config_profiles::CliProfile;
use crate::error::CliError;

const TEST_PROFILE: &str = "ferry-cli-test-profile";

fn operation(payload: Option<&str>) -> SyncOperation {
    SyncOperation::new(
        OperationKind::Update,
        "todos",
        "t1",
        payload.map(|raw| Payload::from_json(raw).unwrap()),
        "device-a",
        1_000,
    )
}

#[test]
fn cli_parses_create_with_item_id() {
    let cli = Cli::parse_from(["ferry", "create", "todos", r#"{"a":1}"#, "--id", "t1"]);
    match cli.command {
        Commands::Create {
            collection,
            json,
            id,
        } => {
            assert_eq!(collection, "todos");
            assert_eq!(json, r#"{"a":1}"#);
            assert_eq!(id.as_deref(), Some("t1"));
        }
        _ => panic!("expected create"),
    }
}

#[test]
fn cli_parses_global_flags_after_subcommand() {
    let cli = Cli::parse_from(["ferry", "status", "--json", "--profile", "work"]);
    assert_eq!(cli.profile.as_deref(), Some("work"));
    assert!(matches!(cli.command, Commands::Status { json: true }));
}

#[test]
fn parse_json_value_rejects_garbage() {
    assert_eq!(parse_json_value(r#" {"a": 1} "#).unwrap(), json!({"a": 1}));
    assert!(matches!(parse_json_value("   "), Err(CliError::InvalidJson(_))));
    assert!(matches!(parse_json_value("{a:1}"), Err(CliError::InvalidJson(_))));
}

#[test]
fn conflict_choice_requires_value_for_custom() {
    assert_eq!(
        conflict_choice(ChoiceArg::Local, None).unwrap(),
        ConflictChoice::Local
    );
    assert!(matches!(
        conflict_choice(ChoiceArg::Custom, None),
        Err(CliError::MissingCustomValue)
    ));
    assert_eq!(
        conflict_choice(ChoiceArg::Custom, Some(r#"{"a": 4}"#)).unwrap(),
        ConflictChoice::Custom(json!({"a": 4}))
    );
}

#[test]
fn normalize_endpoint_requires_http_scheme() {
    assert_eq!(
        normalize_endpoint(" https://api.example.com/v1/sync/ ".to_string()).unwrap(),
        "https://api.example.com/v1/sync"
    );
    assert!(normalize_endpoint("api.example.com/v1/sync".to_string()).is_err());
    assert!(normalize_endpoint("  ".to_string()).is_err());
}

#[test]
fn apply_profile_init_merges_engine_settings() {
    let mut profile = CliProfile::default();
    apply_profile_init(
        &mut profile,
        &ProfileInit {
            endpoint: Some("http://localhost:8080/sync/".to_string()),
            batch_size: Some(10),
            strategy: Some(StrategyArg::Lww),
            conflict_mode: Some(ConflictModeArg::Manual),
            ..ProfileInit::default()
        },
    )
    .unwrap();

    assert_eq!(
        profile.endpoint.as_deref(),
        Some("http://localhost:8080/sync")
    );
    assert_eq!(profile.engine.batch_size, 10);
    assert_eq!(profile.engine.strategy, ResolutionStrategy::LastWriteWins);
    assert_eq!(profile.engine.conflict_mode, ConflictMode::Manual);
    assert_eq!(profile.engine.max_retries, 3);
}

#[test]
fn apply_profile_init_rejects_invalid_values() {
    let mut profile = CliProfile::default();
    let result = apply_profile_init(
        &mut profile,
        &ProfileInit {
            batch_size: Some(0),
            ..ProfileInit::default()
        },
    );
    assert!(matches!(result, Err(CliError::Config(_))));
    assert_eq!(profile.engine.batch_size, 50);

    let result = apply_profile_init(
        &mut profile,
        &ProfileInit {
            timeout_secs: Some(0),
            ..ProfileInit::default()
        },
    );
    assert!(result.is_err());
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
}

#[test]
fn preview_truncates_with_ellipsis() {
    assert_eq!(
        preview("This is a very long sentence that should be shortened", 20),
        "This is a very lo..."
    );
    assert_eq!(preview("  short \n text ", 20), "short text");
}

#[test]
fn format_timestamp_returns_utc_label() {
    assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn format_operation_lines_include_key_fields() {
    let mut pending = operation(Some(r#"{"title":"milk"}"#));
    pending.retry_count = 2;

    let rendered = format_operation_lines(&[pending], 1_000 + 5 * 60_000);
    assert_eq!(rendered.len(), 1);
    assert!(rendered[0].contains("update"));
    assert!(rendered[0].contains("todos/t1"));
    assert!(rendered[0].contains("5m ago"));
    assert!(rendered[0].contains("retries=2"));
    assert!(rendered[0].contains(r#"{"title":"milk"}"#));
}

#[test]
fn operation_list_item_decodes_payload() {
    let item = operation_to_list_item(&operation(Some(r#"{"a":1}"#)));
    assert_eq!(item.kind, "update");
    assert_eq!(item.payload, Some(json!({"a": 1})));

    let deleted = operation_to_list_item(&operation(None));
    assert_eq!(deleted.payload, None);
}

#[test]
fn conflict_lines_show_suggestion() {
    let pending = PendingConflict {
        collection: "todos".to_string(),
        item_id: "t1".to_string(),
        conflict: Conflict::new(None, json!({"a": 2}), json!({"a": 3})),
        operation_id: OperationId::new(),
        detected_at: 0,
        suggestion: Some(json!({"a": 2})),
    };

    let rendered = format_conflict_lines(std::slice::from_ref(&pending));
    assert!(rendered[0].starts_with("1970-01-01 00:00:00 UTC"));
    assert!(rendered[0].contains("todos/t1"));
    assert!(rendered[0].contains(r#"suggested={"a":2}"#));

    let item = conflict_to_list_item(&pending);
    assert_eq!(item.remote, json!({"a": 3}));
    assert_eq!(item.detected_at_iso, "1970-01-01 00:00:00 UTC");
}

#[test]
fn completions_write_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ferry.bash");
    run_completions(CompletionShell::Bash, Some(&path)).unwrap();
    let script = std::fs::read_to_string(&path).unwrap();
    assert!(script.contains("ferry"));
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "multi_thread")]
async fn mutations_are_queued_in_local_database() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("ferry.db");

    run_create("todos", Some("t1"), r#"{"title":"milk"}"#, &db_path, Some(TEST_PROFILE))
        .await
        .unwrap();
    run_update(
        "todos",
        "t1",
        r#"{"title":"oat milk"}"#,
        Some("r1".to_string()),
        &db_path,
        Some(TEST_PROFILE),
    )
    .await
    .unwrap();
    run_delete("todos", "t2", None, &db_path, Some(TEST_PROFILE))
        .await
        .unwrap();

    let session = open_engine(&db_path, Some(TEST_PROFILE)).await.unwrap();
    assert_eq!(session.profile_name, TEST_PROFILE);
    let kinds: Vec<OperationKind> = session
        .engine
        .pending_operations()
        .iter()
        .map(|op| op.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            OperationKind::Create,
            OperationKind::Update,
            OperationKind::Delete
        ]
    );
    assert_eq!(
        session.engine.local_copy("todos", "t1").await.unwrap(),
        Some(json!({"title": "oat milk"}))
    );
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "multi_thread")]
async fn invalid_json_does_not_touch_database() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("ferry.db");

    let result = run_create("todos", None, "not json", &db_path, Some(TEST_PROFILE)).await;
    assert!(matches!(result, Err(CliError::InvalidJson(_))));
    assert!(!db_path.exists());

    let store = LibSqlStore::open(&db_path).await.unwrap();
    assert!(store.keys("sync-queue").await.unwrap().is_empty());
}
