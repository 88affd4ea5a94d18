mod common;

use std::time::Duration;

use common::{FakeGenie, FakeSql, FakeWorkspace, Fakes, TOKEN, job, settings, table};
use dbx_core::{
    ContentBlock,
    Dispatcher,
    PollPolicy,
    Redactor,
    StatementOutcome,
    ToolContext,
    ToolResult,
    build_registry,
};
use dbx_mcp::tools::{ConnectionSummary, ToolSettings, discovered_group, static_groups};
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;

fn dispatcher(fakes: &Fakes, settings: &ToolSettings) -> Dispatcher {
    Dispatcher::new(build_registry(static_groups(&fakes.deps(), settings)))
        .with_redactor(settings.redactor.clone())
}

fn args(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

async fn call(dispatcher: &Dispatcher, name: &str, arguments: Value) -> ToolResult {
    let ctx = ToolContext::new(CancellationToken::new());
    dispatcher.call_tool(name, args(arguments), &ctx).await
}

fn texts(result: &ToolResult) -> Vec<String> {
    result
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text(text) => Some(text.clone()),
            ContentBlock::Resource { .. } => None,
        })
        .collect()
}

fn fast_polling() -> ToolSettings {
    ToolSettings {
        poll_policy: PollPolicy::fixed(Duration::from_millis(10), 5),
        ..settings()
    }
}

#[tokio::test]
async fn run_sql_query_renders_rows_as_markdown() {
    let outcome = StatementOutcome::Rows {
        columns: vec!["region".to_string(), "total".to_string()],
        rows: vec![vec![json!("emea"), json!(12)], vec![json!("apac"), Value::Null]],
    };
    let fakes = Fakes::new(
        FakeWorkspace::default(),
        FakeSql::returning(outcome),
        FakeGenie::scripted(&[]),
    );
    let dispatcher = dispatcher(&fakes, &settings());

    let result = call(&dispatcher, "run_sql_query", json!({"query": "SELECT 1"})).await;

    assert!(!result.is_error);
    assert_eq!(
        result.first_text(),
        Some("| region | total |\n| --- | --- |\n| emea | 12 |\n| apac | NULL |")
    );
    assert_eq!(fakes.sql.statements()[0].text, "SELECT 1");
}

#[tokio::test]
async fn run_sql_query_without_result_set_reports_success() {
    let fakes = Fakes::default();
    let dispatcher = dispatcher(&fakes, &settings());

    let result = call(&dispatcher, "run_sql_query", json!({"query": "DELETE FROM t"})).await;

    assert!(!result.is_error);
    assert_eq!(
        result.first_text(),
        Some("Query executed successfully. No results returned.")
    );
}

#[tokio::test]
async fn list_jobs_passes_the_limit_through() {
    let workspace = FakeWorkspace {
        jobs: vec![job(1, "nightly"), job(2, "hourly"), job(3, "weekly")],
        ..FakeWorkspace::default()
    };
    let fakes = Fakes::new(
        workspace,
        FakeSql::returning(StatementOutcome::NoResultSet),
        FakeGenie::scripted(&[]),
    );
    let dispatcher = dispatcher(&fakes, &settings());

    let result = call(&dispatcher, "list_jobs", json!({"limit": "2"})).await;

    assert!(!result.is_error, "{result:?}");
    let text = result.first_text().unwrap_or_default();
    assert!(text.contains("| 1 | nightly | ann@example.com |"));
    assert!(text.contains("| 2 | hourly |"));
    assert!(!text.contains("weekly"));
}

#[tokio::test]
async fn get_job_for_unknown_id_is_a_permanent_remote_error() {
    let fakes = Fakes::default();
    let dispatcher = dispatcher(&fakes, &settings());

    let result = call(&dispatcher, "get_job", json!({"job_id": 99})).await;

    assert!(result.is_error);
    assert_eq!(
        result.first_text(),
        Some("RemoteServiceError: (permanent, status 404) Job 99 does not exist.")
    );
}

#[tokio::test]
async fn list_tables_uses_configured_defaults() {
    let workspace = FakeWorkspace {
        tables: vec![table("main.sales.orders", false)],
        ..FakeWorkspace::default()
    };
    let fakes = Fakes::new(
        workspace,
        FakeSql::returning(StatementOutcome::NoResultSet),
        FakeGenie::scripted(&[]),
    );
    let dispatcher = dispatcher(&fakes, &settings());

    let result = call(&dispatcher, "list_tables", json!({})).await;

    assert!(!result.is_error);
    assert!(
        result
            .first_text()
            .is_some_and(|text| text.contains("| main.sales.orders | MANAGED | NULL |"))
    );
}

#[tokio::test]
async fn list_tables_without_scope_is_rejected_before_any_remote_call() {
    let fakes = Fakes::default();
    let dispatcher = dispatcher(&fakes, &ToolSettings::default());

    let result = call(&dispatcher, "list_tables", json!({})).await;

    assert!(result.is_error);
    let text = result.first_text().unwrap_or_default();
    assert!(text.starts_with("ValidationError: /catalog: no catalog given"), "{text}");
    assert!(text.contains("/schema"));
    assert_eq!(fakes.workspace.calls(), 0);
}

#[tokio::test]
async fn test_connection_reports_partial_success_without_leaking_the_token() {
    let fakes = Fakes::new(
        FakeWorkspace::default(),
        FakeSql::failing(&format!("invalid access token {TOKEN}")),
        FakeGenie::scripted(&[]),
    );
    let settings = ToolSettings {
        connection: ConnectionSummary {
            host: Some("adb-1.azuredatabricks.net".to_string()),
            token_set: true,
            http_path: Some("/sql/1.0/warehouses/abc".to_string()),
        },
        redactor: Redactor::new([TOKEN]),
        ..settings()
    };
    let dispatcher = dispatcher(&fakes, &settings);

    let result = call(&dispatcher, "test_connection", json!({})).await;

    assert!(!result.is_error);
    let text = result.first_text().unwrap_or_default();
    assert!(!text.contains(TOKEN));
    let report: Value = serde_json::from_str(text).expect("report is JSON");
    assert_eq!(report["databricks_api"], json!(true));
    assert_eq!(report["sql_warehouse"], json!(false));
    assert_eq!(report["token"], json!("Set"));
    assert_eq!(report["status"], json!("Partial Success"));
    assert_eq!(report["details"]["current_user"], json!("ann@example.com"));
    assert!(
        report["details"]["sql_error"]
            .as_str()
            .is_some_and(|error| error.contains("[REDACTED]"))
    );
}

#[tokio::test]
async fn test_connection_skips_sql_when_settings_are_missing() {
    let fakes = Fakes::default();
    let dispatcher = dispatcher(&fakes, &settings());

    let result = call(&dispatcher, "test_connection", json!({})).await;

    let report: Value =
        serde_json::from_str(result.first_text().unwrap_or_default()).expect("report is JSON");
    assert_eq!(report["host"], json!("Not set"));
    assert_eq!(report["sql_warehouse"], json!(false));
    assert!(fakes.sql.statements().is_empty());
}

#[tokio::test(start_paused = true)]
async fn genie_ask_waits_for_the_answer_and_renders_the_query_result() {
    let fakes = Fakes::new(
        FakeWorkspace::default(),
        FakeSql::returning(StatementOutcome::NoResultSet),
        FakeGenie::scripted(&["SUBMITTED", "EXECUTING_QUERY", "COMPLETED"]),
    );
    let dispatcher = dispatcher(&fakes, &fast_polling());

    let result = call(
        &dispatcher,
        "genie_ask",
        json!({"space_id": "space-1", "content": "How many orders per region?"}),
    )
    .await;

    assert!(!result.is_error, "{result:?}");
    let blocks = texts(&result);
    assert_eq!(blocks.len(), 4);
    assert_eq!(blocks[0], "EMEA has the most orders.");
    assert!(blocks[1].starts_with("Orders grouped by region\n\n```sql\nSELECT region"));
    assert_eq!(
        blocks[2],
        "| region | orders |\n| --- | --- |\n| emea | 12 |\n| apac | 7 |"
    );
    let reference: Value = serde_json::from_str(&blocks[3]).expect("reference is JSON");
    assert_eq!(reference["conversation_id"], json!("c1"));
    assert_eq!(reference["message_id"], json!("m1"));
    assert_eq!(fakes.genie.polls(), 3);
}

#[tokio::test(start_paused = true)]
async fn genie_poll_times_out_with_the_last_status() {
    let fakes = Fakes::default();
    let dispatcher = dispatcher(&fakes, &fast_polling());

    let result = call(
        &dispatcher,
        "genie_poll_until_complete",
        json!({
            "space_id": "space-1",
            "conversation_id": "c1",
            "message_id": "m1",
            "max_attempts": 2
        }),
    )
    .await;

    assert!(result.is_error);
    assert_eq!(
        result.first_text(),
        Some(
            "TimeoutError: genie message m1 did not reach a terminal state after 2 attempts (last status: RUNNING)"
        )
    );
    assert_eq!(fakes.genie.polls(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_genie_message_surfaces_the_remote_reason() {
    let genie = FakeGenie {
        error: Some("warehouse is stopped".to_string()),
        ..FakeGenie::scripted(&["FAILED"])
    };
    let fakes = Fakes::new(
        FakeWorkspace::default(),
        FakeSql::returning(StatementOutcome::NoResultSet),
        genie,
    );
    let dispatcher = dispatcher(&fakes, &fast_polling());

    let result = call(
        &dispatcher,
        "genie_ask",
        json!({"space_id": "space-1", "content": "why?"}),
    )
    .await;

    assert!(result.is_error);
    assert_eq!(
        result.first_text(),
        Some(
            "RemoteServiceError: (permanent) genie message m1 ended with status FAILED: warehouse is stopped"
        )
    );
}

#[tokio::test]
async fn genie_space_outside_the_allow_list_is_rejected() {
    let fakes = Fakes::default();
    let settings = ToolSettings {
        genie_space_ids: vec!["space-1".to_string()],
        ..settings()
    };
    let dispatcher = dispatcher(&fakes, &settings);

    let result = call(
        &dispatcher,
        "genie_start_conversation",
        json!({"space_id": "space-2", "content": "hello"}),
    )
    .await;

    assert!(result.is_error);
    assert!(
        result
            .first_text()
            .is_some_and(|text| text.starts_with("ValidationError: /space_id"))
    );
    assert_eq!(
        fakes.genie.started.load(std::sync::atomic::Ordering::SeqCst),
        0
    );
}

#[tokio::test]
async fn genie_download_is_returned_as_an_embedded_resource() {
    let fakes = Fakes::default();
    let dispatcher = dispatcher(&fakes, &settings());

    let result = call(
        &dispatcher,
        "genie_generate_download",
        json!({
            "space_id": "s",
            "conversation_id": "c",
            "message_id": "m",
            "attachment_id": "a"
        }),
    )
    .await;

    assert!(!result.is_error);
    match &result.content[0] {
        ContentBlock::Resource { uri, mime_type, .. } => {
            assert_eq!(
                uri,
                "genie://spaces/s/conversations/c/messages/m/attachments/a/downloads/d-1"
            );
            assert_eq!(mime_type.as_deref(), Some("application/json"));
        }
        other => panic!("expected a resource block, got {other:?}"),
    }
}

#[tokio::test]
async fn vector_search_defaults_to_the_index_columns() {
    let fakes = Fakes::default();
    let dispatcher = dispatcher(&fakes, &settings());

    let result = call(
        &dispatcher,
        "vector_search",
        json!({"index_name": "main.docs.chunks_index", "query": "refund policy"}),
    )
    .await;

    assert!(!result.is_error, "{result:?}");
    let rows: Value = serde_json::from_str(result.first_text().unwrap_or_default())
        .expect("matches are JSON");
    assert_eq!(rows, json!([{"id": 1, "chunk": "refunds take 5 days"}]));

    let requests = fakes.vector_search.requests.lock().expect("requests lock");
    let (index, request) = &requests[0];
    assert_eq!(index, "main.docs.chunks_index");
    assert_eq!(request.columns, vec!["id".to_string(), "chunk".to_string()]);
    assert_eq!(request.num_results, 5);
}

#[tokio::test]
async fn execute_uc_function_binds_named_parameters() {
    let fakes = Fakes::default();
    let dispatcher = dispatcher(&fakes, &settings());

    let result = call(
        &dispatcher,
        "execute_uc_function",
        json!({"function_name": "main.sales.lookup_order", "parameters": {"order_id": 42}}),
    )
    .await;

    assert!(!result.is_error, "{result:?}");
    let statements = fakes.sql.statements();
    assert_eq!(
        statements[0].text,
        "SELECT `main`.`sales`.`lookup_order`(`order_id` => :order_id)"
    );
    assert_eq!(statements[0].parameters[0].value.as_deref(), Some("42"));
    assert_eq!(statements[0].parameters[0].type_name.as_deref(), Some("INT"));
}

#[tokio::test]
async fn execute_uc_function_reports_missing_parameters() {
    let fakes = Fakes::default();
    let dispatcher = dispatcher(&fakes, &settings());

    let result = call(
        &dispatcher,
        "execute_uc_function",
        json!({"function_name": "main.sales.lookup_order"}),
    )
    .await;

    assert!(result.is_error);
    assert_eq!(
        result.first_text(),
        Some(
            "ValidationError: /parameters/order_id: missing required function parameter (expected integer)"
        )
    );
    assert!(fakes.sql.statements().is_empty());
}

#[tokio::test]
async fn discovery_adds_index_and_function_tools() {
    let workspace = FakeWorkspace {
        tables: vec![
            table("main.sales.orders", false),
            table("main.sales.docs_index", true),
        ],
        ..FakeWorkspace::default()
    };
    let fakes = Fakes::new(
        workspace,
        FakeSql::returning(StatementOutcome::NoResultSet),
        FakeGenie::scripted(&[]),
    );
    let settings = settings();
    let deps = fakes.deps();

    let discovered = discovered_group(&deps, &settings).await;
    assert_eq!(discovered.len(), 2);

    let mut groups = static_groups(&deps, &settings);
    groups.push(discovered);
    let dispatcher = Dispatcher::new(build_registry(groups));
    let names = dispatcher.registry().names();
    assert!(names.contains(&"main__sales__docs_index"));
    assert!(names.contains(&"main__sales__lookup_order"));
    assert!(!names.contains(&"main__sales__orders"));

    let result = call(&dispatcher, "main__sales__lookup_order", json!({"order_id": 7})).await;
    assert!(!result.is_error, "{result:?}");
    assert_eq!(
        fakes.sql.statements()[0].parameters[0].value.as_deref(),
        Some("7")
    );
}

#[tokio::test]
async fn discovery_failures_leave_the_other_half_intact() {
    let workspace = FakeWorkspace {
        unreachable: true,
        ..FakeWorkspace::default()
    };
    let fakes = Fakes::new(
        workspace,
        FakeSql::returning(StatementOutcome::NoResultSet),
        FakeGenie::scripted(&[]),
    );

    let discovered = discovered_group(&fakes.deps(), &settings()).await;

    assert_eq!(discovered.len(), 1);
}

#[tokio::test]
async fn discovery_without_a_schema_yields_an_empty_group() {
    let fakes = Fakes::default();

    let discovered = discovered_group(&fakes.deps(), &ToolSettings::default()).await;

    assert!(discovered.is_empty());
    assert_eq!(fakes.workspace.calls(), 0);
}
