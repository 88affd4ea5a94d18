use async_trait::async_trait;
use dbx_core::{
    Redactor,
    SqlStatement,
    Tool,
    ToolContext,
    ToolError,
    ToolResult,
    ToolSpec,
    ValidatedArguments,
};
use dbx_models::CurrentUser;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{SqlSource, WorkspaceSource};

const NOT_SET: &str = "Not set";
const SET: &str = "Set";
const TEST_QUERY: &str = "SELECT 1 AS test_value";

/// Which connection settings were supplied. Secret values are never kept here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionSummary {
    pub host: Option<String>,
    pub token_set: bool,
    /// SQL endpoint path, or the warehouse it resolves to.
    pub http_path: Option<String>,
}

impl ConnectionSummary {
    fn sql_ready(&self) -> bool {
        self.host.is_some() && self.token_set && self.http_path.is_some()
    }
}

/// Parameters for the connection check (none).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct TestConnectionParams {}

#[derive(Debug, Clone, Default, Serialize)]
struct ConnectionDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    current_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_info: Option<CurrentUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sql_test_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sql_result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sql_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct ConnectionReport {
    databricks_api: bool,
    sql_warehouse: bool,
    host: String,
    token: &'static str,
    http_path: String,
    details: ConnectionDetails,
    status: &'static str,
    message: &'static str,
}

impl ConnectionReport {
    fn new(summary: &ConnectionSummary) -> Self {
        Self {
            databricks_api: false,
            sql_warehouse: false,
            host: summary.host.clone().unwrap_or_else(|| NOT_SET.to_string()),
            token: if summary.token_set { SET } else { NOT_SET },
            http_path: summary
                .http_path
                .clone()
                .unwrap_or_else(|| NOT_SET.to_string()),
            details: ConnectionDetails::default(),
            status: "Failed",
            message: "Unable to connect to Databricks",
        }
    }

    fn summarize(&mut self) {
        (self.status, self.message) = match (self.databricks_api, self.sql_warehouse) {
            (true, true) => ("Success", "All connections successful"),
            (true, false) => (
                "Partial Success",
                "API connected, but SQL Warehouse connection failed",
            ),
            (false, _) => ("Failed", "Unable to connect to Databricks"),
        };
    }
}

pub struct TestConnection {
    spec: ToolSpec,
    workspace: WorkspaceSource,
    sql: SqlSource,
    summary: ConnectionSummary,
    redactor: Redactor,
}

impl TestConnection {
    pub fn new(
        workspace: WorkspaceSource,
        sql: SqlSource,
        summary: ConnectionSummary,
        redactor: Redactor,
    ) -> Self {
        Self {
            spec: ToolSpec::for_params::<TestConnectionParams>(
                "test_connection",
                "Test the workspace API and SQL warehouse connections and report which settings are present.",
            ),
            workspace,
            sql,
            summary,
            redactor,
        }
    }

    async fn check_api(&self, report: &mut ConnectionReport) {
        let outcome = async {
            let workspace = self.workspace.acquire().await?;
            workspace.current_user().await
        }
        .await;
        match outcome {
            Ok(user) => {
                report.databricks_api = true;
                report.details.current_user = Some(user.user_name.clone());
                report.details.user_info = Some(user);
            }
            Err(err) => {
                let rendered = err.render(&self.redactor);
                warn!(error = %rendered, "workspace API connection check failed");
                report.details.api_error = Some(rendered);
            }
        }
    }

    async fn check_sql(&self, report: &mut ConnectionReport, ctx: &ToolContext) {
        if !self.summary.sql_ready() {
            return;
        }
        let outcome = async {
            let sql = self.sql.acquire().await?;
            sql.execute(SqlStatement::new(TEST_QUERY), ctx.cancellation())
                .await
        }
        .await;
        match outcome {
            Ok(result) => {
                report.sql_warehouse = true;
                report.details.sql_test_query =
                    Some("Successfully executed test query: SELECT 1".to_string());
                report.details.sql_result = Some(result.to_markdown());
            }
            Err(err) => {
                let rendered = err.render(&self.redactor);
                warn!(error = %rendered, "SQL warehouse connection check failed");
                report.details.sql_error = Some(rendered);
            }
        }
    }
}

#[async_trait]
impl Tool for TestConnection {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        _args: ValidatedArguments,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let mut report = ConnectionReport::new(&self.summary);
        self.check_api(&mut report).await;
        self.check_sql(&mut report, ctx).await;
        report.summarize();
        ToolResult::json(&report)
    }
}
