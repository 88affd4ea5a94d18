use async_trait::async_trait;
use dbx_core::{SqlStatement, Tool, ToolContext, ToolError, ToolResult, ToolSpec, ValidatedArguments};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::SqlSource;

/// Parameters for running a SQL statement.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunSqlQueryParams {
    /// SQL statement to execute on the configured warehouse.
    pub query: String,
}

pub struct RunSqlQuery {
    spec: ToolSpec,
    sql: SqlSource,
}

impl RunSqlQuery {
    pub fn new(sql: SqlSource) -> Self {
        Self {
            spec: ToolSpec::for_params::<RunSqlQueryParams>(
                "run_sql_query",
                "Execute a SQL query on the configured SQL warehouse and return the result as a Markdown table.",
            ),
            sql,
        }
    }
}

#[async_trait]
impl Tool for RunSqlQuery {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        args: ValidatedArguments,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let params: RunSqlQueryParams = args.parse()?;
        let sql = self.sql.acquire().await?;
        let outcome = sql
            .execute(SqlStatement::new(params.query), ctx.cancellation())
            .await?;
        Ok(ToolResult::text(outcome.to_markdown()))
    }
}
