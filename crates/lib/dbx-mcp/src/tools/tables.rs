use async_trait::async_trait;
use dbx_core::{
    Tool,
    ToolContext,
    ToolError,
    ToolResult,
    ToolSpec,
    ValidatedArguments,
    format_table,
};
use dbx_models::TableInfo;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ToolSettings, WorkspaceSource};

/// Parameters for listing catalog tables.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListTablesParams {
    /// Catalog to list; defaults to the configured catalog.
    pub catalog: Option<String>,
    /// Schema to list; defaults to the configured schema.
    pub schema: Option<String>,
}

fn format_tables(catalog: &str, schema: &str, tables: &[TableInfo]) -> String {
    if tables.is_empty() {
        return format!("No tables found in {catalog}.{schema}.");
    }
    let rows: Vec<Vec<Value>> = tables
        .iter()
        .map(|table| {
            vec![
                Value::from(table.qualified_name()),
                table.table_type.clone().map_or(Value::Null, Value::from),
                table.comment.clone().map_or(Value::Null, Value::from),
            ]
        })
        .collect();
    format_table(&["full_name", "table_type", "comment"], &rows)
}

pub struct ListTables {
    spec: ToolSpec,
    workspace: WorkspaceSource,
    settings: ToolSettings,
}

impl ListTables {
    pub fn new(workspace: WorkspaceSource, settings: ToolSettings) -> Self {
        Self {
            spec: ToolSpec::for_params::<ListTablesParams>(
                "list_tables",
                "List tables in a catalog schema. Defaults to the configured schema.",
            ),
            workspace,
            settings,
        }
    }
}

#[async_trait]
impl Tool for ListTables {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        args: ValidatedArguments,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let params: ListTablesParams = args.parse()?;
        let (catalog, schema) = self.settings.scope(params.catalog, params.schema)?;
        let workspace = self.workspace.acquire().await?;
        let tables = workspace.list_tables(&catalog, &schema).await?;
        Ok(ToolResult::text(format_tables(&catalog, &schema, &tables)))
    }
}
