//! Read-only MCP resources.
//!
//! `schema://tables` lists the tables of the configured `catalog.schema`, one
//! line per table. Reads go through the same [`Normalizer`] as tool calls, so
//! failures carry the usual kind prefix and never include the token.

use dbx_core::{Normalizer, ToolError, ToolResult};
use dbx_models::TableInfo;
use rmcp::model::{AnnotateAble, RawResource, Resource};

use crate::tools::{ToolSettings, WorkspaceSource};

pub const TABLES_URI: &str = "schema://tables";

fn table_lines(catalog: &str, schema: &str, tables: &[TableInfo]) -> String {
    if tables.is_empty() {
        return format!("No tables found in {catalog}.{schema}.");
    }
    tables
        .iter()
        .map(|table| {
            format!(
                "Database: {}, Schema: {}, Table: {}",
                table.catalog_name.as_deref().unwrap_or(catalog),
                table.schema_name.as_deref().unwrap_or(schema),
                table.name
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Table listing of the configured schema.
pub struct SchemaResource {
    workspace: WorkspaceSource,
    settings: ToolSettings,
    normalizer: Normalizer,
}

impl SchemaResource {
    #[must_use]
    pub fn new(workspace: WorkspaceSource, settings: ToolSettings) -> Self {
        let normalizer = Normalizer::new(settings.redactor.clone());
        Self {
            workspace,
            settings,
            normalizer,
        }
    }

    /// Protocol listing entry.
    #[must_use]
    pub fn describe(&self) -> Resource {
        let scope = self
            .settings
            .schema_full_name()
            .unwrap_or_else(|| "the configured schema".to_string());
        let mut raw = RawResource::new(TABLES_URI, "tables");
        raw.description = Some(format!("Tables in {scope}."));
        raw.mime_type = Some("text/plain".to_string());
        raw.no_annotation()
    }

    /// Renders the listing, or an error-marked result naming the failure kind.
    pub async fn read(&self) -> ToolResult {
        self.normalizer.run(TABLES_URI, self.list()).await
    }

    async fn list(&self) -> Result<ToolResult, ToolError> {
        let (catalog, schema) = self.settings.scope(None, None)?;
        let workspace = self.workspace.acquire().await?;
        let tables = workspace.list_tables(&catalog, &schema).await?;
        Ok(ToolResult::text(table_lines(&catalog, &schema, &tables)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str) -> TableInfo {
        TableInfo {
            name: name.to_string(),
            catalog_name: Some("main".to_string()),
            schema_name: Some("sales".to_string()),
            full_name: Some(format!("main.sales.{name}")),
            table_type: Some("MANAGED".to_string()),
            comment: None,
            properties: std::collections::HashMap::new(),
        }
    }

    #[test]
    fn one_line_per_table() {
        let text = table_lines("main", "sales", &[table("orders"), table("refunds")]);
        assert_eq!(
            text,
            "Database: main, Schema: sales, Table: orders\nDatabase: main, Schema: sales, Table: refunds"
        );
    }

    #[test]
    fn empty_schema_says_so() {
        assert_eq!(table_lines("main", "sales", &[]), "No tables found in main.sales.");
    }
}
