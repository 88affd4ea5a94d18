use std::sync::Arc;

use dbx_core::{Tool, ToolError, ToolGroup};
use dbx_models::endpoints::{VECTOR_INDEX_PROPERTY, tool_name_for};
use tracing::{info, warn};

use super::functions::FunctionTool;
use super::vector_search::IndexSearch;
use super::{ToolDeps, ToolSettings};

/// Builds one tool per vector index and per catalog function in the configured schema.
///
/// Needs live credentials. Failures are logged and that half of discovery is
/// skipped; the returned group may be empty.
pub async fn discovered_group(deps: &ToolDeps, settings: &ToolSettings) -> ToolGroup {
    let mut group = ToolGroup::new("discovered");
    let (Some(catalog), Some(schema)) = (settings.catalog.as_deref(), settings.schema.as_deref())
    else {
        warn!("tool discovery needs a schema full name; skipping");
        return group;
    };

    match discover_indexes(deps, catalog, schema).await {
        Ok(tools) => {
            info!(catalog, schema, count = tools.len(), "discovered vector search index tools");
            tools.into_iter().for_each(|tool| group.push(tool));
        }
        Err(err) => {
            warn!(catalog, schema, error = %err.render(&settings.redactor), "vector index discovery failed");
        }
    }

    match discover_functions(deps, catalog, schema).await {
        Ok(tools) => {
            info!(catalog, schema, count = tools.len(), "discovered catalog function tools");
            tools.into_iter().for_each(|tool| group.push(tool));
        }
        Err(err) => {
            warn!(catalog, schema, error = %err.render(&settings.redactor), "catalog function discovery failed");
        }
    }

    group
}

async fn discover_indexes(
    deps: &ToolDeps,
    catalog: &str,
    schema: &str,
) -> Result<Vec<Arc<dyn Tool>>, ToolError> {
    let workspace = deps.workspace.acquire().await?;
    let tables = workspace.list_tables(catalog, schema).await?;
    Ok(tables
        .into_iter()
        .filter(|table| table.properties.contains_key(VECTOR_INDEX_PROPERTY))
        .map(|table| {
            let index_name = table.qualified_name();
            Arc::new(IndexSearch::new(
                tool_name_for(&index_name),
                index_name,
                deps.vector_search.clone(),
            )) as Arc<dyn Tool>
        })
        .collect())
}

async fn discover_functions(
    deps: &ToolDeps,
    catalog: &str,
    schema: &str,
) -> Result<Vec<Arc<dyn Tool>>, ToolError> {
    let catalog_api = deps.functions.acquire().await?;
    let functions = catalog_api.list_functions(catalog, schema).await?;
    Ok(functions
        .into_iter()
        .map(|info| Arc::new(FunctionTool::new(info, deps.sql.clone())) as Arc<dyn Tool>)
        .collect())
}
