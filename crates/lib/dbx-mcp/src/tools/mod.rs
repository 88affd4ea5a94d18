//! MCP tool families.
//!
//! Tools are grouped by provider: developer utilities (SQL, jobs, tables,
//! connection checks), the conversational genie API, vector search, catalog
//! functions, and tools discovered from the workspace at startup. Each group is
//! a [`ToolGroup`]; the daemon passes them to [`dbx_core::build_registry`] in
//! that order so later groups override earlier ones.

mod connection;
mod discovery;
mod functions;
mod genie;
mod jobs;
mod sql;
mod tables;
mod vector_search;

use std::sync::Arc;

use dbx_core::{
    ClientSource,
    FieldIssue,
    FunctionCatalog,
    GenieApi,
    PollPolicy,
    Redactor,
    SqlExecutor,
    ToolError,
    ToolGroup,
    ValidationError,
    VectorSearchApi,
    WorkspaceApi,
};

pub use connection::ConnectionSummary;
pub use discovery::discovered_group;
pub use functions::{function_input_schema, function_sql};
pub use genie::genie_status;
pub use jobs::{format_job_details, format_job_runs, format_jobs};

pub type SqlSource = Arc<dyn ClientSource<dyn SqlExecutor>>;
pub type WorkspaceSource = Arc<dyn ClientSource<dyn WorkspaceApi>>;
pub type GenieSource = Arc<dyn ClientSource<dyn GenieApi>>;
pub type VectorSearchSource = Arc<dyn ClientSource<dyn VectorSearchApi>>;
pub type FunctionSource = Arc<dyn ClientSource<dyn FunctionCatalog>>;

/// Client sources injected into every tool at construction.
#[derive(Clone)]
pub struct ToolDeps {
    pub sql: SqlSource,
    pub workspace: WorkspaceSource,
    pub genie: GenieSource,
    pub vector_search: VectorSearchSource,
    pub functions: FunctionSource,
}

/// Static settings the tool families read at construction.
#[derive(Debug, Clone, Default)]
pub struct ToolSettings {
    /// Default catalog for listing tools and discovery.
    pub catalog: Option<String>,
    /// Default schema for listing tools and discovery.
    pub schema: Option<String>,
    /// Allowed conversational spaces; empty means any.
    pub genie_space_ids: Vec<String>,
    pub poll_policy: PollPolicy,
    pub connection: ConnectionSummary,
    pub redactor: Redactor,
}

impl ToolSettings {
    /// Resolves a catalog and schema from call arguments, falling back to the configured defaults.
    ///
    /// # Errors
    /// `Validation` naming each part that is neither given nor configured.
    pub fn scope(
        &self,
        catalog: Option<String>,
        schema: Option<String>,
    ) -> Result<(String, String), ToolError> {
        let catalog = catalog
            .filter(|value| !value.trim().is_empty())
            .or_else(|| self.catalog.clone());
        let schema = schema
            .filter(|value| !value.trim().is_empty())
            .or_else(|| self.schema.clone());
        match (catalog, schema) {
            (Some(catalog), Some(schema)) => Ok((catalog, schema)),
            (catalog, schema) => {
                let mut issues = Vec::new();
                if catalog.is_none() {
                    issues.push(
                        FieldIssue::new("/catalog", "no catalog given and no default configured")
                            .with_expected("string"),
                    );
                }
                if schema.is_none() {
                    issues.push(
                        FieldIssue::new("/schema", "no schema given and no default configured")
                            .with_expected("string"),
                    );
                }
                Err(ToolError::Validation(ValidationError::new(issues)))
            }
        }
    }

    /// The configured `catalog.schema`, when both parts are set.
    #[must_use]
    pub fn schema_full_name(&self) -> Option<String> {
        match (&self.catalog, &self.schema) {
            (Some(catalog), Some(schema)) => Some(format!("{catalog}.{schema}")),
            _ => None,
        }
    }
}

/// SQL, jobs, tables and connection diagnostics.
#[must_use]
pub fn developer_group(deps: &ToolDeps, settings: &ToolSettings) -> ToolGroup {
    ToolGroup::new("developer")
        .with_tool(sql::RunSqlQuery::new(deps.sql.clone()))
        .with_tool(jobs::ListJobs::new(deps.workspace.clone()))
        .with_tool(jobs::GetJob::new(deps.workspace.clone()))
        .with_tool(jobs::GetJobDetails::new(deps.workspace.clone()))
        .with_tool(jobs::GetJobRuns::new(deps.workspace.clone()))
        .with_tool(tables::ListTables::new(
            deps.workspace.clone(),
            settings.clone(),
        ))
        .with_tool(connection::TestConnection::new(
            deps.workspace.clone(),
            deps.sql.clone(),
            settings.connection.clone(),
            settings.redactor.clone(),
        ))
}

/// Conversational genie tools.
#[must_use]
pub fn genie_group(deps: &ToolDeps, settings: &ToolSettings) -> ToolGroup {
    let spaces = settings.genie_space_ids.as_slice();
    let policy = settings.poll_policy;
    ToolGroup::new("genie")
        .with_tool(genie::StartConversation::new(deps.genie.clone(), spaces))
        .with_tool(genie::CreateMessage::new(deps.genie.clone(), spaces))
        .with_tool(genie::GetMessage::new(deps.genie.clone(), spaces))
        .with_tool(genie::GenerateDownload::new(deps.genie.clone(), spaces))
        .with_tool(genie::PollUntilComplete::new(
            deps.genie.clone(),
            spaces,
            policy,
        ))
        .with_tool(genie::Ask::new(deps.genie.clone(), spaces, policy))
}

#[must_use]
pub fn vector_search_group(deps: &ToolDeps) -> ToolGroup {
    ToolGroup::new("vector_search")
        .with_tool(vector_search::VectorSearch::new(deps.vector_search.clone()))
}

/// Catalog function listing and execution.
#[must_use]
pub fn functions_group(deps: &ToolDeps, settings: &ToolSettings) -> ToolGroup {
    ToolGroup::new("functions")
        .with_tool(functions::ListUcFunctions::new(
            deps.functions.clone(),
            settings.clone(),
        ))
        .with_tool(functions::ExecuteUcFunction::new(
            deps.functions.clone(),
            deps.sql.clone(),
        ))
}

/// Every static group in registry order.
#[must_use]
pub fn static_groups(deps: &ToolDeps, settings: &ToolSettings) -> Vec<ToolGroup> {
    vec![
        developer_group(deps, settings),
        genie_group(deps, settings),
        vector_search_group(deps),
        functions_group(deps, settings),
    ]
}
