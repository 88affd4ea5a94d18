//! MCP server implementation for dbx-mcp.
//!
//! This crate adapts the protocol-independent [`Dispatcher`] to rmcp: tool
//! listing and invocation are routed through the shared registry, and every
//! tool outcome, including classified failures, is returned as a tool result
//! rather than a protocol error. It also hosts the tool families themselves,
//! the `schema://tables` resource and the stdio and streamable HTTP runners.

pub mod resources;
pub mod server;
pub mod tools;

use std::sync::Arc;

use dbx_core::{ContentBlock, Dispatcher, ToolContext, ToolResult, ToolSpec};
use rmcp::model::{
    CallToolRequestParams,
    CallToolResult,
    Content,
    ListResourcesResult,
    ListToolsResult,
    PaginatedRequestParams,
    ReadResourceRequestParams,
    ReadResourceResult,
    ResourceContents,
    ServerCapabilities,
    ServerInfo,
    Tool,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData, RoleServer, ServerHandler};

use crate::resources::{SchemaResource, TABLES_URI};

const SERVER_INSTRUCTIONS: &str = r"dbx-mcp exposes Databricks workspace operations as MCP tools.

Workflow:
1. Call `test_connection` to check which settings are present and whether the API and SQL warehouse are reachable.
2. Explore data:
   - The `schema://tables` resource lists the tables of the configured schema.
   - `list_tables` and `list_uc_functions` default to the configured `catalog.schema`.
   - `run_sql_query` executes SQL on the configured warehouse and returns a Markdown table.
3. Jobs: `list_jobs`, `get_job`, `get_job_details`, `get_job_runs`.
4. Ask questions in natural language with genie:
   - `genie_ask` starts or continues a conversation and waits for the answer.
   - `genie_start_conversation` / `genie_create_message` then `genie_poll_until_complete` for step-by-step control.
5. Retrieval: `vector_search` queries any index; discovered indexes and functions appear as `catalog__schema__name` tools.

Notes:
- Failed calls return a single line prefixed with the failure kind, e.g. `RemoteServiceError: (transient, status 503) ...`.
  Transient failures are safe to retry; permanent ones are not.";

/// Capability flags advertised at initialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilityFlags {
    pub tools_changed: bool,
    pub resources_changed: bool,
}

/// MCP server wrapper around the shared dispatcher.
#[derive(Clone)]
pub struct DbxMcp {
    dispatcher: Arc<Dispatcher>,
    tables: Option<Arc<SchemaResource>>,
    flags: CapabilityFlags,
}

impl DbxMcp {
    /// Creates a new server using a dispatcher by value.
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self::with_dispatcher(Arc::new(dispatcher))
    }

    /// Creates a new server using a shared dispatcher handle.
    #[must_use]
    pub fn with_dispatcher(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            tables: None,
            flags: CapabilityFlags::default(),
        }
    }

    /// Publishes the table listing as `schema://tables`.
    #[must_use]
    pub fn with_schema_resource(mut self, tables: Arc<SchemaResource>) -> Self {
        self.tables = Some(tables);
        self
    }

    #[must_use]
    pub const fn with_flags(mut self, flags: CapabilityFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

/// Converts a registry spec into its protocol form.
#[must_use]
pub fn to_mcp_tool(spec: &ToolSpec) -> Tool {
    Tool::new(
        spec.name().to_string(),
        spec.description().to_string(),
        Arc::new(spec.input_schema().clone()),
    )
}

/// Converts a tool outcome into a call result, carrying the error marker.
#[must_use]
pub fn to_call_result(result: ToolResult) -> CallToolResult {
    let content: Vec<Content> = result
        .content
        .into_iter()
        .map(|block| match block {
            ContentBlock::Text(text) => Content::text(text),
            ContentBlock::Resource {
                uri,
                mime_type,
                text,
            } => Content::resource(ResourceContents::TextResourceContents {
                uri,
                mime_type,
                text,
                meta: None,
            }),
        })
        .collect();
    if result.is_error {
        CallToolResult::error(content)
    } else {
        CallToolResult::success(content)
    }
}

impl ServerHandler for DbxMcp {
    fn get_info(&self) -> ServerInfo {
        let mut capabilities = ServerCapabilities::builder()
            .enable_tools()
            .enable_resources()
            .build();
        if let Some(tools) = capabilities.tools.as_mut() {
            tools.list_changed = Some(self.flags.tools_changed);
        }
        if let Some(resources) = capabilities.resources.as_mut() {
            resources.list_changed = Some(self.flags.resources_changed);
        }
        let mut info = ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities,
            ..Default::default()
        };
        info.server_info.name = env!("CARGO_PKG_NAME").to_string();
        info.server_info.version = env!("CARGO_PKG_VERSION").to_string();
        info
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        let tools = self.dispatcher.list_tools().iter().map(to_mcp_tool).collect();
        Ok(ListToolsResult::with_all_items(tools))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let ctx = ToolContext::new(context.ct.clone());
        let result = self
            .dispatcher
            .call_tool(&request.name, request.arguments, &ctx)
            .await;
        Ok(to_call_result(result))
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        let resources = self.tables.iter().map(|tables| tables.describe()).collect();
        Ok(ListResourcesResult::with_all_items(resources))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        let tables = match &self.tables {
            Some(tables) if request.uri == TABLES_URI => tables,
            _ => {
                return Err(ErrorData::resource_not_found(
                    format!("unknown resource: {}", request.uri),
                    None,
                ));
            }
        };
        let result = tables.read().await;
        let text = result.first_text().unwrap_or_default().to_string();
        if result.is_error {
            return Err(ErrorData::internal_error(text, None));
        }
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::TextResourceContents {
                uri: request.uri,
                mime_type: Some("text/plain".to_string()),
                text,
                meta: None,
            }],
        })
    }
}
