//! Capability interfaces per tool family.
//!
//! Tools depend on these traits rather than on a concrete client, and obtain
//! an implementation through a [`ClientSource`] at execution time.

use std::sync::Arc;

use async_trait::async_trait;
use dbx_models::{
    CurrentUser,
    FunctionInfo,
    GenieDownload,
    GenieMessage,
    GenieQueryResult,
    GenieStartConversation,
    Job,
    JobRun,
    TableInfo,
    VectorIndexInfo,
    VectorQueryRequest,
    VectorQueryResponse,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::ToolError;
use crate::format::format_table;

/// Trivial round-trip used to decide whether a cached client is still usable.
#[async_trait]
pub trait Probe: Send + Sync {
    /// # Errors
    /// The remote failure that made the client unusable.
    async fn ping(&self) -> Result<(), ToolError>;
}

/// Named parameter bound into a SQL statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlParameter {
    pub name: String,
    pub value: Option<String>,
    /// SQL type name such as `STRING` or `INT`; the server infers it when absent.
    pub type_name: Option<String>,
}

impl SqlParameter {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
            type_name: None,
        }
    }

    #[must_use]
    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlStatement {
    pub text: String,
    pub parameters: Vec<SqlParameter>,
}

impl SqlStatement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_parameter(mut self, parameter: SqlParameter) -> Self {
        self.parameters.push(parameter);
        self
    }
}

/// What a statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementOutcome {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    /// The statement ran without producing a result set, e.g. DDL or `UPDATE`.
    NoResultSet,
}

impl StatementOutcome {
    #[must_use]
    pub fn to_markdown(&self) -> String {
        match self {
            Self::Rows { columns, rows } => format_table(columns, rows),
            Self::NoResultSet => format_table::<String, Vec<Value>>(&[], &[]),
        }
    }
}

/// SQL warehouse connection.
#[async_trait]
pub trait SqlExecutor: Probe {
    /// Runs one statement, waiting for it to finish unless `cancel` fires first.
    ///
    /// # Errors
    /// `Cancelled` when `cancel` fires; remote and data-shape failures otherwise.
    async fn execute(
        &self,
        statement: SqlStatement,
        cancel: &CancellationToken,
    ) -> Result<StatementOutcome, ToolError>;
}

/// Workspace REST API: jobs, identity and catalog tables.
#[async_trait]
pub trait WorkspaceApi: Probe {
    /// # Errors
    /// Remote failures, classified by HTTP status.
    async fn list_jobs(&self, limit: Option<u32>) -> Result<Vec<Job>, ToolError>;

    /// # Errors
    /// `RemoteService` with status 404 when the job does not exist.
    async fn get_job(&self, job_id: i64) -> Result<Job, ToolError>;

    /// # Errors
    /// Remote failures, classified by HTTP status.
    async fn list_job_runs(&self, job_id: i64, limit: Option<u32>)
    -> Result<Vec<JobRun>, ToolError>;

    /// # Errors
    /// Remote failures, classified by HTTP status.
    async fn current_user(&self) -> Result<CurrentUser, ToolError>;

    /// # Errors
    /// Remote failures, classified by HTTP status.
    async fn list_tables(&self, catalog: &str, schema: &str) -> Result<Vec<TableInfo>, ToolError>;
}

/// Conversational data Q&A API.
#[async_trait]
pub trait GenieApi: Probe {
    /// # Errors
    /// Remote failures, classified by HTTP status.
    async fn start_conversation(
        &self,
        space_id: &str,
        content: &str,
    ) -> Result<GenieStartConversation, ToolError>;

    /// # Errors
    /// Remote failures, classified by HTTP status.
    async fn create_message(
        &self,
        space_id: &str,
        conversation_id: &str,
        content: &str,
    ) -> Result<GenieMessage, ToolError>;

    /// # Errors
    /// Remote failures, classified by HTTP status.
    async fn get_message(
        &self,
        space_id: &str,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<GenieMessage, ToolError>;

    /// # Errors
    /// Remote failures, classified by HTTP status.
    async fn get_query_result(
        &self,
        space_id: &str,
        conversation_id: &str,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<GenieQueryResult, ToolError>;

    /// # Errors
    /// Remote failures, classified by HTTP status.
    async fn generate_download(
        &self,
        space_id: &str,
        conversation_id: &str,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<GenieDownload, ToolError>;
}

#[async_trait]
pub trait VectorSearchApi: Probe {
    /// # Errors
    /// Remote failures, classified by HTTP status.
    async fn describe_index(&self, index_name: &str) -> Result<VectorIndexInfo, ToolError>;

    /// # Errors
    /// Remote failures, classified by HTTP status.
    async fn query_index(
        &self,
        index_name: &str,
        request: VectorQueryRequest,
    ) -> Result<VectorQueryResponse, ToolError>;
}

/// Catalog function metadata. Execution goes through [`SqlExecutor`].
#[async_trait]
pub trait FunctionCatalog: Probe {
    /// # Errors
    /// Remote failures, classified by HTTP status.
    async fn list_functions(
        &self,
        catalog: &str,
        schema: &str,
    ) -> Result<Vec<FunctionInfo>, ToolError>;

    /// # Errors
    /// Remote failures, classified by HTTP status.
    async fn get_function(&self, full_name: &str) -> Result<FunctionInfo, ToolError>;
}

/// Hands out a client for one capability, building it on demand.
#[async_trait]
pub trait ClientSource<T: ?Sized>: Send + Sync {
    /// # Errors
    /// Whatever building or health-checking the client failed with.
    async fn acquire(&self) -> Result<Arc<T>, ToolError>;
}

/// Source that always returns the same client.
pub struct FixedClient<T: ?Sized>(Arc<T>);

impl<T: ?Sized> FixedClient<T> {
    pub const fn new(client: Arc<T>) -> Self {
        Self(client)
    }
}

#[async_trait]
impl<T> ClientSource<T> for FixedClient<T>
where
    T: ?Sized + Send + Sync,
{
    async fn acquire(&self) -> Result<Arc<T>, ToolError> {
        Ok(self.0.clone())
    }
}
