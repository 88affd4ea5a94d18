#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dbx_core::{
    FixedClient,
    FunctionCatalog,
    GenieApi,
    Probe,
    SqlExecutor,
    SqlStatement,
    StatementOutcome,
    ToolError,
    VectorSearchApi,
    WorkspaceApi,
};
use dbx_mcp::tools::{ToolDeps, ToolSettings};
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
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

pub const TOKEN: &str = "dapi-secret-token";

fn parse<T: serde::de::DeserializeOwned>(value: Value) -> T {
    serde_json::from_value(value).expect("fixture should parse")
}

#[derive(Default)]
pub struct FakeWorkspace {
    pub jobs: Vec<Job>,
    pub runs: Vec<JobRun>,
    pub tables: Vec<TableInfo>,
    pub unreachable: bool,
    pub calls: AtomicUsize,
}

impl FakeWorkspace {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn call(&self) -> Result<(), ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            return Err(ToolError::transport("connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl Probe for FakeWorkspace {
    async fn ping(&self) -> Result<(), ToolError> {
        self.call()
    }
}

#[async_trait]
impl WorkspaceApi for FakeWorkspace {
    async fn list_jobs(&self, limit: Option<u32>) -> Result<Vec<Job>, ToolError> {
        self.call()?;
        let limit = limit.map_or(self.jobs.len(), |limit| limit as usize);
        Ok(self.jobs.iter().take(limit).cloned().collect())
    }

    async fn get_job(&self, job_id: i64) -> Result<Job, ToolError> {
        self.call()?;
        self.jobs
            .iter()
            .find(|job| job.job_id == job_id)
            .cloned()
            .ok_or_else(|| ToolError::remote_status(404, format!("Job {job_id} does not exist.")))
    }

    async fn list_job_runs(&self, _job_id: i64, _limit: Option<u32>) -> Result<Vec<JobRun>, ToolError> {
        self.call()?;
        Ok(self.runs.clone())
    }

    async fn current_user(&self) -> Result<CurrentUser, ToolError> {
        self.call()?;
        Ok(parse(json!({"userName": "ann@example.com", "displayName": "Ann"})))
    }

    async fn list_tables(&self, _catalog: &str, _schema: &str) -> Result<Vec<TableInfo>, ToolError> {
        self.call()?;
        Ok(self.tables.clone())
    }
}

pub struct FakeSql {
    pub outcome: StatementOutcome,
    pub failure: Option<String>,
    pub statements: Mutex<Vec<SqlStatement>>,
}

impl FakeSql {
    pub fn returning(outcome: StatementOutcome) -> Self {
        Self {
            outcome,
            failure: None,
            statements: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: StatementOutcome::NoResultSet,
            failure: Some(message.to_string()),
            statements: Mutex::new(Vec::new()),
        }
    }

    pub fn statements(&self) -> Vec<SqlStatement> {
        self.statements.lock().expect("statements lock").clone()
    }
}

#[async_trait]
impl Probe for FakeSql {
    async fn ping(&self) -> Result<(), ToolError> {
        Ok(())
    }
}

#[async_trait]
impl SqlExecutor for FakeSql {
    async fn execute(
        &self,
        statement: SqlStatement,
        _cancel: &CancellationToken,
    ) -> Result<StatementOutcome, ToolError> {
        self.statements
            .lock()
            .expect("statements lock")
            .push(statement);
        match &self.failure {
            Some(message) => Err(ToolError::remote_status(403, message.clone())),
            None => Ok(self.outcome.clone()),
        }
    }
}

/// Genie space whose message walks through a scripted list of statuses.
pub struct FakeGenie {
    pub statuses: Mutex<VecDeque<&'static str>>,
    pub error: Option<String>,
    pub polls: AtomicUsize,
    pub started: AtomicUsize,
}

impl FakeGenie {
    pub fn scripted(statuses: &[&'static str]) -> Self {
        Self {
            statuses: Mutex::new(statuses.iter().copied().collect()),
            error: None,
            polls: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
        }
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    fn message(&self, conversation_id: &str, message_id: &str, status: &str) -> GenieMessage {
        let mut message: GenieMessage = parse(json!({
            "id": message_id,
            "conversation_id": conversation_id,
            "content": "How many orders per region?",
            "status": status,
        }));
        if status == "COMPLETED" {
            message.attachments = parse(json!([
                {"attachment_id": "a-text", "text": {"content": "EMEA has the most orders."}},
                {"attachment_id": "a-query", "query": {
                    "query": "SELECT region, count(*) AS orders FROM sales GROUP BY region",
                    "description": "Orders grouped by region"
                }}
            ]));
        }
        if let Some(error) = &self.error {
            message.error = Some(parse(json!({"error": error})));
        }
        message
    }
}

#[async_trait]
impl Probe for FakeGenie {
    async fn ping(&self) -> Result<(), ToolError> {
        Ok(())
    }
}

#[async_trait]
impl GenieApi for FakeGenie {
    async fn start_conversation(
        &self,
        _space_id: &str,
        _content: &str,
    ) -> Result<GenieStartConversation, ToolError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        Ok(GenieStartConversation {
            conversation_id: "c1".to_string(),
            message_id: "m1".to_string(),
            message: Some(self.message("c1", "m1", "SUBMITTED")),
        })
    }

    async fn create_message(
        &self,
        _space_id: &str,
        conversation_id: &str,
        _content: &str,
    ) -> Result<GenieMessage, ToolError> {
        Ok(self.message(conversation_id, "m2", "SUBMITTED"))
    }

    async fn get_message(
        &self,
        _space_id: &str,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<GenieMessage, ToolError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let status = self
            .statuses
            .lock()
            .expect("status script lock")
            .pop_front()
            .unwrap_or("EXECUTING_QUERY");
        Ok(self.message(conversation_id, message_id, status))
    }

    async fn get_query_result(
        &self,
        _space_id: &str,
        _conversation_id: &str,
        _message_id: &str,
        attachment_id: &str,
    ) -> Result<GenieQueryResult, ToolError> {
        assert_eq!(attachment_id, "a-query");
        Ok(parse(json!({"statement_response": {
            "statement_id": "st-9",
            "status": {"state": "SUCCEEDED"},
            "manifest": {"schema": {"column_count": 2, "columns": [
                {"name": "region"}, {"name": "orders"}
            ]}},
            "result": {"data_array": [["emea", "12"], ["apac", "7"]]}
        }})))
    }

    async fn generate_download(
        &self,
        _space_id: &str,
        _conversation_id: &str,
        _message_id: &str,
        _attachment_id: &str,
    ) -> Result<GenieDownload, ToolError> {
        Ok(parse(json!({"download_id": "d-1", "status": "PENDING"})))
    }
}

#[derive(Default)]
pub struct FakeVectorSearch {
    pub requests: Mutex<Vec<(String, VectorQueryRequest)>>,
}

#[async_trait]
impl Probe for FakeVectorSearch {
    async fn ping(&self) -> Result<(), ToolError> {
        Ok(())
    }
}

#[async_trait]
impl VectorSearchApi for FakeVectorSearch {
    async fn describe_index(&self, index_name: &str) -> Result<VectorIndexInfo, ToolError> {
        Ok(parse(json!({
            "name": index_name,
            "primary_key": "id",
            "delta_sync_index_spec": {"embedding_source_columns": [{"name": "chunk"}]}
        })))
    }

    async fn query_index(
        &self,
        index_name: &str,
        request: VectorQueryRequest,
    ) -> Result<VectorQueryResponse, ToolError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push((index_name.to_string(), request));
        Ok(parse(json!({
            "manifest": {"column_count": 2, "columns": [{"name": "id"}, {"name": "chunk"}]},
            "result": {"data_array": [[1, "refunds take 5 days"]]}
        })))
    }
}

#[derive(Default)]
pub struct FakeFunctions {
    pub functions: Vec<FunctionInfo>,
    pub unreachable: bool,
}

#[async_trait]
impl Probe for FakeFunctions {
    async fn ping(&self) -> Result<(), ToolError> {
        Ok(())
    }
}

#[async_trait]
impl FunctionCatalog for FakeFunctions {
    async fn list_functions(
        &self,
        _catalog: &str,
        _schema: &str,
    ) -> Result<Vec<FunctionInfo>, ToolError> {
        if self.unreachable {
            return Err(ToolError::remote_status(503, "catalog unavailable"));
        }
        Ok(self.functions.clone())
    }

    async fn get_function(&self, full_name: &str) -> Result<FunctionInfo, ToolError> {
        self.functions
            .iter()
            .find(|function| function.qualified_name() == full_name)
            .cloned()
            .ok_or_else(|| ToolError::remote_status(404, format!("Function {full_name} does not exist.")))
    }
}

pub fn job(job_id: i64, name: &str) -> Job {
    parse(json!({"job_id": job_id, "settings": {"name": name}, "creator_user_name": "ann@example.com"}))
}

pub fn table(full_name: &str, vector_index: bool) -> TableInfo {
    let properties = if vector_index {
        json!({"model_endpoint_url": "https://example.cloud/serving-endpoints/gte"})
    } else {
        json!({})
    };
    let name = full_name.rsplit('.').next().unwrap_or(full_name);
    parse(json!({"name": name, "full_name": full_name, "table_type": "MANAGED", "properties": properties}))
}

pub fn lookup_function() -> FunctionInfo {
    parse(json!({
        "name": "lookup_order",
        "full_name": "main.sales.lookup_order",
        "data_type": "STRING",
        "comment": "Look up an order by id.",
        "input_params": {"parameters": [
            {"name": "order_id", "type_name": "INT", "position": 0}
        ]}
    }))
}

/// Concrete fakes plus the deps that hand them out.
pub struct Fakes {
    pub workspace: Arc<FakeWorkspace>,
    pub sql: Arc<FakeSql>,
    pub genie: Arc<FakeGenie>,
    pub vector_search: Arc<FakeVectorSearch>,
    pub functions: Arc<FakeFunctions>,
}

impl Fakes {
    pub fn new(workspace: FakeWorkspace, sql: FakeSql, genie: FakeGenie) -> Self {
        Self {
            workspace: Arc::new(workspace),
            sql: Arc::new(sql),
            genie: Arc::new(genie),
            vector_search: Arc::new(FakeVectorSearch::default()),
            functions: Arc::new(FakeFunctions {
                functions: vec![lookup_function()],
                unreachable: false,
            }),
        }
    }

    pub fn deps(&self) -> ToolDeps {
        let workspace: Arc<dyn WorkspaceApi> = self.workspace.clone();
        let sql: Arc<dyn SqlExecutor> = self.sql.clone();
        let genie: Arc<dyn GenieApi> = self.genie.clone();
        let vector_search: Arc<dyn VectorSearchApi> = self.vector_search.clone();
        let functions: Arc<dyn FunctionCatalog> = self.functions.clone();
        ToolDeps {
            workspace: Arc::new(FixedClient::new(workspace)),
            sql: Arc::new(FixedClient::new(sql)),
            genie: Arc::new(FixedClient::new(genie)),
            vector_search: Arc::new(FixedClient::new(vector_search)),
            functions: Arc::new(FixedClient::new(functions)),
        }
    }
}

impl Default for Fakes {
    fn default() -> Self {
        Self::new(
            FakeWorkspace::default(),
            FakeSql::returning(StatementOutcome::NoResultSet),
            FakeGenie::scripted(&[]),
        )
    }
}

pub fn settings() -> ToolSettings {
    ToolSettings {
        catalog: Some("main".to_string()),
        schema: Some("sales".to_string()),
        ..ToolSettings::default()
    }
}
