use async_trait::async_trait;
use dbx_core::{
    CompletionPoller,
    CompletionSource,
    JobStatus,
    Observation,
    PollPolicy,
    Probe,
    SqlExecutor,
    SqlStatement,
    StatementOutcome,
    ToolError,
};
use dbx_models::endpoints::{SQL_STATEMENTS, statement_path};
use dbx_models::{ResultData, StatementParameter, StatementRequest, StatementResponse};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::DatabricksClient;
use crate::settings::{ClientSettings, WarehouseSettings};

/// How long the submit call blocks server-side before handing back a statement id.
const WAIT_TIMEOUT: &str = "30s";
const MAX_RESULT_CHUNKS: usize = 100;

/// Maps a statement execution state onto the poller's status model.
///
/// # Errors
/// `DataShape` when the response carries no state at all.
pub fn statement_status(state: Option<&str>) -> Result<JobStatus, ToolError> {
    let state = state.ok_or_else(|| ToolError::data_shape("statement response has no status"))?;
    Ok(match state {
        "PENDING" => JobStatus::Pending,
        "SUCCEEDED" => JobStatus::Completed,
        "FAILED" => JobStatus::Failed,
        "CANCELED" | "CLOSED" => JobStatus::Cancelled,
        _ => JobStatus::Running,
    })
}

/// Runs statements on one SQL warehouse through the statement execution API.
#[derive(Debug, Clone)]
pub struct SqlWarehouse {
    client: DatabricksClient,
    warehouse_id: String,
    catalog: Option<String>,
    schema: Option<String>,
    poller: CompletionPoller,
}

impl SqlWarehouse {
    /// # Errors
    /// `Configuration` when the host, token or warehouse cannot be resolved.
    pub fn connect(
        client: &ClientSettings,
        warehouse: &WarehouseSettings,
        policy: PollPolicy,
    ) -> Result<Self, ToolError> {
        let warehouse_id = warehouse.warehouse_id()?;
        let client = DatabricksClient::connect(client)?;
        Ok(Self {
            client,
            warehouse_id,
            catalog: warehouse.catalog.clone(),
            schema: warehouse.schema.clone(),
            poller: CompletionPoller::new(policy),
        })
    }

    #[must_use]
    pub fn warehouse_id(&self) -> &str {
        &self.warehouse_id
    }

    fn request(&self, statement: SqlStatement) -> StatementRequest {
        StatementRequest {
            statement: statement.text,
            warehouse_id: self.warehouse_id.clone(),
            parameters: statement
                .parameters
                .into_iter()
                .map(|parameter| StatementParameter {
                    name: parameter.name,
                    value: parameter.value,
                    type_name: parameter.type_name,
                })
                .collect(),
            catalog: self.catalog.clone(),
            schema: self.schema.clone(),
            wait_timeout: WAIT_TIMEOUT.to_string(),
            on_wait_timeout: "CONTINUE".to_string(),
            format: "JSON_ARRAY".to_string(),
            disposition: "INLINE".to_string(),
        }
    }

    async fn collect_rows(&self, response: StatementResponse) -> Result<StatementOutcome, ToolError> {
        let columns = response.column_names();
        if columns.is_empty() {
            return Ok(StatementOutcome::NoResultSet);
        }

        let mut rows = Vec::new();
        let mut next = response.result.and_then(|chunk| {
            rows.extend(chunk.data_array.unwrap_or_default());
            chunk.next_chunk_internal_link
        });
        let mut fetched = 0;
        while let Some(link) = next.take() {
            if fetched >= MAX_RESULT_CHUNKS {
                warn!(chunks = fetched, "result truncated after chunk limit");
                break;
            }
            let chunk: ResultData = self.client.get(&link, &[]).await?;
            rows.extend(chunk.data_array.unwrap_or_default());
            next = chunk.next_chunk_internal_link;
            fetched += 1;
        }
        Ok(StatementOutcome::Rows { columns, rows })
    }

    async fn cancel_statement(&self, statement_id: &str) {
        let path = format!("{}/cancel", statement_path(statement_id));
        let outcome: Result<serde_json::Value, ToolError> = self.client.post(&path, &json!({})).await;
        if let Err(err) = outcome {
            warn!(statement_id, error = %err, "failed to cancel statement");
        }
    }
}

#[async_trait]
impl Probe for SqlWarehouse {
    async fn ping(&self) -> Result<(), ToolError> {
        self.execute(SqlStatement::new("SELECT 1"), &CancellationToken::new())
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl SqlExecutor for SqlWarehouse {
    async fn execute(
        &self,
        statement: SqlStatement,
        cancel: &CancellationToken,
    ) -> Result<StatementOutcome, ToolError> {
        let request = self.request(statement);
        let response: StatementResponse = self.client.post(SQL_STATEMENTS, &request).await?;

        let response = match statement_status(response.state())? {
            JobStatus::Completed => response,
            JobStatus::Pending | JobStatus::Running => {
                let statement_id = response
                    .statement_id
                    .clone()
                    .ok_or_else(|| ToolError::data_shape("statement response has no statement_id"))?;
                debug!(statement_id = %statement_id, "statement still running; polling");
                let progress = StatementProgress {
                    client: self.client.clone(),
                };
                match self
                    .poller
                    .await_completion(&progress, &statement_id, cancel)
                    .await
                {
                    Ok(response) => response,
                    Err(err @ (ToolError::Cancelled(_) | ToolError::Timeout { .. })) => {
                        self.cancel_statement(&statement_id).await;
                        return Err(err);
                    }
                    Err(err) => return Err(err),
                }
            }
            status => return Err(statement_failure(&response, status)),
        };

        self.collect_rows(response).await
    }
}

struct StatementProgress {
    client: DatabricksClient,
}

#[async_trait]
impl CompletionSource for StatementProgress {
    type Snapshot = StatementResponse;
    type Output = StatementResponse;

    fn operation(&self) -> &str {
        "sql statement"
    }

    async fn poll_status(&self, job_id: &str) -> Result<Observation<StatementResponse>, ToolError> {
        let response: StatementResponse = self.client.get(&statement_path(job_id), &[]).await?;
        let status = statement_status(response.state())?;
        let reason = failure_reason(&response);
        Ok(Observation::new(status, response).with_reason(reason))
    }

    async fn fetch_result(
        &self,
        _job_id: &str,
        snapshot: StatementResponse,
    ) -> Result<StatementResponse, ToolError> {
        Ok(snapshot)
    }
}

fn failure_reason(response: &StatementResponse) -> Option<String> {
    response
        .status
        .as_ref()
        .and_then(|status| status.error.as_ref())
        .and_then(|error| error.message.clone())
}

fn statement_failure(response: &StatementResponse, status: JobStatus) -> ToolError {
    let id = response.statement_id.as_deref().unwrap_or("(unknown)");
    let reason = failure_reason(response).unwrap_or_else(|| "no reason given".to_string());
    ToolError::remote_permanent(format!(
        "sql statement {id} ended with status {status}: {reason}"
    ))
}
