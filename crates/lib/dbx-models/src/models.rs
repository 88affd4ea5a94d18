use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error envelope returned by the remote API on non-success responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Page of jobs returned by the jobs list endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobList {
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Job definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub job_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<JobSettings>,
}

impl Job {
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.settings.as_ref().and_then(|settings| settings.name.as_deref())
    }
}

/// User-editable settings of a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<JobTask>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One task within a job. Task payloads vary by kind and are kept verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobTask {
    pub task_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobTask {
    /// Returns the task kind derived from its `*_task` payload key, e.g. `notebook`.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.extra
            .keys()
            .find_map(|key| key.strip_suffix("_task"))
    }
}

/// Page of job runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunList {
    #[serde(default)]
    pub runs: Vec<JobRun>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// A single execution of a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobRun {
    pub run_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<RunState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_duration: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub life_cycle_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_message: Option<String>,
}

/// Identity of the caller as reported by the SCIM `Me` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(
        rename = "displayName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableList {
    #[serde(default)]
    pub tables: Vec<TableInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Catalog table metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, String>,
}

impl TableInfo {
    /// Returns the three-part name, falling back to joining the parts.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        if let Some(full_name) = &self.full_name {
            return full_name.clone();
        }
        [
            self.catalog_name.as_deref(),
            self.schema_name.as_deref(),
            Some(self.name.as_str()),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(".")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionList {
    #[serde(default)]
    pub functions: Vec<FunctionInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Catalog function metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_params: Option<FunctionParameterInfos>,
}

impl FunctionInfo {
    #[must_use]
    pub fn qualified_name(&self) -> String {
        if let Some(full_name) = &self.full_name {
            return full_name.clone();
        }
        [
            self.catalog_name.as_deref(),
            self.schema_name.as_deref(),
            Some(self.name.as_str()),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(".")
    }

    #[must_use]
    pub fn parameters(&self) -> &[FunctionParameterInfo] {
        self.input_params
            .as_ref()
            .map_or(&[], |params| params.parameters.as_slice())
    }

    /// Table-valued functions are selected `FROM`, scalar functions are projected.
    #[must_use]
    pub fn is_table_valued(&self) -> bool {
        self.data_type.as_deref() == Some("TABLE_TYPE")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionParameterInfos {
    #[serde(default)]
    pub parameters: Vec<FunctionParameterInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionParameterInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_default: Option<String>,
}

/// Request body for the SQL statement execution endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatementRequest {
    pub statement: String,
    pub warehouse_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<StatementParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub wait_timeout: String,
    pub on_wait_timeout: String,
    pub format: String,
    pub disposition: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatementParameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

/// Response of the SQL statement execution endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatementResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatementStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<ResultManifest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultData>,
}

impl StatementResponse {
    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.status.as_ref().and_then(|status| status.state.as_deref())
    }

    /// Column names of the result set, if the statement produced one.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.manifest
            .as_ref()
            .and_then(|manifest| manifest.schema.as_ref())
            .map(|schema| schema.columns.iter().map(|column| column.name.clone()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatementStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<ResultSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_row_count: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultSchema {
    #[serde(default)]
    pub column_count: usize,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

/// Inline result chunk. Cells are JSON values (strings for SQL, typed for vector search).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResultData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_array: Option<Vec<Vec<Value>>>,
    /// Relative link to the next chunk of a large inline result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_chunk_internal_link: Option<String>,
}

/// Message returned by the conversational API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenieMessage {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub conversation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,
    #[serde(default)]
    pub content: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<GenieAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<GenieError>,
}

impl GenieMessage {
    #[must_use]
    pub fn message_id(&self) -> &str {
        self.message_id.as_deref().unwrap_or(&self.id)
    }

    /// First attachment carrying a generated query.
    #[must_use]
    pub fn query_attachment(&self) -> Option<&GenieAttachment> {
        self.attachments
            .iter()
            .find(|attachment| attachment.query.is_some())
    }

    /// Concatenated text answers across attachments.
    #[must_use]
    pub fn text_answer(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .attachments
            .iter()
            .filter_map(|attachment| attachment.text.as_ref())
            .map(|text| text.content.as_str())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenieAttachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<GenieTextAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<GenieQueryAttachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenieTextAttachment {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenieQueryAttachment {
    #[serde(default)]
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenieError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Response of the start-conversation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenieStartConversation {
    pub conversation_id: String,
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<GenieMessage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GenieQueryResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_response: Option<StatementResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenieDownload {
    pub download_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Request body for querying a vector search index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VectorQueryRequest {
    pub query_text: String,
    pub columns: Vec<String>,
    pub num_results: u32,
}

/// Response of a vector search query; the result reuses the statement chunk shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VectorQueryResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<ResultSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultData>,
}

/// Vector search index definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VectorIndexInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_sync_index_spec: Option<VectorIndexSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_access_index_spec: Option<VectorIndexSpec>,
}

impl VectorIndexInfo {
    /// Primary key followed by the embedded text columns.
    #[must_use]
    pub fn default_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self.primary_key.iter().cloned().collect();
        let spec = self
            .delta_sync_index_spec
            .as_ref()
            .or(self.direct_access_index_spec.as_ref());
        if let Some(spec) = spec {
            for column in &spec.embedding_source_columns {
                if !columns.contains(&column.name) {
                    columns.push(column.name.clone());
                }
            }
        }
        columns
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VectorIndexSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding_source_columns: Vec<EmbeddingSourceColumn>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbeddingSourceColumn {
    pub name: String,
}
