use async_trait::async_trait;
use dbx_core::{Tool, ToolContext, ToolError, ToolResult, ToolSpec, ValidatedArguments};
use dbx_models::{VectorQueryRequest, VectorQueryResponse};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::VectorSearchSource;

const DEFAULT_NUM_RESULTS: u32 = 5;

/// Parameters for querying any vector search index.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VectorSearchParams {
    /// Three-part index name, `catalog.schema.index`.
    pub index_name: String,
    /// Text to search for.
    pub query: String,
    /// Columns to return; defaults to the index's key and text columns.
    pub columns: Option<Vec<String>>,
    /// Number of matches to return.
    pub num_results: Option<u32>,
}

/// Parameters for querying a discovered index.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IndexQueryParams {
    /// Text to search for.
    pub query: String,
    /// Number of matches to return.
    pub num_results: Option<u32>,
}

/// Converts a query response into one JSON object per match.
///
/// Every row must carry exactly one cell per manifest column.
fn matches_as_objects(
    response: VectorQueryResponse,
) -> Result<Vec<Map<String, Value>>, ToolError> {
    let columns: Vec<String> = response
        .manifest
        .map(|manifest| manifest.columns.into_iter().map(|column| column.name).collect())
        .unwrap_or_default();
    response
        .result
        .and_then(|chunk| chunk.data_array)
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, row)| {
            if row.len() == columns.len() {
                Ok(columns.iter().cloned().zip(row).collect())
            } else {
                Err(ToolError::data_shape(format!(
                    "vector search row {index} has {} cells but the manifest lists {} columns",
                    row.len(),
                    columns.len()
                )))
            }
        })
        .collect()
}

async fn query(
    source: &VectorSearchSource,
    index_name: &str,
    text: String,
    columns: Option<Vec<String>>,
    num_results: Option<u32>,
) -> Result<ToolResult, ToolError> {
    let client = source.acquire().await?;
    let columns = match columns.filter(|columns| !columns.is_empty()) {
        Some(columns) => columns,
        None => client.describe_index(index_name).await?.default_columns(),
    };
    if columns.is_empty() {
        return Err(ToolError::data_shape(format!(
            "vector index {index_name} declares no primary key or text columns"
        )));
    }
    let request = VectorQueryRequest {
        query_text: text,
        columns,
        num_results: num_results.unwrap_or(DEFAULT_NUM_RESULTS).max(1),
    };
    let response = client.query_index(index_name, request).await?;
    ToolResult::json(&matches_as_objects(response)?)
}

pub struct VectorSearch {
    spec: ToolSpec,
    client: VectorSearchSource,
}

impl VectorSearch {
    pub fn new(client: VectorSearchSource) -> Self {
        Self {
            spec: ToolSpec::for_params::<VectorSearchParams>(
                "vector_search",
                "Run a similarity search against a vector search index and return the matching rows as JSON.",
            ),
            client,
        }
    }
}

#[async_trait]
impl Tool for VectorSearch {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        args: ValidatedArguments,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let params: VectorSearchParams = args.parse()?;
        query(
            &self.client,
            &params.index_name,
            params.query,
            params.columns,
            params.num_results,
        )
        .await
    }
}

/// Search tool bound to one index found at startup.
pub struct IndexSearch {
    spec: ToolSpec,
    index_name: String,
    client: VectorSearchSource,
}

impl IndexSearch {
    pub fn new(name: String, index_name: String, client: VectorSearchSource) -> Self {
        let description = format!(
            "Similarity search over the vector search index {index_name}. Returns matching rows as JSON."
        );
        Self {
            spec: ToolSpec::for_params::<IndexQueryParams>(name, description),
            index_name,
            client,
        }
    }
}

#[async_trait]
impl Tool for IndexSearch {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        args: ValidatedArguments,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let params: IndexQueryParams = args.parse()?;
        query(
            &self.client,
            &self.index_name,
            params.query,
            None,
            params.num_results,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn matches_pair_cells_with_manifest_columns() {
        let response: VectorQueryResponse = serde_json::from_value(json!({
            "manifest": {"column_count": 3, "columns": [
                {"name": "id"}, {"name": "chunk"}, {"name": "score"}
            ]},
            "result": {"row_count": 1, "data_array": [[7, "refund policy", 0.91]]}
        }))
        .expect("response should parse");
        let matches = matches_as_objects(response).expect("widths match");
        assert_eq!(matches.len(), 1);
        assert_eq!(
            Value::Object(matches[0].clone()),
            json!({"id": 7, "chunk": "refund policy", "score": 0.91})
        );
    }

    #[test]
    fn empty_response_has_no_matches() {
        let matches = matches_as_objects(VectorQueryResponse::default()).expect("no rows");
        assert!(matches.is_empty());
    }

    #[test]
    fn row_width_must_match_manifest() {
        let response: VectorQueryResponse = serde_json::from_value(json!({
            "manifest": {"column_count": 2, "columns": [{"name": "id"}, {"name": "chunk"}]},
            "result": {"row_count": 2, "data_array": [[1, "ok"], [2, "extra", 0.5]]}
        }))
        .expect("response should parse");

        let err = matches_as_objects(response).expect_err("width mismatch");
        assert_eq!(
            err.to_string(),
            "vector search row 1 has 3 cells but the manifest lists 2 columns"
        );
        assert!(matches!(err, ToolError::DataShape(_)));
    }
}
