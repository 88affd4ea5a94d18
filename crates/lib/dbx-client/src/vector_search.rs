use async_trait::async_trait;
use dbx_core::{ToolError, VectorSearchApi};
use dbx_models::endpoints::{vector_index_path, vector_index_query_path};
use dbx_models::{VectorIndexInfo, VectorQueryRequest, VectorQueryResponse};

use crate::client::DatabricksClient;

#[async_trait]
impl VectorSearchApi for DatabricksClient {
    async fn describe_index(&self, index_name: &str) -> Result<VectorIndexInfo, ToolError> {
        self.get(&vector_index_path(index_name), &[]).await
    }

    async fn query_index(
        &self,
        index_name: &str,
        request: VectorQueryRequest,
    ) -> Result<VectorQueryResponse, ToolError> {
        self.post(&vector_index_query_path(index_name), &request).await
    }
}
