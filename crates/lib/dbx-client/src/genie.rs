use async_trait::async_trait;
use dbx_core::{GenieApi, ToolError};
use dbx_models::endpoints::{
    genie_downloads_path,
    genie_message_path,
    genie_messages_path,
    genie_query_result_path,
    genie_start_conversation_path,
};
use dbx_models::{
    GenieDownload,
    GenieMessage,
    GenieQueryResult,
    GenieStartConversation,
};
use serde_json::json;

use crate::client::DatabricksClient;

#[async_trait]
impl GenieApi for DatabricksClient {
    async fn start_conversation(
        &self,
        space_id: &str,
        content: &str,
    ) -> Result<GenieStartConversation, ToolError> {
        self.post(
            &genie_start_conversation_path(space_id),
            &json!({ "content": content }),
        )
        .await
    }

    async fn create_message(
        &self,
        space_id: &str,
        conversation_id: &str,
        content: &str,
    ) -> Result<GenieMessage, ToolError> {
        self.post(
            &genie_messages_path(space_id, conversation_id),
            &json!({ "content": content }),
        )
        .await
    }

    async fn get_message(
        &self,
        space_id: &str,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<GenieMessage, ToolError> {
        self.get(&genie_message_path(space_id, conversation_id, message_id), &[])
            .await
    }

    async fn get_query_result(
        &self,
        space_id: &str,
        conversation_id: &str,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<GenieQueryResult, ToolError> {
        self.get(
            &genie_query_result_path(space_id, conversation_id, message_id, attachment_id),
            &[],
        )
        .await
    }

    async fn generate_download(
        &self,
        space_id: &str,
        conversation_id: &str,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<GenieDownload, ToolError> {
        self.post(
            &genie_downloads_path(space_id, conversation_id, message_id, attachment_id),
            &json!({}),
        )
        .await
    }
}
