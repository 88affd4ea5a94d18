//! Conversational data Q&A through genie spaces.
//!
//! Messages are answered asynchronously by the remote service. The polling
//! tools hand a [`GenieMessageSource`] to the [`CompletionPoller`] and render
//! the completed message: text answer, generated query and its result table.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dbx_core::{
    CompletionPoller,
    CompletionSource,
    ContentBlock,
    GenieApi,
    JobStatus,
    Observation,
    PollPolicy,
    Tool,
    ToolContext,
    ToolError,
    ToolResult,
    ToolSpec,
    ValidatedArguments,
    format_json,
    format_table,
};
use dbx_models::GenieMessage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::GenieSource;

const SPACE_ID: &str = "space_id";

/// Maps a genie message status onto the poller's status model.
///
/// Unknown statuses are treated as still running.
#[must_use]
pub fn genie_status(status: &str) -> JobStatus {
    match status {
        "COMPLETED" => JobStatus::Completed,
        "FAILED" => JobStatus::Failed,
        "CANCELLED" => JobStatus::Cancelled,
        "QUERY_RESULT_EXPIRED" => JobStatus::Expired,
        "SUBMITTED" => JobStatus::Pending,
        _ => JobStatus::Running,
    }
}

/// Parameters for starting a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StartConversationParams {
    /// Genie space to ask.
    pub space_id: String,
    /// Natural language question.
    pub content: String,
}

/// Parameters for adding a message to a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateMessageParams {
    pub space_id: String,
    pub conversation_id: String,
    pub content: String,
}

/// Parameters addressing one message.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MessageParams {
    pub space_id: String,
    pub conversation_id: String,
    pub message_id: String,
}

/// Parameters addressing one message attachment.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AttachmentParams {
    pub space_id: String,
    pub conversation_id: String,
    pub message_id: String,
    pub attachment_id: String,
}

/// Parameters for waiting on a message.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PollParams {
    pub space_id: String,
    pub conversation_id: String,
    pub message_id: String,
    /// Fixed delay between status checks, in seconds. Capped at the server's
    /// maximum poll interval.
    pub poll_interval_secs: Option<u64>,
    /// Number of status checks before giving up. Capped at the server's budget.
    pub max_attempts: Option<u32>,
}

/// Parameters for asking a question and waiting for the answer.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AskParams {
    pub space_id: String,
    pub content: String,
    /// Continue this conversation instead of starting a new one.
    pub conversation_id: Option<String>,
}

fn spec_for<P: JsonSchema>(name: &str, description: &str, spaces: &[String]) -> ToolSpec {
    ToolSpec::for_params::<P>(name, description).with_allowed_values(SPACE_ID, spaces)
}

fn policy_override(
    base: PollPolicy,
    interval_secs: Option<u64>,
    max_attempts: Option<u32>,
) -> PollPolicy {
    let ceiling = base.max_interval.max(base.interval);
    let policy = interval_secs.map_or(base, |secs| {
        let interval = Duration::from_secs(secs.max(1)).min(ceiling);
        PollPolicy::fixed(interval, base.max_attempts)
    });
    max_attempts.map_or(policy, |max| {
        policy.with_max_attempts(max.min(base.max_attempts))
    })
}

/// Completed message plus the fetched result of its query attachment, if any.
#[derive(Debug, Clone)]
pub struct GenieAnswer {
    pub message: GenieMessage,
    pub table: Option<String>,
}

impl GenieAnswer {
    fn into_result(self) -> Result<ToolResult, ToolError> {
        let mut result = ToolResult::default();
        if let Some(text) = self.message.text_answer() {
            result = result.with_block(ContentBlock::Text(text));
        }
        if let Some(query) = self
            .message
            .query_attachment()
            .and_then(|attachment| attachment.query.as_ref())
        {
            let mut block = String::new();
            if let Some(description) = &query.description {
                block.push_str(description);
                block.push_str("\n\n");
            }
            block.push_str("```sql\n");
            block.push_str(&query.query);
            block.push_str("\n```");
            result = result.with_block(ContentBlock::Text(block));
        }
        if let Some(table) = self.table {
            result = result.with_block(ContentBlock::Text(table));
        }
        let reference = format_json(&json!({
            "conversation_id": self.message.conversation_id,
            "message_id": self.message.message_id(),
            "status": self.message.status,
        }))?;
        Ok(result.with_block(ContentBlock::Text(reference)))
    }
}

/// Reads one genie message's status and, on completion, its query result.
pub struct GenieMessageSource {
    api: Arc<dyn GenieApi>,
    space_id: String,
    conversation_id: String,
}

impl GenieMessageSource {
    pub fn new(
        api: Arc<dyn GenieApi>,
        space_id: impl Into<String>,
        conversation_id: impl Into<String>,
    ) -> Self {
        Self {
            api,
            space_id: space_id.into(),
            conversation_id: conversation_id.into(),
        }
    }
}

#[async_trait]
impl CompletionSource for GenieMessageSource {
    type Snapshot = GenieMessage;
    type Output = GenieAnswer;

    fn operation(&self) -> &str {
        "genie message"
    }

    async fn poll_status(&self, job_id: &str) -> Result<Observation<GenieMessage>, ToolError> {
        let message = self
            .api
            .get_message(&self.space_id, &self.conversation_id, job_id)
            .await?;
        let status = genie_status(&message.status);
        let reason = message.error.as_ref().and_then(|error| error.error.clone());
        Ok(Observation::new(status, message).with_reason(reason))
    }

    async fn fetch_result(
        &self,
        job_id: &str,
        snapshot: GenieMessage,
    ) -> Result<GenieAnswer, ToolError> {
        let attachment_id = snapshot
            .query_attachment()
            .and_then(|attachment| attachment.attachment_id.clone());
        let Some(attachment_id) = attachment_id else {
            return Ok(GenieAnswer {
                message: snapshot,
                table: None,
            });
        };
        debug!(message_id = job_id, attachment_id = %attachment_id, "fetching genie query result");
        let result = self
            .api
            .get_query_result(&self.space_id, &self.conversation_id, job_id, &attachment_id)
            .await?;
        let response = result.statement_response.ok_or_else(|| {
            ToolError::data_shape(format!(
                "genie query result for message {job_id} has no statement_response"
            ))
        })?;
        let columns = response.column_names();
        let rows = response
            .result
            .and_then(|chunk| chunk.data_array)
            .unwrap_or_default();
        Ok(GenieAnswer {
            message: snapshot,
            table: Some(format_table(&columns, &rows)),
        })
    }
}

async fn wait_for_answer(
    api: Arc<dyn GenieApi>,
    policy: PollPolicy,
    space_id: &str,
    conversation_id: &str,
    message_id: &str,
    ctx: &ToolContext,
) -> Result<ToolResult, ToolError> {
    let source = GenieMessageSource::new(api, space_id, conversation_id);
    CompletionPoller::new(policy)
        .await_completion(&source, message_id, ctx.cancellation())
        .await?
        .into_result()
}

pub struct StartConversation {
    spec: ToolSpec,
    genie: GenieSource,
}

impl StartConversation {
    pub fn new(genie: GenieSource, spaces: &[String]) -> Self {
        Self {
            spec: spec_for::<StartConversationParams>(
                "genie_start_conversation",
                "Start a new conversation in a genie space. Returns the conversation and message ids.",
                spaces,
            ),
            genie,
        }
    }
}

#[async_trait]
impl Tool for StartConversation {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        args: ValidatedArguments,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let params: StartConversationParams = args.parse()?;
        let genie = self.genie.acquire().await?;
        let started = genie
            .start_conversation(&params.space_id, &params.content)
            .await?;
        ToolResult::json(&started)
    }
}

pub struct CreateMessage {
    spec: ToolSpec,
    genie: GenieSource,
}

impl CreateMessage {
    pub fn new(genie: GenieSource, spaces: &[String]) -> Self {
        Self {
            spec: spec_for::<CreateMessageParams>(
                "genie_create_message",
                "Ask a follow-up question in an existing genie conversation.",
                spaces,
            ),
            genie,
        }
    }
}

#[async_trait]
impl Tool for CreateMessage {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        args: ValidatedArguments,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let params: CreateMessageParams = args.parse()?;
        let genie = self.genie.acquire().await?;
        let message = genie
            .create_message(&params.space_id, &params.conversation_id, &params.content)
            .await?;
        ToolResult::json(&message)
    }
}

pub struct GetMessage {
    spec: ToolSpec,
    genie: GenieSource,
}

impl GetMessage {
    pub fn new(genie: GenieSource, spaces: &[String]) -> Self {
        Self {
            spec: spec_for::<MessageParams>(
                "genie_get_message",
                "Get the current state of a genie message.",
                spaces,
            ),
            genie,
        }
    }
}

#[async_trait]
impl Tool for GetMessage {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        args: ValidatedArguments,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let params: MessageParams = args.parse()?;
        let genie = self.genie.acquire().await?;
        let message = genie
            .get_message(&params.space_id, &params.conversation_id, &params.message_id)
            .await?;
        ToolResult::json(&message)
    }
}

pub struct GenerateDownload {
    spec: ToolSpec,
    genie: GenieSource,
}

impl GenerateDownload {
    pub fn new(genie: GenieSource, spaces: &[String]) -> Self {
        Self {
            spec: spec_for::<AttachmentParams>(
                "genie_generate_download",
                "Request a downloadable export of a genie query result.",
                spaces,
            ),
            genie,
        }
    }
}

#[async_trait]
impl Tool for GenerateDownload {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        args: ValidatedArguments,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let params: AttachmentParams = args.parse()?;
        let genie = self.genie.acquire().await?;
        let download = genie
            .generate_download(
                &params.space_id,
                &params.conversation_id,
                &params.message_id,
                &params.attachment_id,
            )
            .await?;
        let text = format_json(&download)?;
        let uri = format!(
            "genie://spaces/{}/conversations/{}/messages/{}/attachments/{}/downloads/{}",
            params.space_id,
            params.conversation_id,
            params.message_id,
            params.attachment_id,
            download.download_id
        );
        Ok(ToolResult::default()
            .with_block(ContentBlock::Resource {
                uri,
                mime_type: Some("application/json".to_string()),
                text: text.clone(),
            })
            .with_block(ContentBlock::Text(text)))
    }
}

pub struct PollUntilComplete {
    spec: ToolSpec,
    genie: GenieSource,
    policy: PollPolicy,
}

impl PollUntilComplete {
    pub fn new(genie: GenieSource, spaces: &[String], policy: PollPolicy) -> Self {
        Self {
            spec: spec_for::<PollParams>(
                "genie_poll_until_complete",
                "Wait for a genie message to finish and return its answer, generated SQL and result table.",
                spaces,
            ),
            genie,
            policy,
        }
    }
}

#[async_trait]
impl Tool for PollUntilComplete {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        args: ValidatedArguments,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let params: PollParams = args.parse()?;
        let policy = policy_override(self.policy, params.poll_interval_secs, params.max_attempts);
        let genie = self.genie.acquire().await?;
        wait_for_answer(
            genie,
            policy,
            &params.space_id,
            &params.conversation_id,
            &params.message_id,
            ctx,
        )
        .await
    }
}

pub struct Ask {
    spec: ToolSpec,
    genie: GenieSource,
    policy: PollPolicy,
}

impl Ask {
    pub fn new(genie: GenieSource, spaces: &[String], policy: PollPolicy) -> Self {
        Self {
            spec: spec_for::<AskParams>(
                "genie_ask",
                "Ask a genie space a question and wait for the answer. Pass conversation_id to continue a conversation.",
                spaces,
            ),
            genie,
            policy,
        }
    }
}

#[async_trait]
impl Tool for Ask {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        args: ValidatedArguments,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let params: AskParams = args.parse()?;
        let genie = self.genie.acquire().await?;
        let (conversation_id, message_id) = match params.conversation_id {
            Some(conversation_id) => {
                let message = genie
                    .create_message(&params.space_id, &conversation_id, &params.content)
                    .await?;
                (conversation_id, message.message_id().to_string())
            }
            None => {
                let started = genie
                    .start_conversation(&params.space_id, &params.content)
                    .await?;
                (started.conversation_id, started.message_id)
            }
        };
        wait_for_answer(
            genie,
            self.policy,
            &params.space_id,
            &conversation_id,
            &message_id,
            ctx,
        )
        .await
    }
}
