use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::error::{Redactor, RetryClass, ToolError};
use crate::tool::ToolResult;

/// Turns every failure raised by a tool into an error-marked [`ToolResult`].
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    redactor: Redactor,
}

impl Normalizer {
    #[must_use]
    pub const fn new(redactor: Redactor) -> Self {
        Self { redactor }
    }

    #[must_use]
    pub const fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    /// Awaits a tool execution, classifying errors and panics.
    pub async fn run<F>(&self, tool: &str, execution: F) -> ToolResult
    where
        F: Future<Output = Result<ToolResult, ToolError>>,
    {
        let outcome = AssertUnwindSafe(execution).catch_unwind().await;
        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => self.classify(tool, &err),
            Err(panic) => {
                let err = ToolError::unknown(format!(
                    "tool panicked: {}",
                    panic_message(panic.as_ref())
                ));
                self.classify(tool, &err)
            }
        }
    }

    /// Logs a classified failure and renders it as tool output.
    #[must_use]
    pub fn classify(&self, tool: &str, err: &ToolError) -> ToolResult {
        let rendered = err.render(&self.redactor);
        let kind = err.kind().label();
        match err {
            ToolError::Configuration(_) => {
                error!(tool, kind, error = %rendered, "tool cannot run until configuration is fixed");
            }
            ToolError::RemoteService { retry, status, .. } => {
                let retryable = *retry == RetryClass::Transient;
                warn!(tool, kind, status = ?status, retryable, error = %rendered, "remote service call failed");
            }
            ToolError::DataShape(_) | ToolError::Unknown(_) => {
                error!(tool, kind, error = %rendered, "tool failed");
            }
            ToolError::Timeout { .. } => {
                warn!(tool, kind, error = %rendered, "tool timed out");
            }
            ToolError::Validation(_) | ToolError::NotFound(_) => {
                info!(tool, kind, error = %rendered, "rejected tool call");
            }
            ToolError::Cancelled(_) => {
                debug!(tool, kind, "tool call cancelled");
            }
        }
        ToolResult::error(rendered)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn success_passes_through() {
        let normalizer = Normalizer::default();
        let result = normalizer
            .run("ok", async { Ok(ToolResult::text("fine")) })
            .await;
        assert!(!result.is_error);
        assert_eq!(result.first_text(), Some("fine"));
    }

    #[tokio::test]
    async fn configuration_errors_are_surfaced_with_prefix() {
        let normalizer = Normalizer::default();
        let result = normalizer
            .run("sql", async {
                Err(ToolError::configuration("missing required setting: DATABRICKS_HOST"))
            })
            .await;
        assert!(result.is_error);
        assert_eq!(
            result.first_text(),
            Some("ConfigurationError: missing required setting: DATABRICKS_HOST")
        );
    }

    #[tokio::test]
    async fn panics_become_unknown_errors() {
        let normalizer = Normalizer::default();
        let result = normalizer
            .run("boom", async {
                let values: Vec<u8> = Vec::new();
                if values.is_empty() {
                    panic!("index out of range");
                }
                Ok(ToolResult::text("unreachable"))
            })
            .await;
        assert!(result.is_error);
        assert_eq!(
            result.first_text(),
            Some("UnknownError: tool panicked: index out of range")
        );
    }

    #[tokio::test]
    async fn secrets_never_reach_output() {
        let normalizer = Normalizer::new(Redactor::new(["s3cr3t-token"]));
        let result = normalizer
            .run("api", async {
                Err(ToolError::remote_status(401, "token s3cr3t-token is invalid"))
            })
            .await;
        let text = result.first_text().unwrap_or_default();
        assert!(!text.contains("s3cr3t-token"));
        assert!(text.starts_with("RemoteServiceError: (permanent, status 401)"));
    }
}
