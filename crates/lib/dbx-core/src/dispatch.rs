use serde_json::{Map, Value};
use tracing::{Instrument, debug, info_span};

use crate::error::{Redactor, ToolError};
use crate::normalize::Normalizer;
use crate::registry::ToolRegistry;
use crate::tool::{ToolContext, ToolResult, ToolSpec};
use crate::validate::{ValidationMode, validate};

/// Routes list and call requests through a read-only registry.
///
/// The dispatcher holds no mutable state, so one instance is shared by every
/// session and every in-flight call.
pub struct Dispatcher {
    registry: ToolRegistry,
    mode: ValidationMode,
    normalizer: Normalizer,
}

impl Dispatcher {
    #[must_use]
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            mode: ValidationMode::default(),
            normalizer: Normalizer::default(),
        }
    }

    #[must_use]
    pub const fn with_validation_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_redactor(mut self, redactor: Redactor) -> Self {
        self.normalizer = Normalizer::new(redactor);
        self
    }

    #[must_use]
    pub const fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Every registered spec in registry order. Never fails.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolSpec> {
        self.registry.specs().cloned().collect()
    }

    /// Looks up, validates and executes a tool.
    ///
    /// Unknown names, invalid arguments and execution failures all come back as
    /// error-marked results; nothing here fails the session.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
        ctx: &ToolContext,
    ) -> ToolResult {
        let span = info_span!("tool_call", tool = %name);
        async {
            let Some(tool) = self.registry.get(name) else {
                return self
                    .normalizer
                    .classify(name, &ToolError::NotFound(name.to_string()));
            };

            let args = match validate(tool.spec().input_schema(), arguments, self.mode) {
                Ok(args) => args,
                Err(err) => {
                    return self.normalizer.classify(name, &ToolError::Validation(err));
                }
            };

            debug!("executing tool");
            self.normalizer.run(name, tool.execute(args, ctx)).await
        }
        .instrument(span)
        .await
    }
}
