use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::error::{FieldIssue, ToolError, ValidationError};

/// Identity record of a tool: name, description and accepted arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    name: String,
    description: String,
    input_schema: Map<String, Value>,
}

impl ToolSpec {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Map<String, Value>,
    ) -> Self {
        let mut input_schema = input_schema;
        input_schema
            .entry("type")
            .or_insert_with(|| Value::String("object".to_string()));
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Builds a spec whose input schema is derived from a parameter type.
    #[must_use]
    pub fn for_params<P: JsonSchema>(
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let schema = schemars::schema_for!(P);
        let input_schema = match serde_json::to_value(schema) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        Self::new(name, description, input_schema)
    }

    /// Restricts a top-level property to a fixed set of values. No-op when `values` is empty.
    #[must_use]
    pub fn with_allowed_values(mut self, property: &str, values: &[String]) -> Self {
        if values.is_empty() {
            return self;
        }
        if let Some(Value::Object(schema)) = self
            .input_schema
            .get_mut("properties")
            .and_then(|properties| properties.get_mut(property))
        {
            schema.insert(
                "enum".to_string(),
                Value::Array(values.iter().cloned().map(Value::String).collect()),
            );
        }
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub const fn input_schema(&self) -> &Map<String, Value> {
        &self.input_schema
    }
}

/// One typed block of tool output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    Text(String),
    /// Reference to structured content held by the remote platform.
    Resource {
        uri: String,
        mime_type: Option<String>,
        text: String,
    },
}

/// Ordered tool output plus an error marker for classified failures.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolResult {
    pub content: Vec<ContentBlock>,
    pub is_error: bool,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text(text.into())],
            is_error: false,
        }
    }

    /// Compact JSON text payload.
    ///
    /// # Errors
    /// `Unknown` when the value cannot be encoded.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ToolError> {
        let text = serde_json::to_string(value)
            .map_err(|err| ToolError::unknown(format!("failed to encode result: {err}")))?;
        Ok(Self::text(text))
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text(text.into())],
            is_error: true,
        }
    }

    #[must_use]
    pub fn with_block(mut self, block: ContentBlock) -> Self {
        self.content.push(block);
        self
    }

    /// Text of the first text block, if any.
    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text(text) => Some(text.as_str()),
            ContentBlock::Resource { .. } => None,
        })
    }
}

/// Per-call context handed to tools.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    cancel: CancellationToken,
}

impl ToolContext {
    #[must_use]
    pub const fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Token cancelled when the owning request is abandoned.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Arguments that passed schema validation. Only the validator constructs these.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidatedArguments(Map<String, Value>);

impl ValidatedArguments {
    pub(crate) const fn new(arguments: Map<String, Value>) -> Self {
        Self(arguments)
    }

    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    /// Deserializes the arguments into a typed parameter struct.
    ///
    /// # Errors
    /// `Validation` when the arguments do not fit `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ToolError> {
        serde_json::from_value(Value::Object(self.0.clone())).map_err(|err| {
            ToolError::Validation(ValidationError::single(FieldIssue::new(
                "/",
                err.to_string(),
            )))
        })
    }
}

/// A named, schema-described unit of remote-delegated work.
///
/// Implementations obtain their remote clients lazily inside [`Tool::execute`],
/// so constructing a tool never needs live credentials.
#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> &ToolSpec;

    /// Runs the tool with arguments already validated against [`ToolSpec::input_schema`].
    ///
    /// # Errors
    /// Any [`ToolError`]; the dispatcher renders it as an error result.
    async fn execute(
        &self,
        args: ValidatedArguments,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError>;
}
