//! Catalog functions: listing, ad hoc execution and per-function tools.
//!
//! Functions run as SQL on the configured warehouse. Arguments are always
//! bound as named statement parameters, never spliced into the statement text.

use async_trait::async_trait;
use dbx_core::{
    FieldIssue,
    SqlParameter,
    SqlStatement,
    Tool,
    ToolContext,
    ToolError,
    ToolResult,
    ToolSpec,
    ValidatedArguments,
    ValidationError,
    format_table,
};
use dbx_models::endpoints::tool_name_for;
use dbx_models::{FunctionInfo, FunctionParameterInfo};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::{FunctionSource, SqlSource, ToolSettings};

/// Parameters for listing catalog functions.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListUcFunctionsParams {
    /// Catalog to list; defaults to the configured catalog.
    pub catalog: Option<String>,
    /// Schema to list; defaults to the configured schema.
    pub schema: Option<String>,
}

/// Parameters for executing a catalog function by name.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecuteUcFunctionParams {
    /// Three-part function name, `catalog.schema.function`.
    pub function_name: String,
    /// Arguments keyed by parameter name.
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

fn json_type(type_name: Option<&str>) -> &'static str {
    match type_name.map(str::to_ascii_uppercase).as_deref() {
        Some("INT" | "LONG" | "SHORT" | "BYTE") => "integer",
        Some("FLOAT" | "DOUBLE" | "DECIMAL") => "number",
        Some("BOOLEAN") => "boolean",
        Some("ARRAY") => "array",
        Some("MAP" | "STRUCT") => "object",
        _ => "string",
    }
}

/// Statement parameter types the warehouse accepts for binding.
fn bind_type(parameter: &FunctionParameterInfo) -> Option<String> {
    parameter
        .type_name
        .as_deref()
        .filter(|type_name| !matches!(*type_name, "ARRAY" | "MAP" | "STRUCT" | "TABLE_TYPE"))
        .map(str::to_string)
}

fn quote_identifier(part: &str) -> String {
    format!("`{}`", part.replace('`', "``"))
}

fn parameter_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn ordered_parameters(info: &FunctionInfo) -> Vec<&FunctionParameterInfo> {
    let mut parameters: Vec<&FunctionParameterInfo> = info.parameters().iter().collect();
    parameters.sort_by_key(|parameter| parameter.position.unwrap_or(u32::MAX));
    parameters
}

/// Input schema of a per-function tool, derived from the parameter list.
#[must_use]
pub fn function_input_schema(info: &FunctionInfo) -> Map<String, Value> {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for parameter in ordered_parameters(info) {
        let mut property = Map::new();
        property.insert(
            "type".to_string(),
            Value::from(json_type(parameter.type_name.as_deref())),
        );
        let description = parameter
            .comment
            .clone()
            .or_else(|| parameter.type_text.clone());
        if let Some(description) = description {
            property.insert("description".to_string(), Value::from(description));
        }
        if parameter.parameter_default.is_none() {
            required.push(Value::from(parameter.name.as_str()));
        }
        properties.insert(parameter.name.clone(), Value::Object(property));
    }
    let schema = json!({
        "type": "object",
        "properties": properties,
        "required": required,
    });
    match schema {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Builds the statement invoking `info` with named arguments.
///
/// Parameters with a default may be omitted. `path` prefixes field paths in
/// validation issues, e.g. `/parameters`.
///
/// # Errors
/// `Validation` for missing required or unknown arguments.
pub fn function_sql(
    info: &FunctionInfo,
    arguments: &Map<String, Value>,
    path: &str,
) -> Result<SqlStatement, ToolError> {
    let parameters = ordered_parameters(info);
    let mut issues: Vec<FieldIssue> = arguments
        .keys()
        .filter(|key| !parameters.iter().any(|parameter| &parameter.name == *key))
        .map(|key| FieldIssue::new(format!("{path}/{key}"), "unknown function parameter"))
        .collect();

    let mut bound = Vec::new();
    let mut calls = Vec::new();
    for parameter in parameters {
        match arguments.get(&parameter.name).and_then(parameter_text) {
            Some(value) => {
                calls.push(format!(
                    "{} => :{}",
                    quote_identifier(&parameter.name),
                    parameter.name
                ));
                let mut sql_parameter = SqlParameter::new(parameter.name.clone(), Some(value));
                if let Some(type_name) = bind_type(parameter) {
                    sql_parameter = sql_parameter.with_type(type_name);
                }
                bound.push(sql_parameter);
            }
            None if parameter.parameter_default.is_some() => {}
            None => issues.push(
                FieldIssue::new(
                    format!("{path}/{}", parameter.name),
                    "missing required function parameter",
                )
                .with_expected(json_type(parameter.type_name.as_deref())),
            ),
        }
    }
    if !issues.is_empty() {
        return Err(ToolError::Validation(ValidationError::new(issues)));
    }

    let function = info
        .qualified_name()
        .split('.')
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(".");
    let call = format!("{function}({})", calls.join(", "));
    let text = if info.is_table_valued() {
        format!("SELECT * FROM {call}")
    } else {
        format!("SELECT {call}")
    };
    Ok(bound
        .into_iter()
        .fold(SqlStatement::new(text), SqlStatement::with_parameter))
}

fn format_functions(catalog: &str, schema: &str, functions: &[FunctionInfo]) -> String {
    if functions.is_empty() {
        return format!("No functions found in {catalog}.{schema}.");
    }
    let rows: Vec<Vec<Value>> = functions
        .iter()
        .map(|function| {
            vec![
                Value::from(function.qualified_name()),
                function
                    .full_data_type
                    .clone()
                    .or_else(|| function.data_type.clone())
                    .map_or(Value::Null, Value::from),
                function.comment.clone().map_or(Value::Null, Value::from),
            ]
        })
        .collect();
    format_table(&["full_name", "data_type", "comment"], &rows)
}

pub struct ListUcFunctions {
    spec: ToolSpec,
    functions: FunctionSource,
    settings: ToolSettings,
}

impl ListUcFunctions {
    pub fn new(functions: FunctionSource, settings: ToolSettings) -> Self {
        Self {
            spec: ToolSpec::for_params::<ListUcFunctionsParams>(
                "list_uc_functions",
                "List catalog functions in a schema. Defaults to the configured schema.",
            ),
            functions,
            settings,
        }
    }
}

#[async_trait]
impl Tool for ListUcFunctions {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        args: ValidatedArguments,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let params: ListUcFunctionsParams = args.parse()?;
        let (catalog, schema) = self.settings.scope(params.catalog, params.schema)?;
        let catalog_api = self.functions.acquire().await?;
        let functions = catalog_api.list_functions(&catalog, &schema).await?;
        Ok(ToolResult::text(format_functions(&catalog, &schema, &functions)))
    }
}

pub struct ExecuteUcFunction {
    spec: ToolSpec,
    functions: FunctionSource,
    sql: SqlSource,
}

impl ExecuteUcFunction {
    pub fn new(functions: FunctionSource, sql: SqlSource) -> Self {
        Self {
            spec: ToolSpec::for_params::<ExecuteUcFunctionParams>(
                "execute_uc_function",
                "Execute a catalog function with named parameters and return the result as a Markdown table.",
            ),
            functions,
            sql,
        }
    }
}

#[async_trait]
impl Tool for ExecuteUcFunction {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        args: ValidatedArguments,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let params: ExecuteUcFunctionParams = args.parse()?;
        let catalog_api = self.functions.acquire().await?;
        let info = catalog_api.get_function(&params.function_name).await?;
        let statement = function_sql(&info, &params.parameters, "/parameters")?;
        let sql = self.sql.acquire().await?;
        let outcome = sql.execute(statement, ctx.cancellation()).await?;
        Ok(ToolResult::text(outcome.to_markdown()))
    }
}

/// Tool bound to one catalog function found at startup.
pub struct FunctionTool {
    spec: ToolSpec,
    info: FunctionInfo,
    sql: SqlSource,
}

impl FunctionTool {
    pub fn new(info: FunctionInfo, sql: SqlSource) -> Self {
        let full_name = info.qualified_name();
        let description = info
            .comment
            .clone()
            .filter(|comment| !comment.trim().is_empty())
            .unwrap_or_else(|| format!("Execute the catalog function {full_name}."));
        Self {
            spec: ToolSpec::new(
                tool_name_for(&full_name),
                description,
                function_input_schema(&info),
            ),
            info,
            sql,
        }
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        args: ValidatedArguments,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let statement = function_sql(&self.info, args.as_map(), "")?;
        let sql = self.sql.acquire().await?;
        let outcome = sql.execute(statement, ctx.cancellation()).await?;
        Ok(ToolResult::text(outcome.to_markdown()))
    }
}
