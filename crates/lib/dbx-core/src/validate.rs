//! Structural validation of caller arguments against a tool's input schema.
//!
//! Validation runs in three passes: lenient coercion of scalar strings for
//! top-level fields, presence and unknown-field checks, then full JSON Schema
//! evaluation. It performs no I/O.

use serde_json::{Map, Value};

use crate::error::{FieldIssue, ValidationError};
use crate::tool::ValidatedArguments;

/// How unknown top-level fields are treated. Applies uniformly to every tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Unknown fields are rejected.
    #[default]
    Strict,
    /// Unknown fields are dropped before execution.
    Lenient,
}

/// Validates raw call arguments against `schema`.
///
/// # Errors
/// Returns a [`ValidationError`] naming every offending field path.
pub fn validate(
    schema: &Map<String, Value>,
    raw_arguments: Option<Map<String, Value>>,
    mode: ValidationMode,
) -> Result<ValidatedArguments, ValidationError> {
    let mut arguments = raw_arguments.unwrap_or_default();
    let properties = schema.get("properties").and_then(Value::as_object);

    let mut issues = Vec::new();

    if let Some(properties) = properties {
        if !accepts_additional(schema) {
            let unknown: Vec<String> = arguments
                .keys()
                .filter(|key| !properties.contains_key(key.as_str()))
                .cloned()
                .collect();
            for key in unknown {
                match mode {
                    ValidationMode::Strict => {
                        issues.push(FieldIssue::new(pointer(&key), "unknown field"));
                    }
                    ValidationMode::Lenient => {
                        arguments.remove(&key);
                    }
                }
            }
        }

        for (key, value) in &mut arguments {
            if let Some(property) = properties.get(key).and_then(Value::as_object) {
                coerce_scalar(property, value);
            }
        }
    }

    for name in required_fields(schema) {
        let missing = arguments.get(name).is_none_or(Value::is_null);
        if missing {
            let mut issue = FieldIssue::new(pointer(name), "missing required field");
            if let Some(expected) = expected_type(properties, name) {
                issue = issue.with_expected(expected);
            }
            issues.push(issue);
        }
    }

    if !issues.is_empty() {
        return Err(ValidationError::new(issues));
    }

    let schema_value = Value::Object(schema.clone());
    let validator = jsonschema::validator_for(&schema_value).map_err(|err| {
        ValidationError::single(FieldIssue::new(
            "/",
            format!("tool input schema is invalid: {err}"),
        ))
    })?;

    let instance = Value::Object(arguments);
    let issues: Vec<FieldIssue> = validator
        .iter_errors(&instance)
        .map(|err| {
            let path = err.instance_path.to_string();
            let path = if path.is_empty() { "/".to_string() } else { path };
            let field = path.trim_start_matches('/').split('/').next().unwrap_or_default();
            let mut issue = FieldIssue::new(path.clone(), err.to_string());
            if let Some(expected) = expected_type(properties, field) {
                issue = issue.with_expected(expected);
            }
            issue
        })
        .collect();

    if !issues.is_empty() {
        return Err(ValidationError::new(issues));
    }

    match instance {
        Value::Object(arguments) => Ok(ValidatedArguments::new(arguments)),
        _ => Err(ValidationError::single(FieldIssue::new(
            "/",
            "arguments must be an object",
        ))),
    }
}

fn pointer(field: &str) -> String {
    format!("/{field}")
}

fn accepts_additional(schema: &Map<String, Value>) -> bool {
    match schema.get("additionalProperties") {
        Some(Value::Bool(allowed)) => *allowed,
        Some(Value::Object(_)) => true,
        _ => false,
    }
}

fn required_fields(schema: &Map<String, Value>) -> impl Iterator<Item = &str> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

fn declared_types(property: &Map<String, Value>) -> Vec<&str> {
    match property.get("type") {
        Some(Value::String(kind)) => vec![kind.as_str()],
        Some(Value::Array(kinds)) => kinds
            .iter()
            .filter_map(Value::as_str)
            .filter(|kind| *kind != "null")
            .collect(),
        _ => Vec::new(),
    }
}

fn expected_type(properties: Option<&Map<String, Value>>, field: &str) -> Option<String> {
    let property = properties?.get(field)?.as_object()?;
    if let Some(options) = property.get("enum").and_then(Value::as_array) {
        let options: Vec<String> = options.iter().map(Value::to_string).collect();
        return Some(format!("one of {}", options.join(", ")));
    }
    let kinds = declared_types(property);
    if kinds.is_empty() {
        None
    } else {
        Some(kinds.join(" or "))
    }
}

/// Converts string-encoded scalars when the schema expects a number or boolean.
fn coerce_scalar(property: &Map<String, Value>, value: &mut Value) {
    let Value::String(text) = value else {
        return;
    };
    let kinds = declared_types(property);
    if kinds.contains(&"string") {
        return;
    }
    let text = text.trim();
    let coerced = if kinds.contains(&"integer") {
        text.parse::<i64>().ok().map(Value::from)
    } else if kinds.contains(&"number") {
        text.parse::<f64>().ok().map(Value::from)
    } else if kinds.contains(&"boolean") {
        text.parse::<bool>().ok().map(Value::from)
    } else {
        None
    };
    if let Some(coerced) = coerced {
        *value = coerced;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Map<String, Value> {
        json!({
            "type": "object",
            "properties": {
                "job_id": {"type": "integer"},
                "limit": {"type": ["integer", "null"]},
                "space_id": {"type": "string", "enum": ["s1", "s2"]}
            },
            "required": ["job_id"]
        })
        .as_object()
        .cloned()
        .expect("object schema")
    }

    fn args(value: Value) -> Option<Map<String, Value>> {
        value.as_object().cloned()
    }

    #[test]
    fn missing_required_field_is_named() {
        let err = validate(&schema(), args(json!({"limit": 5})), ValidationMode::Strict)
            .expect_err("job_id is required");
        assert_eq!(err.paths(), vec!["/job_id"]);
        assert_eq!(err.issues[0].expected.as_deref(), Some("integer"));
    }

    #[test]
    fn absent_arguments_fail_required_check() {
        let err = validate(&schema(), None, ValidationMode::Strict).expect_err("no arguments");
        assert_eq!(err.paths(), vec!["/job_id"]);
    }

    #[test]
    fn unknown_fields_rejected_in_strict_mode() {
        let err = validate(
            &schema(),
            args(json!({"job_id": 1, "verbose": true})),
            ValidationMode::Strict,
        )
        .expect_err("verbose is unknown");
        assert_eq!(err.paths(), vec!["/verbose"]);
    }

    #[test]
    fn unknown_fields_dropped_in_lenient_mode() {
        let validated = validate(
            &schema(),
            args(json!({"job_id": 1, "verbose": true})),
            ValidationMode::Lenient,
        )
        .expect("lenient mode accepts");
        assert!(validated.get("verbose").is_none());
        assert_eq!(validated.get("job_id"), Some(&json!(1)));
    }

    #[test]
    fn numeric_strings_are_coerced() {
        let validated = validate(&schema(), args(json!({"job_id": "42"})), ValidationMode::Strict)
            .expect("coercible");
        assert_eq!(validated.get("job_id"), Some(&json!(42)));
    }

    #[test]
    fn wrong_type_reports_path_and_expected_type() {
        let err = validate(
            &schema(),
            args(json!({"job_id": "forty-two"})),
            ValidationMode::Strict,
        )
        .expect_err("not an integer");
        assert_eq!(err.paths(), vec!["/job_id"]);
        assert_eq!(err.issues[0].expected.as_deref(), Some("integer"));
    }

    #[test]
    fn enum_violations_are_rejected() {
        let err = validate(
            &schema(),
            args(json!({"job_id": 1, "space_id": "other"})),
            ValidationMode::Strict,
        )
        .expect_err("space not allowed");
        assert_eq!(err.paths(), vec!["/space_id"]);
        assert!(err.issues[0]
            .expected
            .as_deref()
            .is_some_and(|expected| expected.starts_with("one of")));
    }

    #[test]
    fn explicit_null_counts_as_missing() {
        let err = validate(&schema(), args(json!({"job_id": null})), ValidationMode::Strict)
            .expect_err("null job_id");
        assert_eq!(err.paths(), vec!["/job_id"]);
    }
}
