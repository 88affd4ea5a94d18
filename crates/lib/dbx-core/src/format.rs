use serde::Serialize;
use serde_json::Value;

use crate::error::ToolError;

/// Returned instead of an empty table.
pub const NO_RESULTS_MESSAGE: &str = "Query executed successfully. No results returned.";

const NULL_CELL: &str = "NULL";

/// Renders a Markdown pipe table: header, `---` separator, one line per row.
///
/// With no columns or no rows the fixed [`NO_RESULTS_MESSAGE`] is returned.
/// Pipe characters inside cells are escaped and line breaks flattened so every
/// record stays on one table line.
#[must_use]
pub fn format_table<C, R>(columns: &[C], rows: &[R]) -> String
where
    C: AsRef<str>,
    R: AsRef<[Value]>,
{
    if columns.is_empty() || rows.is_empty() {
        return NO_RESULTS_MESSAGE.to_string();
    }

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(table_line(columns.iter().map(|column| escape_cell(column.as_ref()))));
    lines.push(table_line(columns.iter().map(|_| "---".to_string())));
    for row in rows {
        lines.push(table_line(row.as_ref().iter().map(cell_text)));
    }
    lines.join("\n")
}

/// Compact JSON text payload; `null` renders as an empty string.
///
/// # Errors
/// Returns `Unknown` if the value cannot be serialized.
pub fn format_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ToolError> {
    let value = serde_json::to_value(value)
        .map_err(|err| ToolError::unknown(format!("failed to encode result: {err}")))?;
    if value.is_null() {
        return Ok(String::new());
    }
    serde_json::to_string(&value)
        .map_err(|err| ToolError::unknown(format!("failed to encode result: {err}")))
}

/// Textual form of one cell.
#[must_use]
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => NULL_CELL.to_string(),
        Value::String(text) => escape_cell(text),
        other => escape_cell(&other.to_string()),
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
}

fn table_line(cells: impl Iterator<Item = String>) -> String {
    let cells: Vec<String> = cells.collect();
    format!("| {} |", cells.join(" | "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_header_separator_and_rows_in_order() {
        let columns = ["name", "val"];
        let rows = vec![vec![json!("a"), json!(1)], vec![json!("b"), json!(2)]];
        let table = format_table(&columns, &rows);
        assert_eq!(
            table,
            "| name | val |\n| --- | --- |\n| a | 1 |\n| b | 2 |"
        );
        assert_eq!(table.lines().count(), 4);
    }

    #[test]
    fn zero_rows_yield_no_results_message() {
        let columns = ["name"];
        let rows: Vec<Vec<Value>> = Vec::new();
        assert_eq!(format_table(&columns, &rows), NO_RESULTS_MESSAGE);
    }

    #[test]
    fn zero_columns_yield_no_results_message() {
        let columns: [&str; 0] = [];
        let rows = vec![vec![json!(1)]];
        assert_eq!(format_table(&columns, &rows), NO_RESULTS_MESSAGE);
    }

    #[test]
    fn pipes_are_escaped_and_nulls_named() {
        let columns = ["expr"];
        let rows = vec![vec![json!("a|b")], vec![Value::Null], vec![json!("two\nlines")]];
        assert_eq!(
            format_table(&columns, &rows),
            "| expr |\n| --- |\n| a\\|b |\n| NULL |\n| two lines |"
        );
    }

    #[test]
    fn json_payloads_are_compact() {
        assert_eq!(
            format_json(&json!({"x": 1, "y": "test"})).expect("encodes"),
            r#"{"x":1,"y":"test"}"#
        );
        assert_eq!(format_json(&vec![1, 2, 3]).expect("encodes"), "[1,2,3]");
        assert_eq!(format_json(&Value::Null).expect("encodes"), "");
    }
}
