pub const JOBS_LIST: &str = "/api/2.1/jobs/list";
pub const JOBS_GET: &str = "/api/2.1/jobs/get";
pub const JOBS_RUNS_LIST: &str = "/api/2.1/jobs/runs/list";
pub const CURRENT_USER: &str = "/api/2.0/preview/scim/v2/Me";
pub const UC_TABLES: &str = "/api/2.1/unity-catalog/tables";
pub const UC_FUNCTIONS: &str = "/api/2.1/unity-catalog/functions";
pub const SQL_STATEMENTS: &str = "/api/2.0/sql/statements";

pub const GENIE_SPACES: &str = "/api/2.0/genie/spaces";
pub const VECTOR_SEARCH_INDEXES: &str = "/api/2.0/vector-search/indexes";

/// Table property that marks a table as backing a vector search index.
pub const VECTOR_INDEX_PROPERTY: &str = "model_endpoint_url";

pub fn statement_path(statement_id: &str) -> String {
    format!("{SQL_STATEMENTS}/{statement_id}")
}

pub fn genie_start_conversation_path(space_id: &str) -> String {
    format!("{GENIE_SPACES}/{space_id}/start-conversation")
}

pub fn genie_messages_path(space_id: &str, conversation_id: &str) -> String {
    format!("{GENIE_SPACES}/{space_id}/conversations/{conversation_id}/messages")
}

pub fn genie_message_path(space_id: &str, conversation_id: &str, message_id: &str) -> String {
    format!(
        "{}/{message_id}",
        genie_messages_path(space_id, conversation_id)
    )
}

pub fn genie_query_result_path(
    space_id: &str,
    conversation_id: &str,
    message_id: &str,
    attachment_id: &str,
) -> String {
    format!(
        "{}/attachments/{attachment_id}/query-result",
        genie_message_path(space_id, conversation_id, message_id)
    )
}

pub fn genie_downloads_path(
    space_id: &str,
    conversation_id: &str,
    message_id: &str,
    attachment_id: &str,
) -> String {
    format!(
        "{}/attachments/{attachment_id}/downloads",
        genie_message_path(space_id, conversation_id, message_id)
    )
}

pub fn vector_index_path(index_name: &str) -> String {
    format!("{VECTOR_SEARCH_INDEXES}/{index_name}")
}

pub fn vector_index_query_path(index_name: &str) -> String {
    format!("{VECTOR_SEARCH_INDEXES}/{index_name}/query")
}

/// Joins a catalog object name into the `catalog__schema__name` form used for tool names.
pub fn tool_name_for(full_name: &str) -> String {
    full_name.replace('.', "__")
}

/// Extracts the warehouse id from a SQL endpoint path such as `/sql/1.0/warehouses/<id>`.
pub fn warehouse_id_from_http_path(http_path: &str) -> Option<&str> {
    let (_, rest) = http_path.split_once("/warehouses/")?;
    let id = rest.trim_matches('/');
    if id.is_empty() || id.contains('/') {
        None
    } else {
        Some(id)
    }
}
