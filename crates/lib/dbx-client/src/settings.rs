use std::fmt;
use std::time::Duration;

use dbx_core::ToolError;
use dbx_models::endpoints::warehouse_id_from_http_path;

pub const HOST_VAR: &str = "DATABRICKS_HOST";
pub const TOKEN_VAR: &str = "DATABRICKS_TOKEN";
pub const HTTP_PATH_VAR: &str = "DATABRICKS_HTTP_PATH";

/// Connection settings for the workspace REST API.
///
/// Every field is optional so the process can start without credentials;
/// [`ClientSettings::base_url`] and [`ClientSettings::token`] report what is
/// missing as a configuration error on first use.
#[derive(Clone)]
pub struct ClientSettings {
    pub host: Option<String>,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            host: None,
            token: None,
            timeout: Duration::from_secs(60),
        }
    }
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field("host", &self.host)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ClientSettings {
    /// Workspace URL without a trailing slash; `https://` is assumed when no scheme is given.
    ///
    /// # Errors
    /// `Configuration` when the host is unset or blank.
    pub fn base_url(&self) -> Result<String, ToolError> {
        let host = required(self.host.as_deref(), HOST_VAR)?;
        let host = host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            Ok(host.to_string())
        } else {
            Ok(format!("https://{host}"))
        }
    }

    /// # Errors
    /// `Configuration` when the token is unset or blank.
    pub fn token(&self) -> Result<&str, ToolError> {
        required(self.token.as_deref(), TOKEN_VAR)
    }
}

/// Where SQL statements run and which namespace they resolve names against.
#[derive(Debug, Clone, Default)]
pub struct WarehouseSettings {
    pub http_path: Option<String>,
    pub warehouse_id: Option<String>,
    pub catalog: Option<String>,
    pub schema: Option<String>,
}

impl WarehouseSettings {
    /// Explicit warehouse id, else the id named by the SQL endpoint path.
    ///
    /// # Errors
    /// `Configuration` when neither is set or the path names no warehouse.
    pub fn warehouse_id(&self) -> Result<String, ToolError> {
        if let Some(id) = self
            .warehouse_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        {
            return Ok(id.to_string());
        }
        let http_path = required(self.http_path.as_deref(), HTTP_PATH_VAR)?;
        warehouse_id_from_http_path(http_path)
            .map(str::to_string)
            .ok_or_else(|| {
                ToolError::configuration(format!(
                    "{HTTP_PATH_VAR} does not name a SQL warehouse: {http_path}"
                ))
            })
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, ToolError> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ToolError::configuration(format!("missing required setting: {name}")))
}
