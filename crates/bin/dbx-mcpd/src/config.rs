use clap::{Parser, ValueEnum, builder::BoolishValueParser};
use dbx_client::{ClientSettings, WarehouseSettings};
use dbx_core::{PollPolicy, ValidationMode};
use dbx_mcp::CapabilityFlags;
use dbx_mcp::server::{DEFAULT_HTTP_ADDR, McpHttpServerConfig};
use std::error::Error;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 1;
const DEFAULT_POLL_MAX_INTERVAL_SECS: u64 = 10;
const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 60;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_POOL_TTL_SECS: u64 = 300;
const DEFAULT_POOL_HEALTH_CHECK_SECS: u64 = 60;
const POLL_BACKOFF_MULTIPLIER: u32 = 2;

/// How the MCP session reaches the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    Stdio,
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "dbx-mcpd", version, about = "Databricks MCP daemon.")]
#[allow(clippy::struct_excessive_bools)]
struct CliArgs {
    #[arg(long, env = "DATABRICKS_HOST")]
    host: Option<String>,

    #[arg(long, env = "DATABRICKS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// SQL endpoint path, `/sql/1.0/warehouses/<id>`.
    #[arg(long, env = "DATABRICKS_HTTP_PATH")]
    http_path: Option<String>,

    #[arg(long, env = "DATABRICKS_WAREHOUSE_ID")]
    warehouse_id: Option<String>,

    /// Default `catalog.schema` for listing and discovery.
    #[arg(short = 's', long, env = "DBX_SCHEMA_FULL_NAME")]
    schema_full_name: Option<String>,

    /// Comma separated genie space ids the genie tools accept.
    #[arg(short = 'g', long, env = "DBX_GENIE_SPACE_IDS")]
    genie_space_ids: Option<String>,

    #[arg(long, env = "DBX_TRANSPORT", value_enum, default_value_t = Transport::Stdio)]
    transport: Transport,

    #[arg(long, env = "DBX_MCP_HTTP_ADDR", default_value = DEFAULT_HTTP_ADDR)]
    http_addr: SocketAddr,

    #[arg(
        long,
        env = "DBX_MCP_HTTP_STATEFUL",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    http_stateful: bool,

    #[arg(
        long,
        env = "DBX_POLL_INTERVAL_SECS",
        default_value_t = DEFAULT_POLL_INTERVAL_SECS
    )]
    poll_interval_secs: u64,

    #[arg(
        long,
        env = "DBX_POLL_MAX_INTERVAL_SECS",
        default_value_t = DEFAULT_POLL_MAX_INTERVAL_SECS
    )]
    poll_max_interval_secs: u64,

    #[arg(
        long,
        env = "DBX_POLL_MAX_ATTEMPTS",
        default_value_t = DEFAULT_POLL_MAX_ATTEMPTS
    )]
    poll_max_attempts: u32,

    #[arg(
        long,
        env = "DBX_REQUEST_TIMEOUT_SECS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS
    )]
    request_timeout_secs: u64,

    /// Idle time before a pooled client is dropped; `0` keeps clients forever.
    #[arg(long, env = "DBX_POOL_TTL_SECS", default_value_t = DEFAULT_POOL_TTL_SECS)]
    pool_ttl_secs: u64,

    #[arg(long, env = "DBX_POOL_SWEEP_SECS")]
    pool_sweep_secs: Option<u64>,

    #[arg(
        long,
        env = "DBX_POOL_HEALTH_CHECK_SECS",
        default_value_t = DEFAULT_POOL_HEALTH_CHECK_SECS
    )]
    pool_health_check_secs: u64,

    /// Drop unknown tool arguments instead of rejecting the call.
    #[arg(
        long,
        env = "DBX_LENIENT_ARGS",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    lenient_args: bool,

    /// Register one tool per vector index and catalog function at startup.
    #[arg(
        long,
        env = "DBX_DISCOVER_TOOLS",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    discover_tools: bool,

    #[arg(
        long,
        env = "DBX_TOOLS_LIST_CHANGED",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    tools_changed: bool,

    #[arg(
        long,
        env = "DBX_RESOURCES_LIST_CHANGED",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    resources_changed: bool,

    #[arg(long, env = "DBX_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

/// Runtime configuration loaded from CLI arguments and environment variables.
///
/// Credentials stay optional here; a missing host, token or warehouse is
/// reported by the first tool call that needs it.
#[derive(Debug, Clone)]
pub struct DbxConfig {
    pub client: ClientSettings,
    pub warehouse: WarehouseSettings,
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub genie_space_ids: Vec<String>,
    pub transport: Transport,
    pub http: McpHttpServerConfig,
    pub poll_policy: PollPolicy,
    pub pool_ttl: Option<Duration>,
    pub sweep_interval: Duration,
    pub health_check_after: Duration,
    pub validation_mode: ValidationMode,
    pub discover_tools: bool,
    pub flags: CapabilityFlags,
    pub log_format: LogFormat,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidSetting { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSetting { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
        }
    }
}

impl Error for ConfigError {}

impl DbxConfig {
    /// # Errors
    /// `InvalidSetting` for a malformed schema name, space list or zero duration.
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }

    /// The configured `catalog.schema`, when both parts are set.
    pub fn schema_full_name(&self) -> Option<String> {
        match (&self.catalog, &self.schema) {
            (Some(catalog), Some(schema)) => Some(format!("{catalog}.{schema}")),
            _ => None,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn split_schema_full_name(value: &str) -> Result<(String, String), ConfigError> {
    let invalid = || ConfigError::InvalidSetting {
        name: "schema full name",
        value: value.to_string(),
    };
    let (catalog, schema) = value.split_once('.').ok_or_else(invalid)?;
    if catalog.trim().is_empty() || schema.trim().is_empty() || schema.contains('.') {
        return Err(invalid());
    }
    Ok((catalog.trim().to_string(), schema.trim().to_string()))
}

fn split_space_ids(value: &str) -> Result<Vec<String>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .map(|id| {
            if id.is_empty() {
                Err(ConfigError::InvalidSetting {
                    name: "genie space ids",
                    value: value.to_string(),
                })
            } else {
                Ok(id.to_string())
            }
        })
        .collect()
}

impl TryFrom<CliArgs> for DbxConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let (catalog, schema) = match non_blank(args.schema_full_name) {
            Some(full_name) => {
                let (catalog, schema) = split_schema_full_name(&full_name)?;
                (Some(catalog), Some(schema))
            }
            None => (None, None),
        };

        let genie_space_ids = match non_blank(args.genie_space_ids) {
            Some(ids) => split_space_ids(&ids)?,
            None => Vec::new(),
        };

        if args.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "poll interval",
                value: args.poll_interval_secs.to_string(),
            });
        }
        if args.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "request timeout",
                value: args.request_timeout_secs.to_string(),
            });
        }
        let poll_interval = Duration::from_secs(args.poll_interval_secs);
        let poll_max_interval =
            Duration::from_secs(args.poll_max_interval_secs).max(poll_interval);
        let poll_policy = PollPolicy::fixed(poll_interval, args.poll_max_attempts)
            .with_backoff(POLL_BACKOFF_MULTIPLIER, poll_max_interval);

        let pool_ttl = if args.pool_ttl_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(args.pool_ttl_secs))
        };
        let sweep_secs = args.pool_sweep_secs.unwrap_or(args.pool_ttl_secs);

        let validation_mode = if args.lenient_args {
            ValidationMode::Lenient
        } else {
            ValidationMode::Strict
        };

        Ok(Self {
            client: ClientSettings {
                host: non_blank(args.host),
                token: non_blank(args.token),
                timeout: Duration::from_secs(args.request_timeout_secs),
            },
            warehouse: WarehouseSettings {
                http_path: non_blank(args.http_path),
                warehouse_id: non_blank(args.warehouse_id),
                catalog: catalog.clone(),
                schema: schema.clone(),
            },
            catalog,
            schema,
            genie_space_ids,
            transport: args.transport,
            http: McpHttpServerConfig::new(args.http_addr).with_stateful_mode(args.http_stateful),
            poll_policy,
            pool_ttl,
            sweep_interval: Duration::from_secs(sweep_secs.max(1)),
            health_check_after: Duration::from_secs(args.pool_health_check_secs),
            validation_mode,
            discover_tools: args.discover_tools,
            flags: CapabilityFlags {
                tools_changed: args.tools_changed,
                resources_changed: args.resources_changed,
            },
            log_format: args.log_format,
        })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    fn base_args() -> CliArgs {
        CliArgs {
            host: None,
            token: None,
            http_path: None,
            warehouse_id: None,
            schema_full_name: None,
            genie_space_ids: None,
            transport: Transport::Stdio,
            http_addr: DEFAULT_HTTP_ADDR.parse().expect("valid MCP addr"),
            http_stateful: true,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            poll_max_interval_secs: DEFAULT_POLL_MAX_INTERVAL_SECS,
            poll_max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            pool_ttl_secs: DEFAULT_POOL_TTL_SECS,
            pool_sweep_secs: None,
            pool_health_check_secs: DEFAULT_POOL_HEALTH_CHECK_SECS,
            lenient_args: false,
            discover_tools: false,
            tools_changed: false,
            resources_changed: false,
            log_format: LogFormat::Text,
        }
    }

    pub fn base_config() -> DbxConfig {
        DbxConfig::try_from(base_args()).expect("defaults are valid")
    }

    #[test]
    fn defaults_start_without_credentials() {
        let config = base_config();
        assert!(config.client.host.is_none());
        assert!(config.client.token.is_none());
        assert!(config.schema_full_name().is_none());
        assert!(config.genie_space_ids.is_empty());
        assert_eq!(config.transport, Transport::Stdio);
        assert_eq!(config.validation_mode, ValidationMode::Strict);
        assert_eq!(config.pool_ttl, Some(Duration::from_secs(DEFAULT_POOL_TTL_SECS)));
        assert_eq!(config.poll_policy.max_attempts, DEFAULT_POLL_MAX_ATTEMPTS);
        assert_eq!(config.flags, CapabilityFlags::default());
    }

    #[test]
    fn schema_full_name_splits_into_catalog_and_schema() {
        let mut args = base_args();
        args.schema_full_name = Some("main.sales".to_string());
        let config = DbxConfig::try_from(args).expect("valid schema name");
        assert_eq!(config.catalog.as_deref(), Some("main"));
        assert_eq!(config.schema.as_deref(), Some("sales"));
        assert_eq!(config.warehouse.catalog.as_deref(), Some("main"));
        assert_eq!(config.schema_full_name().as_deref(), Some("main.sales"));
    }

    #[test]
    fn schema_full_name_without_a_dot_is_rejected() {
        for value in ["sales", "main.", ".sales", "main.sales.orders"] {
            let mut args = base_args();
            args.schema_full_name = Some(value.to_string());
            let err = DbxConfig::try_from(args).expect_err("malformed schema name");
            assert_eq!(err.to_string(), format!("invalid schema full name value: {value}"));
        }
    }

    #[test]
    fn genie_space_ids_are_comma_separated() {
        let mut args = base_args();
        args.genie_space_ids = Some("space-1, space-2".to_string());
        let config = DbxConfig::try_from(args).expect("valid ids");
        assert_eq!(config.genie_space_ids, vec!["space-1", "space-2"]);
    }

    #[test]
    fn empty_genie_space_id_entries_are_rejected() {
        let mut args = base_args();
        args.genie_space_ids = Some("space-1,,space-2".to_string());
        assert!(DbxConfig::try_from(args).is_err());
    }

    #[test]
    fn blank_credentials_count_as_unset() {
        let mut args = base_args();
        args.host = Some("  ".to_string());
        args.token = Some(String::new());
        args.http_path = Some(" /sql/1.0/warehouses/abc ".to_string());
        let config = DbxConfig::try_from(args).expect("valid config");
        assert!(config.client.host.is_none());
        assert!(config.client.token.is_none());
        assert_eq!(
            config.warehouse.http_path.as_deref(),
            Some("/sql/1.0/warehouses/abc")
        );
    }

    #[test]
    fn zero_ttl_disables_eviction() {
        let mut args = base_args();
        args.pool_ttl_secs = 0;
        let config = DbxConfig::try_from(args).expect("valid config");
        assert!(config.pool_ttl.is_none());
    }

    #[test]
    fn poll_ceiling_never_drops_below_the_interval() {
        let mut args = base_args();
        args.poll_interval_secs = 5;
        args.poll_max_interval_secs = 2;
        let config = DbxConfig::try_from(args).expect("valid config");
        assert_eq!(config.poll_policy.interval, Duration::from_secs(5));
        assert_eq!(config.poll_policy.max_interval, Duration::from_secs(5));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let mut args = base_args();
        args.poll_interval_secs = 0;
        assert!(DbxConfig::try_from(args).is_err());
    }

    #[test]
    fn token_never_shows_in_debug_output() {
        let mut args = base_args();
        args.token = Some("dapi-secret".to_string());
        let config = DbxConfig::try_from(args).expect("valid config");
        assert!(!format!("{config:?}").contains("dapi-secret"));
    }

    #[test]
    fn cli_flags_parse() {
        let args = CliArgs::try_parse_from([
            "dbx-mcpd",
            "-s",
            "main.sales",
            "-g",
            "space-1",
            "--transport",
            "http",
            "--lenient-args",
            "--log-format",
            "json",
        ])
        .expect("flags parse");
        let config = DbxConfig::try_from(args).expect("valid config");
        assert_eq!(config.transport, Transport::Http);
        assert_eq!(config.validation_mode, ValidationMode::Lenient);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.genie_space_ids, vec!["space-1"]);
    }
}
