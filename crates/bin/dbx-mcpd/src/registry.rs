use std::sync::Arc;

use dbx_client::{DatabricksClient, SqlWarehouse};
use dbx_core::{
    BuildClientFn,
    ClientPool,
    ClientPoolConfig,
    Dispatcher,
    FunctionCatalog,
    GenieApi,
    Probe,
    Redactor,
    SqlExecutor,
    VectorSearchApi,
    WorkspaceApi,
    build_registry,
};
use dbx_mcp::DbxMcp;
use dbx_mcp::resources::SchemaResource;
use dbx_mcp::tools::{ConnectionSummary, ToolDeps, ToolSettings, discovered_group, static_groups};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::DbxConfig;

/// One lazily connected client per capability.
pub struct ClientPools {
    sql: ClientPool<dyn SqlExecutor>,
    workspace: ClientPool<dyn WorkspaceApi>,
    genie: ClientPool<dyn GenieApi>,
    vector_search: ClientPool<dyn VectorSearchApi>,
    functions: ClientPool<dyn FunctionCatalog>,
}

impl ClientPools {
    pub fn new(config: &DbxConfig) -> Self {
        Self {
            sql: sql_pool(config),
            workspace: rest_pool("workspace", config, |client| {
                Arc::new(client) as Arc<dyn WorkspaceApi>
            }),
            genie: rest_pool("genie", config, |client| {
                Arc::new(client) as Arc<dyn GenieApi>
            }),
            vector_search: rest_pool("vector_search", config, |client| {
                Arc::new(client) as Arc<dyn VectorSearchApi>
            }),
            functions: rest_pool("functions", config, |client| {
                Arc::new(client) as Arc<dyn FunctionCatalog>
            }),
        }
    }

    pub fn deps(&self) -> ToolDeps {
        ToolDeps {
            sql: Arc::new(self.sql.clone()),
            workspace: Arc::new(self.workspace.clone()),
            genie: Arc::new(self.genie.clone()),
            vector_search: Arc::new(self.vector_search.clone()),
            functions: Arc::new(self.functions.clone()),
        }
    }

    /// Starts idle eviction for every pool; nothing is spawned when no TTL is set.
    pub fn spawn_sweepers(&self) -> Vec<JoinHandle<()>> {
        [
            self.sql.clone().spawn_sweeper(),
            self.workspace.clone().spawn_sweeper(),
            self.genie.clone().spawn_sweeper(),
            self.vector_search.clone().spawn_sweeper(),
            self.functions.clone().spawn_sweeper(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

fn pool_config<T: ?Sized>(config: &DbxConfig, build: BuildClientFn<T>) -> ClientPoolConfig<T> {
    let mut pool_config = ClientPoolConfig::new(build)
        .with_sweep_interval(config.sweep_interval)
        .with_health_check_after(config.health_check_after);
    if let Some(ttl) = config.pool_ttl {
        pool_config = pool_config.with_ttl(ttl);
    }
    pool_config
}

fn rest_pool<T>(
    name: &str,
    config: &DbxConfig,
    upcast: fn(DatabricksClient) -> Arc<T>,
) -> ClientPool<T>
where
    T: ?Sized + Probe + 'static,
{
    let settings = config.client.clone();
    let build: BuildClientFn<T> = Arc::new(move || {
        let settings = settings.clone();
        Box::pin(async move { DatabricksClient::connect(&settings).map(upcast) })
    });
    ClientPool::new(name, pool_config(config, build))
}

fn sql_pool(config: &DbxConfig) -> ClientPool<dyn SqlExecutor> {
    let client = config.client.clone();
    let warehouse = config.warehouse.clone();
    let policy = config.poll_policy;
    let build: BuildClientFn<dyn SqlExecutor> = Arc::new(move || {
        let client = client.clone();
        let warehouse = warehouse.clone();
        Box::pin(async move {
            let executor = SqlWarehouse::connect(&client, &warehouse, policy)?;
            info!(warehouse_id = %executor.warehouse_id(), "connected SQL warehouse client");
            Ok(Arc::new(executor) as Arc<dyn SqlExecutor>)
        })
    });
    ClientPool::new("sql", pool_config(config, build))
}

/// Settings handed to every tool family.
pub fn tool_settings(config: &DbxConfig) -> ToolSettings {
    let client = &config.client;
    ToolSettings {
        catalog: config.catalog.clone(),
        schema: config.schema.clone(),
        genie_space_ids: config.genie_space_ids.clone(),
        poll_policy: config.poll_policy,
        connection: ConnectionSummary {
            host: client.host.clone(),
            token_set: client.token.is_some(),
            http_path: config
                .warehouse
                .http_path
                .clone()
                .or_else(|| config.warehouse.warehouse_id.clone()),
        },
        redactor: Redactor::new(client.token.iter().cloned()),
    }
}

/// Builds the registry from the static groups plus, when enabled, discovered tools.
pub async fn build_dispatcher(config: &DbxConfig, deps: &ToolDeps) -> Dispatcher {
    let settings = tool_settings(config);
    let mut groups = static_groups(deps, &settings);
    if config.discover_tools {
        groups.push(discovered_group(deps, &settings).await);
    }
    let registry = build_registry(groups);
    info!(
        tools = registry.len(),
        schema = ?config.schema_full_name(),
        "tool registry ready"
    );
    Dispatcher::new(registry)
        .with_validation_mode(config.validation_mode)
        .with_redactor(settings.redactor)
}

/// The MCP server: registry, `schema://tables` and the advertised capability flags.
pub async fn build_server(config: &DbxConfig, deps: &ToolDeps) -> DbxMcp {
    let dispatcher = build_dispatcher(config, deps).await;
    let tables = SchemaResource::new(deps.workspace.clone(), tool_settings(config));
    DbxMcp::new(dispatcher)
        .with_schema_resource(Arc::new(tables))
        .with_flags(config.flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::base_config;
    use dbx_core::{ToolContext, ValidationMode};
    use serde_json::{Map, Value, json};
    use tokio_util::sync::CancellationToken;

    fn arguments(value: Value) -> Option<Map<String, Value>> {
        value.as_object().cloned()
    }

    #[tokio::test]
    async fn registry_builds_without_credentials() {
        let config = base_config();
        let pools = ClientPools::new(&config);
        let dispatcher = build_dispatcher(&config, &pools.deps()).await;

        let names = dispatcher.registry().names();
        assert_eq!(names.first(), Some(&"run_sql_query"));
        assert!(names.contains(&"genie_ask"));
        assert!(names.contains(&"vector_search"));
        assert!(names.contains(&"execute_uc_function"));
        assert!(!pools.sql.is_connected().await);
    }

    #[tokio::test]
    async fn missing_credentials_surface_on_first_use() {
        let config = base_config();
        let pools = ClientPools::new(&config);
        let dispatcher = build_dispatcher(&config, &pools.deps()).await;
        let ctx = ToolContext::new(CancellationToken::new());

        let result = dispatcher
            .call_tool("list_jobs", arguments(json!({})), &ctx)
            .await;

        assert!(result.is_error);
        assert_eq!(
            result.first_text(),
            Some("ConfigurationError: missing required setting: DATABRICKS_HOST")
        );
    }

    #[tokio::test]
    async fn token_is_scrubbed_from_rendered_failures() {
        let mut config = base_config();
        config.client.host = Some("http://127.0.0.1:9".to_string());
        config.client.token = Some("dapi-secret".to_string());
        config.warehouse.http_path = Some("/sql/1.0/endpoints/dapi-secret".to_string());
        let pools = ClientPools::new(&config);
        let dispatcher = build_dispatcher(&config, &pools.deps()).await;
        let ctx = ToolContext::new(CancellationToken::new());

        let result = dispatcher
            .call_tool("run_sql_query", arguments(json!({"query": "SELECT 1"})), &ctx)
            .await;

        assert!(result.is_error);
        let text = result.first_text().unwrap_or_default();
        assert!(text.starts_with("ConfigurationError:"), "{text}");
        assert!(!text.contains("dapi-secret"));
    }

    #[test]
    fn settings_record_presence_not_values() {
        let mut config = base_config();
        config.client.token = Some("dapi-secret".to_string());
        config.warehouse.warehouse_id = Some("abc".to_string());
        config.validation_mode = ValidationMode::Lenient;

        let settings = tool_settings(&config);

        assert!(settings.connection.token_set);
        assert_eq!(settings.connection.http_path.as_deref(), Some("abc"));
        assert!(!format!("{settings:?}").contains("dapi-secret"));
    }
}
