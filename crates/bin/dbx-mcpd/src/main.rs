//! Daemon entry point for the Databricks MCP server.
//!
//! Loads configuration from the command line and environment, builds the
//! client pools, tool registry and resources, and serves MCP over stdio or
//! streamable HTTP.
//! Logs go to stderr; stdout belongs to the stdio transport.

mod config;
mod registry;

use std::process::ExitCode;

use dbx_mcp::server::{serve_stdio, serve_streamable_http};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{DbxConfig, LogFormat, Transport};
use crate::registry::{ClientPools, build_server};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(config: DbxConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let pools = ClientPools::new(&config);
    let _sweepers = pools.spawn_sweepers();
    let server = build_server(&config, &pools.deps()).await;

    match config.transport {
        Transport::Stdio => serve_stdio(server).await,
        Transport::Http => serve_streamable_http(server, config.http).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match DbxConfig::from_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("dbx-mcpd: {err}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.log_format);
    info!(transport = ?config.transport, "starting dbx-mcpd");

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "server stopped with an error");
            ExitCode::FAILURE
        }
    }
}
