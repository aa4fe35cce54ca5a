//! Stamp MCP Server - Entry point
//!
//! An MCP server for stamping documents with overlay images.

use stamp_mcp_server::run_server_with_dirs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stamp_mcp_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting Stamp MCP Server");

    // Any command-line arguments are treated as resource directories
    let resource_dirs: Vec<String> = std::env::args().skip(1).collect();
    if !resource_dirs.is_empty() {
        tracing::info!(dirs = ?resource_dirs, "Exposing resource directories");
    }

    run_server_with_dirs(resource_dirs).await
}
