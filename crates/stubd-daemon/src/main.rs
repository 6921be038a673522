//! stubd-daemon entry point.
//!
//! This file is intentionally thin: it sets up tracing, reads the env-derived
//! configuration, starts the stub server, and stops it on ctrl-c. All glue
//! lives in the library target.

use anyhow::Context;
use stubd_daemon::{ServerConfig, StubServer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = config_from_env();
    let server = StubServer::new();
    server
        .start(config)
        .await
        .context("failed to start stub server")?;
    if let Some(addr) = server.local_addr().await {
        info!("stubd listening on http://{addr}");
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    server.stop().await.context("failed to stop stub server")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// `STUBD_PORT` and `STUBD_PATHS` (comma-separated prefixes) override the
/// defaults of 3000 and `/api`.
fn config_from_env() -> ServerConfig {
    let mut config = ServerConfig::default();
    if let Some(port) = std::env::var("STUBD_PORT").ok().and_then(|p| p.parse().ok()) {
        config.port = port;
    }
    if let Ok(paths) = std::env::var("STUBD_PATHS") {
        let paths: Vec<String> = paths
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if !paths.is_empty() {
            config.paths = paths;
        }
    }
    config
}
