//! wirecall - minimal RPC transport server.
//!
//! Starts a wirecall server from configuration and registers a small
//! example service for smoke testing with any wirecall client.

use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wirecall_server::{arg, Config, Server, ServerConfig, Service};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if WIRECALL_CONFIG is set, then env
    // overrides)
    let config = match Config::load() {
        Ok(c) => {
            if let Ok(path) = std::env::var("WIRECALL_CONFIG") {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };

    tracing::info!("Starting wirecall server");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  Idle timeout: {}s", config.network.idle_timeout_secs);
    tracing::info!("  Max connections: {}", config.network.max_connections);

    let mut server_config = ServerConfig::new(config.network.bind_addr);
    server_config.idle_timeout = config.network.idle_timeout();
    server_config.max_connections = config.network.max_connections;

    let mut server = Server::new(server_config);
    server.register(
        "demo",
        Service::new()
            .method("echo", |args: Vec<serde_json::Value>| {
                Ok(args.into_iter().next())
            })
            .method("add", |args| {
                let a: i64 = arg(&args, 0)?;
                let b: i64 = arg(&args, 1)?;
                Ok(Some(json!(a + b)))
            }),
    )?;

    let server = Arc::new(server);

    // Spawn shutdown signal handler
    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
    });

    // Run server (blocks until shutdown)
    server.run().await?;

    tracing::info!("Server stopped");
    Ok(())
}
