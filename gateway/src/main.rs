//! MCP gateway binary

use anyhow::{Context, Result};
use engram_auth::{CachedValidator, PostgresTokenStore};
use engram_config::EngramConfig;
use engram_gateway::{build_router, GatewayState, MemoryClient};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = EngramConfig::from_env().context("configuration error")?;

    let token_store = Arc::new(
        PostgresTokenStore::connect(&config.storage.auth_database_url)
            .await
            .context("auth store startup failed")?,
    );
    let auth = Arc::new(CachedValidator::new(token_store));

    let client = Arc::new(
        MemoryClient::new(
            &config.memory_service_url,
            config.request_timeout,
            config.connect_timeout,
        )
        .context("memory service client wiring failed")?,
    );

    let state = GatewayState::new(
        auth,
        client,
        config.chunking.clone(),
        config.project_id_mode,
        config.default_user_id.clone(),
    );

    info!(
        upstream = %config.memory_service_url,
        project_id_mode = config.project_id_mode.as_str(),
        max_chunk = config.chunking.max_chunk_size,
        overlap = config.chunking.overlap_size,
        "gateway configured"
    );

    let listener = tokio::net::TcpListener::bind(&config.gateway_bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.gateway_bind_addr))?;
    info!(addr = %config.gateway_bind_addr, "mcp gateway listening");

    axum::serve(listener, build_router(state))
        .await
        .context("server error")?;
    Ok(())
}
