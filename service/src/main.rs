//! Memory Service binary

use anyhow::{Context, Result};
use engram_auth::{CachedValidator, PostgresTokenStore};
use engram_config::EngramConfig;
use engram_graph::{IntelligenceEngine, PostgresGraphStore};
use engram_providers::{build_embedder, build_llm, FactExtractor};
use engram_service::{build_router, spawn_projection_pool, AppState, MemoryPipeline, ProjectionConfig};
use engram_store::PostgresVectorStore;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = EngramConfig::from_env().context("configuration error")?;

    // The index strategy is fixed for the process lifetime; log the
    // decision before anything touches the store.
    let strategy = config.index_strategy();
    strategy.log_decision(config.embedding.dimensions);

    let vector_store = Arc::new(
        PostgresVectorStore::connect(
            &config.storage.database_url,
            config.embedding.dimensions,
            strategy,
        )
        .await
        .context("vector store startup failed")?,
    );

    let graph_store = Arc::new(
        PostgresGraphStore::connect(&config.storage.graph_database_url)
            .await
            .context("graph store startup failed")?,
    );
    let engine = Arc::new(IntelligenceEngine::new(
        graph_store,
        config.trust_weights.clone(),
    ));

    let token_store = Arc::new(
        PostgresTokenStore::connect(&config.storage.auth_database_url)
            .await
            .context("auth store startup failed")?,
    );
    let auth = Arc::new(CachedValidator::new(token_store));

    let llm = build_llm(&config.llm).context("LLM provider wiring failed")?;
    let embedder = build_embedder(&config.embedding).context("embedder wiring failed")?;
    info!(
        llm = config.llm.provider.as_str(),
        embedder = config.embedding.provider.as_str(),
        model = %config.embedding.model,
        dimensions = config.embedding.dimensions,
        "providers wired"
    );

    let projection = spawn_projection_pool(
        ProjectionConfig::default(),
        vector_store.clone(),
        engine.clone(),
    );

    let pipeline = Arc::new(MemoryPipeline::new(
        vector_store,
        embedder,
        FactExtractor::new(llm),
        engine.clone(),
        projection,
        config.update_similarity_threshold,
    ));

    let state = AppState {
        pipeline,
        engine,
        auth,
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "memory service listening");

    axum::serve(listener, build_router(state))
        .await
        .context("server error")?;
    Ok(())
}
