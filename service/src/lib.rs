//! Memory Service
//!
//! Stateless HTTP layer over the vector and graph stores: REST
//! endpoints for memory CRUD and search, the LLM extraction pipeline,
//! and the background graph projection worker pool.

pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod projection;

pub use error::ApiError;
pub use pipeline::MemoryPipeline;
pub use projection::{spawn_projection_pool, ProjectionConfig, ProjectionHandle};

use axum::routing::{get, post};
use axum::Router;
use engram_auth::CachedValidator;
use engram_graph::IntelligenceEngine;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state threaded through every handler
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<MemoryPipeline>,
    pub engine: Arc<IntelligenceEngine>,
    pub auth: Arc<CachedValidator>,
}

/// Assemble the service router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/memories", post(handlers::add_memories).get(handlers::list_memories))
        .route(
            "/memories/:id",
            get(handlers::get_memory)
                .put(handlers::update_memory)
                .delete(handlers::delete_memory),
        )
        .route("/memories/:id/history", get(handlers::memory_history))
        .route("/search", post(handlers::search))
        .route("/reset", post(handlers::reset))
        .route("/graph/link", post(handlers::link_memories))
        .route("/graph/related/:id", get(handlers::related_memories))
        .route("/graph/path", get(handlers::find_path))
        .route("/graph/evolution", get(handlers::memory_evolution))
        .route("/graph/superseded", get(handlers::superseded_memories))
        .route(
            "/graph/components",
            post(handlers::create_component).get(handlers::list_components),
        )
        .route("/graph/components/link", post(handlers::link_components))
        .route("/graph/components/describe", post(handlers::describe_component))
        .route("/graph/components/:name/impact", get(handlers::component_impact))
        .route("/graph/decisions", post(handlers::create_decision))
        .route("/graph/decisions/:id", get(handlers::decision_rationale))
        .route("/graph/communities", get(handlers::communities))
        .route("/graph/trust/:id", get(handlers::trust_score))
        .route("/graph/intelligence", get(handlers::intelligence))
        .route("/graph/sync", post(handlers::graph_sync))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
