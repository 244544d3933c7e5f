//! MCP gateway
//!
//! Authenticated tool endpoint in front of the Memory Service. Two
//! transports share one tool catalogue: HTTP-stream at `/mcp/` and
//! SSE at `/sse/`. The gateway owns chunking and project-id
//! derivation; all memory state lives behind the Memory Service REST
//! API.

pub mod chunker;
pub mod client;
pub mod project;
pub mod protocol;
pub mod tools;
pub mod transport;

pub use chunker::{chunk_text, Chunk};
pub use client::MemoryClient;

use axum::routing::get;
use axum::Router;
use engram_auth::CachedValidator;
use engram_config::{ChunkingConfig, ProjectIdMode};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tower_http::trace::TraceLayer;

/// Open SSE sessions: session id -> payload channel
pub type SessionMap = Arc<RwLock<HashMap<String, mpsc::Sender<String>>>>;

/// Shared gateway state threaded through the transports
#[derive(Clone)]
pub struct GatewayState {
    pub auth: Arc<CachedValidator>,
    pub client: Arc<MemoryClient>,
    pub chunking: ChunkingConfig,
    pub project_id_mode: ProjectIdMode,
    pub default_user_id: String,
    pub sessions: SessionMap,
}

impl GatewayState {
    pub fn new(
        auth: Arc<CachedValidator>,
        client: Arc<MemoryClient>,
        chunking: ChunkingConfig,
        project_id_mode: ProjectIdMode,
        default_user_id: String,
    ) -> Self {
        Self {
            auth,
            client,
            chunking,
            project_id_mode,
            default_user_id,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

/// Assemble the gateway router with both transports
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/mcp/", get(transport::mcp_get).post(transport::mcp_post))
        .route("/sse/", get(transport::sse_get).post(transport::sse_post))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
