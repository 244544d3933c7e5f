//! HTTP request handlers for the Memory Service

use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Json;
use chrono::{DateTime, Utc};
use engram_types::{
    AddMemoriesRequest, AddMemoriesResponse, Component, CreateComponentRequest,
    CreateDecisionRequest, CreateDecisionResponse, DecisionRationale, DeleteMemoryResponse,
    DescribeComponentRequest, GraphSyncResponse, HistoryEvent, ImpactAnalysis,
    IntelligenceReport, LinkComponentsRequest, LinkMemoriesRequest, LinkMemoriesResponse,
    ListMemoriesResponse, MemoryCommunity, MemoryError, MemoryView, RelatedMemory,
    SearchRequest, SearchResponse, UpdateMemoryRequest,
};
use serde::Deserialize;
use serde_json::json;

/// Caller scope for user-filtered endpoints
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RelatedQuery {
    pub user_id: String,
    pub depth: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Deserialize)]
pub struct EvolutionQuery {
    pub user_id: String,
    pub topic: String,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// Liveness probe
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "engram-service",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn add_memories(
    State(state): State<AppState>,
    Json(request): Json<AddMemoriesRequest>,
) -> Result<Json<AddMemoriesResponse>, ApiError> {
    Ok(Json(state.pipeline.add_memories(request).await?))
}

pub async fn list_memories(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ListMemoriesResponse>, ApiError> {
    Ok(Json(state.pipeline.list(&query.user_id).await?))
}

pub async fn get_memory(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<MemoryView>, ApiError> {
    Ok(Json(state.pipeline.get(&id, &query.user_id).await?))
}

pub async fn update_memory(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateMemoryRequest>,
) -> Result<Json<MemoryView>, ApiError> {
    Ok(Json(state.pipeline.update(&id, request).await?))
}

pub async fn delete_memory(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<DeleteMemoryResponse>, ApiError> {
    Ok(Json(state.pipeline.delete(&id, &query.user_id).await?))
}

pub async fn memory_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<HistoryEvent>>, ApiError> {
    Ok(Json(state.pipeline.history(&id, &query.user_id).await?))
}

pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    Ok(Json(state.pipeline.search(request).await?))
}

/// Administrative full wipe; requires a token carrying the `admin`
/// permission in the `X-API-Token`/`X-API-UserID` headers
pub async fn reset(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token = header_value(&headers, "X-API-Token")?;
    let user_id = header_value(&headers, "X-API-UserID")?;
    state
        .auth
        .require_permission(&token, &user_id, "admin")
        .await?;

    state.pipeline.reset().await?;
    Ok(Json(json!({"reset": true})))
}

fn header_value(headers: &HeaderMap, name: &str) -> Result<String, MemoryError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| MemoryError::Unauthenticated("unauthorized".into()))
}

// ---- Graph endpoints ----

pub async fn link_memories(
    State(state): State<AppState>,
    Json(request): Json<LinkMemoriesRequest>,
) -> Result<Json<LinkMemoriesResponse>, ApiError> {
    state
        .engine
        .link_memories(&request.user_id, &request.a, &request.b, request.relation)
        .await?;
    Ok(Json(LinkMemoriesResponse {
        linked: true,
        relation: request.relation,
    }))
}

pub async fn related_memories(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<RelatedQuery>,
) -> Result<Json<Vec<RelatedMemory>>, ApiError> {
    Ok(Json(
        state
            .engine
            .related_memories(&query.user_id, &id, query.depth)
            .await?,
    ))
}

pub async fn find_path(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let path = state.engine.find_path(&query.from, &query.to).await?;
    Ok(Json(json!({ "path": path })))
}

pub async fn memory_evolution(
    State(state): State<AppState>,
    Query(query): Query<EvolutionQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let nodes = state
        .engine
        .memory_evolution(&query.user_id, &query.topic, query.since, query.until)
        .await?;
    Ok(Json(json!({ "evolution": nodes })))
}

pub async fn superseded_memories(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let nodes = state
        .engine
        .find_superseded_memories(&query.user_id)
        .await?;
    Ok(Json(json!({ "superseded": nodes })))
}

pub async fn create_component(
    State(state): State<AppState>,
    Json(request): Json<CreateComponentRequest>,
) -> Result<Json<Component>, ApiError> {
    Ok(Json(
        state
            .engine
            .create_component(&request.name, &request.kind)
            .await?,
    ))
}

pub async fn list_components(
    State(state): State<AppState>,
) -> Result<Json<Vec<Component>>, ApiError> {
    Ok(Json(state.engine.store().list_components().await?))
}

pub async fn link_components(
    State(state): State<AppState>,
    Json(request): Json<LinkComponentsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .engine
        .link_component_dependency(&request.from, &request.to, request.tag)
        .await?;
    Ok(Json(json!({"linked": true})))
}

pub async fn describe_component(
    State(state): State<AppState>,
    Json(request): Json<DescribeComponentRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .engine
        .link_memory_to_component(&request.user_id, &request.memory_id, &request.name)
        .await?;
    Ok(Json(json!({"linked": true})))
}

pub async fn component_impact(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ImpactAnalysis>, ApiError> {
    Ok(Json(state.engine.impact_analysis(&name).await?))
}

pub async fn create_decision(
    State(state): State<AppState>,
    Json(request): Json<CreateDecisionRequest>,
) -> Result<Json<CreateDecisionResponse>, ApiError> {
    let decision = state
        .engine
        .create_decision(
            &request.user_id,
            &request.text,
            request.pros,
            request.cons,
            request.alternatives,
        )
        .await?;
    Ok(Json(CreateDecisionResponse { id: decision.id }))
}

pub async fn decision_rationale(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DecisionRationale>, ApiError> {
    let (decision, justified_memories) = state.engine.decision_rationale(&id).await?;
    Ok(Json(DecisionRationale {
        decision,
        justified_memories,
    }))
}

pub async fn communities(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<MemoryCommunity>>, ApiError> {
    Ok(Json(state.engine.detect_communities(&query.user_id).await?))
}

pub async fn trust_score(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let score = state.engine.trust_score(&id).await?;
    Ok(Json(json!({ "memory_id": id, "trust_score": score })))
}

pub async fn intelligence(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<IntelligenceReport>, ApiError> {
    Ok(Json(
        state.engine.intelligence_report(&query.user_id).await?,
    ))
}

pub async fn graph_sync(
    State(state): State<AppState>,
) -> Result<Json<GraphSyncResponse>, ApiError> {
    let scheduled = state.pipeline.graph_sync().await?;
    Ok(Json(GraphSyncResponse { scheduled }))
}
