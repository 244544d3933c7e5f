//! The memory pipeline: extraction, storage, search, and lifecycle
//!
//! `POST /memories` never stores raw input. The LLM extracts atomic
//! facts, each fact is embedded and inserted (or resolved onto an
//! existing memory for UPDATE items), and a projection job is queued
//! per touched row. The vector-store insert is the commit point;
//! everything before it is safe to abort.

use crate::projection::ProjectionHandle;
use chrono::Utc;
use engram_graph::IntelligenceEngine;
use engram_providers::{EmbeddingProvider, FactExtractor, MemoryAction};
use engram_store::{content_hash, SearchFilters, VectorStore};
use engram_types::{
    AddMemoriesRequest, AddMemoriesResponse, DeleteMemoryResponse, HistoryEvent,
    HistoryEventKind, ListMemoriesResponse, Memory, MemoryError, MemoryRecord, MemoryResult,
    MemoryView, SearchRequest, SearchResponse, SearchResult, UpdateMemoryRequest,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const DEFAULT_SEARCH_LIMIT: usize = 10;

fn provider_err(e: anyhow::Error) -> MemoryError {
    MemoryError::ProviderUnavailable(e.to_string())
}

pub struct MemoryPipeline {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    extractor: FactExtractor,
    engine: Arc<IntelligenceEngine>,
    projection: ProjectionHandle,
    /// Cosine floor for resolving extractor UPDATE items onto an
    /// existing memory; unresolved UPDATEs degrade to ADD
    update_similarity_threshold: f32,
}

impl MemoryPipeline {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        extractor: FactExtractor,
        engine: Arc<IntelligenceEngine>,
        projection: ProjectionHandle,
        update_similarity_threshold: f32,
    ) -> Self {
        Self {
            store,
            embedder,
            extractor,
            engine,
            projection,
            update_similarity_threshold,
        }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    fn view(memory: Memory) -> MemoryView {
        MemoryView {
            id: memory.id,
            memory: memory.content,
            metadata: memory.metadata,
            created_at: memory.created_at,
            updated_at: memory.updated_at,
        }
    }

    /// Fetch one memory and enforce ownership. A row owned by someone
    /// else is `access_denied`, never `not_found`.
    async fn owned_memory(&self, id: &str, user_id: &str) -> Result<Memory, MemoryError> {
        let memory = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| MemoryError::NotFound(format!("Memory {} not found", id)))?;
        if memory.owner_id != user_id {
            return Err(MemoryError::denied_for(id, user_id));
        }
        Ok(memory)
    }

    /// The extraction algorithm behind `POST /memories`
    pub async fn add_memories(
        &self,
        request: AddMemoriesRequest,
    ) -> Result<AddMemoriesResponse, MemoryError> {
        if request.user_id.trim().is_empty() {
            return Err(MemoryError::BadInput("user_id is required".into()));
        }
        if request.messages.is_empty() {
            return Err(MemoryError::BadInput("messages must not be empty".into()));
        }

        let transcript: Vec<(String, String)> = request
            .messages
            .iter()
            .map(|m| (m.role.clone(), m.content.clone()))
            .collect();

        // Provider failures fail the whole call; nothing has been
        // written yet.
        let facts = self
            .extractor
            .extract(&transcript)
            .await
            .map_err(provider_err)?;

        let actionable: Vec<_> = facts
            .into_iter()
            .filter(|f| f.action != MemoryAction::None)
            .collect();
        if actionable.is_empty() {
            return Ok(AddMemoriesResponse {
                results: Vec::new(),
                relations: Vec::new(),
            });
        }

        let texts: Vec<String> = actionable.iter().map(|f| f.content.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await.map_err(provider_err)?;

        let mut base_metadata: HashMap<String, serde_json::Value> =
            request.metadata.clone().unwrap_or_default();
        if let Some(agent_id) = &request.agent_id {
            base_metadata.insert("agent_id".to_string(), serde_json::json!(agent_id));
        }
        if let Some(run_id) = &request.run_id {
            base_metadata.insert("run_id".to_string(), serde_json::json!(run_id));
        }

        // Results mirror the extractor's output order.
        let mut results = Vec::with_capacity(actionable.len());
        for (fact, embedding) in actionable.into_iter().zip(embeddings.into_iter()) {
            let result = match fact.action {
                MemoryAction::Update => {
                    match self
                        .resolve_update_target(&request.user_id, &embedding)
                        .await?
                    {
                        Some(existing) => {
                            self.apply_update(existing, &fact.content, embedding).await?
                        }
                        None => {
                            debug!("no similar memory for UPDATE, storing as new");
                            self.insert_new(&request.user_id, &fact.content, embedding, &base_metadata)
                                .await?
                        }
                    }
                }
                _ => {
                    self.insert_new(&request.user_id, &fact.content, embedding, &base_metadata)
                        .await?
                }
            };
            results.push(result);
        }

        info!(
            user = %request.user_id,
            stored = results.len(),
            "memories ingested"
        );
        Ok(AddMemoriesResponse {
            results,
            relations: Vec::new(),
        })
    }

    /// Nearest owned memory at or above the similarity floor
    async fn resolve_update_target(
        &self,
        user_id: &str,
        embedding: &[f32],
    ) -> Result<Option<Memory>, MemoryError> {
        let hits = self.store.search(user_id, embedding, 1, None).await?;
        Ok(hits
            .into_iter()
            .next()
            .filter(|(_, score)| *score >= self.update_similarity_threshold)
            .map(|(memory, _)| memory))
    }

    async fn insert_new(
        &self,
        user_id: &str,
        content: &str,
        embedding: Vec<f32>,
        metadata: &HashMap<String, serde_json::Value>,
    ) -> Result<MemoryResult, MemoryError> {
        let now = Utc::now();
        let memory = Memory {
            id: Uuid::new_v4().to_string(),
            owner_id: user_id.to_string(),
            content: content.to_string(),
            metadata: metadata.clone(),
            created_at: now,
            updated_at: now,
            content_hash: content_hash(content),
        };
        let id = memory.id.clone();

        self.store
            .insert(MemoryRecord {
                memory,
                embedding,
            })
            .await?;
        self.store
            .append_history(HistoryEvent {
                memory_id: id.clone(),
                event_kind: HistoryEventKind::Add,
                prev_content: None,
                new_content: Some(content.to_string()),
                timestamp: now,
            })
            .await?;
        self.projection.schedule(&id);

        Ok(MemoryResult {
            id,
            memory: content.to_string(),
            event: HistoryEventKind::Add,
            created_at: now,
        })
    }

    async fn apply_update(
        &self,
        existing: Memory,
        content: &str,
        embedding: Vec<f32>,
    ) -> Result<MemoryResult, MemoryError> {
        let prev_content = existing.content.clone();
        let updated = self
            .store
            .update_content(&existing.id, content, embedding)
            .await?;
        self.store
            .append_history(HistoryEvent {
                memory_id: existing.id.clone(),
                event_kind: HistoryEventKind::Update,
                prev_content: Some(prev_content),
                new_content: Some(content.to_string()),
                timestamp: updated.updated_at,
            })
            .await?;
        self.projection.schedule(&existing.id);

        Ok(MemoryResult {
            id: existing.id,
            memory: content.to_string(),
            event: HistoryEventKind::Update,
            created_at: updated.updated_at,
        })
    }

    /// `POST /search`: embed once, k-NN restricted to the caller's rows
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse, MemoryError> {
        if request.user_id.trim().is_empty() {
            return Err(MemoryError::BadInput("user_id is required".into()));
        }
        if request.query.trim().is_empty() {
            return Err(MemoryError::BadInput("query is required".into()));
        }

        let embeddings = self
            .embedder
            .embed(&[request.query.clone()])
            .await
            .map_err(provider_err)?;
        let embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::ProviderUnavailable("embedder returned nothing".into()))?;

        let limit = request.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        let filters: Option<SearchFilters> = request.filters;
        let hits = self
            .store
            .search(&request.user_id, &embedding, limit, filters.as_ref())
            .await?;

        Ok(SearchResponse {
            results: hits
                .into_iter()
                .map(|(memory, score)| SearchResult {
                    id: memory.id,
                    memory: memory.content,
                    score,
                    metadata: memory.metadata,
                    created_at: memory.created_at,
                })
                .collect(),
        })
    }

    pub async fn list(&self, user_id: &str) -> Result<ListMemoriesResponse, MemoryError> {
        let memories = self.store.list_by_owner(user_id).await?;
        Ok(ListMemoriesResponse {
            results: memories.into_iter().map(Self::view).collect(),
        })
    }

    pub async fn get(&self, id: &str, user_id: &str) -> Result<MemoryView, MemoryError> {
        let memory = self.owned_memory(id, user_id).await?;
        Ok(Self::view(memory))
    }

    /// `PUT /memories/{id}`: replace content, re-embed, record one
    /// UPDATE event
    pub async fn update(
        &self,
        id: &str,
        request: UpdateMemoryRequest,
    ) -> Result<MemoryView, MemoryError> {
        if request.content.trim().is_empty() {
            return Err(MemoryError::BadInput("content is required".into()));
        }
        let existing = self.owned_memory(id, &request.user_id).await?;

        let embeddings = self
            .embedder
            .embed(&[request.content.clone()])
            .await
            .map_err(provider_err)?;
        let embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::ProviderUnavailable("embedder returned nothing".into()))?;

        let result = self.apply_update(existing, &request.content, embedding).await?;
        let memory = self
            .store
            .get(&result.id)
            .await?
            .ok_or_else(|| MemoryError::Internal("updated row vanished".into()))?;
        Ok(Self::view(memory))
    }

    pub async fn delete(
        &self,
        id: &str,
        user_id: &str,
    ) -> Result<DeleteMemoryResponse, MemoryError> {
        let existing = self.owned_memory(id, user_id).await?;

        self.store.delete(id).await?;
        self.store
            .append_history(HistoryEvent {
                memory_id: id.to_string(),
                event_kind: HistoryEventKind::Delete,
                prev_content: Some(existing.content),
                new_content: None,
                timestamp: Utc::now(),
            })
            .await?;

        // The vector row is gone either way; a graph hiccup here only
        // delays node removal until the next sync.
        if let Err(e) = self.engine.remove_memory(id).await {
            warn!(id, "failed to remove graph node after delete: {}", e);
        }

        Ok(DeleteMemoryResponse {
            id: id.to_string(),
            deleted: true,
        })
    }

    pub async fn history(
        &self,
        id: &str,
        user_id: &str,
    ) -> Result<Vec<HistoryEvent>, MemoryError> {
        self.owned_memory(id, user_id).await?;
        self.store.history(id).await
    }

    /// Administrative wipe of both stores
    pub async fn reset(&self) -> Result<(), MemoryError> {
        self.store.reset().await?;
        self.engine.store().reset().await?;
        info!("administrative reset complete");
        Ok(())
    }

    /// Re-enqueue projection for every stored memory
    pub async fn graph_sync(&self) -> Result<u64, MemoryError> {
        let ids = self.store.all_ids().await?;
        let count = ids.len() as u64;
        for (id, _owner) in ids {
            self.projection.schedule(&id);
        }
        info!(count, "graph re-projection scheduled");
        Ok(count)
    }
}
