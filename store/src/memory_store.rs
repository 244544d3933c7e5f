//! In-memory vector store for tests and the conformance suite

use crate::vector_store::{content_hash, SearchFilters, VectorStore};
use async_trait::async_trait;
use chrono::Utc;
use engram_types::vector::cosine_similarity;
use engram_types::{HistoryEvent, Memory, MemoryError, MemoryRecord};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    rows: HashMap<String, MemoryRecord>,
    history: Vec<HistoryEvent>,
}

/// Map-backed store with the same observable behavior as the Postgres
/// implementation. Also usable as a fault-injection point: see
/// [`MemoryVectorStore::fail_next`].
pub struct MemoryVectorStore {
    inner: RwLock<Inner>,
    dimensions: usize,
    fail_next: RwLock<u32>,
}

impl MemoryVectorStore {
    pub fn new(dimensions: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            dimensions,
            fail_next: RwLock::new(0),
        }
    }

    /// Make the next `n` operations fail with `store_unavailable`
    pub async fn fail_next(&self, n: u32) {
        *self.fail_next.write().await = n;
    }

    async fn maybe_fail(&self) -> Result<(), MemoryError> {
        let mut remaining = self.fail_next.write().await;
        if *remaining > 0 {
            *remaining -= 1;
            return Err(MemoryError::StoreUnavailable(
                "injected store failure".to_string(),
            ));
        }
        Ok(())
    }

    fn matches_filters(memory: &Memory, filters: Option<&SearchFilters>) -> bool {
        match filters {
            None => true,
            Some(filters) => filters
                .iter()
                .all(|(key, expected)| memory.metadata.get(key) == Some(expected)),
        }
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn insert(&self, record: MemoryRecord) -> Result<(), MemoryError> {
        self.maybe_fail().await?;
        if record.embedding.len() != self.dimensions {
            return Err(MemoryError::BadInput(format!(
                "embedding dimension {} does not match configured {}",
                record.embedding.len(),
                self.dimensions
            )));
        }
        let mut inner = self.inner.write().await;
        inner.rows.insert(record.memory.id.clone(), record);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Memory>, MemoryError> {
        self.maybe_fail().await?;
        let inner = self.inner.read().await;
        Ok(inner.rows.get(id).map(|r| r.memory.clone()))
    }

    async fn update_content(
        &self,
        id: &str,
        content: &str,
        embedding: Vec<f32>,
    ) -> Result<Memory, MemoryError> {
        self.maybe_fail().await?;
        if embedding.len() != self.dimensions {
            return Err(MemoryError::BadInput(format!(
                "embedding dimension {} does not match configured {}",
                embedding.len(),
                self.dimensions
            )));
        }
        let mut inner = self.inner.write().await;
        let record = inner
            .rows
            .get_mut(id)
            .ok_or_else(|| MemoryError::NotFound(format!("Memory {} not found", id)))?;

        record.memory.content = content.to_string();
        record.memory.content_hash = content_hash(content);
        record.memory.updated_at = Utc::now();
        record.embedding = embedding;
        Ok(record.memory.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), MemoryError> {
        self.maybe_fail().await?;
        let mut inner = self.inner.write().await;
        inner.rows.remove(id);
        Ok(())
    }

    async fn search(
        &self,
        owner_id: &str,
        embedding: &[f32],
        limit: usize,
        filters: Option<&SearchFilters>,
    ) -> Result<Vec<(Memory, f32)>, MemoryError> {
        self.maybe_fail().await?;
        if embedding.len() != self.dimensions {
            return Err(MemoryError::BadInput(format!(
                "query embedding dimension {} does not match configured {}",
                embedding.len(),
                self.dimensions
            )));
        }

        let inner = self.inner.read().await;
        let mut scored: Vec<(Memory, f32)> = inner
            .rows
            .values()
            .filter(|r| r.memory.owner_id == owner_id)
            .filter(|r| Self::matches_filters(&r.memory, filters))
            .map(|r| {
                (
                    r.memory.clone(),
                    cosine_similarity(embedding, &r.embedding),
                )
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.created_at.cmp(&a.0.created_at))
        });
        scored.truncate(limit);
        Ok(scored)
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Memory>, MemoryError> {
        self.maybe_fail().await?;
        let inner = self.inner.read().await;
        let mut memories: Vec<Memory> = inner
            .rows
            .values()
            .filter(|r| r.memory.owner_id == owner_id)
            .map(|r| r.memory.clone())
            .collect();
        memories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(memories)
    }

    async fn count_by_owner(&self, owner_id: &str) -> Result<u64, MemoryError> {
        self.maybe_fail().await?;
        let inner = self.inner.read().await;
        Ok(inner
            .rows
            .values()
            .filter(|r| r.memory.owner_id == owner_id)
            .count() as u64)
    }

    async fn all_ids(&self) -> Result<Vec<(String, String)>, MemoryError> {
        self.maybe_fail().await?;
        let inner = self.inner.read().await;
        Ok(inner
            .rows
            .values()
            .map(|r| (r.memory.id.clone(), r.memory.owner_id.clone()))
            .collect())
    }

    async fn append_history(&self, event: HistoryEvent) -> Result<(), MemoryError> {
        self.maybe_fail().await?;
        let mut inner = self.inner.write().await;
        inner.history.push(event);
        Ok(())
    }

    async fn history(&self, memory_id: &str) -> Result<Vec<HistoryEvent>, MemoryError> {
        self.maybe_fail().await?;
        let inner = self.inner.read().await;
        let mut events: Vec<HistoryEvent> = inner
            .history
            .iter()
            .filter(|e| e.memory_id == memory_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(events)
    }

    async fn reset(&self) -> Result<(), MemoryError> {
        self.maybe_fail().await?;
        let mut inner = self.inner.write().await;
        inner.rows.clear();
        inner.history.clear();
        Ok(())
    }
}
