//! The vector store trait and shared helpers

use async_trait::async_trait;
use engram_types::{HistoryEvent, Memory, MemoryError, MemoryRecord};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Exact-match metadata predicates applied inside the search query
pub type SearchFilters = HashMap<String, serde_json::Value>;

/// Stable hash of memory content, used for dedup/equality
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Operations every vector store backend must support.
///
/// Owner scoping is part of the query for list/search/count; single-row
/// reads return the row regardless of owner so the service layer can
/// distinguish `access_denied` from `not_found`.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert a new memory row. This is the commit point of the write
    /// path: nothing before it has touched storage.
    async fn insert(&self, record: MemoryRecord) -> Result<(), MemoryError>;

    /// Point read by id
    async fn get(&self, id: &str) -> Result<Option<Memory>, MemoryError>;

    /// Replace content (and its embedding) in place. `owner_id` never
    /// changes. Returns the updated row.
    async fn update_content(
        &self,
        id: &str,
        content: &str,
        embedding: Vec<f32>,
    ) -> Result<Memory, MemoryError>;

    /// Delete by id
    async fn delete(&self, id: &str) -> Result<(), MemoryError>;

    /// k-NN over the owner's rows, optionally narrowed by exact-match
    /// metadata predicates. Results carry cosine similarity scores,
    /// best first; ties broken by `created_at` descending.
    async fn search(
        &self,
        owner_id: &str,
        embedding: &[f32],
        limit: usize,
        filters: Option<&SearchFilters>,
    ) -> Result<Vec<(Memory, f32)>, MemoryError>;

    /// All rows owned by `owner_id`, newest first
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Memory>, MemoryError>;

    /// Row count for one owner
    async fn count_by_owner(&self, owner_id: &str) -> Result<u64, MemoryError>;

    /// Ids of every row in the store (administrative re-projection)
    async fn all_ids(&self) -> Result<Vec<(String, String)>, MemoryError>;

    /// Append one history event. Events are never mutated once written.
    async fn append_history(&self, event: HistoryEvent) -> Result<(), MemoryError>;

    /// History for one memory, oldest first
    async fn history(&self, memory_id: &str) -> Result<Vec<HistoryEvent>, MemoryError>;

    /// Administrative full wipe of rows and history
    async fn reset(&self) -> Result<(), MemoryError>;
}
