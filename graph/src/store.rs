//! Graph store trait

use async_trait::async_trait;
use engram_types::{Component, Decision, GraphEdge, GraphNode, MemoryError};

/// Operations every graph backend must support. Node ids share the
/// memory-id namespace for memory nodes; component nodes are addressed
/// by their unique name and decision nodes by their id.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create or refresh a memory node (projection is retried, so this
    /// must be idempotent)
    async fn upsert_memory_node(&self, node: GraphNode) -> Result<(), MemoryError>;

    async fn get_node(&self, id: &str) -> Result<Option<GraphNode>, MemoryError>;

    /// Remove a node and every edge incident to it
    async fn remove_node(&self, id: &str) -> Result<(), MemoryError>;

    /// Add a typed edge. Duplicate `(from, to, kind)` triples collapse
    /// to one edge.
    async fn add_edge(&self, edge: GraphEdge) -> Result<(), MemoryError>;

    /// Outgoing edges of a node
    async fn edges_from(&self, id: &str) -> Result<Vec<GraphEdge>, MemoryError>;

    /// Incoming edges of a node
    async fn edges_to(&self, id: &str) -> Result<Vec<GraphEdge>, MemoryError>;

    /// Every memory node of one owner plus the edges among them
    async fn owner_subgraph(
        &self,
        owner_id: &str,
    ) -> Result<(Vec<GraphNode>, Vec<GraphEdge>), MemoryError>;

    /// Upsert a component by its unique name
    async fn upsert_component(&self, name: &str, kind: &str) -> Result<Component, MemoryError>;

    async fn get_component(&self, name: &str) -> Result<Option<Component>, MemoryError>;

    async fn list_components(&self) -> Result<Vec<Component>, MemoryError>;

    /// Count of memories with a DESCRIBES edge to the component
    async fn describing_memory_count(&self, name: &str) -> Result<u64, MemoryError>;

    async fn create_decision(&self, decision: Decision) -> Result<(), MemoryError>;

    async fn get_decision(&self, id: &str) -> Result<Option<Decision>, MemoryError>;

    /// Administrative full wipe
    async fn reset(&self) -> Result<(), MemoryError>;
}
