//! In-memory graph store for tests
//!
//! Behaviorally equivalent to the Postgres store, plus a fault
//! injection hook used by the projection retry tests.

use crate::store::GraphStore;
use async_trait::async_trait;
use chrono::Utc;
use engram_types::{Component, Decision, GraphEdge, GraphNode, MemoryError};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    nodes: HashMap<String, GraphNode>,
    edges: Vec<GraphEdge>,
    components: HashMap<String, Component>,
    decisions: HashMap<String, Decision>,
}

pub struct InMemoryGraphStore {
    inner: RwLock<Inner>,
    fail_next: RwLock<u32>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
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
                "injected graph failure".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn upsert_memory_node(&self, node: GraphNode) -> Result<(), MemoryError> {
        self.maybe_fail().await?;
        let mut inner = self.inner.write().await;
        inner.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    async fn get_node(&self, id: &str) -> Result<Option<GraphNode>, MemoryError> {
        self.maybe_fail().await?;
        let inner = self.inner.read().await;
        Ok(inner.nodes.get(id).cloned())
    }

    async fn remove_node(&self, id: &str) -> Result<(), MemoryError> {
        self.maybe_fail().await?;
        let mut inner = self.inner.write().await;
        inner.nodes.remove(id);
        inner.edges.retain(|e| e.from != id && e.to != id);
        Ok(())
    }

    async fn add_edge(&self, edge: GraphEdge) -> Result<(), MemoryError> {
        self.maybe_fail().await?;
        let mut inner = self.inner.write().await;
        let duplicate = inner
            .edges
            .iter()
            .any(|e| e.from == edge.from && e.to == edge.to && e.kind == edge.kind);
        if !duplicate {
            inner.edges.push(edge);
        }
        Ok(())
    }

    async fn edges_from(&self, id: &str) -> Result<Vec<GraphEdge>, MemoryError> {
        self.maybe_fail().await?;
        let inner = self.inner.read().await;
        Ok(inner.edges.iter().filter(|e| e.from == id).cloned().collect())
    }

    async fn edges_to(&self, id: &str) -> Result<Vec<GraphEdge>, MemoryError> {
        self.maybe_fail().await?;
        let inner = self.inner.read().await;
        Ok(inner.edges.iter().filter(|e| e.to == id).cloned().collect())
    }

    async fn owner_subgraph(
        &self,
        owner_id: &str,
    ) -> Result<(Vec<GraphNode>, Vec<GraphEdge>), MemoryError> {
        self.maybe_fail().await?;
        let inner = self.inner.read().await;
        let nodes: Vec<GraphNode> = inner
            .nodes
            .values()
            .filter(|n| n.owner_id == owner_id)
            .cloned()
            .collect();
        let ids: std::collections::HashSet<&str> =
            nodes.iter().map(|n| n.id.as_str()).collect();
        let edges: Vec<GraphEdge> = inner
            .edges
            .iter()
            .filter(|e| ids.contains(e.from.as_str()) && ids.contains(e.to.as_str()))
            .cloned()
            .collect();
        Ok((nodes, edges))
    }

    async fn upsert_component(&self, name: &str, kind: &str) -> Result<Component, MemoryError> {
        self.maybe_fail().await?;
        let mut inner = self.inner.write().await;
        let component = inner
            .components
            .entry(name.to_string())
            .and_modify(|c| c.kind = kind.to_string())
            .or_insert_with(|| Component {
                name: name.to_string(),
                kind: kind.to_string(),
                created_at: Utc::now(),
            });
        Ok(component.clone())
    }

    async fn get_component(&self, name: &str) -> Result<Option<Component>, MemoryError> {
        self.maybe_fail().await?;
        let inner = self.inner.read().await;
        Ok(inner.components.get(name).cloned())
    }

    async fn list_components(&self) -> Result<Vec<Component>, MemoryError> {
        self.maybe_fail().await?;
        let inner = self.inner.read().await;
        let mut components: Vec<Component> = inner.components.values().cloned().collect();
        components.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(components)
    }

    async fn describing_memory_count(&self, name: &str) -> Result<u64, MemoryError> {
        self.maybe_fail().await?;
        let inner = self.inner.read().await;
        Ok(inner
            .edges
            .iter()
            .filter(|e| e.kind == engram_types::RelationKind::Describes && e.to == name)
            .count() as u64)
    }

    async fn create_decision(&self, decision: Decision) -> Result<(), MemoryError> {
        self.maybe_fail().await?;
        let mut inner = self.inner.write().await;
        inner.decisions.insert(decision.id.clone(), decision);
        Ok(())
    }

    async fn get_decision(&self, id: &str) -> Result<Option<Decision>, MemoryError> {
        self.maybe_fail().await?;
        let inner = self.inner.read().await;
        Ok(inner.decisions.get(id).cloned())
    }

    async fn reset(&self) -> Result<(), MemoryError> {
        self.maybe_fail().await?;
        let mut inner = self.inner.write().await;
        *inner = Inner::default();
        Ok(())
    }
}
