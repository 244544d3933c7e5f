//! Graph intelligence analyses
//!
//! Every operation runs synchronously against the [`GraphStore`]. The
//! analyses are plain adjacency algorithms over the owner's subgraph;
//! nothing here depends on which backend holds the edges.

use crate::store::GraphStore;
use chrono::{DateTime, Utc};
use engram_config::TrustWeights;
use engram_types::{
    Component, Decision, GraphEdge, GraphNode, ImpactAnalysis, ImpactedComponent,
    IntelligenceReport, Memory, MemoryCommunity, MemoryError, NodeKind, RelatedMemory,
    RelationKind,
};
use engram_types::graph::{IntelligenceInsights, IntelligenceSummary};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const DEFAULT_TRAVERSAL_DEPTH: u32 = 2;
const TRUST_HALF_LIFE_DAYS: f64 = 90.0;
const LABEL_PROPAGATION_MAX_ROUNDS: usize = 100;
const CENTRAL_MEMORY_LIMIT: usize = 5;

pub struct IntelligenceEngine {
    store: Arc<dyn GraphStore>,
    trust_weights: TrustWeights,
}

impl IntelligenceEngine {
    pub fn new(store: Arc<dyn GraphStore>, trust_weights: TrustWeights) -> Self {
        Self {
            store,
            trust_weights,
        }
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    // ---- Projection ----

    /// Mirror a vector-store memory into the graph and attach it to any
    /// components or decisions its metadata references. Idempotent, so
    /// the projection worker can retry it safely.
    pub async fn project_memory(&self, memory: &Memory) -> Result<(), MemoryError> {
        self.store
            .upsert_memory_node(GraphNode {
                id: memory.id.clone(),
                kind: NodeKind::Memory,
                owner_id: memory.owner_id.clone(),
                label: memory.content.clone(),
                created_at: memory.created_at,
            })
            .await?;

        if let Some(components) = memory.metadata.get("components").and_then(|v| v.as_array()) {
            for name in components.iter().filter_map(|v| v.as_str()) {
                if self.store.get_component(name).await?.is_some() {
                    self.store
                        .add_edge(GraphEdge {
                            from: memory.id.clone(),
                            to: name.to_string(),
                            kind: RelationKind::Describes,
                            tag: None,
                            created_at: Utc::now(),
                        })
                        .await?;
                }
            }
        }

        if let Some(decision_id) = memory.metadata.get("decision_id").and_then(|v| v.as_str()) {
            if self.store.get_decision(decision_id).await?.is_some() {
                self.store
                    .add_edge(GraphEdge {
                        from: decision_id.to_string(),
                        to: memory.id.clone(),
                        kind: RelationKind::Justifies,
                        tag: None,
                        created_at: Utc::now(),
                    })
                    .await?;
            }
        }

        debug!(id = %memory.id, "memory projected into graph");
        Ok(())
    }

    /// Remove a deleted memory's node and incident edges
    pub async fn remove_memory(&self, memory_id: &str) -> Result<(), MemoryError> {
        self.store.remove_node(memory_id).await
    }

    // ---- Linking ----

    /// Create a typed edge between two owned memories. A SUPERSEDES
    /// edge flags the target obsolete in subsequent analyses.
    pub async fn link_memories(
        &self,
        owner_id: &str,
        a: &str,
        b: &str,
        kind: RelationKind,
    ) -> Result<(), MemoryError> {
        if !kind.is_memory_relation() {
            return Err(MemoryError::BadInput(format!(
                "{} is not a memory-to-memory relation",
                kind
            )));
        }

        for id in [a, b] {
            let node = self
                .store
                .get_node(id)
                .await?
                .ok_or_else(|| MemoryError::NotFound(format!("Memory {} not found", id)))?;
            if node.owner_id != owner_id {
                return Err(MemoryError::denied_for(id, owner_id));
            }
        }

        self.store
            .add_edge(GraphEdge {
                from: a.to_string(),
                to: b.to_string(),
                kind,
                tag: None,
                created_at: Utc::now(),
            })
            .await?;

        if kind == RelationKind::Supersedes {
            info!(superseded = %b, by = %a, "memory superseded");
        }
        Ok(())
    }

    // ---- Traversal ----

    /// All memories reachable within `depth` edges of the origin, with
    /// the edge kind that first connected them. BFS over both edge
    /// directions; duplicates collapsed; the origin itself excluded.
    pub async fn related_memories(
        &self,
        owner_id: &str,
        memory_id: &str,
        depth: Option<u32>,
    ) -> Result<Vec<RelatedMemory>, MemoryError> {
        let depth = depth.unwrap_or(DEFAULT_TRAVERSAL_DEPTH);

        let origin = self
            .store
            .get_node(memory_id)
            .await?
            .ok_or_else(|| MemoryError::NotFound(format!("Memory {} not found", memory_id)))?;
        if origin.owner_id != owner_id {
            return Err(MemoryError::denied_for(memory_id, owner_id));
        }

        let (nodes, edges) = self.store.owner_subgraph(owner_id).await?;
        let labels: HashMap<&str, &GraphNode> =
            nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        let adjacency = undirected_adjacency(&edges);

        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(memory_id);
        let mut queue: VecDeque<(&str, u32)> = VecDeque::new();
        queue.push_back((memory_id, 0));
        let mut related = Vec::new();

        while let Some((current, distance)) = queue.pop_front() {
            if distance >= depth {
                continue;
            }
            if let Some(neighbors) = adjacency.get(current) {
                for &(neighbor, kind) in neighbors {
                    if visited.insert(neighbor) {
                        if let Some(node) = labels.get(neighbor) {
                            related.push(RelatedMemory {
                                id: node.id.clone(),
                                content: node.label.clone(),
                                relation: kind,
                                distance: distance + 1,
                            });
                        }
                        queue.push_back((neighbor, distance + 1));
                    }
                }
            }
        }

        related.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.id.cmp(&b.id)));
        Ok(related)
    }

    /// Shortest edge-labelled path between two memories, or empty when
    /// none exists
    pub async fn find_path(&self, a: &str, b: &str) -> Result<Vec<GraphEdge>, MemoryError> {
        if a == b {
            return Ok(Vec::new());
        }

        // Frontier expansion over both directions; predecessor edges
        // reconstruct the path.
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(a.to_string());
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(a.to_string());
        let mut predecessor: HashMap<String, GraphEdge> = HashMap::new();

        while let Some(current) = queue.pop_front() {
            let mut incident = self.store.edges_from(&current).await?;
            incident.extend(self.store.edges_to(&current).await?);

            for edge in incident {
                let neighbor = if edge.from == current {
                    edge.to.clone()
                } else {
                    edge.from.clone()
                };
                if visited.insert(neighbor.clone()) {
                    predecessor.insert(neighbor.clone(), edge);
                    if neighbor == b {
                        let mut path = Vec::new();
                        let mut cursor = b.to_string();
                        while cursor != a {
                            let edge = predecessor.remove(&cursor).ok_or_else(|| {
                                MemoryError::Internal("path reconstruction lost an edge".into())
                            })?;
                            cursor = if edge.to == cursor {
                                edge.from.clone()
                            } else {
                                edge.to.clone()
                            };
                            path.push(edge);
                        }
                        path.reverse();
                        return Ok(path);
                    }
                    queue.push_back(neighbor);
                }
            }
        }

        Ok(Vec::new())
    }

    /// Memories whose content matches `topic` by substring, plus nodes
    /// they extend or supersede into, ordered by creation time
    pub async fn memory_evolution(
        &self,
        owner_id: &str,
        topic: &str,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<GraphNode>, MemoryError> {
        let (nodes, edges) = self.store.owner_subgraph(owner_id).await?;
        let needle = topic.to_lowercase();

        let mut selected: HashSet<&str> = nodes
            .iter()
            .filter(|n| n.label.to_lowercase().contains(&needle))
            .map(|n| n.id.as_str())
            .collect();

        // One hop of EXTENDS/SUPERSEDES out of the matching set
        let linked: Vec<&str> = edges
            .iter()
            .filter(|e| {
                matches!(e.kind, RelationKind::Extends | RelationKind::Supersedes)
                    && selected.contains(e.from.as_str())
            })
            .map(|e| e.to.as_str())
            .collect();
        selected.extend(linked);

        let mut evolution: Vec<GraphNode> = nodes
            .iter()
            .filter(|n| selected.contains(n.id.as_str()))
            .filter(|n| since.map(|t| n.created_at >= t).unwrap_or(true))
            .filter(|n| until.map(|t| n.created_at <= t).unwrap_or(true))
            .cloned()
            .collect();
        evolution.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(evolution)
    }

    /// Memories with an incoming SUPERSEDES edge from another owned node
    pub async fn find_superseded_memories(
        &self,
        owner_id: &str,
    ) -> Result<Vec<GraphNode>, MemoryError> {
        let (nodes, edges) = self.store.owner_subgraph(owner_id).await?;
        let superseded: HashSet<&str> = edges
            .iter()
            .filter(|e| e.kind == RelationKind::Supersedes)
            .map(|e| e.to.as_str())
            .collect();

        let mut result: Vec<GraphNode> = nodes
            .into_iter()
            .filter(|n| superseded.contains(n.id.as_str()))
            .collect();
        result.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(result)
    }

    // ---- Components ----

    pub async fn create_component(&self, name: &str, kind: &str) -> Result<Component, MemoryError> {
        if name.trim().is_empty() {
            return Err(MemoryError::BadInput("component name is required".into()));
        }
        self.store.upsert_component(name, kind).await
    }

    pub async fn link_component_dependency(
        &self,
        from: &str,
        to: &str,
        tag: Option<String>,
    ) -> Result<(), MemoryError> {
        for name in [from, to] {
            if self.store.get_component(name).await?.is_none() {
                return Err(MemoryError::NotFound(format!(
                    "Component {} not found",
                    name
                )));
            }
        }
        self.store
            .add_edge(GraphEdge {
                from: from.to_string(),
                to: to.to_string(),
                kind: RelationKind::DependsOn,
                tag,
                created_at: Utc::now(),
            })
            .await
    }

    pub async fn link_memory_to_component(
        &self,
        owner_id: &str,
        memory_id: &str,
        name: &str,
    ) -> Result<(), MemoryError> {
        let node = self
            .store
            .get_node(memory_id)
            .await?
            .ok_or_else(|| MemoryError::NotFound(format!("Memory {} not found", memory_id)))?;
        if node.owner_id != owner_id {
            return Err(MemoryError::denied_for(memory_id, owner_id));
        }
        if self.store.get_component(name).await?.is_none() {
            return Err(MemoryError::NotFound(format!("Component {} not found", name)));
        }

        self.store
            .add_edge(GraphEdge {
                from: memory_id.to_string(),
                to: name.to_string(),
                kind: RelationKind::Describes,
                tag: None,
                created_at: Utc::now(),
            })
            .await
    }

    /// What would break if `name` changed: the transitive set of
    /// components reachable via reversed DEPENDS_ON, each with the
    /// count of memories describing it
    pub async fn impact_analysis(&self, name: &str) -> Result<ImpactAnalysis, MemoryError> {
        if self.store.get_component(name).await?.is_none() {
            return Err(MemoryError::NotFound(format!("Component {} not found", name)));
        }

        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(name.to_string());
        let mut queue: VecDeque<(String, u32)> = VecDeque::new();
        queue.push_back((name.to_string(), 0));
        let mut impacted = Vec::new();

        while let Some((current, distance)) = queue.pop_front() {
            let dependents = self.store.edges_to(&current).await?;
            for edge in dependents
                .into_iter()
                .filter(|e| e.kind == RelationKind::DependsOn)
            {
                if visited.insert(edge.from.clone()) {
                    let describing = self.store.describing_memory_count(&edge.from).await?;
                    impacted.push(ImpactedComponent {
                        name: edge.from.clone(),
                        distance: distance + 1,
                        describing_memories: describing,
                    });
                    queue.push_back((edge.from, distance + 1));
                }
            }
        }

        impacted.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.name.cmp(&b.name)));
        Ok(ImpactAnalysis {
            component: name.to_string(),
            impacted,
        })
    }

    // ---- Decisions ----

    pub async fn create_decision(
        &self,
        owner_id: &str,
        text: &str,
        pros: Vec<String>,
        cons: Vec<String>,
        alternatives: Vec<String>,
    ) -> Result<Decision, MemoryError> {
        if text.trim().is_empty() {
            return Err(MemoryError::BadInput("decision text is required".into()));
        }
        let decision = Decision {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            owner_id: owner_id.to_string(),
            pros,
            cons,
            alternatives,
            created_at: Utc::now(),
        };
        self.store.create_decision(decision.clone()).await?;
        Ok(decision)
    }

    /// The decision node plus every memory linked via JUSTIFIES
    pub async fn decision_rationale(
        &self,
        id: &str,
    ) -> Result<(Decision, Vec<RelatedMemory>), MemoryError> {
        let decision = self
            .store
            .get_decision(id)
            .await?
            .ok_or_else(|| MemoryError::NotFound(format!("Decision {} not found", id)))?;

        let mut justified = Vec::new();
        for edge in self.store.edges_from(id).await? {
            if edge.kind != RelationKind::Justifies {
                continue;
            }
            if let Some(node) = self.store.get_node(&edge.to).await? {
                justified.push(RelatedMemory {
                    id: node.id,
                    content: node.label,
                    relation: RelationKind::Justifies,
                    distance: 1,
                });
            }
        }
        justified.sort_by(|a, b| a.id.cmp(&b.id));
        Ok((decision, justified))
    }

    // ---- Analyses ----

    /// Partition the owner's memory subgraph into clusters via label
    /// propagation. Nodes are swept in id order and ties adopt the
    /// smallest label, so the partition is deterministic.
    pub async fn detect_communities(
        &self,
        owner_id: &str,
    ) -> Result<Vec<MemoryCommunity>, MemoryError> {
        let (nodes, edges) = self.store.owner_subgraph(owner_id).await?;
        Ok(propagate_labels(&nodes, &edges))
    }

    /// Trust score in `[0, 1]` for one memory: weighted inbound
    /// citations, recency with a 90-day half-life, and a penalty per
    /// conflicting edge.
    pub async fn trust_score(&self, memory_id: &str) -> Result<f64, MemoryError> {
        self.trust_score_at(memory_id, Utc::now()).await
    }

    pub async fn trust_score_at(
        &self,
        memory_id: &str,
        now: DateTime<Utc>,
    ) -> Result<f64, MemoryError> {
        let node = self
            .store
            .get_node(memory_id)
            .await?
            .ok_or_else(|| MemoryError::NotFound(format!("Memory {} not found", memory_id)))?;

        let inbound = self.store.edges_to(memory_id).await?;
        let outbound = self.store.edges_from(memory_id).await?;

        let citations = inbound
            .iter()
            .filter(|e| matches!(e.kind, RelationKind::RespondsTo | RelationKind::Extends))
            .count() as f64;
        let conflicts = inbound
            .iter()
            .chain(outbound.iter())
            .filter(|e| e.kind == RelationKind::ConflictsWith)
            .count() as f64;

        let age_days = (now - node.created_at).num_seconds().max(0) as f64 / 86_400.0;
        let recency = 0.5f64.powf(age_days / TRUST_HALF_LIFE_DAYS);
        let citation_term = 1.0 - 1.0 / (1.0 + citations);
        let conflict_term = conflicts.min(4.0) / 4.0;

        let w = &self.trust_weights;
        let score =
            w.citations * citation_term + w.recency * recency - w.conflicts * conflict_term;
        Ok(score.clamp(0.0, 1.0))
    }

    /// The full intelligence report for one owner
    pub async fn intelligence_report(
        &self,
        owner_id: &str,
    ) -> Result<IntelligenceReport, MemoryError> {
        let (nodes, edges) = self.store.owner_subgraph(owner_id).await?;
        let total = nodes.len() as u64;

        let adjacency = undirected_adjacency(&edges);
        let degree: HashMap<&str, usize> = nodes
            .iter()
            .map(|n| {
                (
                    n.id.as_str(),
                    adjacency.get(n.id.as_str()).map(|v| v.len()).unwrap_or(0),
                )
            })
            .collect();

        let isolated = degree.values().filter(|d| **d == 0).count() as u64;
        let obsolete = edges
            .iter()
            .filter(|e| e.kind == RelationKind::Supersedes)
            .map(|e| e.to.as_str())
            .collect::<HashSet<_>>()
            .len() as u64;
        let conflicting: Vec<GraphEdge> = edges
            .iter()
            .filter(|e| e.kind == RelationKind::ConflictsWith)
            .cloned()
            .collect();

        let avg_connections = if total == 0 {
            0.0
        } else {
            degree.values().sum::<usize>() as f64 / total as f64
        };

        let communities = propagate_labels(&nodes, &edges);
        let clusters: HashMap<String, u64> = communities
            .iter()
            .map(|c| (c.label.clone(), c.member_ids.len() as u64))
            .collect();

        let mut by_degree: Vec<(&str, usize)> =
            degree.iter().map(|(id, d)| (*id, *d)).collect();
        by_degree.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let central_memories: Vec<String> = by_degree
            .iter()
            .take(CENTRAL_MEMORY_LIMIT)
            .filter(|(_, d)| *d > 0)
            .map(|(id, _)| id.to_string())
            .collect();

        let health = knowledge_health_score(&nodes, &edges, &adjacency);

        let mut recommendations = Vec::new();
        if total == 0 {
            recommendations.push("No memories yet; start capturing coding preferences".to_string());
        } else {
            if isolated as f64 / total as f64 > 0.2 {
                recommendations.push(
                    "Many memories are isolated; link related memories to improve recall".to_string(),
                );
            }
            if obsolete > 0 {
                recommendations
                    .push(format!("{} superseded memories could be archived", obsolete));
            }
            if !conflicting.is_empty() {
                recommendations.push(format!(
                    "{} conflicting relationships need resolution",
                    conflicting.len()
                ));
            }
            if recommendations.is_empty() {
                recommendations.push("Knowledge graph is healthy".to_string());
            }
        }

        Ok(IntelligenceReport {
            summary: IntelligenceSummary {
                total_memories: total,
                avg_connections,
                isolated_memories: isolated,
                obsolete_memories: obsolete,
                knowledge_health_score: health,
            },
            insights: IntelligenceInsights {
                conflicting_knowledge: conflicting,
                clusters,
                central_memories,
            },
            recommendations,
        })
    }
}

/// Undirected adjacency: node id -> (neighbor id, edge kind)
fn undirected_adjacency<'a>(
    edges: &'a [GraphEdge],
) -> HashMap<&'a str, Vec<(&'a str, RelationKind)>> {
    let mut adjacency: HashMap<&str, Vec<(&str, RelationKind)>> = HashMap::new();
    for edge in edges {
        adjacency
            .entry(edge.from.as_str())
            .or_default()
            .push((edge.to.as_str(), edge.kind));
        adjacency
            .entry(edge.to.as_str())
            .or_default()
            .push((edge.from.as_str(), edge.kind));
    }
    adjacency
}

/// Label propagation with deterministic sweeps: nodes visited in id
/// order, label ties broken toward the smallest label.
fn propagate_labels(nodes: &[GraphNode], edges: &[GraphEdge]) -> Vec<MemoryCommunity> {
    let mut ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    ids.sort_unstable();
    let adjacency = undirected_adjacency(edges);

    let mut labels: HashMap<&str, &str> = ids.iter().map(|id| (*id, *id)).collect();

    for _ in 0..LABEL_PROPAGATION_MAX_ROUNDS {
        let mut changed = false;
        for id in &ids {
            let Some(neighbors) = adjacency.get(*id) else {
                continue;
            };
            if neighbors.is_empty() {
                continue;
            }

            let mut counts: HashMap<&str, usize> = HashMap::new();
            for &(neighbor, _) in neighbors {
                if let Some(label) = labels.get(neighbor) {
                    *counts.entry(*label).or_default() += 1;
                }
            }
            let Some(best) = counts
                .iter()
                .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
                .map(|(label, _)| *label)
            else {
                continue;
            };

            if labels[*id] != best {
                labels.insert(*id, best);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let mut clusters: HashMap<&str, Vec<String>> = HashMap::new();
    for id in &ids {
        clusters.entry(labels[*id]).or_default().push(id.to_string());
    }

    let mut communities: Vec<MemoryCommunity> = clusters
        .into_iter()
        .map(|(label, mut member_ids)| {
            member_ids.sort_unstable();
            MemoryCommunity {
                label: label.to_string(),
                member_ids,
            }
        })
        .collect();
    communities.sort_by(|a, b| a.label.cmp(&b.label));
    communities
}

/// Knowledge health score in `[0, 10]`.
///
/// Published formula:
///
/// ```text
/// score = 10 * clamp( 0.35 * (1 - isolated_ratio)
///                   + 0.25 * (1 - obsolete_ratio)
///                   + 0.25 * (1 - conflict_ratio)
///                   + 0.15 * avg_clustering, 0, 1 )
/// ```
///
/// where `isolated_ratio` and `obsolete_ratio` are over memory nodes,
/// `conflict_ratio` is CONFLICTS_WITH edges over all edges (0 when the
/// graph has no edges), and `avg_clustering` is the mean local
/// clustering coefficient over nodes with degree >= 2. An empty graph
/// scores 10: nothing is unhealthy about it yet.
fn knowledge_health_score(
    nodes: &[GraphNode],
    edges: &[GraphEdge],
    adjacency: &HashMap<&str, Vec<(&str, RelationKind)>>,
) -> f64 {
    let total = nodes.len();
    if total == 0 {
        return 10.0;
    }

    let isolated = nodes
        .iter()
        .filter(|n| adjacency.get(n.id.as_str()).map(|v| v.is_empty()).unwrap_or(true))
        .count();
    let obsolete = edges
        .iter()
        .filter(|e| e.kind == RelationKind::Supersedes)
        .map(|e| e.to.as_str())
        .collect::<HashSet<_>>()
        .len();
    let conflicts = edges
        .iter()
        .filter(|e| e.kind == RelationKind::ConflictsWith)
        .count();

    let isolated_ratio = isolated as f64 / total as f64;
    let obsolete_ratio = obsolete as f64 / total as f64;
    let conflict_ratio = if edges.is_empty() {
        0.0
    } else {
        conflicts as f64 / edges.len() as f64
    };
    let avg_clustering = average_clustering(nodes, adjacency);

    let raw = 0.35 * (1.0 - isolated_ratio)
        + 0.25 * (1.0 - obsolete_ratio)
        + 0.25 * (1.0 - conflict_ratio)
        + 0.15 * avg_clustering;
    10.0 * raw.clamp(0.0, 1.0)
}

/// Mean local clustering coefficient over nodes with degree >= 2;
/// 0 when no node qualifies
fn average_clustering(
    nodes: &[GraphNode],
    adjacency: &HashMap<&str, Vec<(&str, RelationKind)>>,
) -> f64 {
    let neighbor_sets: HashMap<&str, HashSet<&str>> = adjacency
        .iter()
        .map(|(id, neighbors)| (*id, neighbors.iter().map(|(n, _)| *n).collect()))
        .collect();

    let mut sum = 0.0;
    let mut counted = 0usize;

    for node in nodes {
        let Some(neighbors) = neighbor_sets.get(node.id.as_str()) else {
            continue;
        };
        let k = neighbors.len();
        if k < 2 {
            continue;
        }

        let mut links = 0usize;
        let neighbor_list: Vec<&str> = neighbors.iter().copied().collect();
        for (i, a) in neighbor_list.iter().enumerate() {
            for b in neighbor_list.iter().skip(i + 1) {
                if neighbor_sets.get(a).map(|s| s.contains(b)).unwrap_or(false) {
                    links += 1;
                }
            }
        }
        sum += 2.0 * links as f64 / (k as f64 * (k as f64 - 1.0));
        counted += 1;
    }

    if counted == 0 {
        0.0
    } else {
        sum / counted as f64
    }
}
