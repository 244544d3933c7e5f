//! Graph node and edge types for the relationship graph

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of a graph node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Memory,
    Component,
    Decision,
}

/// Typed relationship between graph nodes.
///
/// Memory-to-memory edges use the first six kinds; `DependsOn` doubles
/// as the component-to-component dependency, `Describes` links a memory
/// to a component, and `Justifies` links a decision to a memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationKind {
    RelatesTo,
    DependsOn,
    Supersedes,
    RespondsTo,
    Extends,
    ConflictsWith,
    Describes,
    Justifies,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::RelatesTo => "RELATES_TO",
            RelationKind::DependsOn => "DEPENDS_ON",
            RelationKind::Supersedes => "SUPERSEDES",
            RelationKind::RespondsTo => "RESPONDS_TO",
            RelationKind::Extends => "EXTENDS",
            RelationKind::ConflictsWith => "CONFLICTS_WITH",
            RelationKind::Describes => "DESCRIBES",
            RelationKind::Justifies => "JUSTIFIES",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RELATES_TO" => Some(RelationKind::RelatesTo),
            "DEPENDS_ON" => Some(RelationKind::DependsOn),
            "SUPERSEDES" => Some(RelationKind::Supersedes),
            "RESPONDS_TO" => Some(RelationKind::RespondsTo),
            "EXTENDS" => Some(RelationKind::Extends),
            "CONFLICTS_WITH" => Some(RelationKind::ConflictsWith),
            "DESCRIBES" => Some(RelationKind::Describes),
            "JUSTIFIES" => Some(RelationKind::Justifies),
            _ => None,
        }
    }

    /// Kinds accepted by `link_memories` for memory-to-memory edges
    pub fn is_memory_relation(&self) -> bool {
        !matches!(self, RelationKind::Describes | RelationKind::Justifies)
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A node in the relationship graph. Memory nodes mirror vector-store
/// rows 1-to-1 once projection has succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    pub owner_id: String,
    /// Content snapshot for memory nodes; name for components
    pub label: String,
    pub created_at: DateTime<Utc>,
}

/// A typed directed edge between two graph nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub kind: RelationKind,
    /// Optional free-form tag (component dependency edges)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An architectural component node. Names are unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    /// Free-form tag such as "Service" or "Infrastructure"
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

/// A recorded decision with structured rationale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub text: String,
    pub owner_id: String,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub alternatives: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// One memory reached by graph traversal, with the edge kind that
/// connected it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedMemory {
    pub id: String,
    pub content: String,
    pub relation: RelationKind,
    /// Number of edges from the origin
    pub distance: u32,
}

/// Transitive impact of changing one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactAnalysis {
    pub component: String,
    /// Components that transitively depend on `component`
    pub impacted: Vec<ImpactedComponent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactedComponent {
    pub name: String,
    /// Dependency hops from the changed component
    pub distance: u32,
    /// Memories with a DESCRIBES edge to this component
    pub describing_memories: u64,
}

/// One cluster from label-propagation community detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCommunity {
    pub label: String,
    pub member_ids: Vec<String>,
}

/// Summary section of the intelligence report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelligenceSummary {
    pub total_memories: u64,
    pub avg_connections: f64,
    pub isolated_memories: u64,
    pub obsolete_memories: u64,
    pub knowledge_health_score: f64,
}

/// Insight section of the intelligence report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelligenceInsights {
    /// CONFLICTS_WITH edges present in the owner's subgraph
    pub conflicting_knowledge: Vec<GraphEdge>,
    /// Community label -> member count
    pub clusters: HashMap<String, u64>,
    /// Top node ids by degree
    pub central_memories: Vec<String>,
}

/// Output of `analyze_memory_intelligence`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelligenceReport {
    pub summary: IntelligenceSummary,
    pub insights: IntelligenceInsights,
    pub recommendations: Vec<String>,
}
