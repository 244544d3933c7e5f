//! Shared domain types and wire contracts for the engram workspace
//!
//! Everything that crosses a crate or process boundary lives here: the
//! memory row model, history events, graph node/edge types, auth records,
//! the error taxonomy, and the REST request/response structs.

pub mod api;
pub mod auth;
pub mod error;
pub mod graph;
pub mod memory;
pub mod vector;

pub use api::*;
pub use auth::{AuditAction, AuditEvent, AuthToken, TokenStats};
pub use error::MemoryError;
pub use graph::{
    Component, Decision, GraphEdge, GraphNode, ImpactAnalysis, ImpactedComponent,
    IntelligenceReport, MemoryCommunity, NodeKind, RelatedMemory, RelationKind,
};
pub use memory::{HistoryEvent, HistoryEventKind, Memory, MemoryRecord};
pub use vector::cosine_similarity;
