//! Memory row model and append-only history events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A stored memory: one atomic fact extracted from submitted text,
/// owned by exactly one user/project scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// Opaque stable identifier
    pub id: String,
    /// Owning user or project scope; immutable after insert
    pub owner_id: String,
    /// The extracted fact (never the raw submitted text)
    pub content: String,
    /// Open key -> value metadata (chunk bookkeeping, run ids, tags)
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Stable hash of `content`, used for dedup/equality
    pub content_hash: String,
}

/// A memory row together with its embedding, as persisted in the
/// vector store. The embedding never crosses the HTTP boundary.
#[derive(Debug, Clone)]
pub struct MemoryRecord {
    pub memory: Memory,
    pub embedding: Vec<f32>,
}

/// Kind of a history event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HistoryEventKind {
    Add,
    Update,
    Delete,
}

impl HistoryEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryEventKind::Add => "ADD",
            HistoryEventKind::Update => "UPDATE",
            HistoryEventKind::Delete => "DELETE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ADD" => Some(HistoryEventKind::Add),
            "UPDATE" => Some(HistoryEventKind::Update),
            "DELETE" => Some(HistoryEventKind::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for HistoryEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only record of one mutation of a memory. Never rewritten
/// once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub memory_id: String,
    pub event_kind: HistoryEventKind,
    pub prev_content: Option<String>,
    pub new_content: Option<String>,
    pub timestamp: DateTime<Utc>,
}
