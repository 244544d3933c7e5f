//! REST request/response contracts for the Memory Service
//!
//! Shared by the service handlers and the MCP gateway client so the two
//! processes cannot drift apart on the wire.

use crate::graph::RelationKind;
use crate::memory::HistoryEventKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One chat message of the raw submitted conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// `POST /memories` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMemoriesRequest {
    pub messages: Vec<ChatMessage>,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

/// One extraction outcome in a `POST /memories` response, in extractor
/// output order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryResult {
    pub id: String,
    /// The stored fact content
    pub memory: String,
    pub event: HistoryEventKind,
    pub created_at: DateTime<Utc>,
}

/// `POST /memories` response body. `relations` is a placeholder the
/// client never waits on: graph projection is asynchronous.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMemoriesResponse {
    pub results: Vec<MemoryResult>,
    #[serde(default)]
    pub relations: Vec<serde_json::Value>,
}

/// `POST /search` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<HashMap<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

/// One ranked search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub memory: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

/// Memory as listed by `GET /memories` (embedding omitted)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryView {
    pub id: String,
    pub memory: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListMemoriesResponse {
    pub results: Vec<MemoryView>,
}

/// `PUT /memories/{id}` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMemoryRequest {
    pub user_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteMemoryResponse {
    pub id: String,
    pub deleted: bool,
}

// ---- Graph endpoints ----

/// `POST /graph/link`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkMemoriesRequest {
    pub user_id: String,
    pub a: String,
    pub b: String,
    pub relation: RelationKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkMemoriesResponse {
    pub linked: bool,
    pub relation: RelationKind,
}

/// `POST /graph/components`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateComponentRequest {
    pub name: String,
    pub kind: String,
}

/// `POST /graph/components/link`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkComponentsRequest {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// `POST /graph/components/describe`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeComponentRequest {
    pub user_id: String,
    pub memory_id: String,
    pub name: String,
}

/// `POST /graph/decisions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDecisionRequest {
    pub user_id: String,
    pub text: String,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDecisionResponse {
    pub id: String,
}

/// `GET /graph/decisions/{id}` response: the node plus memories linked
/// via JUSTIFIES
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRationale {
    pub decision: crate::graph::Decision,
    pub justified_memories: Vec<crate::graph::RelatedMemory>,
}

/// `POST /graph/sync` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSyncResponse {
    pub scheduled: u64,
}

// ---- Gateway ingestion summary ----

/// Per-chunk outcome reported by `add_coding_preference`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkOutcome {
    pub chunk_index: usize,
    pub memory_ids: Vec<String>,
}

/// Summary returned by the gateway after chunked ingestion. On partial
/// failure `failed_chunk_index` names the first chunk that failed;
/// `chunks` lists only the successes, so the caller may retry the
/// failed suffix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionSummary {
    pub run_id: String,
    pub total_chunks: usize,
    pub chunks: Vec<ChunkOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_chunk_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_request_accepts_minimal_body() {
        let body = r#"{"messages":[{"role":"user","content":"hi"}],"user_id":"alice"}"#;
        let req: AddMemoriesRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.user_id, "alice");
        assert!(req.metadata.is_none());
        assert!(req.run_id.is_none());
    }

    #[test]
    fn search_request_defaults() {
        let body = r#"{"query":"q","user_id":"u"}"#;
        let req: SearchRequest = serde_json::from_str(body).unwrap();
        assert!(req.limit.is_none());
        assert!(req.filters.is_none());
    }

    #[test]
    fn ingestion_summary_omits_failure_fields_on_success() {
        let summary = IngestionSummary {
            run_id: "run".into(),
            total_chunks: 1,
            chunks: vec![],
            failed_chunk_index: None,
            error: None,
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("failed_chunk_index"));
    }
}
