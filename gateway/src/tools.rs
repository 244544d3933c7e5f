//! MCP tool catalogue and dispatch
//!
//! Thirteen tools over the Memory Service. Every tool runs under the
//! effective project scope derived for the request; the gateway holds
//! no memory state of its own.

use crate::chunker::chunk_text;
use crate::GatewayState;
use engram_types::{
    AddMemoriesRequest, ChatMessage, ChunkOutcome, CreateComponentRequest,
    CreateDecisionRequest, IngestionSummary, LinkComponentsRequest, LinkMemoriesRequest,
    MemoryError, RelationKind, SearchRequest,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Tool descriptors for `tools/list`
pub fn tool_descriptors() -> Vec<Value> {
    let text_arg = |name: &str, description: &str| {
        json!({
            "type": "object",
            "properties": { name: { "type": "string", "description": description } },
            "required": [name],
        })
    };

    vec![
        json!({
            "name": "add_coding_preference",
            "description": "Store a coding preference, decision, or fact. Long text is chunked automatically.",
            "inputSchema": text_arg("text", "What to remember"),
        }),
        json!({
            "name": "search_coding_preferences",
            "description": "Semantic search over stored preferences.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "limit": { "type": "integer", "default": DEFAULT_SEARCH_LIMIT },
                },
                "required": ["query"],
            },
        }),
        json!({
            "name": "get_all_coding_preferences",
            "description": "List every memory owned by the effective project.",
            "inputSchema": { "type": "object", "properties": {} },
        }),
        json!({
            "name": "delete_memory",
            "description": "Delete one memory by id.",
            "inputSchema": text_arg("memory_id", "Memory id to delete"),
        }),
        json!({
            "name": "get_memory_history",
            "description": "Ordered history events of one memory.",
            "inputSchema": text_arg("memory_id", "Memory id"),
        }),
        json!({
            "name": "link_memories",
            "description": "Create a typed relationship between two memories (RELATES_TO, DEPENDS_ON, SUPERSEDES, RESPONDS_TO, EXTENDS, CONFLICTS_WITH).",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "a": { "type": "string" },
                    "b": { "type": "string" },
                    "relation": { "type": "string" },
                },
                "required": ["a", "b", "relation"],
            },
        }),
        json!({
            "name": "get_related_memories",
            "description": "Memories reachable within `depth` relationship hops.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "memory_id": { "type": "string" },
                    "depth": { "type": "integer", "default": 2 },
                },
                "required": ["memory_id"],
            },
        }),
        json!({
            "name": "analyze_memory_intelligence",
            "description": "Knowledge graph health report: connectivity, conflicts, clusters, recommendations.",
            "inputSchema": { "type": "object", "properties": {} },
        }),
        json!({
            "name": "create_component",
            "description": "Register an architectural component (name is unique).",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "kind": { "type": "string", "description": "e.g. Service, Infrastructure" },
                },
                "required": ["name", "kind"],
            },
        }),
        json!({
            "name": "link_component_dependency",
            "description": "Record that one component depends on another.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "from": { "type": "string" },
                    "to": { "type": "string" },
                    "tag": { "type": "string" },
                },
                "required": ["from", "to"],
            },
        }),
        json!({
            "name": "analyze_component_impact",
            "description": "What would break if this component changed.",
            "inputSchema": text_arg("name", "Component name"),
        }),
        json!({
            "name": "create_decision",
            "description": "Record a decision with pros, cons, and alternatives.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "text": { "type": "string" },
                    "pros": { "type": "array", "items": { "type": "string" } },
                    "cons": { "type": "array", "items": { "type": "string" } },
                    "alternatives": { "type": "array", "items": { "type": "string" } },
                },
                "required": ["text"],
            },
        }),
        json!({
            "name": "get_decision_rationale",
            "description": "A decision plus the memories that justify it.",
            "inputSchema": text_arg("decision_id", "Decision id"),
        }),
    ]
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, MemoryError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| MemoryError::BadInput(format!("{} is required", key)))
}

fn optional_u32(args: &Value, key: &str) -> Option<u32> {
    args.get(key).and_then(|v| v.as_u64()).map(|v| v as u32)
}

fn string_list(args: &Value, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Execute one tool under the resolved owner scope
pub async fn execute_tool(
    state: &GatewayState,
    scope: &str,
    name: &str,
    args: &Value,
) -> Result<Value, MemoryError> {
    match name {
        "add_coding_preference" => {
            let text = required_str(args, "text")?;
            let summary = ingest_chunked(state, scope, text).await?;
            Ok(serde_json::to_value(summary)
                .map_err(|e| MemoryError::Internal(e.to_string()))?)
        }
        "search_coding_preferences" => {
            let query = required_str(args, "query")?;
            let limit = args
                .get("limit")
                .and_then(|v| v.as_u64())
                .map(|v| v as usize)
                .unwrap_or(DEFAULT_SEARCH_LIMIT);
            let response = state
                .client
                .search(&SearchRequest {
                    query: query.to_string(),
                    user_id: scope.to_string(),
                    limit: Some(limit),
                    filters: None,
                    agent_id: None,
                    run_id: None,
                })
                .await?;
            Ok(serde_json::to_value(response)
                .map_err(|e| MemoryError::Internal(e.to_string()))?)
        }
        "get_all_coding_preferences" => {
            let response = state.client.list_memories(scope).await?;
            Ok(serde_json::to_value(response)
                .map_err(|e| MemoryError::Internal(e.to_string()))?)
        }
        "delete_memory" => {
            let memory_id = required_str(args, "memory_id")?;
            let response = state.client.delete_memory(memory_id, scope).await?;
            Ok(serde_json::to_value(response)
                .map_err(|e| MemoryError::Internal(e.to_string()))?)
        }
        "get_memory_history" => {
            let memory_id = required_str(args, "memory_id")?;
            let events = state.client.memory_history(memory_id, scope).await?;
            Ok(serde_json::to_value(events)
                .map_err(|e| MemoryError::Internal(e.to_string()))?)
        }
        "link_memories" => {
            let relation_raw = required_str(args, "relation")?;
            let relation = RelationKind::parse(&relation_raw.to_uppercase())
                .filter(RelationKind::is_memory_relation)
                .ok_or_else(|| {
                    MemoryError::BadInput(format!("unknown relation: {}", relation_raw))
                })?;
            let response = state
                .client
                .link_memories(&LinkMemoriesRequest {
                    user_id: scope.to_string(),
                    a: required_str(args, "a")?.to_string(),
                    b: required_str(args, "b")?.to_string(),
                    relation,
                })
                .await?;
            Ok(serde_json::to_value(response)
                .map_err(|e| MemoryError::Internal(e.to_string()))?)
        }
        "get_related_memories" => {
            let memory_id = required_str(args, "memory_id")?;
            let related = state
                .client
                .related_memories(memory_id, scope, optional_u32(args, "depth"))
                .await?;
            Ok(serde_json::to_value(related)
                .map_err(|e| MemoryError::Internal(e.to_string()))?)
        }
        "analyze_memory_intelligence" => {
            let report = state.client.intelligence(scope).await?;
            Ok(serde_json::to_value(report)
                .map_err(|e| MemoryError::Internal(e.to_string()))?)
        }
        "create_component" => {
            let response = state
                .client
                .create_component(&CreateComponentRequest {
                    name: required_str(args, "name")?.to_string(),
                    kind: required_str(args, "kind")?.to_string(),
                })
                .await?;
            Ok(response)
        }
        "link_component_dependency" => {
            let response = state
                .client
                .link_components(&LinkComponentsRequest {
                    from: required_str(args, "from")?.to_string(),
                    to: required_str(args, "to")?.to_string(),
                    tag: args
                        .get("tag")
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                })
                .await?;
            Ok(response)
        }
        "analyze_component_impact" => {
            let impact = state
                .client
                .component_impact(required_str(args, "name")?)
                .await?;
            Ok(serde_json::to_value(impact)
                .map_err(|e| MemoryError::Internal(e.to_string()))?)
        }
        "create_decision" => {
            let response = state
                .client
                .create_decision(&CreateDecisionRequest {
                    user_id: scope.to_string(),
                    text: required_str(args, "text")?.to_string(),
                    pros: string_list(args, "pros"),
                    cons: string_list(args, "cons"),
                    alternatives: string_list(args, "alternatives"),
                })
                .await?;
            Ok(serde_json::to_value(response)
                .map_err(|e| MemoryError::Internal(e.to_string()))?)
        }
        "get_decision_rationale" => {
            let rationale = state
                .client
                .decision_rationale(required_str(args, "decision_id")?)
                .await?;
            Ok(serde_json::to_value(rationale)
                .map_err(|e| MemoryError::Internal(e.to_string()))?)
        }
        _ => Err(MemoryError::BadInput(format!("unknown tool: {}", name))),
    }
}

/// Chunk oversized text and dispatch the chunks sequentially. A chunk
/// failure stops the run; the summary reports the successes and the
/// failed index so the caller can retry the suffix.
async fn ingest_chunked(
    state: &GatewayState,
    scope: &str,
    text: &str,
) -> Result<IngestionSummary, MemoryError> {
    let chunks = chunk_text(text, &state.chunking);
    let total_chunks = chunks.len();
    let run_id = Uuid::new_v4().to_string();
    let chunked = total_chunks > 1;

    let mut outcomes: Vec<ChunkOutcome> = Vec::with_capacity(total_chunks);
    for chunk in &chunks {
        let mut metadata: HashMap<String, serde_json::Value> = HashMap::new();
        if chunked {
            metadata.insert("chunk_index".into(), json!(chunk.index));
            metadata.insert("total_chunks".into(), json!(total_chunks));
            metadata.insert("chunk_size".into(), json!(chunk.size));
            metadata.insert("has_overlap".into(), json!(chunk.has_overlap));
            metadata.insert("run_id".into(), json!(run_id));
        }

        let request = AddMemoriesRequest {
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: chunk.content.clone(),
            }],
            user_id: scope.to_string(),
            metadata: if metadata.is_empty() {
                None
            } else {
                Some(metadata)
            },
            agent_id: None,
            run_id: Some(run_id.clone()),
        };

        match state.client.add_memories(&request).await {
            Ok(response) => {
                outcomes.push(ChunkOutcome {
                    chunk_index: chunk.index,
                    memory_ids: response.results.into_iter().map(|r| r.id).collect(),
                });
            }
            Err(e) => {
                warn!(
                    run_id = %run_id,
                    chunk = chunk.index,
                    "chunk dispatch failed: {}",
                    e
                );
                return Ok(IngestionSummary {
                    run_id,
                    total_chunks,
                    chunks: outcomes,
                    failed_chunk_index: Some(chunk.index),
                    error: Some(e.to_string()),
                });
            }
        }
    }

    info!(run_id = %run_id, chunks = total_chunks, scope, "ingestion complete");
    Ok(IngestionSummary {
        run_id,
        total_chunks,
        chunks: outcomes,
        failed_chunk_index: None,
        error: None,
    })
}
