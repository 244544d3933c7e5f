//! Fact extraction via the configured LLM
//!
//! Turns a raw submitted conversation into zero or more atomic,
//! durable, first-person statements, each tagged ADD, UPDATE, or NONE.

use crate::llm::LlmProvider;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

const EXTRACTION_SYSTEM_PROMPT: &str = r#"You extract durable facts from conversations with a software developer.

Rules:
- Emit atomic, first-person statements about lasting preferences, decisions, and facts ("I prefer...", "My project uses...").
- Skip greetings, questions, and transient context.
- Tag each statement with an action:
  - ADD: a new fact not seen before
  - UPDATE: a correction or replacement of an earlier fact
  - NONE: not worth storing
- Respond with ONLY a JSON array, no prose:
  [{"content": "...", "action": "ADD"}]
- Respond with [] when nothing is worth storing."#;

/// Action the extractor assigned to one statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MemoryAction {
    Add,
    Update,
    None,
}

impl MemoryAction {
    fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "ADD" => MemoryAction::Add,
            "UPDATE" => MemoryAction::Update,
            _ => MemoryAction::None,
        }
    }
}

/// One extracted statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedFact {
    pub content: String,
    pub action: MemoryAction,
}

/// Runs the extraction prompt and parses the model's reply
pub struct FactExtractor {
    llm: Arc<dyn LlmProvider>,
}

impl FactExtractor {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Extract facts from a conversation rendered as `(role, content)`
    /// pairs. Returns facts in the model's output order; NONE items are
    /// kept so the caller can ignore them explicitly.
    pub async fn extract(&self, messages: &[(String, String)]) -> Result<Vec<ExtractedFact>> {
        if messages.is_empty() {
            return Err(anyhow!("No messages to extract from"));
        }

        let transcript = messages
            .iter()
            .map(|(role, content)| format!("{}: {}", role, content))
            .collect::<Vec<_>>()
            .join("\n");

        let reply = self.llm.complete(EXTRACTION_SYSTEM_PROMPT, &transcript).await?;
        let facts = parse_extraction_reply(&reply)?;

        debug!(
            model = self.llm.model_name(),
            facts = facts.len(),
            "extraction complete"
        );
        Ok(facts)
    }
}

/// Parse the model reply into facts. Tolerates markdown fences and
/// leading prose; the first JSON array found wins.
fn parse_extraction_reply(reply: &str) -> Result<Vec<ExtractedFact>> {
    let json = extract_json_array(reply)
        .ok_or_else(|| anyhow!("Extractor reply contains no JSON array"))?;

    let items: Vec<serde_json::Value> =
        serde_json::from_str(json).map_err(|e| anyhow!("Malformed extractor reply: {}", e))?;

    let mut facts = Vec::with_capacity(items.len());
    for item in items {
        let content = match item["content"].as_str() {
            Some(c) if !c.trim().is_empty() => c.trim().to_string(),
            _ => {
                warn!("extractor item missing content, skipping");
                continue;
            }
        };
        let action = item["action"]
            .as_str()
            .map(MemoryAction::parse)
            .unwrap_or(MemoryAction::None);
        facts.push(ExtractedFact { content, action });
    }

    Ok(facts)
}

/// Locate the outermost JSON array in free-form model output
fn extract_json_array(reply: &str) -> Option<&str> {
    let start = reply.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in reply[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '[' if !in_string => depth += 1,
            ']' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&reply[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
