//! Chat LLM provider trait and implementations
//!
//! Used by the extraction pipeline. One completion per `POST /memories`
//! call, bounded by the configured extraction deadline.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use engram_config::{LlmConfig, LlmProviderKind};
use std::sync::Arc;
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_COMPLETION_TOKENS: u32 = 2048;

/// Trait for chat completion providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run one completion with a system prompt and a user message
    async fn complete(&self, system: &str, user: &str) -> Result<String>;

    /// Model identifier
    fn model_name(&self) -> &str;
}

/// Ollama chat provider (`/api/chat`)
pub struct OllamaChat {
    client: reqwest::Client,
    base_url: String,
    model_name: String,
}

impl OllamaChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: config.ollama_url.clone(),
            model_name: config.ollama_model.clone(),
        })
    }
}

#[async_trait]
impl LlmProvider for OllamaChat {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request_body = serde_json::json!({
            "model": self.model_name,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "stream": false,
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request_body)
            .send()
            .await
            .context("Ollama chat request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("Ollama API error: {}", response.status()));
        }

        let body: serde_json::Value = response.json().await?;
        let content = body["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("Invalid chat response format"))?;

        debug!(model = %self.model_name, chars = content.len(), "ollama completion");
        Ok(content.to_string())
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// OpenAI chat provider (`/chat/completions`)
pub struct OpenAiChat {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model_name: String,
}

impl OpenAiChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if config.openai_api_key.is_empty() {
            return Err(anyhow!("OPENAI_API_KEY is required for the openai provider"));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: config.openai_base_url.clone(),
            api_key: config.openai_api_key.clone(),
            model_name: config.openai_model.clone(),
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiChat {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request_body = serde_json::json!({
            "model": self.model_name,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .context("OpenAI chat request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("OpenAI API error: {}", response.status()));
        }

        let body: serde_json::Value = response.json().await?;
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("Invalid chat response format"))?;

        Ok(content.to_string())
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Anthropic messages provider (`/v1/messages`)
pub struct AnthropicChat {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model_name: String,
}

impl AnthropicChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if config.anthropic_api_key.is_empty() {
            return Err(anyhow!(
                "ANTHROPIC_API_KEY is required for the anthropic provider"
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: config.anthropic_base_url.clone(),
            api_key: config.anthropic_api_key.clone(),
            model_name: config.anthropic_model.clone(),
        })
    }
}

#[async_trait]
impl LlmProvider for AnthropicChat {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request_body = serde_json::json!({
            "model": self.model_name,
            "max_tokens": MAX_COMPLETION_TOKENS,
            "system": system,
            "messages": [
                {"role": "user", "content": user},
            ],
        });

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request_body)
            .send()
            .await
            .context("Anthropic messages request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("Anthropic API error: {}", response.status()));
        }

        let body: serde_json::Value = response.json().await?;
        let content = body["content"][0]["text"]
            .as_str()
            .ok_or_else(|| anyhow!("Invalid messages response format"))?;

        Ok(content.to_string())
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Wire the configured chat provider
pub fn build_llm(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match config.provider {
        LlmProviderKind::Ollama => Arc::new(OllamaChat::new(config)?),
        LlmProviderKind::OpenAi => Arc::new(OpenAiChat::new(config)?),
        LlmProviderKind::Anthropic => Arc::new(AnthropicChat::new(config)?),
    };
    Ok(provider)
}
