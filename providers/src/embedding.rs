//! Embedding provider trait and implementations

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use engram_config::{EmbeddingConfig, EmbeddingProviderKind};
use std::sync::Arc;
use tracing::debug;

/// Trait for embedding providers. Every returned vector is checked
/// against the configured dimensionality; a mismatch is an error, never
/// a silently truncated row.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a batch of texts, in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Dimensionality of vectors produced by this provider
    fn dimensions(&self) -> usize;

    /// Model identifier
    fn model_name(&self) -> &str;

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool>;
}

fn check_dimensions(embedding: &[f32], expected: usize) -> Result<()> {
    if embedding.len() != expected {
        return Err(anyhow!(
            "Expected embedding dimension {}, got {}",
            expected,
            embedding.len()
        ));
    }
    Ok(())
}

/// Ollama embedding provider (`/api/embeddings`)
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model_name: String,
    dimensions: usize,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.ollama_url.clone(),
            model_name: config.model.clone(),
            dimensions: config.dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for text in texts {
            let request_body = serde_json::json!({
                "model": self.model_name,
                "prompt": text,
            });

            let response = self
                .client
                .post(format!("{}/api/embeddings", self.base_url))
                .json(&request_body)
                .send()
                .await
                .context("Ollama embedding request failed")?;

            if !response.status().is_success() {
                return Err(anyhow!("Ollama API error: {}", response.status()));
            }

            let body: serde_json::Value = response.json().await?;
            let values = body["embedding"]
                .as_array()
                .ok_or_else(|| anyhow!("Invalid embedding response format"))?;

            let embedding: Vec<f32> = values
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect();
            check_dimensions(&embedding, self.dimensions)?;
            embeddings.push(embedding);
        }

        debug!(count = embeddings.len(), model = %self.model_name, "generated embeddings");
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?;
        Ok(response.status().is_success())
    }
}

/// OpenAI embedding provider (`/embeddings`, batched)
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model_name: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        if config.openai_api_key.is_empty() {
            return Err(anyhow!("OPENAI_API_KEY is required for the openai embedder"));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.openai_base_url.clone(),
            api_key: config.openai_api_key.clone(),
            model_name: config.model.clone(),
            dimensions: config.dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request_body = serde_json::json!({
            "model": self.model_name,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .context("OpenAI embedding request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("OpenAI API error: {}", response.status()));
        }

        let body: serde_json::Value = response.json().await?;
        let data = body["data"]
            .as_array()
            .ok_or_else(|| anyhow!("Invalid embedding response format"))?;

        let mut embeddings = Vec::with_capacity(data.len());
        for item in data {
            let values = item["embedding"]
                .as_array()
                .ok_or_else(|| anyhow!("Invalid embedding response format"))?;
            let embedding: Vec<f32> = values
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect();
            check_dimensions(&embedding, self.dimensions)?;
            embeddings.push(embedding);
        }

        if embeddings.len() != texts.len() {
            return Err(anyhow!(
                "OpenAI returned {} embeddings for {} inputs",
                embeddings.len(),
                texts.len()
            ));
        }

        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Ok(response.status().is_success())
    }
}

/// Deterministic hash-based provider for tests. Same text, same vector.
pub struct DeterministicEmbedder {
    dimensions: usize,
    model_name: String,
}

impl DeterministicEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            model_name: "deterministic".to_string(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for DeterministicEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        use std::hash::{Hash, Hasher};

        let embeddings = texts
            .iter()
            .map(|text| {
                let mut hasher = std::collections::hash_map::DefaultHasher::new();
                text.hash(&mut hasher);
                let seed = hasher.finish();

                (0..self.dimensions)
                    .map(|i| {
                        let value = seed.wrapping_add(i as u64).wrapping_mul(6364136223846793005);
                        ((value % 1000) as f32 / 1000.0) * 2.0 - 1.0
                    })
                    .collect()
            })
            .collect();

        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Wire the configured embedding provider
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let embedder: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbeddingProviderKind::Ollama => Arc::new(OllamaEmbedder::new(config)?),
        EmbeddingProviderKind::OpenAi => Arc::new(OpenAiEmbedder::new(config)?),
    };
    Ok(embedder)
}
