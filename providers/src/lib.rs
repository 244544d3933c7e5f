//! LLM and embedding provider integrations
//!
//! Providers are wired once at startup from configuration; everything
//! downstream sees only the [`LlmProvider`] and [`EmbeddingProvider`]
//! traits.

pub mod embedding;
pub mod extraction;
pub mod llm;

pub use embedding::{
    build_embedder, DeterministicEmbedder, EmbeddingProvider, OllamaEmbedder, OpenAiEmbedder,
};
pub use extraction::{ExtractedFact, FactExtractor, MemoryAction};
pub use llm::{build_llm, AnthropicChat, LlmProvider, OllamaChat, OpenAiChat};
