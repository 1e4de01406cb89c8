//! LLM provider abstraction layer.
//!
//! This module defines a common interface for the generative backend
//! (Gemini) and the embedding backend (Ollama) used by the RAG pipeline.

mod types;
pub mod gemini;
pub mod ollama;

// Re-export common types
pub use types::{
    EmbedRequest,
    EmbedResponse,
    EmbeddingProvider,
    GenerateRequest,
    Provider,
    ProviderError,
    Result,
};

// Re-export provider implementations
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
