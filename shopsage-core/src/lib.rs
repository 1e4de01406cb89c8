//! shopsage-core - Retrieval-augmented product advisor
//!
//! Answers free-text product questions from a precomputed catalogue:
//! - Catalogue loading (document collection + similarity index)
//! - Retrieval with a fixed similarity floor
//! - Grounded answer generation with API key fallback
//! - Configuration and credential resolution
//!
//! ## Primary API
//!
//! Load once with [`RagEngine::new`], then call [`RagEngine::run`] or
//! [`RagEngine::ask`] per question.

// Public modules
pub mod config;
pub mod credentials;
pub mod provider;
pub mod rag;

// Public exports
pub use config::Config;
pub use credentials::Credential;
pub use rag::{PipelineResult, ProductSummary, RagEngine, RagError, NO_MATCH_RESPONSE};

// Provider exports
pub use provider::{EmbeddingProvider, GenerateRequest, Provider, ProviderError};
