//! Common types for LLM providers.

use crate::credentials::Credential;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when interacting with a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error (status {status}): {message}")]
    Status { status: u16, message: String },

    #[error("Provider returned no text")]
    EmptyResponse,

    #[error("Provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Short, user-facing description of the failure.
    ///
    /// Never includes the backend's payload, which may echo request details.
    pub fn summary(&self) -> &'static str {
        match self {
            ProviderError::Status { status, message } => match *status {
                401 | 403 => "the API key was rejected",
                429 => "the API quota was exceeded",
                // Gemini reports an unknown key as a bad request.
                400 if message.contains("API_KEY_INVALID") => "the API key was rejected",
                400 => "the generation request was rejected",
                s if s >= 500 => "the generation service is temporarily unavailable",
                _ => "the generation request failed",
            },
            ProviderError::Request(_) => "the generation service could not be reached",
            ProviderError::Json(_) | ProviderError::EmptyResponse => {
                "the generation service returned no text"
            }
            ProviderError::Other(_) => "the generation request failed",
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Provider trait for generative backends.
///
/// One call is one outbound request authenticated with the given key.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate a text completion for a single prompt.
    async fn generate(&self, request: GenerateRequest, api_key: &Credential) -> Result<String>;
}

/// Provider trait for embedding backends.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for the given text.
    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>>;
}

/// Request for a single-turn text completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f64,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            temperature: 0.7,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Request for generating embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub model: String,
    pub input: String,
}

/// Response containing embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub model: String,

    #[serde(default)]
    pub embeddings: Vec<Vec<f32>>,
}
