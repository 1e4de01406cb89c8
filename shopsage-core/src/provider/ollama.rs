//! Ollama embedding provider.
//!
//! Encodes query text through Ollama's `/api/embed` endpoint. The catalogue
//! vectors must have been produced by the same model for distances to mean
//! anything.

use super::types::*;
use async_trait::async_trait;

/// Ollama HTTP API provider.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    base_url: String,
    http_client: reqwest::Client,
}

impl OllamaProvider {
    /// Creates a new Ollama provider pointed at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &crate::Config) -> Self {
        Self::new(config.embedding.base_url.clone())
    }

    fn embed_request(text: &str, model: &str) -> EmbedRequest {
        EmbedRequest {
            model: ollama_model_name(model).to_string(),
            input: text.to_string(),
        }
    }
}

/// Maps a sentence-transformers model name to the tag Ollama publishes it
/// under. Names Ollama already understands pass through unchanged.
pub fn ollama_model_name(model: &str) -> &str {
    let bare = model.strip_prefix("sentence-transformers/").unwrap_or(model);
    match bare {
        "all-MiniLM-L6-v2" => "all-minilm:22m",
        "all-MiniLM-L12-v2" => "all-minilm:33m",
        _ => model,
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::from_config(&crate::Config::default())
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embed", self.base_url);

        let embed_request = Self::embed_request(text, model);

        let response = self
            .http_client
            .post(&url)
            .json(&embed_request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let embed_response = response.json::<EmbedResponse>().await?;

        embed_response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Other("No embeddings returned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let provider = OllamaProvider::new("http://localhost:11434/");
        assert_eq!(provider.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_sentence_transformers_names_mapped() {
        let request = OllamaProvider::embed_request("lip tint", "all-MiniLM-L6-v2");
        assert_eq!(request.model, "all-minilm:22m");
        assert_eq!(request.input, "lip tint");

        assert_eq!(
            ollama_model_name("sentence-transformers/all-MiniLM-L6-v2"),
            "all-minilm:22m"
        );
        assert_eq!(ollama_model_name("all-MiniLM-L12-v2"), "all-minilm:33m");
    }

    #[test]
    fn test_ollama_names_pass_through() {
        assert_eq!(ollama_model_name("all-minilm"), "all-minilm");
        assert_eq!(ollama_model_name("nomic-embed-text"), "nomic-embed-text");
    }

    #[test]
    fn test_embed_response_tolerates_missing_embeddings() {
        let parsed: EmbedResponse = serde_json::from_str(r#"{"model":"all-minilm"}"#).unwrap();
        assert!(parsed.embeddings.is_empty());
    }
}
