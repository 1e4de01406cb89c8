//! Grounded answer generation with credential fallback.
//!
//! The prompt carries the customer's question and every retrieved product.
//! Credentials are tried in order, one backend call each, until one
//! succeeds. Failures never escape as errors: the final outcome is always
//! text the caller can show to the user.

use super::types::Candidate;
use crate::credentials::Credential;
use crate::provider::{GenerateRequest, Provider};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, warn};

/// Returned when no credential is available at all.
pub const NO_CREDENTIAL_RESPONSE: &str = "No valid API key available.";

/// Result of a single backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success(String),
    Failure(String),
}

/// Text returned to the caller plus the outcome of every attempt made.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    pub text: String,
    pub attempts: Vec<AttemptOutcome>,
}

/// Builds grounded prompts and calls the generative backend.
#[derive(Clone)]
pub struct Generator {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f64,
    system_prompt: String,
}

impl Generator {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Builds the prompt for one question.
    pub fn build_prompt(&self, query: &str, candidates: &[Candidate]) -> String {
        let mut context = String::new();
        for (i, candidate) in candidates.iter().enumerate() {
            if i > 0 {
                context.push_str("\n\n");
            }
            let _ = write!(
                context,
                "Product {}:\n{}\nSimilarity: {:.3}",
                i + 1,
                candidate.entry,
                candidate.similarity_score
            );
        }

        format!(
            "{}\n\n\
             Customer Question: {}\n\n\
             Available Products:\n{}\n\n\
             Reply directly to the customer question. Provide a helpful recommendation with \
             reasoning. Mention specific product names, prices, and key features.",
            self.system_prompt.trim(),
            query,
            context
        )
    }

    /// Generates an answer, returning only the text.
    pub async fn generate(
        &self,
        query: &str,
        candidates: &[Candidate],
        credentials: &[Option<Credential>],
    ) -> String {
        self.generate_detailed(query, candidates, credentials).await.text
    }

    /// Generates an answer, trying each present credential in order.
    ///
    /// Absent slots are skipped without counting as an attempt. The first
    /// success wins. If the last present credential fails, the returned text
    /// describes the failure and asks for a valid key.
    pub async fn generate_detailed(
        &self,
        query: &str,
        candidates: &[Candidate],
        credentials: &[Option<Credential>],
    ) -> GenerationReport {
        let present: Vec<&Credential> = credentials.iter().flatten().collect();
        let Some((last, earlier)) = present.split_last() else {
            warn!("No credential available for generation");
            return GenerationReport {
                text: NO_CREDENTIAL_RESPONSE.to_string(),
                attempts: Vec::new(),
            };
        };

        let prompt = self.build_prompt(query, candidates);
        let mut attempts = Vec::with_capacity(present.len());

        for (i, credential) in earlier.iter().enumerate() {
            match self.attempt(&prompt, credential).await {
                AttemptOutcome::Success(text) => {
                    info!(attempt = i + 1, "Generation succeeded");
                    attempts.push(AttemptOutcome::Success(text.clone()));
                    return GenerationReport { text, attempts };
                }
                AttemptOutcome::Failure(reason) => {
                    warn!(attempt = i + 1, %reason, "Credential failed, trying next");
                    attempts.push(AttemptOutcome::Failure(reason));
                }
            }
        }

        let text = match self.attempt(&prompt, last).await {
            AttemptOutcome::Success(text) => {
                info!(attempt = present.len(), "Generation succeeded");
                attempts.push(AttemptOutcome::Success(text.clone()));
                text
            }
            AttemptOutcome::Failure(reason) => {
                let text = format!("Error: {}. Please provide a valid API key to continue", reason);
                attempts.push(AttemptOutcome::Failure(reason));
                text
            }
        };

        GenerationReport { text, attempts }
    }

    async fn attempt(&self, prompt: &str, credential: &Credential) -> AttemptOutcome {
        let request = GenerateRequest::new(&self.model, prompt).with_temperature(self.temperature);
        match self.provider.generate(request, credential).await {
            Ok(text) => AttemptOutcome::Success(text.trim().to_string()),
            Err(e) => {
                warn!(error = %e, "Generation request failed");
                AttemptOutcome::Failure(e.summary().to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ProviderError, Result as ProviderResult};
    use crate::rag::types::{CatalogueEntry, ProductMetadata};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Accepts exactly one key; records which keys it was called with.
    struct KeyCheckingProvider {
        valid_key: &'static str,
        calls: Mutex<Vec<String>>,
    }

    impl KeyCheckingProvider {
        fn new(valid_key: &'static str) -> Arc<Self> {
            Arc::new(Self {
                valid_key,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Provider for KeyCheckingProvider {
        async fn generate(&self, request: GenerateRequest, api_key: &Credential) -> ProviderResult<String> {
            self.calls.lock().unwrap().push(api_key.expose().to_string());
            if api_key.expose() == self.valid_key {
                Ok(format!("  answer for: {}  ", request.model))
            } else {
                Err(ProviderError::Status {
                    status: 400,
                    message: "API key not valid. Please pass a valid API key.".to_string(),
                })
            }
        }
    }

    fn candidate() -> Candidate {
        Candidate {
            rank: 1,
            entry: CatalogueEntry {
                text: "Lip Tint: a sheer, buildable tint".to_string(),
                metadata: ProductMetadata {
                    product_name: "Lip Tint".to_string(),
                    brand_name: "GlowCo".to_string(),
                    price_usd: 18.0,
                    rating: 4.5,
                    extra: BTreeMap::new(),
                },
            },
            distance: 0.1,
            similarity_score: 1.0 / 1.1,
        }
    }

    fn key(s: &str) -> Option<Credential> {
        Credential::new(s)
    }

    #[test]
    fn test_prompt_contains_question_and_numbered_products() {
        let generator = Generator::new(KeyCheckingProvider::new("k"), "m", "You are a helpful advisor.");
        let mut second = candidate();
        second.rank = 2;
        second.entry.metadata.product_name = "Tint Balm".to_string();

        let prompt = generator.build_prompt("affordable lip tint", &[candidate(), second]);
        assert!(prompt.starts_with("You are a helpful advisor."));
        assert!(prompt.contains("Customer Question: affordable lip tint"));
        assert!(prompt.contains("Product 1:\nLip Tint: a sheer, buildable tint"));
        assert!(prompt.contains("Product 2:"));
        assert!(prompt.contains("Tint Balm"));
        assert!(prompt.contains("$18.00"));
    }

    #[tokio::test]
    async fn test_valid_caller_key_used_once() {
        let provider = KeyCheckingProvider::new("caller");
        let generator = Generator::new(provider.clone(), "gemini-2.0-flash", "advisor");

        let report = generator
            .generate_detailed("q", &[candidate()], &[key("caller"), key("default")])
            .await;

        assert_eq!(provider.calls(), vec!["caller"]);
        assert_eq!(report.text, "answer for: gemini-2.0-flash");
        assert_eq!(report.attempts.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_caller_falls_back_to_default() {
        let provider = KeyCheckingProvider::new("default");
        let generator = Generator::new(provider.clone(), "m", "advisor");

        let report = generator
            .generate_detailed("q", &[candidate()], &[key("bad"), key("default")])
            .await;

        assert_eq!(provider.calls(), vec!["bad", "default"]);
        assert_eq!(report.text, "answer for: m");
        assert!(matches!(report.attempts[0], AttemptOutcome::Failure(_)));
        assert!(matches!(report.attempts[1], AttemptOutcome::Success(_)));
    }

    #[tokio::test]
    async fn test_no_credentials_makes_no_calls() {
        let provider = KeyCheckingProvider::new("default");
        let generator = Generator::new(provider.clone(), "m", "advisor");

        let text = generator.generate("q", &[candidate()], &[None, None]).await;

        assert!(provider.calls().is_empty());
        assert_eq!(text, NO_CREDENTIAL_RESPONSE);
    }

    #[tokio::test]
    async fn test_absent_caller_skipped_without_attempt() {
        let provider = KeyCheckingProvider::new("default");
        let generator = Generator::new(provider.clone(), "m", "advisor");

        let report = generator
            .generate_detailed("q", &[candidate()], &[None, key("default")])
            .await;

        assert_eq!(provider.calls(), vec!["default"]);
        assert_eq!(report.attempts.len(), 1);
    }

    #[tokio::test]
    async fn test_all_keys_fail_returns_readable_error() {
        let provider = KeyCheckingProvider::new("nothing-matches");
        let generator = Generator::new(provider.clone(), "m", "advisor");

        let text = generator
            .generate("q", &[candidate()], &[key("bad"), key("also-bad")])
            .await;

        assert_eq!(provider.calls().len(), 2);
        assert_eq!(
            text,
            "Error: the generation request was rejected. Please provide a valid API key to continue"
        );
        assert!(!text.contains("API key not valid"));
    }

    #[tokio::test]
    async fn test_single_default_failure_is_terminal() {
        let provider = KeyCheckingProvider::new("nothing-matches");
        let generator = Generator::new(provider.clone(), "m", "advisor");

        let text = generator.generate("q", &[candidate()], &[None, key("default")]).await;

        assert_eq!(provider.calls(), vec!["default"]);
        assert!(text.starts_with("Error: "));
        assert!(text.ends_with("Please provide a valid API key to continue"));
    }

    #[tokio::test]
    async fn test_failed_caller_without_default_reports_error() {
        let provider = KeyCheckingProvider::new("nothing-matches");
        let generator = Generator::new(provider.clone(), "m", "advisor");

        let report = generator
            .generate_detailed("q", &[candidate()], &[key("bad"), None])
            .await;

        assert_eq!(provider.calls(), vec!["bad"]);
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(
            report.text,
            "Error: the generation request was rejected. Please provide a valid API key to continue"
        );
        assert_ne!(report.text, NO_CREDENTIAL_RESPONSE);
    }

    #[tokio::test]
    async fn test_default_success_after_failed_caller_records_both() {
        let provider = KeyCheckingProvider::new("default");
        let generator = Generator::new(provider.clone(), "m", "advisor");

        let report = generator
            .generate_detailed("q", &[candidate()], &[key("bad"), key("default")])
            .await;

        assert_eq!(
            report.attempts,
            vec![
                AttemptOutcome::Failure("the generation request was rejected".to_string()),
                AttemptOutcome::Success("answer for: m".to_string()),
            ]
        );
    }
}
