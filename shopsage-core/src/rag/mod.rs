//! Retrieval Augmented Generation (RAG) over the product catalogue.
//!
//! # Overview
//!
//! A question is answered in two steps:
//! 1. **Retrieval**: the question is embedded and the nearest catalogue
//!    entries are looked up in the similarity index. Entries whose similarity
//!    score is not above the floor are dropped.
//! 2. **Generation**: the surviving entries and the question are placed in a
//!    prompt and sent to the generative backend, trying the caller's API key
//!    before the operator's default.
//!
//! If retrieval finds nothing, generation is skipped and a fixed
//! "no match" answer is returned.
//!
//! # Architecture
//!
//! - [`RagEngine`]: orchestrates one request end to end
//! - [`retriever`]: query → ranked, filtered [`Candidate`]s
//! - [`generator`]: grounded prompt + credential fallback
//! - [`catalogue`]: one-time loading of the documents, index and encoder
//! - [`store`]: the similarity index and its file format
//! - [`embedder`]: query encoding

pub mod catalogue;
pub mod embedder;
pub mod generator;
pub mod retriever;
pub mod store;
mod types;

pub use catalogue::{DocumentCollection, LoadError, LoadedCatalogue};
pub use embedder::{Embedder, EmbedderError};
pub use generator::{AttemptOutcome, GenerationReport, Generator, NO_CREDENTIAL_RESPONSE};
pub use retriever::{similarity_score, RetrievalError, Retriever, DEFAULT_SIMILARITY_FLOOR};
pub use store::{FlatIndex, IndexError, Neighbor, SimilarityIndex};
pub use types::{Candidate, CatalogueEntry, PipelineResult, ProductMetadata, ProductSummary};

use crate::config::Config;
use crate::credentials::Credential;
use crate::provider::{EmbeddingProvider, Provider};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Returned when no catalogue entry is similar enough to the question.
pub const NO_MATCH_RESPONSE: &str = "Sorry no products match this description in our catalogue";

/// Failures that escape the pipeline. Everything else becomes response text.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("Catalogue could not be loaded: {0}")]
    Load(#[from] LoadError),

    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),
}

pub type Result<T> = std::result::Result<T, RagError>;

/// The product-question pipeline.
///
/// Holds the loaded catalogue and the default credential; both are
/// read-only, so the engine is `Clone` and can serve concurrent requests
/// without locking. An engine only exists once the catalogue has loaded.
#[derive(Clone)]
pub struct RagEngine {
    retriever: Retriever,
    generator: Generator,
    default_credential: Option<Credential>,
    default_top_k: usize,
}

impl RagEngine {
    /// Loads the catalogue and wires up the pipeline.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use shopsage_core::{Config, RagEngine, credentials};
    /// # use shopsage_core::provider::{GeminiProvider, OllamaProvider};
    /// # use std::sync::Arc;
    /// # async fn example() -> anyhow::Result<()> {
    /// let config = Config::load_or_default();
    /// let default_key = credentials::resolve_default_credential(&config.credentials);
    /// let engine = RagEngine::new(
    ///     &config,
    ///     Arc::new(OllamaProvider::from_config(&config)),
    ///     Arc::new(GeminiProvider::from_config(&config)),
    ///     default_key,
    /// )
    /// .await?;
    ///
    /// let result = engine.ask("affordable lip tint", None).await?;
    /// println!("{}", result.response);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(
        config: &Config,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        provider: Arc<dyn Provider>,
        default_credential: Option<Credential>,
    ) -> Result<Self> {
        let catalogue = LoadedCatalogue::load(config, embedding_provider).await?;
        Ok(Self::from_parts(config, catalogue, provider, default_credential))
    }

    /// Wires up the pipeline around an already-loaded catalogue.
    pub fn from_parts(
        config: &Config,
        catalogue: LoadedCatalogue,
        provider: Arc<dyn Provider>,
        default_credential: Option<Credential>,
    ) -> Self {
        let retriever =
            Retriever::new(catalogue).with_similarity_floor(config.retrieval.similarity_floor);
        let generator = Generator::new(provider, config.llm.model.clone(), config.system_prompt.clone())
            .with_temperature(config.llm.temperature);

        Self {
            retriever,
            generator,
            default_credential,
            default_top_k: config.retrieval.top_k,
        }
    }

    pub fn catalogue(&self) -> &LoadedCatalogue {
        self.retriever.catalogue()
    }

    pub fn has_default_credential(&self) -> bool {
        self.default_credential.is_some()
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// Answers a question using the configured `top_k`.
    pub async fn ask(
        &self,
        query: &str,
        caller_credential: Option<Credential>,
    ) -> Result<PipelineResult> {
        self.run(query, self.default_top_k, caller_credential).await
    }

    /// Answers a question.
    ///
    /// Returns the fixed [`NO_MATCH_RESPONSE`] without calling the backend
    /// when no catalogue entry passes the similarity floor. Credential and
    /// backend failures are reported in `response`, not as errors.
    ///
    /// # Errors
    ///
    /// Only retrieval failures (encoder or index) are returned as errors.
    pub async fn run(
        &self,
        query: &str,
        top_k: usize,
        caller_credential: Option<Credential>,
    ) -> Result<PipelineResult> {
        info!(query, top_k, "Searching catalogue");

        let candidates = self.retriever.retrieve(query, top_k).await?;

        if candidates.is_empty() {
            info!("No relevant products");
            return Ok(PipelineResult {
                query: query.to_string(),
                response: NO_MATCH_RESPONSE.to_string(),
                retrieved_products: None,
            });
        }

        info!(found = candidates.len(), "Found relevant products");

        let credentials = [caller_credential, self.default_credential.clone()];
        let response = self.generator.generate(query, &candidates, &credentials).await;

        Ok(PipelineResult {
            query: query.to_string(),
            response,
            retrieved_products: Some(candidates.iter().map(ProductSummary::from).collect()),
        })
    }
}
