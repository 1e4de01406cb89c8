//! Loading the precomputed catalogue.
//!
//! The catalogue is two files written by the offline indexing job: the
//! binary similarity index and a JSON document collection. Both are loaded
//! once at startup and checked against each other and against the encoder.
//! Any inconsistency is fatal; there is no partial catalogue.

use super::embedder::{Embedder, EmbedderError};
use super::store::{FlatIndex, IndexError, SimilarityIndex};
use super::types::CatalogueEntry;
use crate::config::Config;
use crate::provider::EmbeddingProvider;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Embedding model assumed when the collection doesn't name one.
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";

/// Encoded once at load time to learn the encoder's output dimension.
const ENCODER_CHECK_TEXT: &str = "hydrating face moisturizer";

/// Errors that make the catalogue unusable. None of these are recoverable.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid similarity index: {0}")]
    Index(#[from] IndexError),

    #[error("Invalid document collection: {0}")]
    Documents(#[from] serde_json::Error),

    #[error("Document {position} is invalid: {reason}")]
    InvalidEntry { position: usize, reason: String },

    #[error("Index holds {vectors} vectors but the collection has {documents} documents")]
    CountMismatch { vectors: usize, documents: usize },

    #[error("Index dimension {index} does not match encoder dimension {encoder}")]
    DimensionMismatch { index: usize, encoder: usize },

    #[error("Query encoder unavailable: {0}")]
    Encoder(#[from] EmbedderError),
}

/// The persisted document collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentCollection {
    #[serde(default)]
    pub embedding_model_name: Option<String>,
    pub documents: Vec<CatalogueEntry>,
}

impl DocumentCollection {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await.map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn embedding_model(&self) -> &str {
        self.embedding_model_name
            .as_deref()
            .unwrap_or(DEFAULT_EMBEDDING_MODEL)
    }
}

/// The loaded, validated catalogue: documents, index and query encoder.
///
/// Shared read-only between requests. Cloning is cheap.
#[derive(Clone)]
pub struct LoadedCatalogue {
    documents: Arc<Vec<CatalogueEntry>>,
    index: Arc<dyn SimilarityIndex>,
    embedder: Embedder,
}

impl LoadedCatalogue {
    /// Loads the catalogue files named in `config.storage`.
    ///
    /// The encoder uses the model recorded in the collection unless
    /// `config.embedding.model` overrides it. The encoder is called once to
    /// confirm its vectors match the index dimension.
    pub async fn load(
        config: &Config,
        embedding_provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, LoadError> {
        let index_path = &config.storage.index_path;
        let index = FlatIndex::open(index_path).await.map_err(|e| match e {
            IndexError::Io(source) => LoadError::Io {
                path: index_path.display().to_string(),
                source,
            },
            other => LoadError::Index(other),
        })?;

        let collection = DocumentCollection::open(&config.storage.documents_path).await?;

        let model = config
            .embedding
            .model
            .clone()
            .unwrap_or_else(|| collection.embedding_model().to_string());
        let embedder = Embedder::new(embedding_provider, model);

        let catalogue = Self::from_parts(
            collection.documents,
            Arc::new(index),
            embedder,
            config.embedding.dimension,
        )?;
        catalogue.verify_encoder().await?;

        info!(
            documents = catalogue.len(),
            dimension = catalogue.dimension(),
            model = catalogue.embedder.model(),
            "Loaded catalogue"
        );

        Ok(catalogue)
    }

    /// Assembles a catalogue from already-loaded parts, applying the same
    /// consistency checks as [`load`](Self::load).
    pub fn from_parts(
        documents: Vec<CatalogueEntry>,
        index: Arc<dyn SimilarityIndex>,
        embedder: Embedder,
        encoder_dimension: usize,
    ) -> Result<Self, LoadError> {
        for (position, entry) in documents.iter().enumerate() {
            entry
                .metadata
                .validate()
                .map_err(|reason| LoadError::InvalidEntry { position, reason })?;
        }

        if index.len() != documents.len() {
            return Err(LoadError::CountMismatch {
                vectors: index.len(),
                documents: documents.len(),
            });
        }

        if index.dimension() != encoder_dimension {
            return Err(LoadError::DimensionMismatch {
                index: index.dimension(),
                encoder: encoder_dimension,
            });
        }

        Ok(Self {
            documents: Arc::new(documents),
            index,
            embedder,
        })
    }

    /// Encodes a fixed text and checks the vector length against the index.
    pub async fn verify_encoder(&self) -> Result<(), LoadError> {
        let encoded = self.embedder.embed(ENCODER_CHECK_TEXT).await?;
        if encoded.len() != self.dimension() {
            return Err(LoadError::DimensionMismatch {
                index: self.dimension(),
                encoder: encoded.len(),
            });
        }
        Ok(())
    }

    pub fn documents(&self) -> &[CatalogueEntry] {
        &self.documents
    }

    pub fn get(&self, position: usize) -> Option<&CatalogueEntry> {
        self.documents.get(position)
    }

    pub fn index(&self) -> &dyn SimilarityIndex {
        self.index.as_ref()
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }
}
