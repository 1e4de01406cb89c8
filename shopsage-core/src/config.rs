use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::rag::DEFAULT_SIMILARITY_FLOOR;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration for the product advisor.
///
/// Covers the generation backend, the query encoder, retrieval policy and the
/// on-disk locations of the precomputed catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub credentials: CredentialConfig,
}

/// Configuration for the generative backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
}

/// Configuration for the query encoder.
///
/// `model` overrides the embedding model recorded in the document collection.
/// Leave it unset so queries are encoded with the same model the catalogue was
/// built with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub base_url: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Vector dimension the index must have.
    pub dimension: usize,
}

/// Retrieval policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of nearest entries requested from the index per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Candidates must score strictly above this to be kept.
    #[serde(default = "default_similarity_floor")]
    pub similarity_floor: f32,
}

/// Locations of the precomputed catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub index_path: PathBuf,
    pub documents_path: PathBuf,
}

/// Where the operator's default API key is looked up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    pub secrets_path: PathBuf,
    pub key_name: String,
}

fn default_top_k() -> usize {
    3
}

fn default_similarity_floor() -> f32 {
    DEFAULT_SIMILARITY_FLOOR
}

fn default_system_prompt() -> String {
    "You are a helpful Sephora beauty advisor. Based on the following products, \
     answer the customer's question naturally and recommend the best options."
        .to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            temperature: 0.7,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: None,
            dimension: 384, // all-MiniLM-L6-v2
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_floor: default_similarity_floor(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("./data/catalogue.index"),
            documents_path: PathBuf::from("./data/catalogue_documents.json"),
        }
    }
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            secrets_path: PathBuf::from("./.shopsage/secrets.toml"),
            key_name: "GEMINI_API_KEY".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            system_prompt: default_system_prompt(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            storage: StorageConfig::default(),
            credentials: CredentialConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from `config.yaml` if it exists, otherwise use defaults.
    pub fn load_or_default() -> Self {
        Self::load("config.yaml").unwrap_or_default()
    }
}
