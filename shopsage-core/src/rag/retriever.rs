//! Retrieval: query text to ranked, filtered catalogue candidates.

use super::catalogue::LoadedCatalogue;
use super::embedder::EmbedderError;
use super::store::IndexError;
use super::types::Candidate;
use thiserror::Error;
use tracing::debug;

/// Candidates must score strictly above this to ground an answer.
pub const DEFAULT_SIMILARITY_FLOOR: f32 = 0.4;

/// Maps an index distance to a similarity score in `(0, 1]`.
///
/// Monotonically decreasing; a distance of zero scores exactly 1.
pub fn similarity_score(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Failed to encode query: {0}")]
    Encoding(#[from] EmbedderError),

    #[error("Similarity search failed: {0}")]
    Search(#[from] IndexError),

    #[error("Encoder produced a {actual}-dimensional vector, index expects {expected}")]
    QueryDimension { expected: usize, actual: usize },

    #[error("Index returned position {0}, which has no document")]
    MissingDocument(usize),

    #[error("top_k must be greater than zero")]
    InvalidTopK,
}

pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Finds the catalogue entries most similar to a query.
#[derive(Clone)]
pub struct Retriever {
    catalogue: LoadedCatalogue,
    similarity_floor: f32,
}

impl Retriever {
    pub fn new(catalogue: LoadedCatalogue) -> Self {
        Self {
            catalogue,
            similarity_floor: DEFAULT_SIMILARITY_FLOOR,
        }
    }

    pub fn with_similarity_floor(mut self, floor: f32) -> Self {
        self.similarity_floor = floor;
        self
    }

    pub fn similarity_floor(&self) -> f32 {
        self.similarity_floor
    }

    pub fn catalogue(&self) -> &LoadedCatalogue {
        &self.catalogue
    }

    /// Returns up to `top_k` candidates scoring above the similarity floor,
    /// best first. An empty result means nothing in the catalogue is close
    /// enough to the query.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Candidate>> {
        if top_k == 0 {
            return Err(RetrievalError::InvalidTopK);
        }

        let vector = self.catalogue.embedder().embed(query).await?;
        let expected = self.catalogue.dimension();
        if vector.len() != expected {
            return Err(RetrievalError::QueryDimension {
                expected,
                actual: vector.len(),
            });
        }

        let neighbors = self.catalogue.index().search(&vector, top_k)?;
        debug!(hits = neighbors.len(), top_k, "Similarity search complete");

        let mut candidates = Vec::with_capacity(neighbors.len());
        for (i, neighbor) in neighbors.into_iter().enumerate() {
            let entry = self
                .catalogue
                .get(neighbor.position)
                .ok_or(RetrievalError::MissingDocument(neighbor.position))?;
            let distance = neighbor.distance.max(0.0);
            candidates.push(Candidate {
                rank: i + 1,
                entry: entry.clone(),
                distance,
                similarity_score: similarity_score(distance),
            });
        }

        let before = candidates.len();
        candidates.retain(|c| c.similarity_score > self.similarity_floor);
        debug!(
            kept = candidates.len(),
            dropped = before - candidates.len(),
            floor = self.similarity_floor,
            "Applied similarity floor"
        );

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_score_bounds() {
        assert_eq!(similarity_score(0.0), 1.0);
        assert!((similarity_score(0.1) - 0.909_090_9).abs() < 1e-6);
        assert!((similarity_score(2.0) - 0.333_333_3).abs() < 1e-6);
        assert!(similarity_score(1e30) > 0.0);
        assert_eq!(similarity_score(-0.5), 1.0);
    }

    #[test]
    fn test_similarity_score_strictly_decreasing() {
        let distances = [0.0_f32, 0.01, 0.1, 0.5, 1.0, 1.5, 2.0, 10.0, 100.0];
        for pair in distances.windows(2) {
            assert!(similarity_score(pair[0]) > similarity_score(pair[1]));
        }
    }

    #[test]
    fn test_floor_boundary() {
        // distance 1.5 scores exactly 0.4, which is not above the floor
        assert!(similarity_score(1.5) <= DEFAULT_SIMILARITY_FLOOR);
        assert!(similarity_score(1.49) > DEFAULT_SIMILARITY_FLOOR);
    }
}
