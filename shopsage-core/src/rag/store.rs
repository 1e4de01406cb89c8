//! Similarity index over the catalogue vectors.
//!
//! The index is built offline and loaded read-only. [`FlatIndex`] performs an
//! exact scan with squared Euclidean distance, so results are deterministic
//! and safe to share between concurrent readers.
//!
//! # File format
//!
//! All integers and floats are little-endian.
//!
//! ```text
//! magic    [u8; 4]   b"SSFX"
//! version  u32       1
//! dim      u32       vector dimension, > 0
//! count    u64       number of vectors
//! data     f32 * count * dim, row-major
//! ```

use std::path::Path;
use thiserror::Error;

const MAGIC: &[u8; 4] = b"SSFX";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Failed to read index file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not an index file (bad magic bytes)")]
    BadMagic,

    #[error("Unsupported index format version {0}")]
    UnsupportedVersion(u32),

    #[error("Index dimension must be non-zero")]
    ZeroDimension,

    #[error("Index file truncated: expected {expected} bytes, found {actual}")]
    Truncated { expected: u64, actual: u64 },

    #[error("Vector {position} has dimension {actual}, index expects {expected}")]
    VectorDimension {
        position: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Vector {position} contains a non-finite component")]
    NonFiniteVector { position: usize },

    #[error("Query has dimension {actual}, index expects {expected}")]
    QueryDimension { expected: usize, actual: usize },

    #[error("Query vector contains a non-finite component")]
    NonFiniteQuery,

    #[error("Requested zero neighbors")]
    ZeroK,
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// One search hit: a position in the catalogue and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Nearest-neighbor search over a fixed set of vectors.
///
/// `search` returns at most `k` neighbors, nearest first. Distances are
/// non-negative; smaller means more similar.
pub trait SimilarityIndex: Send + Sync {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    /// Number of vectors in the index.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dimension(&self) -> usize;
}

/// Exact squared-L2 index held in memory.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Builds an index from in-memory rows. All rows must share a dimension.
    pub fn from_vectors(dimension: usize, vectors: &[Vec<f32>]) -> Result<Self> {
        if dimension == 0 {
            return Err(IndexError::ZeroDimension);
        }
        let mut data = Vec::with_capacity(dimension * vectors.len());
        for (position, vector) in vectors.iter().enumerate() {
            if vector.len() != dimension {
                return Err(IndexError::VectorDimension {
                    position,
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            if vector.iter().any(|x| !x.is_finite()) {
                return Err(IndexError::NonFiniteVector { position });
            }
            data.extend_from_slice(vector);
        }
        Ok(Self { dimension, data })
    }

    /// Reads an index file from disk.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Self::from_bytes(&bytes)
    }

    /// Writes the index in the on-disk format.
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        tokio::fs::write(path, self.to_bytes()).await?;
        Ok(())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(IndexError::Truncated {
                expected: HEADER_LEN as u64,
                actual: bytes.len() as u64,
            });
        }
        if &bytes[0..4] != MAGIC {
            return Err(IndexError::BadMagic);
        }

        let version = read_u32(&bytes[4..8]);
        if version != FORMAT_VERSION {
            return Err(IndexError::UnsupportedVersion(version));
        }

        let dimension = read_u32(&bytes[8..12]) as usize;
        if dimension == 0 {
            return Err(IndexError::ZeroDimension);
        }
        let count = read_u64(&bytes[12..20]);

        let payload = &bytes[HEADER_LEN..];
        let expected = count
            .checked_mul(dimension as u64)
            .and_then(|n| n.checked_mul(4))
            .ok_or(IndexError::Truncated {
                expected: u64::MAX,
                actual: payload.len() as u64,
            })?;
        if payload.len() as u64 != expected {
            return Err(IndexError::Truncated {
                expected: HEADER_LEN as u64 + expected,
                actual: bytes.len() as u64,
            });
        }

        let data: Vec<f32> = payload
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        if let Some(i) = data.iter().position(|x| !x.is_finite()) {
            return Err(IndexError::NonFiniteVector {
                position: i / dimension,
            });
        }

        Ok(Self { dimension, data })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let count = (self.data.len() / self.dimension) as u64;
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        bytes.extend_from_slice(&count.to_le_bytes());
        for value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    fn vector(&self, position: usize) -> &[f32] {
        let start = position * self.dimension;
        &self.data[start..start + self.dimension]
    }
}

impl SimilarityIndex for FlatIndex {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Err(IndexError::ZeroK);
        }
        if query.len() != self.dimension {
            return Err(IndexError::QueryDimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(IndexError::NonFiniteQuery);
        }

        let mut neighbors: Vec<Neighbor> = (0..self.len())
            .map(|position| Neighbor {
                position,
                distance: squared_l2(query, self.vector(position)),
            })
            .collect();

        let by_distance = |a: &Neighbor, b: &Neighbor| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.position.cmp(&b.position))
        };

        if k < neighbors.len() {
            neighbors.select_nth_unstable_by(k - 1, by_distance);
            neighbors.truncate(k);
        }
        neighbors.sort_by(by_distance);

        Ok(neighbors)
    }

    fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}
