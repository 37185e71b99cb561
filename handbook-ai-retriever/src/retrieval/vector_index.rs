//! Exact nearest-neighbor index over chunk embeddings.
//!
//! The corpus is one handbook, so an exact cosine scan over every chunk is
//! both fast enough and exactly correct; what matters here is ranking
//! correctness, stable tie-breaking, and safe persistence.
//!
//! ## On-disk layout
//!
//! An index persists as two co-located artifacts derived from one base
//! path:
//!
//! - `<base>.vectors`: binary, a 24-byte header (magic, format version,
//!   dimension, count) followed by the f16 vector payload
//! - `<base>.chunks`: JSON, chunk records plus the embedding model id and
//!   a blake3 digest of the vector payload
//!
//! The digest ties the pair together: loading a chunk store next to a
//! vector file it was not written with fails instead of silently mispairing
//! text and vectors. Writes stage through temp files and rename into place.

use half::f16;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const VECTOR_MAGIC: &[u8; 8] = b"HBAIVEC1";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 8 + 4 + 4 + 8;

/// A chunk as stored in the index: provenance plus text.
///
/// `page` is present for paginated sources (PDF) and `None` for plain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Identifier of the source document
    pub source: String,
    /// Position of the chunk within the document (0-indexed)
    pub sequence: usize,
    /// Character offset of the first character of the chunk
    pub start_char: usize,
    /// Character offset one past the last character of the chunk
    pub end_char: usize,
    /// Page the chunk starts on (1-indexed), when the source has pages
    pub page: Option<usize>,
    /// The chunk text
    pub text: String,
}

/// Errors from constructing an index in memory.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Chunk and vector sequences differ in length
    #[error("chunk/vector length mismatch: {chunks} chunks, {vectors} vectors")]
    LengthMismatch { chunks: usize, vectors: usize },

    /// No chunks were supplied
    #[error("cannot build an index from zero chunks")]
    Empty,

    /// A vector's dimension disagrees with the first vector's
    #[error("vector {index} has dimension {found}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },
}

/// Errors from saving or loading the paired index artifacts.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// One of the two artifacts is missing
    #[error("index artifact missing: {path}")]
    MissingArtifact { path: PathBuf },

    /// The vector file failed structural validation
    #[error("vector file {path} is corrupt: {reason}")]
    CorruptVectorFile { path: PathBuf, reason: String },

    /// The chunk store does not describe the vector file next to it
    #[error("chunk store {path} does not match its vector file: {reason}")]
    ArtifactMismatch { path: PathBuf, reason: String },

    /// Underlying I/O failure
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Chunk store (de)serialization failure
    #[error("chunk store serialization failed: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
}

#[derive(Serialize, Deserialize)]
struct ChunkStoreFile {
    version: u32,
    model_id: String,
    dimension: usize,
    count: usize,
    vectors_digest: String,
    chunks: Vec<ChunkRecord>,
}

/// In-memory searchable index over parallel chunk/vector arrays.
///
/// Read-only after construction; the only way to change an index is a full
/// rebuild. Searches never fail on a well-formed index.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    chunks: Vec<ChunkRecord>,
    vectors: Vec<Vec<f16>>,
    dimension: usize,
    model_id: String,
}

impl VectorIndex {
    /// Builds an index from parallel chunk and vector sequences.
    ///
    /// `model_id` records the embedding capability that produced the
    /// vectors; retrieval refuses to pair this index with a different one.
    pub fn build(
        chunks: Vec<ChunkRecord>,
        vectors: Vec<Vec<f16>>,
        model_id: impl Into<String>,
    ) -> Result<Self, IndexError> {
        if chunks.len() != vectors.len() {
            return Err(IndexError::LengthMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }
        if chunks.is_empty() {
            return Err(IndexError::Empty);
        }

        let dimension = vectors[0].len();
        for (index, vector) in vectors.iter().enumerate() {
            if vector.len() != dimension {
                return Err(IndexError::DimensionMismatch {
                    index,
                    expected: dimension,
                    found: vector.len(),
                });
            }
        }

        Ok(Self {
            chunks,
            vectors,
            dimension,
            model_id: model_id.into(),
        })
    }

    /// Creates an index with no chunks, for hosts that start without a corpus.
    pub fn empty(dimension: usize, model_id: impl Into<String>) -> Self {
        Self {
            chunks: Vec::new(),
            vectors: Vec::new(),
            dimension,
            model_id: model_id.into(),
        }
    }

    /// Number of chunks in the index.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns `true` if the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Dimension of the stored vectors.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Identity of the embedding capability the vectors came from.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// The stored chunks, in insertion order.
    pub fn chunks(&self) -> &[ChunkRecord] {
        &self.chunks
    }

    /// Returns up to `limit` chunks nearest to `query_vector`.
    ///
    /// Results are ordered by cosine similarity descending; equal
    /// similarities keep insertion order. Returns fewer than `limit`
    /// entries when the index is smaller, and an empty vec when it is
    /// empty.
    pub fn search_by_vector(&self, query_vector: &[f16], limit: usize) -> Vec<(&ChunkRecord, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, vector)| (i, cosine_similarity(query_vector, vector)))
            .collect();

        // Stable sort: ties keep insertion order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(i, similarity)| (&self.chunks[i], similarity))
            .collect()
    }

    /// Persists the index as its two paired artifacts.
    ///
    /// Both files are staged as temp files in the target directory and
    /// renamed into place. If the process dies between the two renames, the
    /// digest check in [`VectorIndex::load`] rejects the torn pair.
    pub fn save(&self, base: &Path) -> Result<(), PersistenceError> {
        let vector_path = vector_file_path(base);
        let chunk_path = chunk_file_path(base);
        let dir = base
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        let payload = self.vector_payload();
        let digest = blake3::hash(&payload).to_hex().to_string();

        let mut vector_bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        vector_bytes.extend_from_slice(VECTOR_MAGIC);
        vector_bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        vector_bytes.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        vector_bytes.extend_from_slice(&(self.chunks.len() as u64).to_le_bytes());
        vector_bytes.extend_from_slice(&payload);

        let store = ChunkStoreFile {
            version: FORMAT_VERSION,
            model_id: self.model_id.clone(),
            dimension: self.dimension,
            count: self.chunks.len(),
            vectors_digest: digest,
            chunks: self.chunks.clone(),
        };
        let store_bytes = serde_json::to_vec_pretty(&store)?;

        let mut vector_tmp = NamedTempFile::new_in(dir)?;
        vector_tmp.write_all(&vector_bytes)?;
        let mut chunk_tmp = NamedTempFile::new_in(dir)?;
        chunk_tmp.write_all(&store_bytes)?;

        vector_tmp
            .persist(&vector_path)
            .map_err(|e| PersistenceError::Io { source: e.error })?;
        chunk_tmp
            .persist(&chunk_path)
            .map_err(|e| PersistenceError::Io { source: e.error })?;

        tracing::info!(
            "Saved index: {} chunks to {} / {}",
            self.chunks.len(),
            vector_path.display(),
            chunk_path.display()
        );
        Ok(())
    }

    /// Loads an index from its two paired artifacts.
    ///
    /// Fails if either artifact is missing, the vector file is structurally
    /// invalid, or the pair is inconsistent (count, dimension, or payload
    /// digest disagree).
    pub fn load(base: &Path) -> Result<Self, PersistenceError> {
        let vector_path = vector_file_path(base);
        let chunk_path = chunk_file_path(base);
        for path in [&vector_path, &chunk_path] {
            if !path.exists() {
                return Err(PersistenceError::MissingArtifact { path: path.clone() });
            }
        }

        let vector_bytes = std::fs::read(&vector_path)?;
        if vector_bytes.len() < HEADER_LEN {
            return Err(PersistenceError::CorruptVectorFile {
                path: vector_path,
                reason: "file shorter than header".to_string(),
            });
        }
        if &vector_bytes[..8] != VECTOR_MAGIC {
            return Err(PersistenceError::CorruptVectorFile {
                path: vector_path,
                reason: "bad magic".to_string(),
            });
        }
        let version = u32::from_le_bytes(vector_bytes[8..12].try_into().unwrap());
        if version != FORMAT_VERSION {
            return Err(PersistenceError::CorruptVectorFile {
                path: vector_path,
                reason: format!("unsupported format version {version}"),
            });
        }
        let dimension = u32::from_le_bytes(vector_bytes[12..16].try_into().unwrap()) as usize;
        let count = u64::from_le_bytes(vector_bytes[16..24].try_into().unwrap()) as usize;

        let payload = &vector_bytes[HEADER_LEN..];
        let expected_len = count * dimension * std::mem::size_of::<f16>();
        if payload.len() != expected_len {
            return Err(PersistenceError::CorruptVectorFile {
                path: vector_path,
                reason: format!(
                    "payload is {} bytes, header promises {expected_len}",
                    payload.len()
                ),
            });
        }
        let digest = blake3::hash(payload).to_hex().to_string();

        let store_bytes = std::fs::read(&chunk_path)?;
        let store: ChunkStoreFile = serde_json::from_slice(&store_bytes)?;

        if store.version != FORMAT_VERSION {
            return Err(PersistenceError::ArtifactMismatch {
                path: chunk_path,
                reason: format!("unsupported format version {}", store.version),
            });
        }
        if store.count != count || store.chunks.len() != store.count {
            return Err(PersistenceError::ArtifactMismatch {
                path: chunk_path,
                reason: format!(
                    "chunk store holds {} chunks, vector file holds {count}",
                    store.chunks.len()
                ),
            });
        }
        if store.dimension != dimension {
            return Err(PersistenceError::ArtifactMismatch {
                path: chunk_path,
                reason: format!(
                    "chunk store dimension {} vs vector file dimension {dimension}",
                    store.dimension
                ),
            });
        }
        if store.vectors_digest != digest {
            return Err(PersistenceError::ArtifactMismatch {
                path: chunk_path,
                reason: "vector payload digest mismatch".to_string(),
            });
        }

        let flat: Vec<f16> = bytemuck::pod_collect_to_vec(payload);
        let vectors: Vec<Vec<f16>> = flat.chunks(dimension.max(1)).map(|v| v.to_vec()).collect();

        tracing::info!(
            "Loaded index: {count} chunks, dimension {dimension}, model {}",
            store.model_id
        );

        Ok(Self {
            chunks: store.chunks,
            vectors,
            dimension,
            model_id: store.model_id,
        })
    }

    fn vector_payload(&self) -> Vec<u8> {
        let flat: Vec<f16> = self.vectors.iter().flatten().copied().collect();
        bytemuck::cast_slice::<f16, u8>(&flat).to_vec()
    }
}

/// Path of the binary vector artifact for an index base path.
pub fn vector_file_path(base: &Path) -> PathBuf {
    base.with_extension("vectors")
}

/// Path of the JSON chunk store artifact for an index base path.
pub fn chunk_file_path(base: &Path) -> PathBuf {
    base.with_extension("chunks")
}

/// Cosine similarity between two f16 vectors.
fn cosine_similarity(a: &[f16], b: &[f16]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| f32::from(*x) * f32::from(*y))
        .sum();

    let norm_a: f32 = a.iter().map(|x| f32::from(*x).powi(2)).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| f32::from(*x).powi(2)).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
