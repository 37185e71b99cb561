//! Offline index construction.
//!
//! Run once (or on demand after a handbook revision): load the document,
//! split it into overlapping chunks, embed every chunk in one batch pass,
//! and persist the paired index artifacts. Rebuilding from the same
//! document produces an equivalent index, so there is no diffing against a
//! previous build; the new artifacts simply replace the old ones.

use anyhow::Result;
use handbook_ai_context::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_SEPARATORS, TextSplitter};
use handbook_ai_embed::EmbeddingProvider;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::document::load_document;
use super::vector_index::{ChunkRecord, VectorIndex, chunk_file_path, vector_file_path};

/// Configuration for an index build
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl BuildConfig {
    /// Set the chunk size (builder style)
    pub fn with_chunk_size(self, chunk_size: usize) -> Self {
        Self { chunk_size, ..self }
    }

    /// Set the chunk overlap (builder style)
    pub fn with_chunk_overlap(self, chunk_overlap: usize) -> Self {
        Self {
            chunk_overlap,
            ..self
        }
    }
}

/// Summary of a completed index build
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Number of chunks indexed
    pub chunks: usize,
    /// Dimension of the stored vectors
    pub dimension: usize,
    /// Path of the vector artifact
    pub vector_path: PathBuf,
    /// Path of the chunk store artifact
    pub chunk_path: PathBuf,
}

/// Orchestrates document loading, chunking, embedding, and persistence.
pub struct IndexBuilder {
    embedder: Arc<dyn EmbeddingProvider>,
    config: BuildConfig,
}

impl IndexBuilder {
    /// Creates a builder around an embedding provider.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, config: BuildConfig) -> Self {
        Self { embedder, config }
    }

    /// Builds and persists an index for one source document.
    ///
    /// Failures from the loader, splitter, embedder, or index surface
    /// unchanged; there is no partial output on error beyond temp files the
    /// OS cleans up.
    pub async fn build_index(&self, document_path: &Path, index_base: &Path) -> Result<BuildReport> {
        let document = load_document(document_path).await?;
        info!(
            "Loaded {}: {} pages, {} characters",
            document.name,
            document.page_count(),
            document.text.chars().count()
        );

        let splitter = TextSplitter::new(
            DEFAULT_SEPARATORS,
            self.config.chunk_size,
            self.config.chunk_overlap,
        );
        let chunks = splitter.split(&document.name, &document.text)?;
        info!("Chunks: {}", chunks.len());
        if let Some(first) = chunks.first() {
            let sample: String = first.text.chars().take(200).collect();
            debug!("Sample chunk: {sample}");
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embedded = self.embedder.embed_texts(&texts).await?;
        info!(
            "Embedded {} chunks at dimension {}",
            embedded.len(),
            embedded.dimension
        );

        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .map(|chunk| ChunkRecord {
                page: Some(document.page_at(chunk.start_char)),
                source: chunk.source,
                sequence: chunk.sequence,
                start_char: chunk.start_char,
                end_char: chunk.end_char,
                text: chunk.text,
            })
            .collect();

        let dimension = embedded.dimension;
        let index = VectorIndex::build(records, embedded.embeddings, self.embedder.model_id())?;
        index.save(index_base)?;

        Ok(BuildReport {
            chunks: index.len(),
            dimension,
            vector_path: vector_file_path(index_base),
            chunk_path: chunk_file_path(index_base),
        })
    }
}
