//! The query-time hot path: two-stage retrieve-then-rerank search.
//!
//! First-stage cosine similarity is a cheap, coarse filter: the retriever
//! over-fetches a broad candidate pool from the vector index, then lets the
//! cross-encoder reranker order that pool with the query and candidate text
//! seen together. Only the top k survive.
//!
//! A [`Retriever`] owns its already-loaded index and its model handles:
//! construct one at process startup and share it; there is no hidden global
//! state. Retrieval itself is stateless per call, and the index is
//! read-only, so concurrent calls need no locking.

use anyhow::{Result, bail};
use handbook_ai_embed::{EmbeddingProvider, RerankProvider};
use std::sync::Arc;
use tracing::debug;

use super::vector_index::{ChunkRecord, VectorIndex};

/// How many candidates the first stage hands to the reranker.
pub const DEFAULT_BROAD_N: usize = 30;

/// How many chunks a retrieval returns by default.
pub const DEFAULT_TOP_K: usize = 3;

/// Configuration for the retriever
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// First-stage candidate pool size
    pub broad_n: usize,
    /// Default number of chunks to return
    pub top_k: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            broad_n: DEFAULT_BROAD_N,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl RetrieverConfig {
    /// Set the first-stage pool size (builder style)
    pub fn with_broad_n(self, broad_n: usize) -> Self {
        Self { broad_n, ..self }
    }

    /// Set the default result count (builder style)
    pub fn with_top_k(self, top_k: usize) -> Self {
        Self { top_k, ..self }
    }
}

/// Outcome of grounding a question in the handbook.
///
/// [`GroundingOutcome::Empty`] is a distinguishable sentinel, not an error:
/// the calling layer maps it to a fixed "not in the handbook" response
/// instead of inventing an answer.
#[derive(Debug, Clone, PartialEq)]
pub enum GroundingOutcome {
    /// Relevant passages, most relevant first
    Passages(Vec<String>),
    /// The index produced no candidates for this question
    Empty,
}

/// Two-stage retriever over a loaded vector index.
pub struct Retriever {
    index: VectorIndex,
    embedder: Arc<dyn EmbeddingProvider>,
    reranker: Arc<dyn RerankProvider>,
    config: RetrieverConfig,
}

impl Retriever {
    /// Creates a retriever from an index and model handles.
    ///
    /// Fails when the index was built by a different embedding capability
    /// than `embedder`: mixed vectors would compare garbage similarities.
    pub fn new(
        index: VectorIndex,
        embedder: Arc<dyn EmbeddingProvider>,
        reranker: Arc<dyn RerankProvider>,
        config: RetrieverConfig,
    ) -> Result<Self> {
        if index.model_id() != embedder.model_id() {
            bail!(
                "index was built with embedding model '{}' but the embedder is '{}'; rebuild the index",
                index.model_id(),
                embedder.model_id()
            );
        }
        Ok(Self {
            index,
            embedder,
            reranker,
            config,
        })
    }

    /// The retriever's configuration.
    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// The loaded index.
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Returns the configured default number of chunks for `query`.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ChunkRecord>> {
        self.retrieve_top_k(query, self.config.top_k).await
    }

    /// Returns the `k` most relevant chunks for `query`, best first.
    ///
    /// Embedding and reranking failures propagate to the caller unchanged.
    /// An empty candidate pool is not an error: the result is simply empty
    /// and the reranker is never invoked.
    pub async fn retrieve_top_k(&self, query: &str, k: usize) -> Result<Vec<ChunkRecord>> {
        let query_vector = self.embedder.embed_text(query).await?;

        let candidates = self.index.search_by_vector(&query_vector, self.config.broad_n);
        debug!(
            "Broad search returned {} candidates for k={k}",
            candidates.len()
        );
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = candidates.iter().map(|(chunk, _)| chunk.text.clone()).collect();
        let scores = self.reranker.score_many(query, &texts).await?;

        let mut ranked: Vec<(&ChunkRecord, f32)> = candidates
            .iter()
            .map(|(chunk, _)| *chunk)
            .zip(scores)
            .collect();
        // Stable sort: equal scores keep their broad-search order.
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);

        if let Some((best, score)) = ranked.first() {
            debug!(
                "Top result: {} seq {} (score {score:.4})",
                best.source, best.sequence
            );
        }

        Ok(ranked.into_iter().map(|(chunk, _)| chunk.clone()).collect())
    }

    /// Host-facing entry point: retrieve passages for a question.
    ///
    /// Returns the chunk texts, or [`GroundingOutcome::Empty`] when
    /// retrieval finds nothing, so the host can fall back to a fixed
    /// "I don't know" style reply.
    pub async fn ground_question(&self, question: &str, k: usize) -> Result<GroundingOutcome> {
        let chunks = self.retrieve_top_k(question, k).await?;
        if chunks.is_empty() {
            return Ok(GroundingOutcome::Empty);
        }
        Ok(GroundingOutcome::Passages(
            chunks.into_iter().map(|chunk| chunk.text).collect(),
        ))
    }
}
