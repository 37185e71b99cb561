//! Cross-encoder reranking provider implementations

use crate::config::RerankConfig;
use crate::error::RerankError;
use async_trait::async_trait;
use fastembed::{RerankInitOptions, TextRerank};
use std::sync::{Arc, Mutex};

/// Trait for rerankers that score candidate texts against a query.
///
/// Scores are positionally aligned with the input candidates and only
/// ordered within a single call; they are not comparable across queries.
/// Callers must not invoke a reranker on an empty candidate list;
/// [`RerankError::EmptyCandidates`] enforces that contract.
#[async_trait]
pub trait RerankProvider: Send + Sync {
    /// Score a single (query, candidate) pair. Higher is more relevant.
    async fn score(&self, query: &str, candidate: &str) -> Result<f32, RerankError> {
        let candidates = [candidate.to_string()];
        let scores = self.score_many(query, &candidates).await?;
        Ok(scores[0])
    }

    /// Score every candidate against the query, preserving input order.
    async fn score_many(&self, query: &str, candidates: &[String])
    -> Result<Vec<f32>, RerankError>;

    /// Get the name of the underlying model
    fn model_name(&self) -> &str;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;
}

/// FastEmbed-based cross-encoder reranker
#[derive(Clone)]
pub struct FastEmbedReranker {
    config: RerankConfig,
    model: Arc<Mutex<TextRerank>>,
}

impl std::fmt::Debug for FastEmbedReranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedReranker")
            .field("config", &self.config)
            .finish()
    }
}

impl FastEmbedReranker {
    /// Downloads (on first use) and loads the configured reranker model.
    pub async fn create(config: RerankConfig) -> Result<Self, RerankError> {
        let model_choice = config.fastembed_model()?;
        tracing::info!("Loading reranker model: {}", config.model_name);

        let model = tokio::task::spawn_blocking(move || -> Result<TextRerank, RerankError> {
            let init_options =
                RerankInitOptions::new(model_choice).with_show_download_progress(true);
            TextRerank::try_new(init_options).map_err(|e| RerankError::External { source: e })
        })
        .await??;

        tracing::info!("Reranker model loaded: {}", config.model_name);

        Ok(Self {
            config,
            model: Arc::new(Mutex::new(model)),
        })
    }
}

#[async_trait]
impl RerankProvider for FastEmbedReranker {
    async fn score_many(
        &self,
        query: &str,
        candidates: &[String],
    ) -> Result<Vec<f32>, RerankError> {
        if candidates.is_empty() {
            return Err(RerankError::EmptyCandidates);
        }

        tracing::debug!("Scoring {} candidates", candidates.len());

        let query = query.to_string();
        let documents = candidates.to_vec();
        let batch_size = self.config.batch_size.max(1);
        let model_clone = Arc::clone(&self.model);

        let results = tokio::task::spawn_blocking(move || {
            let mut model_guard = model_clone.lock().unwrap();
            model_guard
                .rerank(query, documents, false, Some(batch_size))
                .map_err(|e| RerankError::External { source: e })
        })
        .await??;

        if results.len() != candidates.len() {
            return Err(RerankError::scoring(std::io::Error::other(format!(
                "reranker returned {} scores for {} candidates",
                results.len(),
                candidates.len()
            ))));
        }

        // fastembed returns results sorted by score; scatter them back to
        // input positions.
        let mut scores = vec![0.0f32; candidates.len()];
        for result in results {
            scores[result.index] = result.score;
        }

        Ok(scores)
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }

    fn provider_name(&self) -> &str {
        "fastembed"
    }
}
