//! Configuration for the embedding and reranking models

use crate::error::{EmbedError, RerankError};
use fastembed::{EmbeddingModel, RerankerModel};
use serde::{Deserialize, Serialize};

/// Default sentence-embedding model: small, fast, and good enough for a
/// single-document corpus.
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";

/// Default cross-encoder reranking model.
pub const DEFAULT_RERANKER_MODEL: &str = "bge-reranker-base";

/// Configuration for the embedding model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedConfig {
    /// Name of the embedding model to use
    pub model_name: String,
    /// Maximum batch size for embedding generation
    pub batch_size: usize,
    /// Whether to normalize embeddings to unit length
    pub normalize: bool,
}

impl EmbedConfig {
    /// Create a new embedding configuration for the named model.
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            batch_size: 16,
            normalize: true,
        }
    }

    /// Set the batch size for embedding generation (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Set whether to normalize embeddings (builder style)
    pub fn with_normalize(self, normalize: bool) -> Self {
        Self { normalize, ..self }
    }

    /// Resolve the configured name to a fastembed model.
    pub fn fastembed_model(&self) -> Result<EmbeddingModel, EmbedError> {
        match self.model_name.as_str() {
            "all-MiniLM-L6-v2" | "sentence-transformers/all-MiniLM-L6-v2" => {
                Ok(EmbeddingModel::AllMiniLML6V2)
            }
            "bge-small-en-v1.5" | "BAAI/bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
            other => Err(EmbedError::invalid_config(format!(
                "unknown embedding model: {other}"
            ))),
        }
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_MODEL)
    }
}

/// Configuration for the cross-encoder reranking model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    /// Name of the reranker model to use
    pub model_name: String,
    /// Maximum batch size for scoring
    pub batch_size: usize,
}

impl RerankConfig {
    /// Create a new reranker configuration for the named model.
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            batch_size: 16,
        }
    }

    /// Set the batch size for scoring (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Resolve the configured name to a fastembed reranker model.
    pub fn fastembed_model(&self) -> Result<RerankerModel, RerankError> {
        match self.model_name.as_str() {
            "bge-reranker-base" | "BAAI/bge-reranker-base" => Ok(RerankerModel::BGERerankerBase),
            "jina-reranker-v1-turbo-en" | "jinaai/jina-reranker-v1-turbo-en" => {
                Ok(RerankerModel::JINARerankerV1TurboEn)
            }
            other => Err(RerankError::invalid_config(format!(
                "unknown reranker model: {other}"
            ))),
        }
    }
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self::new(DEFAULT_RERANKER_MODEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_config_defaults() {
        let config = EmbedConfig::default();
        assert_eq!(config.model_name, "all-MiniLM-L6-v2");
        assert_eq!(config.batch_size, 16);
        assert!(config.normalize);
        assert!(config.fastembed_model().is_ok());
    }

    #[test]
    fn test_embed_config_builder_methods() {
        let config = EmbedConfig::default()
            .with_batch_size(64)
            .with_normalize(false);
        assert_eq!(config.batch_size, 64);
        assert!(!config.normalize);
    }

    #[test]
    fn test_unknown_embedding_model_is_rejected() {
        let config = EmbedConfig::new("not-a-model");
        assert!(matches!(
            config.fastembed_model(),
            Err(EmbedError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_rerank_config_defaults() {
        let config = RerankConfig::default();
        assert_eq!(config.model_name, "bge-reranker-base");
        assert!(config.fastembed_model().is_ok());
    }

    #[test]
    fn test_unknown_reranker_model_is_rejected() {
        let config = RerankConfig::new("not-a-model");
        assert!(matches!(
            config.fastembed_model(),
            Err(RerankError::InvalidConfig { .. })
        ));
    }
}
