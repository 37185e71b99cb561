//! Error types for the model capabilities

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Errors produced while generating embeddings.
///
/// Covers configuration problems, model loading, and runtime failures
/// during embedding generation. Integrates with [`thiserror`] so sources
/// chain through [`std::error::Error`].
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Embedding requested for empty text
    #[error("cannot embed empty text")]
    EmptyText,

    /// Error when model configuration is invalid
    #[error("invalid model configuration: {message}")]
    InvalidConfig { message: String },

    /// Error during model initialization
    #[error("model initialization failed: {source}")]
    ModelInitialization {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error during embedding generation
    #[error("embedding generation failed: {source}")]
    EmbeddingGeneration {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Async task join errors
    #[error("async task failed: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },

    /// Generic errors from other libraries
    #[error("external error: {source}")]
    External {
        #[from]
        source: anyhow::Error,
    },
}

impl EmbedError {
    /// Create a model initialization error from any error type.
    pub fn model_init<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ModelInitialization {
            source: Box::new(source),
        }
    }

    /// Create an embedding generation error from any error type.
    pub fn embedding_gen<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::EmbeddingGeneration {
            source: Box::new(source),
        }
    }

    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Errors produced while scoring candidates against a query.
///
/// Reranker scores are only meaningful within one invocation; these errors
/// cover the ways an invocation itself can fail.
#[derive(Debug, thiserror::Error)]
pub enum RerankError {
    /// Scoring requested for an empty candidate list
    #[error("cannot rerank an empty candidate list")]
    EmptyCandidates,

    /// Error when model configuration is invalid
    #[error("invalid reranker configuration: {message}")]
    InvalidConfig { message: String },

    /// Error during scoring
    #[error("relevance scoring failed: {source}")]
    Scoring {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Async task join errors
    #[error("async task failed: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },

    /// Generic errors from other libraries
    #[error("external error: {source}")]
    External {
        #[from]
        source: anyhow::Error,
    },
}

impl RerankError {
    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a scoring error from any error type.
    pub fn scoring<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Scoring {
            source: Box::new(source),
        }
    }
}
