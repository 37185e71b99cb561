//! Embedding provider implementations

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use fastembed::{InitOptions, TextEmbedding};
use half::f16;
use std::sync::{Arc, Mutex};

/// Result of embedding generation
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text
    pub embeddings: Vec<Vec<f16>>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Create a new embedding result from a vector of f16 embeddings.
    ///
    /// The dimension is inferred from the first embedding vector and
    /// defaults to 0 when the result is empty.
    pub fn new(embeddings: Vec<Vec<f16>>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    /// Returns the number of embedding vectors in this result.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Returns `true` if this result contains no embedding vectors.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Trait for embedding providers that can generate embeddings from text.
///
/// Vectors from two providers are comparable only when their [`model_id`]s
/// match: the id captures provider, model, dimension, and normalization, so
/// an index built by one provider can refuse queries embedded by another.
///
/// [`model_id`]: EmbeddingProvider::model_id
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>>;

    /// Generate embeddings for multiple texts (batch processing)
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult>;

    /// Get the dimension of embeddings produced by this provider
    fn embedding_dimension(&self) -> usize;

    /// Get the name of the underlying model
    fn model_name(&self) -> &str;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;

    /// Identity string tying vectors to the capability that produced them.
    fn model_id(&self) -> String {
        format!(
            "{}:{}:{}:norm",
            self.provider_name(),
            self.model_name(),
            self.embedding_dimension()
        )
    }
}

/// FastEmbed-based embedding provider using local ONNX models
#[derive(Clone)]
pub struct FastEmbedProvider {
    config: EmbedConfig,
    model: Arc<Mutex<TextEmbedding>>,
    dimension: usize,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("config", &self.config)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedProvider {
    /// Downloads (on first use) and loads the configured embedding model.
    ///
    /// Model loading and the dimension probe run on a blocking task; the
    /// returned provider is ready to embed.
    pub async fn create(config: EmbedConfig) -> Result<Self> {
        let model_choice = config.fastembed_model()?;
        tracing::info!("Loading embedding model: {}", config.model_name);

        let (model, dimension) =
            tokio::task::spawn_blocking(move || -> Result<(TextEmbedding, usize)> {
                let init_options = InitOptions::new(model_choice).with_show_download_progress(true);

                let mut model = TextEmbedding::try_new(init_options)
                    .map_err(|e| EmbedError::External { source: e })?;

                // Probe with one embedding to learn the output dimension.
                let probe = model
                    .embed(vec!["dimension probe".to_string()], None)
                    .map_err(|e| EmbedError::External { source: e })?;
                let dimension = probe.first().map(|emb| emb.len()).unwrap_or(384);

                Ok((model, dimension))
            })
            .await??;

        tracing::info!(
            "Embedding model loaded: {} (dimension {})",
            config.model_name,
            dimension
        );

        Ok(Self {
            config,
            model: Arc::new(Mutex::new(model)),
            dimension,
        })
    }

    /// Convert f32 embeddings to normalized f16
    fn convert_to_f16(&self, embeddings: Vec<Vec<f32>>) -> Vec<Vec<f16>> {
        embeddings
            .into_iter()
            .map(|embedding| {
                let mut f16_embedding: Vec<f16> =
                    embedding.into_iter().map(f16::from_f32).collect();

                if self.config.normalize {
                    let norm: f32 = f16_embedding
                        .iter()
                        .map(|x| x.to_f32() * x.to_f32())
                        .sum::<f32>()
                        .sqrt();
                    if norm > 0.0 {
                        for value in &mut f16_embedding {
                            *value = f16::from_f32(value.to_f32() / norm);
                        }
                    }
                }

                f16_embedding
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>> {
        let texts = vec![text.to_string()];
        let result = self.embed_texts(&texts).await?;
        result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::invalid_config("No embedding generated for text"))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::new(vec![]));
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EmbedError::EmptyText);
        }

        tracing::debug!("Generating embeddings for {} texts", texts.len());

        // Process in batches to bound memory usage.
        let batch_size = self.config.batch_size.max(1);
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(batch_size) {
            let chunk = chunk.to_vec();
            let model_clone = Arc::clone(&self.model);

            let batch_embeddings = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
                tracing::debug!("Processing batch of {} texts", chunk.len());

                let mut model_guard = model_clone.lock().unwrap();
                model_guard
                    .embed(chunk, None)
                    .map_err(|e| EmbedError::External { source: e })
            })
            .await??;

            all_embeddings.extend(self.convert_to_f16(batch_embeddings));
        }

        tracing::debug!("Generated {} embeddings", all_embeddings.len());
        Ok(EmbeddingResult::new(all_embeddings))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }

    fn provider_name(&self) -> &str {
        "fastembed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbedConfig;

    #[test]
    fn test_embedding_result() {
        let embeddings = vec![
            vec![f16::from_f32(0.1), f16::from_f32(0.2), f16::from_f32(0.3)],
            vec![f16::from_f32(0.4), f16::from_f32(0.5), f16::from_f32(0.6)],
        ];
        let result = EmbeddingResult::new(embeddings);

        assert_eq!(result.len(), 2);
        assert_eq!(result.dimension, 3);
        assert!(!result.is_empty());
    }

    #[test]
    fn test_empty_embedding_result() {
        let result = EmbeddingResult::new(vec![]);
        assert_eq!(result.len(), 0);
        assert_eq!(result.dimension, 0);
        assert!(result.is_empty());
    }

    #[tokio::test]
    #[ignore] // Integration test: downloads the real model - run with: cargo test test_fastembed_determinism -- --ignored
    async fn test_fastembed_determinism() -> Result<()> {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .try_init()
            .ok();

        let provider = FastEmbedProvider::create(EmbedConfig::default()).await?;
        assert_eq!(provider.provider_name(), "fastembed");
        assert_eq!(provider.embedding_dimension(), 384);

        let text = "How much vacation do employees accrue per month?";
        let first = provider.embed_text(text).await?;
        let second = provider.embed_text(text).await?;
        assert_eq!(first.len(), 384);

        // Embeddings are normalized, so the dot product is the cosine.
        let cosine: f32 = first
            .iter()
            .zip(second.iter())
            .map(|(a, b)| a.to_f32() * b.to_f32())
            .sum();
        assert!(
            cosine >= 0.999999,
            "same text should embed to the same vector, cosine was {cosine}"
        );

        Ok(())
    }

    #[tokio::test]
    #[ignore] // Integration test: downloads the real model
    async fn test_fastembed_rejects_empty_text() -> Result<()> {
        let provider = FastEmbedProvider::create(EmbedConfig::default()).await?;

        let result = provider.embed_texts(&["   ".to_string()]).await;
        assert!(matches!(result, Err(EmbedError::EmptyText)));

        Ok(())
    }
}
