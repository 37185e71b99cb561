//! Integration tests for the two-stage retrieval pipeline.
//!
//! These run against deterministic fake model providers: a one-hot keyword
//! embedder and a table-driven reranker with a call counter. That keeps the
//! pipeline's ordering and short-circuit behavior fully observable without
//! downloading real models.

use anyhow::Result;
use async_trait::async_trait;
use half::f16;
use handbook_ai_embed::error::Result as EmbedResult;
use handbook_ai_embed::{
    EmbedError, EmbeddingProvider, EmbeddingResult, RerankError, RerankProvider,
};
use handbook_ai_retriever::retrieval::{
    builder::{BuildConfig, IndexBuilder},
    retriever::{GroundingOutcome, Retriever, RetrieverConfig},
    vector_index::{ChunkRecord, VectorIndex},
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::tempdir;

/// Embeds text onto the axis of the first keyword it contains; texts with
/// no keyword share a catch-all axis. One-hot vectors are unit length, so
/// cosine similarity is 1.0 for a keyword match and 0.0 otherwise.
struct KeywordEmbedder {
    keywords: Vec<&'static str>,
}

impl KeywordEmbedder {
    fn new(keywords: Vec<&'static str>) -> Self {
        Self { keywords }
    }

    fn vector_for(&self, text: &str) -> Vec<f16> {
        let dimension = self.embedding_dimension();
        let lowered = text.to_lowercase();
        let axis = self
            .keywords
            .iter()
            .position(|kw| lowered.contains(kw))
            .unwrap_or(dimension - 1);
        (0..dimension)
            .map(|i| f16::from_f32(if i == axis { 1.0 } else { 0.0 }))
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed_text(&self, text: &str) -> EmbedResult<Vec<f16>> {
        if text.trim().is_empty() {
            return Err(EmbedError::EmptyText);
        }
        Ok(self.vector_for(text))
    }

    async fn embed_texts(&self, texts: &[String]) -> EmbedResult<EmbeddingResult> {
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EmbedError::EmptyText);
        }
        Ok(EmbeddingResult::new(
            texts.iter().map(|t| self.vector_for(t)).collect(),
        ))
    }

    fn embedding_dimension(&self) -> usize {
        self.keywords.len() + 1
    }

    fn model_name(&self) -> &str {
        "keyword-stub"
    }

    fn provider_name(&self) -> &str {
        "stub"
    }
}

/// Scores candidates with a fixed function and counts invocations.
struct StubReranker {
    score_fn: fn(&str, &str) -> f32,
    calls: Arc<AtomicUsize>,
}

impl StubReranker {
    fn new(score_fn: fn(&str, &str) -> f32) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                score_fn,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

#[async_trait]
impl RerankProvider for StubReranker {
    async fn score_many(
        &self,
        query: &str,
        candidates: &[String],
    ) -> Result<Vec<f32>, RerankError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if candidates.is_empty() {
            return Err(RerankError::EmptyCandidates);
        }
        Ok(candidates
            .iter()
            .map(|candidate| (self.score_fn)(query, candidate))
            .collect())
    }

    fn model_name(&self) -> &str {
        "table-stub"
    }

    fn provider_name(&self) -> &str {
        "stub"
    }
}

fn handbook_chunks() -> Vec<&'static str> {
    vec![
        "Benefits enrollment happens every November.",
        "Vacation accrues at 1.5 days per month of service.",
        "Security badges must be worn at all times in the office.",
    ]
}

async fn handbook_retriever(
    reranker: StubReranker,
) -> Result<(Retriever, Arc<KeywordEmbedder>)> {
    let embedder = Arc::new(KeywordEmbedder::new(vec!["benefit", "vacation", "badge"]));
    let texts: Vec<String> = handbook_chunks().iter().map(|t| t.to_string()).collect();
    let embedded = embedder.embed_texts(&texts).await?;

    let records: Vec<ChunkRecord> = texts
        .iter()
        .enumerate()
        .map(|(sequence, text)| ChunkRecord {
            source: "handbook.pdf".to_string(),
            sequence,
            start_char: sequence * 100,
            end_char: sequence * 100 + text.chars().count(),
            page: Some(sequence + 1),
            text: text.clone(),
        })
        .collect();

    let index = VectorIndex::build(records, embedded.embeddings, embedder.model_id())?;
    let retriever = Retriever::new(
        index,
        Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>,
        Arc::new(reranker),
        RetrieverConfig::default(),
    )?;
    Ok((retriever, embedder))
}

fn favor_vacation(_query: &str, candidate: &str) -> f32 {
    if candidate.to_lowercase().contains("vacation") {
        1.0
    } else {
        0.1
    }
}

// Distinct, deterministic scores so rankings are total.
fn by_length(_query: &str, candidate: &str) -> f32 {
    candidate.len() as f32
}

fn constant(_query: &str, _candidate: &str) -> f32 {
    0.5
}

#[tokio::test]
async fn test_end_to_end_vacation_policy() -> Result<()> {
    let (reranker, calls) = StubReranker::new(favor_vacation);
    let (retriever, _) = handbook_retriever(reranker).await?;

    let results = retriever.retrieve_top_k("vacation policy", 1).await?;
    assert_eq!(results.len(), 1);
    assert!(results[0].text.contains("Vacation accrues"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    match retriever.ground_question("vacation policy", 1).await? {
        GroundingOutcome::Passages(passages) => {
            assert_eq!(passages.len(), 1);
            assert!(passages[0].contains("Vacation accrues"));
        }
        GroundingOutcome::Empty => panic!("expected passages"),
    }
    Ok(())
}

#[tokio::test]
async fn test_top_k_monotonicity() -> Result<()> {
    let (reranker, _) = StubReranker::new(by_length);
    let (retriever, _) = handbook_retriever(reranker).await?;

    let mut previous: Vec<ChunkRecord> = Vec::new();
    for k in 1..=3 {
        let results = retriever.retrieve_top_k("vacation policy", k).await?;
        assert_eq!(results.len(), k);
        assert_eq!(&results[..previous.len()], &previous[..]);
        previous = results;
    }

    // Asking for more than the corpus holds returns everything.
    let all = retriever.retrieve_top_k("vacation policy", 10).await?;
    assert_eq!(all.len(), 3);

    // The no-k entry point uses the configured default.
    let default = retriever.retrieve("vacation policy").await?;
    assert_eq!(default, retriever.retrieve_top_k("vacation policy", 3).await?);
    Ok(())
}

#[tokio::test]
async fn test_empty_index_short_circuits_reranker() -> Result<()> {
    let embedder = Arc::new(KeywordEmbedder::new(vec!["vacation"]));
    let (reranker, calls) = StubReranker::new(constant);

    let retriever = Retriever::new(
        VectorIndex::empty(embedder.embedding_dimension(), embedder.model_id()),
        Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>,
        Arc::new(reranker),
        RetrieverConfig::default(),
    )?;

    let results = retriever.retrieve_top_k("vacation policy", 3).await?;
    assert!(results.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0, "reranker must not run");

    assert_eq!(
        retriever.ground_question("vacation policy", 3).await?,
        GroundingOutcome::Empty
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_tie_break_keeps_broad_search_order() -> Result<()> {
    let embedder = Arc::new(KeywordEmbedder::new(vec!["policy"]));
    let (reranker, _) = StubReranker::new(constant);

    let one_hot = |axis: usize| -> Vec<f16> {
        (0..2)
            .map(|i| f16::from_f32(if i == axis { 1.0 } else { 0.0 }))
            .collect()
    };
    let records: Vec<ChunkRecord> = ["alpha", "bravo", "charlie"]
        .iter()
        .enumerate()
        .map(|(sequence, text)| ChunkRecord {
            source: "handbook.pdf".to_string(),
            sequence,
            start_char: 0,
            end_char: text.len(),
            page: None,
            text: text.to_string(),
        })
        .collect();
    // alpha and bravo tie on cosine; charlie is farther away.
    let vectors = vec![one_hot(0), one_hot(0), one_hot(1)];

    let index = VectorIndex::build(records, vectors, embedder.model_id())?;
    let retriever = Retriever::new(
        index,
        Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>,
        Arc::new(reranker),
        RetrieverConfig::default(),
    )?;

    // Reranker scores are all equal, so the broad-search order (which is
    // itself insertion-stable) must survive.
    let results = retriever.retrieve_top_k("policy question", 3).await?;
    let texts: Vec<&str> = results.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["alpha", "bravo", "charlie"]);
    Ok(())
}

#[tokio::test]
async fn test_rejects_index_from_different_model() -> Result<()> {
    let embedder = Arc::new(KeywordEmbedder::new(vec!["vacation"]));
    let (reranker, _) = StubReranker::new(constant);

    let index = VectorIndex::empty(2, "stub:some-other-model:2:norm");
    let result = Retriever::new(
        index,
        embedder as Arc<dyn EmbeddingProvider>,
        Arc::new(reranker),
        RetrieverConfig::default(),
    );
    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn test_embedding_failure_propagates() -> Result<()> {
    let (reranker, calls) = StubReranker::new(constant);
    let (retriever, _) = handbook_retriever(reranker).await?;

    // The keyword embedder rejects empty text; the retriever must surface
    // that instead of recovering.
    let result = retriever.retrieve_top_k("   ", 3).await;
    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_build_save_load_query_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let document_path = dir.path().join("handbook.txt");
    let index_base = dir.path().join("handbook");

    let text = format!(
        "{}\n\n{}\n\n{}\n",
        handbook_chunks()[0],
        handbook_chunks()[1],
        handbook_chunks()[2]
    );
    tokio::fs::write(&document_path, &text).await?;

    let embedder = Arc::new(KeywordEmbedder::new(vec!["benefit", "vacation", "badge"]));
    let report = IndexBuilder::new(
        Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>,
        BuildConfig::default(),
    )
    .build_index(&document_path, &index_base)
    .await?;
    assert!(report.chunks >= 1);
    assert_eq!(report.dimension, embedder.embedding_dimension());
    assert!(report.vector_path.exists());
    assert!(report.chunk_path.exists());

    let index = VectorIndex::load(&index_base)?;
    let (reranker, _) = StubReranker::new(favor_vacation);
    let retriever = Retriever::new(
        index,
        Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>,
        Arc::new(reranker),
        RetrieverConfig::default(),
    )?;

    match retriever.ground_question("vacation policy", 1).await? {
        GroundingOutcome::Passages(passages) => {
            assert!(passages[0].contains("Vacation accrues"));
        }
        GroundingOutcome::Empty => panic!("expected passages"),
    }
    Ok(())
}
