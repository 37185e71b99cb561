//! handbook-ai-retriever: Two-stage retrieval over an HR handbook
//!
//! This crate holds the retrieval pipeline that grounds handbook questions
//! in actual handbook text: an offline index build (load → chunk → embed →
//! persist) and an online two-stage search (embed query → broad vector
//! recall → cross-encoder rerank → top-k).
//!
//! ## Key Modules
//!
//! - **[`retrieval::vector_index`]**: exact nearest-neighbor index with
//!   paired on-disk artifacts
//! - **[`retrieval::document`]**: PDF/plain-text document loading
//! - **[`retrieval::builder`]**: offline index construction
//! - **[`retrieval::retriever`]**: the query-time hot path
//!
//! ## Architecture
//!
//! ```text
//! Document → TextSplitter → EmbeddingProvider → VectorIndex → disk
//!                                                   ↑
//! Query → EmbeddingProvider → broad search → RerankProvider → top-k
//! ```

pub mod retrieval;
