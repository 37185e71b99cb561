//! Model capabilities for the handbook retrieval pipeline.
//!
//! This crate wraps the two scoring models the pipeline depends on behind
//! narrow async traits, so the rest of the system never touches model
//! internals and tests can substitute deterministic fakes:
//!
//! - [`EmbeddingProvider`]: maps text to fixed-dimension, L2-normalized
//!   vectors for similarity search. Backed by [`FastEmbedProvider`] running
//!   a local ONNX sentence-embedding model.
//! - [`RerankProvider`]: scores (query, candidate) pairs with a
//!   cross-encoder for fine-grained relevance. Backed by
//!   [`FastEmbedReranker`].
//!
//! Both backends load their model once and run inference on blocking tasks
//! so async callers are never stalled by ONNX execution.

pub mod config;
pub mod error;
pub mod provider;
pub mod rerank;

pub use config::{EmbedConfig, RerankConfig};
pub use error::{EmbedError, RerankError, Result};
pub use provider::{EmbeddingProvider, EmbeddingResult, FastEmbedProvider};
pub use rerank::{FastEmbedReranker, RerankProvider};
