//! Embeddings module - Generate semantic embeddings for text
//!
//! Provides trait-based abstraction for embedding generation with ONNX backend.
//! Retrieval embeds each question once with `embed_query`; ingestion embeds
//! frame captions and speech segments with `embed_passage`.

mod onnx;
mod similarity;

pub use onnx::OnnxEmbedder;
pub use similarity::cosine_similarity;

use anyhow::Result;
use std::path::Path;

use crate::config::EmbeddingsSection;

/// Trait for embedding generation engines
///
/// Requires Send so the engine can hold it behind a mutex shared by
/// concurrent queries.
pub trait EmbeddingEngine: Send {
    /// Generate embedding for a single text
    fn embed(&mut self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding for a query text (with model-specific prefix if needed)
    ///
    /// For asymmetric models (e.g., BGE, E5), this applies query-specific formatting.
    /// For symmetric models (e.g., all-MiniLM), this is identical to embed().
    fn embed_query(&mut self, text: &str) -> Result<Vec<f32>> {
        self.embed(text)
    }

    /// Generate embedding for a passage text (with model-specific prefix if needed)
    fn embed_passage(&mut self, text: &str) -> Result<Vec<f32>> {
        self.embed(text)
    }

    /// Get embedding dimension (e.g., 384 for all-MiniLM-L6-v2)
    fn dimension(&self) -> usize;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Create the ONNX embedder described by the `[embeddings]` config section
pub fn create_embedder(
    section: &EmbeddingsSection,
    dimension: usize,
) -> Result<Box<dyn EmbeddingEngine>> {
    Ok(Box::new(OnnxEmbedder::new_from_paths(
        Path::new(&section.model_path),
        Path::new(&section.tokenizer_path),
        &section.model,
        dimension,
        section.query_prefix.clone(),
        section.passage_prefix.clone(),
    )?))
}
