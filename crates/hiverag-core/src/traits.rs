//! Seams between the pipeline and the models behind it.

use crate::error::Result;

/// Dense text encoder.
///
/// `embed_batch` returns exactly one vector per input, in input order, each
/// of length `dim()`. Failures surface as `Error::Encoding` (or
/// `Error::EncodingTimeout` from a timeout wrapper) and abort the batch.
pub trait Embedder: Send + Sync {
    /// Stable identifier of the model behind this encoder.
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Pairwise relevance model (cross-encoder).
///
/// Scores every `(query, document)` pair in one call and returns one score
/// per document, in input order. Higher is more relevant.
pub trait PairScorer: Send + Sync {
    fn model_id(&self) -> &str;
    fn score_pairs(&self, query: &str, documents: &[&str]) -> Result<Vec<f32>>;
}
