use crate::error::{Error, Result};
use crate::types::GenerationParams;

/// Maps text to fixed-dimension vectors.
///
/// Implementations must return vectors of exactly `dim()` components for a
/// given `model_id()`; the vector index relies on that to reject foreign
/// embeddings.
pub trait Embedder: Send + Sync {
    /// Stable identifier of the model (e.g. `sentence-transformers/all-MiniLM-L6-v2`).
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    /// Maximum input length in model tokens; longer input is truncated.
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding(format!("{} returned no vector", self.model_id())))
    }
}

/// Runs a local language model against a prompt.
pub trait Generator: Send + Sync {
    fn model_id(&self) -> &str;
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
}
