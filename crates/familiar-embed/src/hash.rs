use std::hash::{Hash, Hasher};

use familiar_core::traits::Embedder;
use familiar_core::Result;
use twox_hash::XxHash64;

pub const HASH_MODEL_PREFIX: &str = "hash:";

/// Hashed bag-of-words embedder selected with model ids of the form
/// `hash:<dim>`.
///
/// Tokens are lower-cased alphanumeric runs; each token adds 1.0 to the bucket
/// picked by its xxHash64, and the result is L2-normalized. Needs no model
/// files, which makes it the embedder of choice for tests and smoke runs.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    id: String,
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { id: format!("{HASH_MODEL_PREFIX}{dim}"), dim }
    }

    pub fn from_model_id(model_id: &str) -> Option<Self> {
        let dim = model_id.strip_prefix(HASH_MODEL_PREFIX)?.parse::<usize>().ok()?;
        (dim > 0).then(|| Self { id: model_id.to_string(), dim })
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let lowered = text.to_lowercase();
        for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let idx = (hasher.finish() % self.dim as u64) as usize;
            v[idx] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        usize::MAX
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn parses_model_ids() {
        assert_eq!(HashEmbedder::from_model_id("hash:64").map(|e| e.dim()), Some(64));
        assert!(HashEmbedder::from_model_id("hash:0").is_none());
        assert!(HashEmbedder::from_model_id("hash:abc").is_none());
        assert!(HashEmbedder::from_model_id("sentence-transformers/all-MiniLM-L6-v2").is_none());
    }

    #[test]
    fn vectors_are_normalized_and_deterministic() {
        let e = HashEmbedder::new(128);
        let a = e.embed_text("hello world");
        let b = e.embed_text("Hello, WORLD!");
        assert_eq!(a.len(), 128);
        assert!((cosine(&a, &a) - 1.0).abs() < 1e-5);
        assert_eq!(a, b, "case and punctuation do not matter");
    }

    #[test]
    fn empty_text_is_the_zero_vector() {
        let v = HashEmbedder::new(16).embed_text("  ...  ");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn shared_words_raise_similarity() {
        let e = HashEmbedder::new(384);
        let q = e.embed_text("What color is the sky?");
        let sky = e.embed_text("The sky is blue.");
        let grass = e.embed_text("Grass is green.");
        assert!(cosine(&q, &sky) > cosine(&q, &grass));
    }
}
