use tracing::debug;

use familiar_core::traits::Embedder;
use familiar_core::types::RetrievalResult;
use familiar_core::{Error, Result};
use familiar_vector::VectorIndex;

/// Embeds a query with the same model the index was built with and returns
/// the nearest chunks.
pub struct Retriever<'a> {
    embedder: &'a dyn Embedder,
}

impl<'a> Retriever<'a> {
    pub fn new(embedder: &'a dyn Embedder) -> Self {
        Self { embedder }
    }

    pub fn retrieve(&self, query_text: &str, index: &VectorIndex, k: usize) -> Result<RetrievalResult> {
        let text = query_text.trim();
        if text.is_empty() {
            return Err(Error::EmptyQuery);
        }
        if self.embedder.model_id() != index.embed_model() {
            return Err(Error::ModelMismatch {
                index_model: index.embed_model().to_string(),
                query_model: self.embedder.model_id().to_string(),
            });
        }
        let vector = self.embedder.embed(text)?;
        let result = index.search(&vector, k)?;
        debug!(k, hits = result.len(), top = ?result.hits.first().map(|h| h.score), "retrieved");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant;

    impl Embedder for Constant {
        fn model_id(&self) -> &str {
            "constant"
        }
        fn dim(&self) -> usize {
            2
        }
        fn max_len(&self) -> usize {
            8
        }
        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[test]
    fn blank_queries_are_rejected() {
        let index = VectorIndex::new("constant", 2);
        let retriever = Retriever::new(&Constant);
        assert!(matches!(retriever.retrieve("  \n\t", &index, 3), Err(Error::EmptyQuery)));
    }

    #[test]
    fn model_must_match_index() {
        let index = VectorIndex::new("other", 2);
        let err = Retriever::new(&Constant).retrieve("sky", &index, 3).unwrap_err();
        match err {
            Error::ModelMismatch { index_model, query_model } => {
                assert_eq!(index_model, "other");
                assert_eq!(query_model, Constant.model_id());
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn empty_index_yields_no_hits() {
        let index = VectorIndex::new("constant", 2);
        assert!(Retriever::new(&Constant).retrieve("sky", &index, 3).unwrap().is_empty());
    }
}
