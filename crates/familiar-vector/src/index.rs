//! In-memory vector index with exhaustive cosine search.

use chrono::{DateTime, SubsecRound, Utc};

use familiar_core::types::{Chunk, Embedding, RetrievalResult, ScoredChunk};
use familiar_core::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// Every chunk of a corpus paired with its vector, all produced by one
/// embedding model.
///
/// Built in full by [`crate::IndexBuilder`] and never patched afterwards; a
/// changed corpus means a new index.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    embed_model: String,
    dim: usize,
    built_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn new(embed_model: impl Into<String>, dim: usize) -> Self {
        Self {
            embed_model: embed_model.into(),
            dim,
            built_at: Utc::now().trunc_subsecs(3),
            entries: Vec::new(),
        }
    }

    pub(crate) fn from_parts(
        embed_model: String,
        dim: usize,
        built_at: DateTime<Utc>,
        entries: Vec<IndexEntry>,
    ) -> Self {
        Self { embed_model, dim, built_at, entries }
    }

    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add one chunk with its vector. The embedding must come from this
    /// index's model and have its dimensionality.
    pub fn push(&mut self, chunk: Chunk, embedding: Embedding) -> Result<()> {
        if embedding.model != self.embed_model {
            return Err(Error::ModelMismatch {
                index_model: self.embed_model.clone(),
                query_model: embedding.model,
            });
        }
        if embedding.vector.len() != self.dim {
            return Err(self.dim_mismatch(&embedding.model, embedding.vector.len()));
        }
        if embedding.chunk_id != chunk.id {
            return Err(Error::Operation(format!(
                "embedding for '{}' pushed with chunk '{}'",
                embedding.chunk_id, chunk.id
            )));
        }
        self.entries.push(IndexEntry { chunk, vector: embedding.vector });
        Ok(())
    }

    /// Top `k` entries by cosine similarity to `query`.
    ///
    /// Ties are broken by ascending chunk id. Zero-norm vectors score 0 and
    /// non-finite ones rank last.
    pub fn search(&self, query: &[f32], k: usize) -> Result<RetrievalResult> {
        if query.len() != self.dim {
            return Err(self.dim_mismatch("query vector", query.len()));
        }
        if k == 0 || self.entries.is_empty() {
            return Ok(RetrievalResult::default());
        }
        let query_norm = norm(query);
        let mut scored: Vec<(f32, &IndexEntry)> =
            self.entries.iter().map(|e| (cosine(query, query_norm, &e.vector), e)).collect();
        scored.sort_by(|(sa, a), (sb, b)| sb.total_cmp(sa).then_with(|| a.chunk.id.cmp(&b.chunk.id)));
        scored.truncate(k);
        let hits = scored
            .into_iter()
            .map(|(score, e)| ScoredChunk { chunk: e.chunk.clone(), score })
            .collect();
        Ok(RetrievalResult { hits })
    }

    /// Content hash over the model id, chunk ids and vector bytes. Two builds
    /// of the same corpus with the same model share a fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.embed_model.as_bytes());
        hasher.update(&(self.dim as u64).to_le_bytes());
        for entry in &self.entries {
            hasher.update(entry.chunk.id.as_bytes());
            hasher.update(&[0]);
            for x in &entry.vector {
                hasher.update(&x.to_le_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }

    fn dim_mismatch(&self, other: &str, other_dim: usize) -> Error {
        Error::ModelMismatch {
            index_model: format!("{} ({}d)", self.embed_model, self.dim),
            query_model: format!("{other} ({other_dim}d)"),
        }
    }
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine(query: &[f32], query_norm: f32, v: &[f32]) -> f32 {
    let denom = query_norm * norm(v);
    if denom == 0.0 {
        return 0.0;
    }
    let dot: f32 = query.iter().zip(v).map(|(a, b)| a * b).sum();
    let score = dot / denom;
    // `+ 0.0` folds -0.0 into 0.0 so both tie under `total_cmp`.
    if score.is_nan() { f32::NEG_INFINITY } else { score + 0.0 }
}
