//! Domain types used by the indexing and query pipelines.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub type ChunkId = String;

/// Where a document sits inside the collected corpus.
///
/// `origin` is the parent directory relative to the corpus root (`misc` for
/// files at the root); `file_name` is the bare file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceMeta {
    pub origin: String,
    pub file_name: String,
}

/// A collected text document. `id` is the normalized path relative to the
/// corpus root, always with `/` separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub path: PathBuf,
    pub text: String,
    pub source: SourceMeta,
}

/// A bounded span of a document; the unit of embedding and retrieval.
///
/// - `id`: `<doc_id>:<start>`, stable while the document is unchanged
/// - `start`/`end`: byte span of `text` inside the parent document
/// - `chunk_index`/`total_chunks`: position within the parent document
/// - `token_count`: estimate from [`crate::tokens::estimate_tokens`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub doc_id: String,
    pub doc_path: String,
    pub source: SourceMeta,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub token_count: usize,
}

/// A vector computed for one chunk by one embedding model.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub chunk_id: ChunkId,
    pub vector: Vec<f32>,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Hits ordered by descending score, ties broken by ascending chunk id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScoredChunk> {
        self.hits.iter()
    }
}

/// Sampling bounds handed to a generation provider. `None` leaves the
/// runtime's own default in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// One question against the index.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub text: String,
    pub k: usize,
    pub max_context_tokens: usize,
    pub generation: GenerationParams,
}
