//! Splits documents into overlapping word windows.
//!
//! Windows close when they reach `max_tokens`, or earlier on a paragraph
//! break (`\n\n`) once at least half full. Spans are contiguous: the first
//! chunk starts at byte 0, the last ends at the end of the document, and each
//! chunk starts at or before the end of the previous one.

use serde::{Deserialize, Serialize};

use crate::tokens::{tokens_for_words, word_spans, words_within};
use crate::types::{Chunk, Document};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_percent: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_tokens: 500, overlap_percent: 0.2 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn chunk(&self, doc: &Document) -> Vec<Chunk> {
        let text = doc.text.as_str();
        let words = word_spans(text);
        if words.is_empty() {
            return Vec::new();
        }
        let windows = self.windows(text, &words);
        let total_chunks = windows.len();
        windows
            .into_iter()
            .enumerate()
            .map(|(chunk_index, (first, last))| {
                let start = if chunk_index == 0 { 0 } else { words[first].0 };
                let end = if last == words.len() { text.len() } else { words[last].0 };
                Chunk {
                    id: format!("{}:{}", doc.id, start),
                    doc_id: doc.id.clone(),
                    doc_path: doc.path.to_string_lossy().to_string(),
                    source: doc.source.clone(),
                    text: text[start..end].to_string(),
                    start,
                    end,
                    chunk_index,
                    total_chunks,
                    token_count: tokens_for_words(last - first),
                }
            })
            .collect()
    }

    /// Word-index windows `[first, last)`.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn windows(&self, text: &str, words: &[(usize, usize)]) -> Vec<(usize, usize)> {
        let max_words = words_within(self.config.max_tokens).max(1);
        let overlap = ((max_words as f32 * self.config.overlap_percent) as usize).min(max_words - 1);
        let mut windows = Vec::new();
        let mut first = 0usize;
        loop {
            let limit = first.saturating_add(max_words).min(words.len());
            let mut last = limit;
            let mut paragraph_break = false;
            if limit < words.len() {
                let half = first + (max_words / 2).max(1);
                if let Some(k) = (half..=limit).rev().find(|&k| {
                    k > first && text[words[k - 1].1..words[k].0].contains("\n\n")
                }) {
                    last = k;
                    paragraph_break = true;
                }
            }
            windows.push((first, last));
            if last >= words.len() {
                break;
            }
            first = if paragraph_break { last } else { last.saturating_sub(overlap).max(first + 1) };
        }
        windows
    }
}
