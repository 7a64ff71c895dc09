//! Fitting retrieved chunks into the prompt's token budget.

use familiar_core::tokens::{estimate_tokens, truncate_to_tokens};
use familiar_core::types::{ChunkId, RetrievalResult};

#[derive(Debug, Clone, PartialEq)]
pub struct ContextBlock {
    pub chunk_id: ChunkId,
    pub doc_path: String,
    pub text: String,
    pub tokens: usize,
    pub score: f32,
}

/// Chunks selected for a prompt, in retrieval order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptContext {
    pub blocks: Vec<ContextBlock>,
    pub tokens: usize,
    /// The top chunk alone exceeded the budget and was cut short.
    pub truncated: bool,
}

impl PromptContext {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// `source: <path>` header, blank line, chunk text; blocks separated by a
    /// blank line.
    pub fn render(&self) -> String {
        self.blocks
            .iter()
            .map(|b| format!("source: {}\n\n{}", b.doc_path, b.text.trim()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Take hits in score order while they fit in `max_context_tokens`.
///
/// Stops at the first hit that does not fit. A top hit that is larger than
/// the whole budget is cut at a word boundary instead, and nothing follows it.
pub fn assemble(retrieval: &RetrievalResult, max_context_tokens: usize) -> PromptContext {
    let mut context = PromptContext::default();
    for hit in retrieval.iter() {
        let tokens = estimate_tokens(&hit.chunk.text);
        if context.tokens + tokens <= max_context_tokens {
            context.tokens += tokens;
            context.blocks.push(ContextBlock {
                chunk_id: hit.chunk.id.clone(),
                doc_path: hit.chunk.doc_path.clone(),
                text: hit.chunk.text.clone(),
                tokens,
                score: hit.score,
            });
            continue;
        }
        if context.blocks.is_empty() {
            let trimmed = truncate_to_tokens(&hit.chunk.text, max_context_tokens);
            context.truncated = true;
            if !trimmed.trim().is_empty() {
                let tokens = estimate_tokens(trimmed);
                context.tokens = tokens;
                context.blocks.push(ContextBlock {
                    chunk_id: hit.chunk.id.clone(),
                    doc_path: hit.chunk.doc_path.clone(),
                    text: trimmed.to_string(),
                    tokens,
                    score: hit.score,
                });
            }
        }
        break;
    }
    context
}
