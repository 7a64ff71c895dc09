//! Query orchestration: retrieve, assemble, prompt, generate.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use familiar_core::config::Settings;
use familiar_core::traits::{Embedder, Generator};
use familiar_core::types::ChunkId;
use familiar_core::{Error, Result};
use familiar_vector::{IndexStore, VectorIndex};

use crate::context::assemble;
use crate::retriever::Retriever;

/// Answer text returned when retrieval finds nothing to ground a reply on.
pub const EMPTY_RESPONSE: &str = "Empty Response";

/// Fill the question-answering template with `context` and `query`.
pub fn build_prompt(context: &str, query: &str) -> String {
    format!(
        "Context information is below.\n\
         ---------------------\n\
         {context}\n\
         ---------------------\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {query}\n\
         Answer: "
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    /// Paths of the documents behind the context, first occurrence first.
    pub sources: Vec<String>,
    pub chunk_ids: Vec<ChunkId>,
    pub context_tokens: usize,
    pub retrieved: usize,
    pub included: usize,
    pub truncated: bool,
}

impl Answer {
    fn empty() -> Self {
        Self {
            text: EMPTY_RESPONSE.to_string(),
            sources: Vec::new(),
            chunk_ids: Vec::new(),
            context_tokens: 0,
            retrieved: 0,
            included: 0,
            truncated: false,
        }
    }
}

pub struct QueryEngine {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    settings: Settings,
}

impl QueryEngine {
    pub fn new(embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>, settings: Settings) -> Self {
        Self { embedder, generator, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Answer `query_text` from the index persisted at the configured
    /// `index_path`.
    pub fn answer_from_path(&self, query_text: &str) -> Result<Answer> {
        if query_text.trim().is_empty() {
            return Err(Error::EmptyQuery);
        }
        let index = IndexStore::load(&self.settings.index_path())?;
        self.answer(query_text, &index)
    }

    /// Answer `query_text` from `index`.
    ///
    /// The configured `embed_model` must be the model the index was built
    /// with, as must the injected embedder.
    pub fn answer(&self, query_text: &str, index: &VectorIndex) -> Result<Answer> {
        let start = Instant::now();
        let query = self.settings.query(query_text.trim());
        if query.text.is_empty() {
            return Err(Error::EmptyQuery);
        }
        if self.settings.embed_model != index.embed_model() {
            return Err(Error::ModelMismatch {
                index_model: index.embed_model().to_string(),
                query_model: self.settings.embed_model.clone(),
            });
        }
        let retrieval = Retriever::new(self.embedder.as_ref()).retrieve(&query.text, index, query.k)?;
        if retrieval.is_empty() {
            info!(entries = index.len(), "nothing retrieved; skipping generation");
            return Ok(Answer::empty());
        }

        let context = assemble(&retrieval, query.max_context_tokens);
        let prompt = build_prompt(&context.render(), &query.text);
        let text = self.generator.generate(&prompt, &query.generation)?;

        let mut sources: Vec<String> = Vec::new();
        for block in &context.blocks {
            if !sources.contains(&block.doc_path) {
                sources.push(block.doc_path.clone());
            }
        }
        let answer = Answer {
            text,
            sources,
            chunk_ids: context.blocks.iter().map(|b| b.chunk_id.clone()).collect(),
            context_tokens: context.tokens,
            retrieved: retrieval.len(),
            included: context.blocks.len(),
            truncated: context.truncated,
        };
        info!(
            model = self.generator.model_id(),
            retrieved = answer.retrieved,
            included = answer.included,
            context_tokens = answer.context_tokens,
            elapsed_ms = start.elapsed().as_millis(),
            "answered query"
        );
        Ok(answer)
    }
}
