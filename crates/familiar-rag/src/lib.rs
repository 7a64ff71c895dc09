//! familiar-rag
//!
//! Retrieval-augmented answering over a [`familiar_vector::VectorIndex`]:
//! retrieve the closest chunks, fit them into a token budget, prompt a
//! generator and package the answer with its sources.

pub mod context;
pub mod engine;
pub mod retriever;

pub use context::{assemble, ContextBlock, PromptContext};
pub use engine::{build_prompt, Answer, QueryEngine, EMPTY_RESPONSE};
pub use retriever::Retriever;
