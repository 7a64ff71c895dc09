//! familiar-llm
//!
//! Generation providers behind `familiar_core::traits::Generator`. The only
//! real provider talks to a local Ollama runtime; test stubs live behind the
//! `mock` feature.

pub mod ollama;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use ollama::OllamaGenerator;
