//! Deterministic generators for tests.

use std::sync::Mutex;

use familiar_core::traits::Generator;
use familiar_core::types::GenerationParams;
use familiar_core::{Error, Result};

/// Answers with the prompt it was given.
#[derive(Debug, Clone)]
pub struct EchoGenerator {
    id: String,
}

impl Default for EchoGenerator {
    fn default() -> Self {
        Self { id: "echo".into() }
    }
}

impl Generator for EchoGenerator {
    fn model_id(&self) -> &str {
        &self.id
    }

    fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String> {
        Ok(prompt.to_string())
    }
}

/// Answers every prompt with the same text and remembers the prompts.
#[derive(Debug, Default)]
pub struct FixedGenerator {
    response: String,
    prompts: Mutex<Vec<String>>,
}

impl FixedGenerator {
    #[must_use]
    pub fn new(response: impl Into<String>) -> Self {
        Self { response: response.into(), prompts: Mutex::new(Vec::new()) }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl Generator for FixedGenerator {
    fn model_id(&self) -> &str {
        "fixed"
    }

    fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        Ok(self.response.clone())
    }
}

/// Behaves like a runtime that does not have the model.
#[derive(Debug, Clone)]
pub struct UnavailableGenerator {
    model: String,
}

impl UnavailableGenerator {
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into() }
    }
}

impl Generator for UnavailableGenerator {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
        Err(Error::unavailable(&self.model, "mock runtime has no models"))
    }
}
