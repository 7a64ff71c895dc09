//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults, `~/.familiar/config.toml`,
//! `config.toml` and `config.<env>.toml` from the working directory, and
//! `FAMILIAR_*` env vars (`__` separates nested keys). The result is extracted
//! into a typed [`Settings`] that callers pass around explicitly.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::{GenerationParams, Query};

pub const DEFAULT_EMBED_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_MODEL: &str = "gemma3:1b";
pub const DEFAULT_INDEX_PATH: &str = "~/.familiar/cache/index";
/// Upper bound for `chunking.max_tokens`.
pub const MAX_CHUNK_TOKENS: usize = 65_536;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub index_path: String,
    /// Embedding model; must match the model recorded in the index.
    pub embed_model: String,
    /// Generation model served by the local runtime.
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Number of chunks retrieved per query.
    pub k: usize,
    pub max_context_tokens: usize,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Root holding one directory per embedding model id.
    pub models_dir: String,
    pub batch_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            index_path: DEFAULT_INDEX_PATH.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: None,
            temperature: None,
            k: 2,
            max_context_tokens: 2048,
            llm: LlmSettings::default(),
            embedding: EmbeddingSettings::default(),
            chunking: ChunkingConfig::default(),
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self { base_url: "http://localhost:11434".to_string(), timeout_secs: None }
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { models_dir: "~/.familiar/models".to_string(), batch_size: 32 }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(Error::InvalidConfig(msg)) };
        if self.embed_model.trim().is_empty() {
            return invalid("embed_model must not be empty".to_string());
        }
        if self.model.trim().is_empty() {
            return invalid("model must not be empty".to_string());
        }
        if self.k == 0 {
            return invalid("k must be at least 1".to_string());
        }
        if self.max_context_tokens == 0 {
            return invalid("max_context_tokens must be at least 1".to_string());
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return invalid(format!("temperature {t} is outside [0, 2]"));
            }
        }
        if !(1..=MAX_CHUNK_TOKENS).contains(&self.chunking.max_tokens) {
            return invalid(format!(
                "chunking.max_tokens {} is outside [1, {MAX_CHUNK_TOKENS}]",
                self.chunking.max_tokens
            ));
        }
        if !(0.0..1.0).contains(&self.chunking.overlap_percent) {
            return invalid(format!("chunking.overlap_percent {} is outside [0, 1)", self.chunking.overlap_percent));
        }
        if self.embedding.batch_size == 0 {
            return invalid("embedding.batch_size must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn index_path(&self) -> PathBuf {
        expand_path(&self.index_path)
    }

    pub fn models_dir(&self) -> PathBuf {
        expand_path(&self.embedding.models_dir)
    }

    pub fn generation(&self) -> GenerationParams {
        GenerationParams { max_tokens: self.max_tokens, temperature: self.temperature }
    }

    pub fn query(&self, text: &str) -> Query {
        Query {
            text: text.to_string(),
            k: self.k,
            max_context_tokens: self.max_context_tokens,
            generation: self.generation(),
        }
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    pub fn load_from(dir: &Path) -> Result<Self> {
        let env_name = env::var("FAMILIAR_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(expand_path("~/.familiar/config.toml")))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("FAMILIAR_").split("__"));

        Ok(Self { figment })
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    /// Extract and validate the typed settings.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
