use clap::{Args, Parser, ValueEnum};
use std::path::PathBuf;

use familiar_core::config::Settings;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    #[value(alias = "json")]
    Structured,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    #[value(alias = "warn")]
    Warning,
    Info,
    Debug,
}

impl LogLevel {
    pub fn directive(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct LogArgs {
    /// Show info-level logs
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Show debug logs for troubleshooting
    #[arg(long)]
    pub debug: bool,

    /// Explicit log level (overrides --verbose/--debug)
    #[arg(long, value_enum, ignore_case = true)]
    pub log_level: Option<LogLevel>,
}

/// Ask a question against a persisted index.
#[derive(Parser, Debug)]
#[command(name = "familiar", version, about = "Answer questions from your local documentation, fully offline")]
pub struct QueryArgs {
    /// The question to answer
    pub prompt: Option<String>,

    /// Read the prompt from stdin instead of an argument
    #[arg(long)]
    pub stdin: bool,

    /// Persisted index directory
    #[arg(long)]
    pub index_path: Option<String>,

    /// Embedding model; must be the one the index was built with
    #[arg(long)]
    pub embed_model: Option<String>,

    /// Generation model served by the local runtime
    #[arg(long)]
    pub model: Option<String>,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    #[arg(long)]
    pub temperature: Option<f32>,

    /// Number of chunks to retrieve
    #[arg(long, short = 'k')]
    pub top_k: Option<usize>,

    /// Token budget for retrieved context
    #[arg(long)]
    pub max_context_tokens: Option<usize>,

    #[command(flatten)]
    pub log: LogArgs,
}

impl QueryArgs {
    /// Overlay the flags that were given on top of loaded settings.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(p) = &self.index_path {
            settings.index_path.clone_from(p);
        }
        if let Some(m) = &self.embed_model {
            settings.embed_model.clone_from(m);
        }
        if let Some(m) = &self.model {
            settings.model.clone_from(m);
        }
        if self.max_tokens.is_some() {
            settings.max_tokens = self.max_tokens;
        }
        if self.temperature.is_some() {
            settings.temperature = self.temperature;
        }
        if let Some(k) = self.top_k {
            settings.k = k;
        }
        if let Some(n) = self.max_context_tokens {
            settings.max_context_tokens = n;
        }
    }
}

/// Build (or rebuild) the index from a directory of text files.
#[derive(Parser, Debug)]
#[command(name = "familiar-indexer", version, about = "Build the familiar index from a documentation directory")]
pub struct IndexArgs {
    /// Directory of plain-text / markdown documents
    pub source_dir: PathBuf,

    /// Where to write the index
    #[arg(long)]
    pub index_path: Option<String>,

    #[arg(long)]
    pub embed_model: Option<String>,

    /// Maximum estimated tokens per chunk
    #[arg(long)]
    pub max_chunk_tokens: Option<usize>,

    /// Fraction of a chunk repeated at the start of the next one
    #[arg(long)]
    pub overlap: Option<f32>,

    /// Chunks embedded per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Do not draw a progress bar
    #[arg(long)]
    pub no_progress: bool,

    #[command(flatten)]
    pub log: LogArgs,
}

impl IndexArgs {
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(p) = &self.index_path {
            settings.index_path.clone_from(p);
        }
        if let Some(m) = &self.embed_model {
            settings.embed_model.clone_from(m);
        }
        if let Some(n) = self.max_chunk_tokens {
            settings.chunking.max_tokens = n;
        }
        if let Some(o) = self.overlap {
            settings.chunking.overlap_percent = o;
        }
        if let Some(b) = self.batch_size {
            settings.embedding.batch_size = b;
        }
    }
}
