use anyhow::Context;
use std::io::{IsTerminal, Read};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use familiar_core::config::Settings;
use familiar_core::traits::{Embedder, Generator};
use familiar_core::Error;
use familiar_embed::load_embedder;
use familiar_llm::OllamaGenerator;
use familiar_rag::{Answer, QueryEngine};
use familiar_vector::{BuildReport, IndexBuilder, IndexStore};

use crate::args::{IndexArgs, OutputFormat, QueryArgs};

/// The prompt from the positional argument or, with `--stdin`, from stdin.
pub fn resolve_prompt(args: &QueryArgs) -> anyhow::Result<String> {
    let prompt = if args.stdin {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("reading prompt from stdin")?;
        buf
    } else {
        args.prompt.clone().unwrap_or_default()
    };
    let prompt = prompt.trim().to_string();
    if prompt.is_empty() {
        return Err(Error::EmptyQuery).context("no prompt supplied; pass one as an argument or use --stdin");
    }
    Ok(prompt)
}

/// Answer `prompt` and render it in `format`.
pub fn run_query(prompt: &str, format: OutputFormat, settings: &Settings) -> anyhow::Result<String> {
    settings.validate()?;
    if prompt.trim().is_empty() {
        return Err(Error::EmptyQuery.into());
    }
    let index_path = settings.index_path();
    let index = IndexStore::load(&index_path)?;
    // Fail before loading any model weights.
    if index.embed_model() != settings.embed_model {
        return Err(Error::ModelMismatch {
            index_model: index.embed_model().to_string(),
            query_model: settings.embed_model.clone(),
        }
        .into());
    }
    let embedder: Arc<dyn Embedder> = Arc::from(load_embedder(&settings.embed_model, &settings.models_dir())?);
    let generator: Arc<dyn Generator> = Arc::new(OllamaGenerator::new(&settings.model, &settings.llm)?);
    let engine = QueryEngine::new(embedder, generator, settings.clone());
    let answer = engine.answer(prompt, &index)?;
    Ok(render_answer(prompt, &answer, format, settings, &index_path))
}

pub fn render_answer(prompt: &str, answer: &Answer, format: OutputFormat, settings: &Settings, index_path: &Path) -> String {
    match format {
        OutputFormat::Text => {
            let mut out = answer.text.trim_end().to_string();
            if !answer.sources.is_empty() {
                out.push_str("\n\nSources:");
                for source in &answer.sources {
                    out.push_str("\n  - ");
                    out.push_str(source);
                }
            }
            out
        }
        OutputFormat::Structured => {
            let index_path = index_path.canonicalize().unwrap_or_else(|_| index_path.to_path_buf());
            serde_json::json!({
                "prompt": prompt,
                "response": answer.text,
                "sources": answer.sources,
                "metadata": {
                    "index_path": index_path.to_string_lossy(),
                    "embed_model": settings.embed_model,
                    "llm_model": settings.model,
                    "chunk_ids": answer.chunk_ids,
                    "retrieved": answer.retrieved,
                    "included": answer.included,
                    "context_tokens": answer.context_tokens,
                    "truncated": answer.truncated,
                },
            })
            .to_string()
        }
    }
}

/// Build the index described by `args` and `settings`, returning a summary
/// line for stdout.
pub fn run_index(args: &IndexArgs, settings: &Settings) -> anyhow::Result<(BuildReport, String)> {
    settings.validate()?;
    let index_path = settings.index_path();
    let embedder = load_embedder(&settings.embed_model, &settings.models_dir())?;
    let progress = !args.no_progress && std::io::stderr().is_terminal();
    info!(source = %args.source_dir.display(), index = %index_path.display(), model = %settings.embed_model, "building index");
    let (index, report) = IndexBuilder::new(embedder.as_ref(), settings.chunking.clone())
        .batch_size(settings.embedding.batch_size)
        .with_progress(progress)
        .build_and_persist(&args.source_dir, &index_path)?;
    let summary = format!(
        "Indexed {} documents ({} chunks, {} skipped) into {}\nembedding model: {} ({}d), fingerprint {}",
        report.documents,
        report.chunks,
        report.skipped.len(),
        index_path.display(),
        index.embed_model(),
        index.dim(),
        index.fingerprint(),
    );
    Ok((report, summary))
}
