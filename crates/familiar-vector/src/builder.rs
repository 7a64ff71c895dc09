//! Corpus directory to [`VectorIndex`]: read, chunk, embed in batches.

use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use familiar_core::chunker::ChunkingConfig;
use familiar_core::data_processor::{DataProcessor, SkippedDocument};
use familiar_core::traits::Embedder;
use familiar_core::types::Embedding;
use familiar_core::{Error, Result};

use crate::index::VectorIndex;
use crate::store::IndexStore;

pub const DEFAULT_BATCH_SIZE: usize = 32;

/// What a build saw, for the indexer's summary line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub documents: usize,
    pub skipped: Vec<SkippedDocument>,
    pub chunks: usize,
}

pub struct IndexBuilder<'a> {
    embedder: &'a dyn Embedder,
    processor: DataProcessor,
    batch_size: usize,
    progress: bool,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(embedder: &'a dyn Embedder, chunking: ChunkingConfig) -> Self {
        Self { embedder, processor: DataProcessor::new(chunking), batch_size: DEFAULT_BATCH_SIZE, progress: false }
    }

    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Draw a progress bar on stderr while embedding.
    #[must_use]
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn build(&self, source_dir: &Path) -> Result<(VectorIndex, BuildReport)> {
        let start = Instant::now();
        let corpus = self.processor.process_directory(source_dir)?;
        let model = self.embedder.model_id();
        let mut index = VectorIndex::new(model, self.embedder.dim());
        info!(
            dir = %source_dir.display(),
            documents = corpus.documents,
            skipped = corpus.skipped.len(),
            chunks = corpus.chunks.len(),
            model,
            "embedding corpus"
        );

        let pb = self.progress_bar(corpus.chunks.len());
        for batch in corpus.chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts)?;
            if vectors.len() != batch.len() {
                return Err(Error::Embedding(format!(
                    "{model} returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                )));
            }
            for (chunk, vector) in batch.iter().zip(vectors) {
                let embedding = Embedding { chunk_id: chunk.id.clone(), vector, model: model.to_string() };
                index.push(chunk.clone(), embedding)?;
            }
            pb.inc(batch.len() as u64);
            debug!(done = index.len(), total = corpus.chunks.len(), "embedded batch");
        }
        pb.finish_and_clear();

        let report = BuildReport { documents: corpus.documents, skipped: corpus.skipped, chunks: index.len() };
        info!(chunks = report.chunks, elapsed_ms = start.elapsed().as_millis(), "index built");
        Ok((index, report))
    }

    /// Build from `source_dir` and persist the result at `index_path`.
    pub fn build_and_persist(&self, source_dir: &Path, index_path: &Path) -> Result<(VectorIndex, BuildReport)> {
        let (index, report) = self.build(source_dir)?;
        IndexStore::persist(index_path, &index)?;
        Ok((index, report))
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%)")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}
