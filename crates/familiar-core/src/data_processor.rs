//! Walks a corpus directory, decodes documents and chunks them.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::chunker::{Chunker, ChunkingConfig};
use crate::error::{Error, Result};
use crate::types::{Chunk, Document, SourceMeta};

/// A document left out of the build, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDocument {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ProcessedCorpus {
    pub documents: usize,
    pub chunks: Vec<Chunk>,
    pub skipped: Vec<SkippedDocument>,
}

#[derive(Debug, Default)]
pub struct DataProcessor {
    chunker: Chunker,
}

impl DataProcessor {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { chunker: Chunker::new(config) }
    }

    /// Chunk every readable document under `data_dir`.
    ///
    /// Documents that cannot be read or decoded as text are recorded in
    /// `skipped` and do not fail the call. A missing `data_dir` is an error;
    /// an empty one is not. Document paths are absolute.
    pub fn process_directory(&self, data_dir: &Path) -> Result<ProcessedCorpus> {
        if !data_dir.is_dir() {
            return Err(Error::NotFound(format!("document directory {}", data_dir.display())));
        }
        let root = data_dir.canonicalize()?;
        let (files, unreadable) = walk_documents(&root);
        let mut corpus = ProcessedCorpus { skipped: unreadable, ..ProcessedCorpus::default() };
        if files.is_empty() {
            info!(dir = %root.display(), skipped = corpus.skipped.len(), "no documents found");
            return Ok(corpus);
        }
        for (file_index, file_path) in files.iter().enumerate() {
            debug!(n = file_index + 1, total = files.len(), path = %file_path.display(), "processing document");
            match read_document(&root, file_path) {
                Ok(doc) => {
                    corpus.documents += 1;
                    corpus.chunks.extend(self.chunker.chunk(&doc));
                }
                Err(Error::UnsupportedFormat { path, reason }) => {
                    warn!(path = %path.display(), %reason, "skipping document");
                    corpus.skipped.push(SkippedDocument { path, reason });
                }
                Err(Error::Io(e)) => {
                    warn!(path = %file_path.display(), error = %e, "skipping unreadable document");
                    corpus.skipped.push(SkippedDocument { path: file_path.clone(), reason: format!("unreadable: {e}") });
                }
                Err(e) => return Err(e),
            }
        }
        info!(documents = corpus.documents, skipped = corpus.skipped.len(), chunks = corpus.chunks.len(), "processed corpus");
        Ok(corpus)
    }
}

/// Read and decode one document, deriving its identity from `root`.
pub fn read_document(root: &Path, file_path: &Path) -> Result<Document> {
    let bytes = fs::read(file_path)?;
    if bytes.contains(&0) {
        return Err(Error::UnsupportedFormat {
            path: file_path.to_path_buf(),
            reason: "binary content (NUL bytes)".to_string(),
        });
    }
    let text = String::from_utf8(bytes).map_err(|e| Error::UnsupportedFormat {
        path: file_path.to_path_buf(),
        reason: format!("not valid UTF-8: {e}"),
    })?;
    let relative = file_path.strip_prefix(root).unwrap_or(file_path);
    Ok(Document {
        id: normalize(relative),
        path: file_path.to_path_buf(),
        text,
        source: source_from_path(relative),
    })
}

/// Regular, non-hidden files under `root`, sorted by path. Symlinks are
/// followed.
pub fn list_documents(root: &Path) -> Vec<PathBuf> {
    walk_documents(root).0
}

/// Like [`list_documents`], also returning the entries the walk could not
/// read (broken links, unreadable directories).
fn walk_documents(root: &Path) -> (Vec<PathBuf>, Vec<SkippedDocument>) {
    let mut files = Vec::new();
    let mut unreadable = Vec::new();
    let walker = walkdir::WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
    for entry in walker {
        match entry {
            Ok(e) if e.file_type().is_file() => files.push(e.into_path()),
            Ok(_) => {}
            Err(e) => {
                let path = e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                warn!(path = %path.display(), error = %e, "skipping unreadable entry");
                unreadable.push(SkippedDocument { path, reason: format!("unreadable: {e}") });
            }
        }
    }
    files.sort();
    (files, unreadable)
}

fn normalize(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn source_from_path(relative: &Path) -> SourceMeta {
    let origin = relative
        .parent()
        .map(normalize)
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "misc".to_string());
    let file_name = relative
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    SourceMeta { origin, file_name }
}
