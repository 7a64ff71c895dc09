//! On-disk persistence of a [`VectorIndex`].
//!
//! Layout under the index path:
//!
//! ```text
//! CURRENT                 JSON manifest naming the active generation
//! gen-<millis>-<hash>/    LanceDB database with a `chunks` table
//! ```
//!
//! A persist writes a fresh generation first and only then replaces
//! `CURRENT` through a temp file and rename, so a reader resolving the
//! manifest always lands on a complete generation. The generation that was
//! active before the flip is kept for readers still holding it; older ones
//! are removed.

use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray, UInt64Array};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::connect;
use lancedb::query::{ExecutableQuery, QueryBase};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use familiar_core::types::{Chunk, SourceMeta};
use familiar_core::{Error, Result};

use crate::index::{IndexEntry, VectorIndex};
use crate::schema::{build_arrow_schema, CHUNKS_TABLE};

pub const MANIFEST_FILE: &str = "CURRENT";
pub const FORMAT_VERSION: u32 = 1;
const GENERATION_PREFIX: &str = "gen-";
const WRITE_BATCH: usize = 1000;

/// Contents of `CURRENT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub generation: String,
    #[serde(default)]
    pub embed_model: String,
    pub dim: usize,
    pub entry_count: usize,
    pub built_at: DateTime<Utc>,
    pub fingerprint: String,
}

pub struct IndexStore;

impl IndexStore {
    /// Write `index` as a new generation under `path` and make it current.
    pub fn persist(path: &Path, index: &VectorIndex) -> Result<Manifest> {
        fs::create_dir_all(path)?;
        let previous = Self::read_manifest(path).ok().map(|m| m.generation);
        let fingerprint = index.fingerprint();
        let generation = next_generation_name(path, &fingerprint);
        let gen_dir = path.join(&generation);

        let rt = runtime()?;
        rt.block_on(write_generation(&gen_dir, index))?;

        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            generation,
            embed_model: index.embed_model().to_string(),
            dim: index.dim(),
            entry_count: index.len(),
            built_at: index.built_at(),
            fingerprint,
        };
        write_manifest(path, &manifest)?;
        prune_generations(path, &manifest.generation, previous.as_deref());
        info!(
            path = %path.display(),
            generation = %manifest.generation,
            entries = manifest.entry_count,
            "index persisted"
        );
        Ok(manifest)
    }

    /// Load the current generation under `path`.
    pub fn load(path: &Path) -> Result<VectorIndex> {
        let manifest = Self::read_manifest(path)?;
        let gen_dir = path.join(&manifest.generation);
        if !gen_dir.is_dir() {
            return Err(Error::corrupt(path, format!("generation {} is missing", manifest.generation)));
        }
        let rt = runtime()?;
        let mut rows = rt.block_on(read_generation(path, &gen_dir, &manifest))?;
        rows.sort_by_key(|(ordinal, _)| *ordinal);
        let entries = rows.into_iter().map(|(_, e)| e).collect();
        debug!(path = %path.display(), generation = %manifest.generation, "index loaded");
        Ok(VectorIndex::from_parts(manifest.embed_model, manifest.dim, manifest.built_at, entries))
    }

    /// Read and sanity-check `CURRENT` without touching the generation.
    pub fn read_manifest(path: &Path) -> Result<Manifest> {
        let file = path.join(MANIFEST_FILE);
        if !file.is_file() {
            return Err(Error::IndexNotFound(path.to_path_buf()));
        }
        let raw = fs::read(&file)?;
        let manifest: Manifest = serde_json::from_slice(&raw)
            .map_err(|e| Error::corrupt(path, format!("unreadable manifest: {e}")))?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(Error::corrupt(path, format!("unknown format version {}", manifest.format_version)));
        }
        if manifest.embed_model.trim().is_empty() {
            return Err(Error::corrupt(path, "manifest names no embedding model"));
        }
        if manifest.dim == 0 {
            return Err(Error::corrupt(path, "manifest dimension is zero"));
        }
        if !manifest.generation.starts_with(GENERATION_PREFIX) || manifest.generation.contains(['/', '\\']) {
            return Err(Error::corrupt(path, format!("bad generation name '{}'", manifest.generation)));
        }
        Ok(manifest)
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread().enable_all().build()?)
}

fn next_generation_name(path: &Path, fingerprint: &str) -> String {
    let base = format!("{GENERATION_PREFIX}{}-{}", Utc::now().timestamp_millis(), &fingerprint[..12]);
    let mut name = base.clone();
    let mut n = 1;
    while path.join(&name).exists() {
        name = format!("{base}-{n}");
        n += 1;
    }
    name
}

fn write_manifest(path: &Path, manifest: &Manifest) -> Result<()> {
    let json = serde_json::to_vec_pretty(manifest).map_err(|e| Error::Operation(format!("encoding manifest: {e}")))?;
    let mut tmp = tempfile::NamedTempFile::new_in(path)?;
    tmp.write_all(&json)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path.join(MANIFEST_FILE)).map_err(|e| Error::Io(e.error))?;
    sync_dir(path)
}

/// Flush directory entries so the rename of `CURRENT` survives a crash.
#[cfg(unix)]
fn sync_dir(path: &Path) -> Result<()> {
    fs::File::open(path)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_path: &Path) -> Result<()> {
    Ok(())
}

fn prune_generations(path: &Path, current: &str, previous: Option<&str>) {
    let Ok(dir) = fs::read_dir(path) else { return };
    for entry in dir.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with(GENERATION_PREFIX) || name == current || Some(name.as_str()) == previous {
            continue;
        }
        match fs::remove_dir_all(entry.path()) {
            Ok(()) => debug!(generation = %name, "pruned old generation"),
            Err(e) => warn!(generation = %name, error = %e, "failed to prune old generation"),
        }
    }
}

fn lance_err(e: lancedb::Error) -> Error {
    Error::Operation(format!("lancedb: {e}"))
}

async fn write_generation(dir: &Path, index: &VectorIndex) -> Result<()> {
    let dim = i32::try_from(index.dim())
        .map_err(|_| Error::InvalidConfig(format!("embedding dimension {} is too large", index.dim())))?;
    let schema = build_arrow_schema(dim);
    let mut batches = Vec::new();
    for (n, group) in index.entries().chunks(WRITE_BATCH).enumerate() {
        let batch = entries_to_record_batch(group, n * WRITE_BATCH, dim)
            .map_err(|e| Error::Operation(format!("building record batch: {e}")))?;
        batches.push(Ok(batch));
    }
    let uri = dir.to_string_lossy();
    let db = connect(uri.as_ref()).execute().await.map_err(lance_err)?;
    let reader = Box::new(RecordBatchIterator::new(batches.into_iter(), schema));
    db.create_table(CHUNKS_TABLE, reader).execute().await.map_err(lance_err)?;
    Ok(())
}

fn entries_to_record_batch(
    entries: &[IndexEntry],
    first_ordinal: usize,
    dim: i32,
) -> std::result::Result<RecordBatch, arrow_schema::ArrowError> {
    let as_u64 = |n: usize| n as u64;
    let chunks = entries.iter().map(|e| &e.chunk);
    let vectors = entries.iter().map(|e| Some(e.vector.iter().copied().map(Some).collect::<Vec<_>>()));
    RecordBatch::try_new(
        build_arrow_schema(dim),
        vec![
            Arc::new(StringArray::from_iter_values(chunks.clone().map(|c| c.id.as_str()))),
            Arc::new(StringArray::from_iter_values(chunks.clone().map(|c| c.doc_id.as_str()))),
            Arc::new(StringArray::from_iter_values(chunks.clone().map(|c| c.doc_path.as_str()))),
            Arc::new(StringArray::from_iter_values(chunks.clone().map(|c| c.source.origin.as_str()))),
            Arc::new(StringArray::from_iter_values(chunks.clone().map(|c| c.source.file_name.as_str()))),
            Arc::new(StringArray::from_iter_values(chunks.clone().map(|c| c.text.as_str()))),
            Arc::new(UInt64Array::from_iter_values(chunks.clone().map(|c| as_u64(c.start)))),
            Arc::new(UInt64Array::from_iter_values(chunks.clone().map(|c| as_u64(c.end)))),
            Arc::new(UInt64Array::from_iter_values(chunks.clone().map(|c| as_u64(c.chunk_index)))),
            Arc::new(UInt64Array::from_iter_values(chunks.clone().map(|c| as_u64(c.total_chunks)))),
            Arc::new(UInt64Array::from_iter_values(chunks.map(|c| as_u64(c.token_count)))),
            Arc::new(UInt64Array::from_iter_values((0..entries.len()).map(|i| as_u64(first_ordinal + i)))),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim)),
        ],
    )
}

async fn read_generation(root: &Path, dir: &Path, manifest: &Manifest) -> Result<Vec<(u64, IndexEntry)>> {
    let corrupt = |reason: String| Error::corrupt(root, reason);
    let uri = dir.to_string_lossy();
    let db = connect(uri.as_ref()).execute().await.map_err(|e| corrupt(format!("opening generation: {e}")))?;
    let names = db.table_names().execute().await.map_err(|e| corrupt(format!("listing tables: {e}")))?;
    if !names.iter().any(|n| n == CHUNKS_TABLE) {
        return Err(corrupt(format!("generation {} has no {CHUNKS_TABLE} table", manifest.generation)));
    }
    let table = db.open_table(CHUNKS_TABLE).execute().await.map_err(|e| corrupt(format!("opening table: {e}")))?;
    let count = table.count_rows(None).await.map_err(|e| corrupt(format!("counting rows: {e}")))?;
    if count != manifest.entry_count {
        return Err(corrupt(format!("manifest lists {} entries, table holds {count}", manifest.entry_count)));
    }
    let mut rows = Vec::with_capacity(count);
    if count == 0 {
        return Ok(rows);
    }
    let mut stream =
        table.query().limit(count).execute().await.map_err(|e| corrupt(format!("querying table: {e}")))?;
    while let Some(batch) = stream.try_next().await.map_err(|e| corrupt(format!("reading rows: {e}")))? {
        rows.extend(batch_to_entries(&batch, manifest.dim).map_err(corrupt)?);
    }
    if rows.len() != count {
        return Err(corrupt(format!("expected {count} rows, read {}", rows.len())));
    }
    Ok(rows)
}

fn batch_to_entries(batch: &RecordBatch, dim: usize) -> std::result::Result<Vec<(u64, IndexEntry)>, String> {
    let strings = |name: &str| -> std::result::Result<&StringArray, String> {
        batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| format!("column {name} missing or mistyped"))
    };
    let numbers = |name: &str| -> std::result::Result<&UInt64Array, String> {
        batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<UInt64Array>())
            .ok_or_else(|| format!("column {name} missing or mistyped"))
    };
    let to_usize = |v: u64| usize::try_from(v).map_err(|_| format!("value {v} out of range"));

    let (ids, doc_ids, doc_paths) = (strings("id")?, strings("doc_id")?, strings("doc_path")?);
    let (origins, file_names, contents) = (strings("origin")?, strings("file_name")?, strings("content")?);
    let (starts, ends, ordinals) = (numbers("start")?, numbers("end")?, numbers("ordinal")?);
    let (chunk_indices, totals, token_counts) = (numbers("chunk_index")?, numbers("total_chunks")?, numbers("token_count")?);
    let vectors = batch
        .column_by_name("vector")
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
        .ok_or_else(|| "column vector missing or mistyped".to_string())?;
    if usize::try_from(vectors.value_length()).ok() != Some(dim) {
        return Err(format!("table stores {}d vectors, manifest says {dim}d", vectors.value_length()));
    }

    let mut out = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        if !vectors.is_valid(i) {
            return Err(format!("row {} has no vector", ids.value(i)));
        }
        let inner = vectors.value(i);
        let vector = inner.as_primitive::<Float32Type>().values().to_vec();
        let chunk = Chunk {
            id: ids.value(i).to_string(),
            doc_id: doc_ids.value(i).to_string(),
            doc_path: doc_paths.value(i).to_string(),
            source: SourceMeta { origin: origins.value(i).to_string(), file_name: file_names.value(i).to_string() },
            text: contents.value(i).to_string(),
            start: to_usize(starts.value(i))?,
            end: to_usize(ends.value(i))?,
            chunk_index: to_usize(chunk_indices.value(i))?,
            total_chunks: to_usize(totals.value(i))?,
            token_count: to_usize(token_counts.value(i))?,
        };
        out.push((ordinals.value(i), IndexEntry { chunk, vector }));
    }
    Ok(out)
}

/// Generation directories currently present under `path`, sorted by name.
pub fn list_generations(path: &Path) -> Result<Vec<PathBuf>> {
    let mut gens: Vec<PathBuf> = fs::read_dir(path)?
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().starts_with(GENERATION_PREFIX))
        .map(|e| e.path())
        .collect();
    gens.sort();
    Ok(gens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(generation: &str) -> Manifest {
        Manifest {
            format_version: FORMAT_VERSION,
            generation: generation.to_string(),
            embed_model: "hash:4".to_string(),
            dim: 4,
            entry_count: 0,
            built_at: Utc::now(),
            fingerprint: "f".repeat(64),
        }
    }

    #[test]
    fn manifest_flip_replaces_current_and_leaves_no_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        write_manifest(tmp.path(), &manifest("gen-1-aaaaaaaaaaaa")).unwrap();
        write_manifest(tmp.path(), &manifest("gen-2-bbbbbbbbbbbb")).unwrap();
        assert_eq!(IndexStore::read_manifest(tmp.path()).unwrap().generation, "gen-2-bbbbbbbbbbbb");
        let names: Vec<String> =
            fs::read_dir(tmp.path()).unwrap().flatten().map(|e| e.file_name().to_string_lossy().to_string()).collect();
        assert_eq!(names, vec![MANIFEST_FILE.to_string()]);
    }

    #[test]
    fn sync_dir_fails_on_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        sync_dir(tmp.path()).unwrap();
        if cfg!(unix) {
            assert!(matches!(sync_dir(&tmp.path().join("absent")), Err(Error::Io(_))));
        }
    }
}
