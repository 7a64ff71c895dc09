//! Sentence-embedding models run locally with candle.
//!
//! A model directory must hold `config.json`, `tokenizer.json` and either
//! `model.safetensors` or `pytorch_model.bin`. BERT-family (e.g.
//! `all-MiniLM-L6-v2`) and XLM-RoBERTa-family (e.g. `bge-m3`) checkpoints are
//! supported; outputs are masked-mean pooled and L2-normalized.

use anyhow::{anyhow, bail, ensure, Context};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use serde_json::Value;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use familiar_core::config::expand_path;
use familiar_core::traits::Embedder;
use familiar_core::{Error, Result};

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::{tokenize_batch, EncodedBatch};

const MAX_BATCH: usize = 16;

enum Backbone {
    Bert(BertModel),
    XlmRoberta(XLMRobertaModel),
}

pub struct LocalEmbeddingModel {
    id: String,
    backbone: Backbone,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
    pad_id: u32,
}

impl LocalEmbeddingModel {
    /// Load `model_id` from local files only. A model with no local copy is
    /// reported as [`Error::ModelUnavailable`]; nothing is downloaded.
    pub fn load(model_id: &str, models_dir: &Path) -> Result<Self> {
        let dir = resolve_model_dir(model_id, models_dir).ok_or_else(|| {
            Error::unavailable(
                model_id,
                format!("no local copy under {} or in the Hugging Face cache", models_dir.display()),
            )
        })?;
        Self::from_dir(model_id, &dir).map_err(|e| Error::unavailable(model_id, format!("{e:#}")))
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn from_dir(model_id: &str, dir: &Path) -> anyhow::Result<Self> {
        let device = select_device();
        info!(model = model_id, dir = %dir.display(), "loading embedding model");
        let tokenizer_path = dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = dir.join("config.json");
        let raw = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let meta: Value = serde_json::from_str(&raw)?;
        let model_type = meta.get("model_type").and_then(Value::as_str).unwrap_or("bert").to_string();
        let dim = meta
            .get("hidden_size")
            .and_then(Value::as_u64)
            .ok_or_else(|| anyhow!("{} lacks hidden_size", config_path.display()))? as usize;
        let positions = meta.get("max_position_embeddings").and_then(Value::as_u64).unwrap_or(512) as usize;
        let pad_id = meta.get("pad_token_id").and_then(Value::as_u64).unwrap_or(0) as u32;

        let vb = load_weights(dir, &device)?;
        let (backbone, max_len) = match model_type.as_str() {
            "bert" => {
                let config: BertConfig = serde_json::from_str(&raw)?;
                (Backbone::Bert(BertModel::load(vb, &config)?), positions.min(512))
            }
            "xlm-roberta" | "roberta" => {
                let config: XLMRobertaConfig = serde_json::from_str(&raw)?;
                // RoBERTa reserves two positions for the padding offset.
                (Backbone::XlmRoberta(XLMRobertaModel::new(&config, vb)?), positions.saturating_sub(2).min(512))
            }
            other => bail!("unsupported embedding architecture '{other}'"),
        };
        info!(model = model_id, dim, max_len, arch = %model_type, "embedding model loaded");
        Ok(Self { id: model_id.to_string(), backbone, tokenizer, device, dim, max_len, pad_id })
    }

    fn forward(&self, batch: &EncodedBatch) -> candle_core::Result<Tensor> {
        match &self.backbone {
            Backbone::Bert(m) => m.forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask)),
            Backbone::XlmRoberta(m) => m.forward(
                &batch.input_ids,
                &batch.attention_mask,
                &batch.token_type_ids,
                None,
                None,
                None,
            ),
        }
    }

    fn embed_group(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let batch = tokenize_batch(&self.tokenizer, texts, self.max_len, self.pad_id, &self.device)?;
        let hidden = self.forward(&batch)?;
        let pooled = masked_mean_l2(&hidden, &batch.attention_mask)?;
        let rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?;
        ensure!(rows.len() == texts.len(), "model returned {} rows for {} texts", rows.len(), texts.len());
        ensure!(rows.iter().all(|r| r.len() == self.dim), "model returned vectors of the wrong dimension");
        debug!(n = texts.len(), elapsed_ms = start.elapsed().as_millis(), "embedded batch");
        Ok(rows)
    }
}

impl Embedder for LocalEmbeddingModel {
    fn model_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for group in texts.chunks(MAX_BATCH) {
            let rows = self.embed_group(group).map_err(|e| Error::Embedding(format!("{}: {e:#}", self.id)))?;
            out.extend(rows);
        }
        Ok(out)
    }
}

fn load_weights(dir: &Path, device: &Device) -> anyhow::Result<VarBuilder<'static>> {
    let safetensors = dir.join("model.safetensors");
    if safetensors.is_file() {
        // SAFETY: model files are not modified while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[safetensors], DType::F32, device)? };
        return Ok(vb);
    }
    let weights_path = dir.join("pytorch_model.bin");
    let weights = candle_core::pickle::read_all(&weights_path)
        .with_context(|| format!("reading weights from {}", weights_path.display()))?;
    let weights_map: HashMap<String, Tensor> = weights.into_iter().collect();
    Ok(VarBuilder::from_tensors(weights_map, DType::F32, device))
}

/// Find a local directory holding `model_id`.
///
/// Looks at `FAMILIAR_MODEL_DIR`, an absolute `model_id`, `<models_dir>/<model_id>`,
/// `<models_dir>/<org>--<name>`, and finally the Hugging Face hub cache
/// (`$HF_HOME/hub` or `~/.cache/huggingface/hub`).
pub fn resolve_model_dir(model_id: &str, models_dir: &Path) -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("FAMILIAR_MODEL_DIR") {
        let p = PathBuf::from(&dir);
        if has_model_files(&p) {
            debug!(dir = %p.display(), "using FAMILIAR_MODEL_DIR");
            return Some(p);
        }
    }
    let direct = Path::new(model_id);
    if direct.is_absolute() && has_model_files(direct) {
        return Some(direct.to_path_buf());
    }
    let candidates = [models_dir.join(model_id), models_dir.join(model_id.replace('/', "--"))];
    if let Some(found) = candidates.into_iter().find(|c| has_model_files(c)) {
        return Some(found);
    }
    hf_cache_snapshot(model_id)
}

fn has_model_files(dir: &Path) -> bool {
    dir.join("config.json").is_file() && dir.join("tokenizer.json").is_file()
}

fn hf_cache_snapshot(model_id: &str) -> Option<PathBuf> {
    let hub = std::env::var("HF_HOME")
        .map(|h| PathBuf::from(h).join("hub"))
        .unwrap_or_else(|_| expand_path("~/.cache/huggingface/hub"));
    let repo = hub.join(format!("models--{}", model_id.replace('/', "--")));
    let revision = std::fs::read_to_string(repo.join("refs").join("main")).ok()?;
    let snapshot = repo.join("snapshots").join(revision.trim());
    has_model_files(&snapshot).then_some(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_model_dir(root: &Path) -> PathBuf {
        std::fs::create_dir_all(root).unwrap();
        std::fs::write(root.join("config.json"), "{}").unwrap();
        std::fs::write(root.join("tokenizer.json"), "{}").unwrap();
        root.to_path_buf()
    }

    #[test]
    fn resolves_nested_and_flattened_model_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = fake_model_dir(&tmp.path().join("sentence-transformers/all-MiniLM-L6-v2"));
        assert_eq!(resolve_model_dir("sentence-transformers/all-MiniLM-L6-v2", tmp.path()), Some(nested));

        let flat = fake_model_dir(&tmp.path().join("BAAI--bge-m3"));
        assert_eq!(resolve_model_dir("BAAI/bge-m3", tmp.path()), Some(flat));
    }

    #[test]
    fn missing_model_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let err = LocalEmbeddingModel::load("acme/not-downloaded-model-xyz", tmp.path())
            .err()
            .expect("load must fail");
        assert!(matches!(err, Error::ModelUnavailable { .. }), "{err}");
    }
}
