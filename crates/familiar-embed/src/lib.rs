//! familiar-embed
//!
//! Text embedders behind the `familiar_core::traits::Embedder` trait: a local
//! candle sentence-transformer and a dependency-free hashed bag-of-words
//! embedder used by tests.

pub mod device;
pub mod hash;
pub mod model;
pub mod pool;
pub mod tokenize;

use std::path::Path;

use familiar_core::traits::Embedder;
use familiar_core::Result;
use tracing::info;

pub use hash::{HashEmbedder, HASH_MODEL_PREFIX};
pub use model::{resolve_model_dir, LocalEmbeddingModel};
pub use pool::masked_mean_l2;

/// Load the embedder named by `model_id`.
///
/// `hash:<dim>` selects [`HashEmbedder`]; anything else is looked up as a
/// local sentence-transformer checkpoint (see [`resolve_model_dir`]).
pub fn load_embedder(model_id: &str, models_dir: &Path) -> Result<Box<dyn Embedder>> {
    if let Some(embedder) = HashEmbedder::from_model_id(model_id) {
        info!(model = model_id, "using hashed bag-of-words embedder");
        return Ok(Box::new(embedder));
    }
    Ok(Box::new(LocalEmbeddingModel::load(model_id, models_dir)?))
}
