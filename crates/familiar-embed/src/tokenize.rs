use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

/// Model inputs for one batch, each shaped `[B, T]`.
pub struct EncodedBatch {
    pub input_ids: Tensor,
    pub attention_mask: Tensor,
    pub token_type_ids: Tensor,
}

/// Encode `texts`, truncating each to `max_len` tokens and right-padding with
/// `pad_id` to the longest sequence in the batch.
pub fn tokenize_batch(
    tokenizer: &Tokenizer,
    texts: &[String],
    max_len: usize,
    pad_id: u32,
    device: &Device,
) -> Result<EncodedBatch> {
    let mut rows = Vec::with_capacity(texts.len());
    for text in texts {
        let enc = tokenizer
            .encode(text.as_str(), true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let mut ids = enc.get_ids().to_vec();
        let mut mask = enc.get_attention_mask().to_vec();
        ids.truncate(max_len);
        mask.truncate(max_len);
        rows.push((ids, mask));
    }
    let seq_len = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0).max(1);
    let batch = rows.len();
    let mut all_ids = Vec::with_capacity(batch * seq_len);
    let mut all_mask = Vec::with_capacity(batch * seq_len);
    for (ids, mask) in rows {
        let pad = seq_len - ids.len();
        all_ids.extend(ids.into_iter().chain(std::iter::repeat(pad_id).take(pad)));
        all_mask.extend(mask.into_iter().chain(std::iter::repeat(0).take(pad)));
    }
    let input_ids = Tensor::from_vec(all_ids, (batch, seq_len), device)?;
    let attention_mask = Tensor::from_vec(all_mask, (batch, seq_len), device)?;
    let token_type_ids = input_ids.zeros_like()?;
    Ok(EncodedBatch { input_ids, attention_mask, token_type_ids })
}
