use anyhow::{ensure, Result};
use candle_core::{DType, Tensor};

/// Mean of the unmasked token states of `hidden` `[B, T, H]`, L2-normalized
/// per row. Returns `[B, H]`.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let dims = hidden.dims();
    ensure!(dims.len() == 3, "hidden shape must be [B,T,H], got {:?}", dims);
    let (batch, hidden_dim) = (dims[0], dims[2]);

    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let mask_3d = mask.unsqueeze(2)?.broadcast_as(hidden.shape())?;
    let sum = (hidden * &mask_3d)?.sum(1)?;
    let lengths = mask.sum(1)?.unsqueeze(1)?.to_dtype(sum.dtype())?;
    let eps_val = match hidden.dtype() { DType::F16 => 1e-6f32, _ => 1e-12f32 };
    let eps = Tensor::new(&[eps_val], hidden.device())?.to_dtype(hidden.dtype())?.unsqueeze(0)?;
    let mean = sum.broadcast_div(&lengths.broadcast_add(&eps)?)?;
    let norm = mean.sqr()?.sum_keepdim(1)?.sqrt()?.broadcast_add(&eps)?;
    let normalized = mean.broadcast_div(&norm)?;
    ensure!(normalized.dims() == [batch, hidden_dim], "pooled shape mismatch: {:?}", normalized.dims());
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn masked_mean_l2_ignores_padding() {
        let dev = Device::Cpu;
        // Two tokens with hidden dim 4; second token is masked out.
        let h = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], (1, 2, 4), &dev).unwrap();
        let mask = Tensor::from_slice(&[1u32, 0u32], (1, 2), &dev).unwrap();
        let out = masked_mean_l2(&h, &mask).unwrap();
        let v: Vec<Vec<f32>> = out.to_vec2().unwrap();
        let norm: f32 = (1.0f32 + 4.0 + 9.0 + 16.0).sqrt();
        let expected = [1.0 / norm, 2.0 / norm, 3.0 / norm, 4.0 / norm];
        for (a, b) in v[0].iter().copied().zip(expected) {
            assert!((a - b).abs() < 1e-5, "a={a} b={b}");
        }
    }

    #[test]
    fn masked_mean_l2_handles_batches_of_different_lengths() {
        let dev = Device::Cpu;
        let h = Tensor::from_slice(
            &[1.0f32, 0.0, 3.0, 0.0, 0.0, 2.0, 0.0, 4.0],
            (2, 2, 2),
            &dev,
        )
        .unwrap();
        let mask = Tensor::from_slice(&[1u32, 1, 1, 0], (2, 2), &dev).unwrap();
        let v: Vec<Vec<f32>> = masked_mean_l2(&h, &mask).unwrap().to_vec2().unwrap();
        // row 0: mean([1,0],[3,0]) = [2,0] -> [1,0]; row 1: only [0,2] -> [0,1]
        assert!((v[0][0] - 1.0).abs() < 1e-5 && v[0][1].abs() < 1e-5);
        assert!(v[1][0].abs() < 1e-5 && (v[1][1] - 1.0).abs() < 1e-5);
    }
}
