//! Masked sequence loss against target token sequences.

use burn::prelude::*;

use crate::data::target::TargetBatch;
use crate::data::vocab::PAD_ID;

/// Mean negative log-likelihood of the target tokens.
///
/// - `log_probs`: [batch, steps, vocab], decoder output; step `t`
///   predicts target position `t + 1`
/// - `target`: one sequence per sample, starting with SOS
///
/// Positions past a target's length are masked out, so padding never
/// contributes. Returns a one-element tensor.
pub fn sequence_nll<B: Backend>(log_probs: Tensor<B, 3>, target: &TargetBatch) -> Tensor<B, 1> {
    let [batch, steps, vocab] = log_probs.dims();
    let device = log_probs.device();

    let mut ids = vec![PAD_ID as i32; batch * steps];
    let mut weights = vec![0.0f32; batch * steps];
    for (sample, seq) in target.tokens().iter().enumerate().take(batch) {
        for (step, &token) in seq.iter().skip(1).take(steps).enumerate() {
            ids[sample * steps + step] = token as i32;
            weights[sample * steps + step] = 1.0;
        }
    }
    let count = weights.iter().sum::<f32>().max(1.0);

    let ids = Tensor::<B, 2, Int>::from_data(TensorData::new(ids, [batch * steps, 1]), &device);
    let weights = Tensor::<B, 1>::from_data(TensorData::new(weights, [batch * steps]), &device);

    let picked: Tensor<B, 1> = log_probs
        .reshape([batch * steps, vocab])
        .gather(1, ids)
        .reshape([batch * steps]);

    (picked * weights).sum().neg().div_scalar(count)
}
