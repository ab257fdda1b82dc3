//! Scatter-based message passing and pooling primitives for burn.
//!
//! burn has no native segment reductions, so neighbor aggregation is
//! expressed through `scatter` with `IndexingUpdateOp::Add`.

use burn::prelude::*;
use burn::tensor::IndexingUpdateOp;

use crate::data::vocab::PAD_ID;

/// Scatter-add: aggregate per-edge messages by destination row.
///
/// - `messages`: [num_edges, d], per-edge message vectors
/// - `dst_indices`: [num_edges], destination row per edge
/// - `num_rows`: total number of rows in the output
///
/// Returns: [num_rows, d], summed messages per row; rows without
/// incoming edges are zero.
pub fn scatter_add<B: Backend>(
    messages: Tensor<B, 2>,
    dst_indices: Tensor<B, 1, Int>,
    num_rows: usize,
) -> Tensor<B, 2> {
    let device = messages.device();
    let [num_edges, d] = messages.dims();

    // Expand dst_indices [E] → [E, 1] → [E, d] for scatter
    let indices_2d: Tensor<B, 2, Int> = dst_indices.unsqueeze_dim::<2>(1).expand([num_edges, d]);

    let output = Tensor::<B, 2>::zeros([num_rows, d], &device);
    output.scatter(0, indices_2d, messages, IndexingUpdateOp::Add)
}

/// Neighborhood softmax: softmax of edge scores grouped by destination row.
///
/// - `edge_scores`: [num_edges, 1], raw attention logits
/// - `dst_indices`: [num_edges], destination row per edge
/// - `num_rows`: total number of rows
///
/// Returns: [num_edges, 1], weights summing to 1 per destination
pub fn neighborhood_softmax<B: Backend>(
    edge_scores: Tensor<B, 2>,
    dst_indices: Tensor<B, 1, Int>,
    num_rows: usize,
) -> Tensor<B, 2> {
    let device = edge_scores.device();
    let num_edges = edge_scores.dims()[0];

    let indices_2d: Tensor<B, 2, Int> = dst_indices
        .clone()
        .unsqueeze_dim::<2>(1)
        .expand([num_edges, 1]);

    // Clamp instead of max subtraction; keeps exp finite
    let exp_scores = edge_scores.clamp(-20.0, 20.0).exp();

    let zeros = Tensor::<B, 2>::zeros([num_rows, 1], &device);
    let row_sum = zeros.scatter(0, indices_2d, exp_scores.clone(), IndexingUpdateOp::Add);

    let edge_sum = row_sum.select(0, dst_indices);
    exp_scores / (edge_sum + 1e-10)
}

/// Mean of embedded sequence positions, skipping `PAD_ID` positions.
///
/// - `embedded`: [R, L, d], embedded ids
/// - `ids`: [R, L], the ids that were embedded
///
/// Returns: [R, d]; all-padding rows are zero.
pub fn masked_mean<B: Backend>(embedded: Tensor<B, 3>, ids: Tensor<B, 2, Int>) -> Tensor<B, 2> {
    let [rows, len, d] = embedded.dims();
    let mask: Tensor<B, 2> = ids.not_equal_elem(PAD_ID as i32).float();
    let count = mask.clone().sum_dim(1).clamp_min(1.0); // [R, 1]

    let weighted = embedded * mask.unsqueeze_dim::<3>(2).expand([rows, len, d]);
    let summed: Tensor<B, 2> = weighted.sum_dim(1).squeeze_dim::<2>(1); // [R, d]
    summed / count.expand([rows, d])
}

// ─── Tests ────────────────────────────────────────────────────────
