//! Supervised training with teacher forcing.
//!
//! One optimizer step per batch of (trees, target sequences): composite
//! forward with the target, masked sequence NLL, backward, AdamW step.

use burn::grad_clipping::GradientClippingConfig;
use burn::optim::{AdamWConfig, GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use rand::Rng;
use tracing::debug;

use super::loss::sequence_nll;
use crate::data::target::TargetBatch;
use crate::data::tree::XmlTree;
use crate::error::Result;
use crate::model::composite::{Hier2Hier, Vocabularies};

/// Supervised training configuration.
#[derive(Debug, Clone)]
pub struct SupervisedConfig {
    /// Initial learning rate.
    pub lr: f64,
    /// Minimum learning rate (cosine decay target).
    pub lr_min: f64,
    pub weight_decay: f64,
    /// Gradient clipping norm.
    pub grad_clip: f32,
}

impl Default for SupervisedConfig {
    fn default() -> Self {
        Self {
            lr: 1e-3,
            lr_min: 1e-5,
            weight_decay: 0.01,
            grad_clip: 1.0,
        }
    }
}

/// Cosine annealing learning rate: lr_min + 0.5*(lr - lr_min)*(1 + cos(pi*t/T))
pub fn cosine_lr(config: &SupervisedConfig, epoch: usize, total_epochs: usize) -> f64 {
    if total_epochs <= 1 {
        return config.lr;
    }
    let t = epoch as f64 / total_epochs as f64;
    config.lr_min + 0.5 * (config.lr - config.lr_min) * (1.0 + (std::f64::consts::PI * t).cos())
}

/// AdamW with gradient norm clipping.
pub fn create_optimizer<B: AutodiffBackend>(
    config: &SupervisedConfig,
) -> impl Optimizer<Hier2Hier<B>, B> {
    AdamWConfig::new()
        .with_weight_decay(config.weight_decay as f32)
        .with_grad_clipping(Some(GradientClippingConfig::Norm(config.grad_clip)))
        .init()
}

/// One training batch: trees with their target output sequences.
pub struct TrainingBatch<'a> {
    pub trees: &'a [XmlTree],
    pub target: &'a TargetBatch,
}

/// Result of one training epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochResult {
    /// Mean loss over batches.
    pub avg_loss: f32,
    pub num_batches: usize,
}

/// Run one optimizer step. Returns the updated model and the batch loss.
#[allow(clippy::too_many_arguments)]
pub fn train_step<B, O, R>(
    model: Hier2Hier<B>,
    batch: &TrainingBatch<'_>,
    vocabs: &Vocabularies,
    optimizer: &mut O,
    lr: f64,
    rng: &mut R,
    device: &B::Device,
) -> Result<(Hier2Hier<B>, f32)>
where
    B: AutodiffBackend,
    O: Optimizer<Hier2Hier<B>, B>,
    R: Rng + ?Sized,
{
    let output = model.forward(batch.trees, vocabs, Some(batch.target), None, rng, device)?;
    let loss = sequence_nll(output.log_probs, batch.target);
    let loss_val = loss
        .clone()
        .into_data()
        .iter::<f32>()
        .next()
        .unwrap_or(f32::NAN);

    let grads = loss.backward();
    let grads = GradientsParams::from_grads(grads, &model);
    Ok((optimizer.step(lr, model, grads), loss_val))
}

/// Train one epoch over `batches`.
pub fn train_epoch<B, O, R>(
    model: Hier2Hier<B>,
    batches: &[TrainingBatch<'_>],
    vocabs: &Vocabularies,
    optimizer: &mut O,
    lr: f64,
    rng: &mut R,
    device: &B::Device,
) -> Result<(Hier2Hier<B>, EpochResult)>
where
    B: AutodiffBackend,
    O: Optimizer<Hier2Hier<B>, B>,
    R: Rng + ?Sized,
{
    let mut model = model;
    let mut total_loss = 0.0f32;
    for batch in batches {
        let (next, loss) = train_step(model, batch, vocabs, optimizer, lr, rng, device)?;
        model = next;
        total_loss += loss;
    }

    let avg_loss = if batches.is_empty() {
        0.0
    } else {
        total_loss / batches.len() as f32
    };
    debug!(avg_loss, batches = batches.len(), lr, "epoch finished");

    Ok((
        model,
        EpochResult {
            avg_loss,
            num_batches: batches.len(),
        },
    ))
}
