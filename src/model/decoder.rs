//! Output decoder: stacked GRU cells with attention over propagated nodes.
//!
//! The root's propagated vector seeds every layer's state. Each step
//! embeds the previous token, runs the GRU stack, attends over the node
//! memory and emits log-probabilities over the output vocabulary. With a
//! target batch, the ground-truth token replaces the prediction as the
//! next input with probability `teacher_forcing_ratio`.

use burn::config::Config;
use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Embedding, EmbeddingConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::{log_softmax, sigmoid, softmax};
use rand::Rng;
use tracing::debug;

use crate::data::target::TargetBatch;
use crate::error::Error;

// ─── Configuration ────────────────────────────────────────────────

/// Output decoder configuration.
#[derive(Config, Debug)]
pub struct OutputDecoderConfig {
    /// Output vocabulary size.
    pub vocab_size: usize,
    /// Width of the propagated node vectors (attention memory).
    pub d_memory: usize,
    /// Start-of-sequence token id.
    pub sos_id: usize,
    /// End-of-sequence token id.
    pub eos_id: usize,
    /// GRU state width.
    #[config(default = 128)]
    pub state_width: usize,
    /// Number of stacked GRU cells.
    #[config(default = 1)]
    pub stack_depth: usize,
    /// Maximum output length, SOS included.
    #[config(default = 50)]
    pub max_output_len: usize,
    /// Probability of feeding the ground-truth token as next input.
    #[config(default = 0.5)]
    pub teacher_forcing_ratio: f64,
    /// Dropout on input token embeddings.
    #[config(default = 0.0)]
    pub input_dropout_p: f64,
    /// Dropout on GRU outputs.
    #[config(default = 0.0)]
    pub dropout_p: f64,
    /// Attend over node memory at each step.
    #[config(default = true)]
    pub use_attention: bool,
}

// ─── GRU Cell ─────────────────────────────────────────────────────

/// Single GRU cell.
///
/// `r = σ(W_r·x + U_r·h)`, `z = σ(W_z·x + U_z·h)`,
/// `n = tanh(W_n·x + r ⊙ U_n·h)`, `h' = n + z ⊙ (h − n)`.
#[derive(Module, Debug)]
pub struct GruCell<B: Backend> {
    /// Input projection to the three gates: d_in → 3·width
    input: Linear<B>,
    /// Hidden projection to the three gates: width → 3·width
    hidden: Linear<B>,
    width: usize,
}

fn init_gru_cell<B: Backend>(d_in: usize, width: usize, device: &B::Device) -> GruCell<B> {
    GruCell {
        input: LinearConfig::new(d_in, 3 * width).init(device),
        hidden: LinearConfig::new(width, 3 * width).init(device),
        width,
    }
}

impl<B: Backend> GruCell<B> {
    /// - `x`: [batch, d_in]
    /// - `h`: [batch, width]
    ///
    /// Returns: [batch, width]
    pub fn forward(&self, x: Tensor<B, 2>, h: Tensor<B, 2>) -> Tensor<B, 2> {
        let w = self.width;
        let gi = self.input.forward(x);
        let gh = self.hidden.forward(h.clone());

        let r = sigmoid(gi.clone().narrow(1, 0, w) + gh.clone().narrow(1, 0, w));
        let z = sigmoid(gi.clone().narrow(1, w, w) + gh.clone().narrow(1, w, w));
        let n = (gi.narrow(1, 2 * w, w) + r * gh.narrow(1, 2 * w, w)).tanh();
        n.clone() + z * (h - n)
    }
}

// ─── Attention ────────────────────────────────────────────────────

/// Luong-style attention over the propagated node memory.
#[derive(Module, Debug)]
pub struct MemoryAttention<B: Backend> {
    /// state_width → d_memory
    query: Linear<B>,
    /// state_width + d_memory → state_width
    combine: Linear<B>,
}

impl<B: Backend> MemoryAttention<B> {
    /// - `h`: [batch, state_width], top GRU output
    /// - `memory`: [batch, N, d_memory]
    /// - `padding`: [batch, N], true for padding slots
    ///
    /// Returns: (attended state [batch, state_width], weights [batch, N])
    pub fn forward(
        &self,
        h: Tensor<B, 2>,
        memory: Tensor<B, 3>,
        padding: Tensor<B, 2, Bool>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let q = self.query.forward(h.clone()).unsqueeze_dim::<3>(2); // [batch, M, 1]
        let scores: Tensor<B, 2> = memory.clone().matmul(q).squeeze_dim::<2>(2); // [batch, N]
        let weights = softmax(scores.mask_fill(padding, -1.0e9), 1);

        let context: Tensor<B, 2> = weights
            .clone()
            .unsqueeze_dim::<3>(1)
            .matmul(memory)
            .squeeze_dim::<2>(1); // [batch, M]
        let combined = self.combine.forward(Tensor::cat(vec![h, context], 1)).tanh();
        (combined, weights)
    }
}

// ─── Decoder ──────────────────────────────────────────────────────

/// Result of one decoding pass.
pub struct DecoderOutput<B: Backend> {
    /// [batch, steps, vocab], per-step log-probabilities. Step `t`
    /// predicts position `t + 1` of the output.
    pub log_probs: Tensor<B, 3>,
    /// Emitted token ids per sample: SOS first, EOS last when emitted.
    pub symbols: Vec<Vec<usize>>,
}

#[derive(Module, Debug)]
pub struct OutputDecoder<B: Backend> {
    /// vocab → state_width
    token_embed: Embedding<B>,
    input_dropout: Dropout,
    /// Root vector → initial state of every layer: d_memory → depth·width
    init_state: Linear<B>,
    cells: Vec<GruCell<B>>,
    dropout: Dropout,
    attention: Option<MemoryAttention<B>>,
    /// state_width → vocab
    output_proj: Linear<B>,
    state_width: usize,
    max_output_len: usize,
    sos_id: usize,
    eos_id: usize,
    teacher_forcing_ratio: f64,
}

impl OutputDecoderConfig {
    /// Initialize the decoder.
    pub fn init<B: Backend>(&self, device: &B::Device) -> OutputDecoder<B> {
        let w = self.state_width;
        let depth = self.stack_depth.max(1);
        let cells = (0..depth).map(|_| init_gru_cell(w, w, device)).collect();
        let attention = self.use_attention.then(|| MemoryAttention {
            query: LinearConfig::new(w, self.d_memory).init(device),
            combine: LinearConfig::new(w + self.d_memory, w).init(device),
        });

        OutputDecoder {
            token_embed: EmbeddingConfig::new(self.vocab_size, w).init(device),
            input_dropout: DropoutConfig::new(self.input_dropout_p).init(),
            init_state: LinearConfig::new(self.d_memory, depth * w).init(device),
            cells,
            dropout: DropoutConfig::new(self.dropout_p).init(),
            attention,
            output_proj: LinearConfig::new(w, self.vocab_size).init(device),
            state_width: w,
            max_output_len: self.max_output_len,
            sos_id: self.sos_id,
            eos_id: self.eos_id,
            teacher_forcing_ratio: self.teacher_forcing_ratio.clamp(0.0, 1.0),
        }
    }
}

impl<B: Backend> OutputDecoder<B> {
    pub fn sos_id(&self) -> usize {
        self.sos_id
    }

    pub fn eos_id(&self) -> usize {
        self.eos_id
    }

    pub fn max_output_len(&self) -> usize {
        self.max_output_len
    }

    /// Decode one output sequence per tree.
    ///
    /// - `memory`: [batch, N, d_memory], propagated node vectors; node 0 of
    ///   every tree is its root
    /// - `padding`: [batch, N], true for padding slots
    /// - `target`: ground-truth sequences for teacher forcing
    /// - `rng`: source of teacher forcing decisions
    ///
    /// Without a target, decoding stops once every sample emitted EOS or
    /// `max_output_len` is reached. With a target, it runs for the longest
    /// target so every target position has a prediction.
    pub fn forward<R: Rng + ?Sized>(
        &self,
        memory: Tensor<B, 3>,
        padding: Tensor<B, 2, Bool>,
        target: Option<&TargetBatch>,
        rng: &mut R,
    ) -> crate::error::Result<DecoderOutput<B>> {
        let [batch, _, d_memory] = memory.dims();
        if let Some(target) = target {
            if target.len() != batch {
                return Err(Error::TargetBatchMismatch {
                    expected: batch,
                    actual: target.len(),
                });
            }
        }
        let device = memory.device();
        let w = self.state_width;

        let steps = match target {
            Some(target) => target.max_len().min(self.max_output_len),
            None => self.max_output_len,
        }
        .saturating_sub(1)
        .max(1);

        let root: Tensor<B, 2> = memory.clone().narrow(1, 0, 1).reshape([batch, d_memory]);
        let init = self.init_state.forward(root).tanh();
        let mut states: Vec<Tensor<B, 2>> = (0..self.cells.len())
            .map(|layer| init.clone().narrow(1, layer * w, w))
            .collect();

        let mut inputs = vec![self.sos_id; batch];
        let mut symbols = vec![vec![self.sos_id]; batch];
        let mut finished = vec![false; batch];
        let mut step_log_probs = Vec::with_capacity(steps);

        for step in 0..steps {
            let ids: Vec<i32> = inputs.iter().map(|&t| t as i32).collect();
            let ids = Tensor::<B, 2, Int>::from_data(TensorData::new(ids, [batch, 1]), &device);
            let mut x: Tensor<B, 2> = self
                .input_dropout
                .forward(self.token_embed.forward(ids))
                .reshape([batch, w]);

            for (cell, state) in self.cells.iter().zip(states.iter_mut()) {
                let h = cell.forward(x, state.clone());
                *state = h.clone();
                x = self.dropout.forward(h);
            }

            let features = match &self.attention {
                Some(attention) => attention.forward(x, memory.clone(), padding.clone()).0,
                None => x,
            };
            let log_probs = log_softmax(self.output_proj.forward(features), 1); // [batch, V]
            let predicted: Vec<usize> = log_probs
                .clone()
                .argmax(1)
                .into_data()
                .iter::<i64>()
                .map(|t| t as usize)
                .collect();
            step_log_probs.push(log_probs);

            for (sample, &token) in predicted.iter().enumerate() {
                if !finished[sample] {
                    symbols[sample].push(token);
                    finished[sample] = token == self.eos_id;
                }
                inputs[sample] = token;
                if let Some(next) = target.and_then(|t| t.sequence(sample).get(step + 1)) {
                    if self.teacher_forcing_ratio > 0.0 && rng.random_bool(self.teacher_forcing_ratio)
                    {
                        inputs[sample] = *next;
                    }
                }
            }

            if target.is_none() && finished.iter().all(|&f| f) {
                break;
            }
        }

        debug!(
            batch,
            steps = step_log_probs.len(),
            finished = finished.iter().filter(|&&f| f).count(),
            "decoded output batch"
        );

        Ok(DecoderOutput {
            log_probs: Tensor::stack::<3>(step_log_probs, 1),
            symbols,
        })
    }
}

// ─── Tests ────────────────────────────────────────────────────────
