//! Node info propagator: synchronous message passing over tree adjacency.
//!
//! Each round reads a snapshot of every node vector, aggregates messages
//! from parent and children, and produces a fresh tensor through a gated
//! update. A node is only influenced by nodes within `stack_depth` hops.
//! Padding rows neither send nor receive messages and stay zero.

use burn::config::Config;
use burn::module::{Ignored, Module};
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::{leaky_relu, sigmoid};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::gnn_ops::{neighborhood_softmax, scatter_add};
use crate::data::layout::{BatchLayout, EdgeTensors};

// ─── Configuration ────────────────────────────────────────────────

/// How incoming neighbor messages are combined into one vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NeighborAggregation {
    /// Plain sum of messages.
    Sum,
    /// Sum divided by the number of neighbors.
    #[default]
    Mean,
    /// GATv2-style learned weights, softmax-normalized per node.
    Attention,
}

/// Configuration of a single propagation round.
#[derive(Config, Debug)]
pub struct PropagationLayerConfig {
    /// Node vector width.
    pub d_model: usize,
    /// Neighbor aggregation rule.
    #[config(default = "NeighborAggregation::Mean")]
    pub aggregation: NeighborAggregation,
    /// Negative slope for LeakyReLU in attention scoring.
    #[config(default = 0.2)]
    pub leaky_relu_alpha: f64,
}

/// Node info propagator configuration.
#[derive(Config, Debug)]
pub struct NodeInfoPropagatorConfig {
    /// Width of incoming node vectors.
    pub d_in: usize,
    /// Width of propagated node vectors.
    pub d_model: usize,
    /// Number of propagation rounds.
    #[config(default = 3)]
    pub stack_depth: usize,
    /// Neighbor aggregation rule, shared by all rounds.
    #[config(default = "NeighborAggregation::Mean")]
    pub aggregation: NeighborAggregation,
}

// ─── Propagation Round ────────────────────────────────────────────

/// Attention scorer for `NeighborAggregation::Attention`.
#[derive(Module, Debug)]
pub struct NeighborAttention<B: Backend> {
    /// Destination node projection.
    w_dst: Linear<B>,
    /// Projects activated edge features to a scalar logit.
    score: Linear<B>,
}

/// One synchronous propagation round.
///
/// Messages: `W_parent·h_p` from the parent, `W_child·h_c` from each child.
/// Update: `z = σ(Wz·h + Uz·m)`, `c = tanh(Wc·h + Uc·m)`,
/// `h' = h + z ⊙ (c − h)`.
#[derive(Module, Debug)]
pub struct PropagationLayer<B: Backend> {
    /// Projection of messages sent by a parent to its children.
    from_parent: Linear<B>,
    /// Projection of messages sent by a child to its parent.
    from_child: Linear<B>,
    gate_self: Linear<B>,
    gate_nbr: Linear<B>,
    cand_self: Linear<B>,
    cand_nbr: Linear<B>,
    /// Present only for attention aggregation.
    attention: Option<NeighborAttention<B>>,
    aggregation: Ignored<NeighborAggregation>,
    leaky_alpha: f64,
}

impl PropagationLayerConfig {
    /// Initialize a propagation round.
    pub fn init<B: Backend>(&self, device: &B::Device) -> PropagationLayer<B> {
        let d = self.d_model;
        let linear = |device: &B::Device| LinearConfig::new(d, d).init(device);
        let attention = (self.aggregation == NeighborAggregation::Attention).then(|| {
            NeighborAttention {
                w_dst: LinearConfig::new(d, d).init(device),
                score: LinearConfig::new(d, 1).init(device),
            }
        });

        PropagationLayer {
            from_parent: linear(device),
            from_child: linear(device),
            gate_self: linear(device),
            gate_nbr: linear(device),
            cand_self: linear(device),
            cand_nbr: linear(device),
            attention,
            aggregation: Ignored(self.aggregation),
            leaky_alpha: self.leaky_relu_alpha,
        }
    }
}

impl<B: Backend> PropagationLayer<B> {
    /// Run one round.
    ///
    /// - `h`: [R, d], node vectors from the previous round
    /// - `edges`: message edges over the same rows, `None` when there are none
    /// - `mask`: [R, 1], 1.0 for real nodes, 0.0 for padding
    ///
    /// Returns: [R, d], next-round node vectors
    pub fn forward(
        &self,
        h: Tensor<B, 2>,
        edges: Option<&EdgeTensors<B>>,
        mask: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let messages = match edges {
            Some(edges) => self.aggregate(h.clone(), edges),
            None => h.zeros_like(),
        };
        self.update(h, messages, mask)
    }

    /// The update applied to a node with no neighbors.
    pub fn self_update(&self, h: Tensor<B, 2>, mask: Tensor<B, 2>) -> Tensor<B, 2> {
        let messages = h.zeros_like();
        self.update(h, messages, mask)
    }

    /// Aggregate incoming messages per row.
    ///
    /// Returns: [R, d]; rows without incoming edges are zero.
    fn aggregate(&self, h: Tensor<B, 2>, edges: &EdgeTensors<B>) -> Tensor<B, 2> {
        let [num_rows, d] = h.dims();
        let num_edges = edges.src.dims()[0];

        let from_parent = edges.from_parent.clone().expand([num_edges, d]);
        let from_child = from_parent.clone().neg().add_scalar(1.0);
        let parent_msgs = self.from_parent.forward(h.clone()).select(0, edges.src.clone());
        let child_msgs = self.from_child.forward(h.clone()).select(0, edges.src.clone());
        let messages = parent_msgs * from_parent + child_msgs * from_child; // [E, d]

        match (self.aggregation.0, &self.attention) {
            (NeighborAggregation::Attention, Some(attn)) => {
                let h_dst = attn.w_dst.forward(h).select(0, edges.dst.clone());
                let activated = leaky_relu(messages.clone() + h_dst, self.leaky_alpha);
                let logits = attn.score.forward(activated); // [E, 1]
                let weights = neighborhood_softmax(logits, edges.dst.clone(), num_rows);
                scatter_add(messages * weights.expand([num_edges, d]), edges.dst.clone(), num_rows)
            }
            (NeighborAggregation::Sum, _) => scatter_add(messages, edges.dst.clone(), num_rows),
            _ => {
                let summed = scatter_add(messages, edges.dst.clone(), num_rows);
                summed / edges.in_degree.clone().expand([num_rows, d])
            }
        }
    }

    fn update(&self, h: Tensor<B, 2>, messages: Tensor<B, 2>, mask: Tensor<B, 2>) -> Tensor<B, 2> {
        let [num_rows, d] = h.dims();
        let z = sigmoid(self.gate_self.forward(h.clone()) + self.gate_nbr.forward(messages.clone()));
        let c = (self.cand_self.forward(h.clone()) + self.cand_nbr.forward(messages)).tanh();
        let next = h.clone() + z * (c - h);
        next * mask.expand([num_rows, d])
    }
}

// ─── Propagator ───────────────────────────────────────────────────

/// Stack of propagation rounds with an optional input projection.
///
/// Input and output: [batch, max_nodes, d]. The input projection exists
/// only when `d_in != d_model`.
#[derive(Module, Debug)]
pub struct NodeInfoPropagator<B: Backend> {
    input_proj: Option<Linear<B>>,
    layers: Vec<PropagationLayer<B>>,
}

impl NodeInfoPropagatorConfig {
    /// Initialize the propagator.
    pub fn init<B: Backend>(&self, device: &B::Device) -> NodeInfoPropagator<B> {
        let input_proj =
            (self.d_in != self.d_model).then(|| LinearConfig::new(self.d_in, self.d_model).init(device));
        let layer_config = PropagationLayerConfig::new(self.d_model).with_aggregation(self.aggregation);
        let layers = (0..self.stack_depth)
            .map(|_| layer_config.init(device))
            .collect();

        NodeInfoPropagator { input_proj, layers }
    }
}

impl<B: Backend> NodeInfoPropagator<B> {
    /// Propagate node vectors along the adjacency described by `layout`.
    ///
    /// - `node_info`: [batch, max_nodes, d_in], encoder output
    /// - `layout`: slot tags and edges for the same batch
    ///
    /// Returns: [batch, max_nodes, d_model]; padding rows are zero.
    pub fn forward(&self, node_info: Tensor<B, 3>, layout: &BatchLayout) -> Tensor<B, 3> {
        let [batch, max_nodes, d_in] = node_info.dims();
        debug_assert_eq!(batch, layout.num_trees());
        debug_assert_eq!(max_nodes, layout.max_nodes());

        let device = node_info.device();
        let rows = batch * max_nodes;
        let mask = layout.node_mask::<B>(&device).reshape([rows, 1]);
        let edges = layout.edge_tensors::<B>(&device);

        debug!(
            batch,
            max_nodes,
            edges = layout.edges().len(),
            rounds = self.layers.len(),
            "propagating node info"
        );

        let mut h = node_info.reshape([rows, d_in]);
        if let Some(proj) = &self.input_proj {
            h = proj.forward(h);
        }
        let d_model = h.dims()[1];
        h = h * mask.clone().expand([rows, d_model]);

        for layer in &self.layers {
            h = layer.forward(h, edges.as_ref(), mask.clone());
        }

        h.reshape([batch, max_nodes, d_model])
    }

    /// Number of propagation rounds.
    pub fn rounds(&self) -> usize {
        self.layers.len()
    }

    pub fn layers(&self) -> &[PropagationLayer<B>] {
        &self.layers
    }
}

// ─── Tests ────────────────────────────────────────────────────────
