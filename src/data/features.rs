//! Host-side node feature extraction.
//!
//! Turns trees into padded integer id tables that the node info encoder
//! embeds. All bounded fields (node count, text length, attribute count,
//! attribute value length) are truncated silently; empty positions hold
//! `PAD_ID`.

use burn::prelude::*;
use tracing::trace;

use super::index::BatchIndex;
use super::tree::XmlTree;
use super::vocab::{Vocab, PAD_ID};

/// Vocabularies consulted during feature extraction.
#[derive(Debug, Clone, Copy)]
pub struct FeatureVocabs<'a> {
    pub tags: &'a Vocab,
    pub text: &'a Vocab,
    pub attribs: &'a Vocab,
    pub attrib_values: &'a Vocab,
}

/// Upper bounds on every variable-length node field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureLimits {
    pub max_nodes: usize,
    pub max_text_len: usize,
    pub max_attrib_count: usize,
    pub max_attrib_value_len: usize,
}

/// Count of fields cut short during extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Truncation {
    pub nodes: usize,
    pub texts: usize,
    pub attrib_lists: usize,
    pub attrib_values: usize,
}

/// Padded id tables for a batch, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeFeatures {
    pub limits: FeatureLimits,
    pub num_trees: usize,
    /// [B, N]
    pub tag_ids: Vec<i32>,
    /// [B, N, T]
    pub text_ids: Vec<i32>,
    /// [B, N, A]
    pub attrib_ids: Vec<i32>,
    /// [B, N, A, V]
    pub attrib_value_ids: Vec<i32>,
    pub truncation: Truncation,
}

impl NodeFeatures {
    /// Extract id tables for every indexed node of every tree.
    pub fn extract(
        trees: &[XmlTree],
        index: &BatchIndex,
        vocabs: &FeatureVocabs<'_>,
        limits: FeatureLimits,
    ) -> Self {
        let FeatureLimits {
            max_nodes: n,
            max_text_len: t,
            max_attrib_count: a,
            max_attrib_value_len: v,
        } = limits;
        let b = trees.len();

        let mut tag_ids = vec![PAD_ID as i32; b * n];
        let mut text_ids = vec![PAD_ID as i32; b * n * t];
        let mut attrib_ids = vec![PAD_ID as i32; b * n * a];
        let mut attrib_value_ids = vec![PAD_ID as i32; b * n * a * v];
        let mut truncation = Truncation::default();

        for (tree_idx, (tree, tree_index)) in trees.iter().zip(index.trees()).enumerate() {
            truncation.nodes += tree_index.node_count().saturating_sub(n);

            for (node_idx, &id) in tree_index.nodes().iter().take(n).enumerate() {
                let node = tree.node(id);
                let slot = tree_idx * n + node_idx;

                tag_ids[slot] = vocabs.tags.encode(&node.tag) as i32;

                if let Some(text) = &node.text {
                    if text.chars().count() > t {
                        truncation.texts += 1;
                    }
                    let ids = vocabs.text.encode_chars(text, t);
                    write_ids(&mut text_ids[slot * t..], &ids);
                }

                if node.attributes.len() > a {
                    truncation.attrib_lists += 1;
                }
                for (k, (name, value)) in node.attributes.iter().take(a).enumerate() {
                    let attrib_slot = slot * a + k;
                    attrib_ids[attrib_slot] = vocabs.attribs.encode(name) as i32;
                    if value.chars().count() > v {
                        truncation.attrib_values += 1;
                    }
                    let ids = vocabs.attrib_values.encode_chars(value, v);
                    write_ids(&mut attrib_value_ids[attrib_slot * v..], &ids);
                }
            }
        }

        if truncation != Truncation::default() {
            trace!(?truncation, "node features truncated");
        }

        NodeFeatures {
            limits,
            num_trees: b,
            tag_ids,
            text_ids,
            attrib_ids,
            attrib_value_ids,
            truncation,
        }
    }

    /// [B, N]
    pub fn tag_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2, Int> {
        let shape = [self.num_trees, self.limits.max_nodes];
        Tensor::from_data(TensorData::new(self.tag_ids.clone(), shape), device)
    }

    /// [B, N, T]
    pub fn text_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 3, Int> {
        let shape = [
            self.num_trees,
            self.limits.max_nodes,
            self.limits.max_text_len,
        ];
        Tensor::from_data(TensorData::new(self.text_ids.clone(), shape), device)
    }

    /// [B, N, A]
    pub fn attrib_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 3, Int> {
        let shape = [
            self.num_trees,
            self.limits.max_nodes,
            self.limits.max_attrib_count,
        ];
        Tensor::from_data(TensorData::new(self.attrib_ids.clone(), shape), device)
    }

    /// [B, N, A, V]
    pub fn attrib_value_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 4, Int> {
        let shape = [
            self.num_trees,
            self.limits.max_nodes,
            self.limits.max_attrib_count,
            self.limits.max_attrib_value_len,
        ];
        Tensor::from_data(TensorData::new(self.attrib_value_ids.clone(), shape), device)
    }
}

fn write_ids(dst: &mut [i32], ids: &[usize]) {
    for (slot, &id) in dst.iter_mut().zip(ids) {
        *slot = id as i32;
    }
}

// ─── Tests ────────────────────────────────────────────────────────
