//! Node info encoder: per-node feature vectors from tag, attributes and text.
//!
//! Works on the padded id tables produced by `NodeFeatures`:
//! tag → embedding; text characters → embedding, masked mean, projection;
//! each attribute value → embedding, masked mean, projection, plus its
//! attribute-name embedding, summed over present attributes.
//! The three parts are concatenated and projected to the output width.

use burn::config::Config;
use burn::module::Module;
use burn::nn::{Embedding, EmbeddingConfig, Linear, LinearConfig};
use burn::prelude::*;

use super::gnn_ops::masked_mean;
use crate::data::vocab::PAD_ID;

// ─── Configuration ────────────────────────────────────────────────

/// Node info encoder configuration.
#[derive(Config, Debug)]
pub struct NodeInfoEncoderConfig {
    /// Tag vocabulary size.
    pub tags_vocab_size: usize,
    /// Text character vocabulary size.
    pub text_vocab_size: usize,
    /// Attribute name vocabulary size.
    pub attribs_vocab_size: usize,
    /// Attribute value character vocabulary size.
    pub attrib_values_vocab_size: usize,
    /// Tag embedding width.
    #[config(default = 16)]
    pub tag_vec_len: usize,
    /// Character embedding width, shared by text and attribute values.
    #[config(default = 16)]
    pub char_vec_len: usize,
    /// Encoded node text width.
    #[config(default = 64)]
    pub node_text_vec_len: usize,
    /// Encoded attribute width.
    #[config(default = 32)]
    pub attrib_value_vec_len: usize,
    /// Output node vector width.
    #[config(default = 128)]
    pub output_vec_len: usize,
}

// ─── Encoder ──────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct NodeInfoEncoder<B: Backend> {
    tag_embed: Embedding<B>,
    text_char_embed: Embedding<B>,
    /// char_vec_len → node_text_vec_len
    text_proj: Linear<B>,
    /// Attribute name → attrib_value_vec_len
    attrib_embed: Embedding<B>,
    attrib_value_char_embed: Embedding<B>,
    /// char_vec_len → attrib_value_vec_len
    attrib_value_proj: Linear<B>,
    /// tag + text + attributes → output_vec_len
    output_proj: Linear<B>,
}

impl NodeInfoEncoderConfig {
    /// Initialize the encoder.
    pub fn init<B: Backend>(&self, device: &B::Device) -> NodeInfoEncoder<B> {
        let combined = self.tag_vec_len + self.node_text_vec_len + self.attrib_value_vec_len;
        NodeInfoEncoder {
            tag_embed: EmbeddingConfig::new(self.tags_vocab_size, self.tag_vec_len).init(device),
            text_char_embed: EmbeddingConfig::new(self.text_vocab_size, self.char_vec_len)
                .init(device),
            text_proj: LinearConfig::new(self.char_vec_len, self.node_text_vec_len).init(device),
            attrib_embed: EmbeddingConfig::new(self.attribs_vocab_size, self.attrib_value_vec_len)
                .init(device),
            attrib_value_char_embed: EmbeddingConfig::new(
                self.attrib_values_vocab_size,
                self.char_vec_len,
            )
            .init(device),
            attrib_value_proj: LinearConfig::new(self.char_vec_len, self.attrib_value_vec_len)
                .init(device),
            output_proj: LinearConfig::new(combined, self.output_vec_len).init(device),
        }
    }
}

impl<B: Backend> NodeInfoEncoder<B> {
    /// Encode every node slot of a batch.
    ///
    /// - `tag_ids`: [B, N]
    /// - `text_ids`: [B, N, T]
    /// - `attrib_ids`: [B, N, A]
    /// - `attrib_value_ids`: [B, N, A, V]
    /// - `node_mask`: [B, N], 1.0 for real nodes, 0.0 for padding
    ///
    /// Returns: [B, N, output_vec_len]; padding rows are zero.
    pub fn forward(
        &self,
        tag_ids: Tensor<B, 2, Int>,
        text_ids: Tensor<B, 3, Int>,
        attrib_ids: Tensor<B, 3, Int>,
        attrib_value_ids: Tensor<B, 4, Int>,
        node_mask: Tensor<B, 2>,
    ) -> Tensor<B, 3> {
        let [b, n] = tag_ids.dims();
        let t = text_ids.dims()[2];
        let [_, _, a, v] = attrib_value_ids.dims();
        let rows = b * n;

        let tags = self.tag_embed.forward(tag_ids); // [B, N, d_tag]

        // Text: [B*N, T] → [B*N, T, d_char] → [B*N, d_char] → [B, N, d_text]
        let text_flat = text_ids.reshape([rows, t]);
        let text = masked_mean(self.text_char_embed.forward(text_flat.clone()), text_flat);
        let text = self.text_proj.forward(text);
        let d_text = text.dims()[1];
        let text = text.reshape([b, n, d_text]);

        // Attribute values: [B*N*A, V] → [B*N*A, d_char] → [B*N, A, d_attr]
        let values_flat = attrib_value_ids.reshape([rows * a, v]);
        let values = masked_mean(
            self.attrib_value_char_embed.forward(values_flat.clone()),
            values_flat,
        );
        let values = self.attrib_value_proj.forward(values);
        let d_attr = values.dims()[1];
        let values = values.reshape([rows, a, d_attr]);

        // Attribute names: [B*N, A] → [B*N, A, d_attr]; sum present slots
        let names_flat = attrib_ids.reshape([rows, a]);
        let present: Tensor<B, 3> = names_flat
            .clone()
            .not_equal_elem(PAD_ID as i32)
            .float()
            .unsqueeze_dim::<3>(2)
            .expand([rows, a, d_attr]);
        let names = self.attrib_embed.forward(names_flat);
        let attribs: Tensor<B, 2> = ((names + values) * present).sum_dim(1).squeeze_dim::<2>(1);
        let attribs = attribs.reshape([b, n, d_attr]);

        let combined = Tensor::cat(vec![tags, text, attribs], 2);
        let out = self.output_proj.forward(combined);
        let d_out = out.dims()[2];
        out * node_mask.unsqueeze_dim::<3>(2).expand([b, n, d_out])
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    fn config() -> NodeInfoEncoderConfig {
        NodeInfoEncoderConfig::new(6, 10, 4, 12)
            .with_tag_vec_len(4)
            .with_char_vec_len(4)
            .with_node_text_vec_len(6)
            .with_attrib_value_vec_len(5)
            .with_output_vec_len(8)
    }

    #[test]
    fn encoder_forward_shape() {
        let device = Default::default();
        let encoder = config().init::<B>(&device);

        let tags = Tensor::<B, 2, Int>::from_ints([[2, 3, 0], [4, 0, 0]], &device);
        let text = Tensor::<B, 3, Int>::zeros([2, 3, 5], &device);
        let attribs = Tensor::<B, 3, Int>::zeros([2, 3, 2], &device);
        let values = Tensor::<B, 4, Int>::zeros([2, 3, 2, 4], &device);
        let mask = Tensor::<B, 2>::from_floats([[1.0, 1.0, 0.0], [1.0, 0.0, 0.0]], &device);

        let out = encoder.forward(tags, text, attribs, values, mask);
        assert_eq!(out.dims(), [2, 3, 8]);
    }

    #[test]
    fn padding_slots_are_zero() {
        let device = Default::default();
        let encoder = config().init::<B>(&device);

        let tags = Tensor::<B, 2, Int>::from_ints([[2, 5]], &device);
        let text = Tensor::<B, 3, Int>::from_ints([[[3, 4, 0], [7, 7, 7]]], &device);
        let attribs = Tensor::<B, 3, Int>::from_ints([[[2], [3]]], &device);
        let values = Tensor::<B, 4, Int>::from_ints([[[[5, 6]], [[9, 0]]]], &device);
        let mask = Tensor::<B, 2>::from_floats([[1.0, 0.0]], &device);

        let out = encoder.forward(tags, text, attribs, values, mask);
        let data: Vec<f32> = out.into_data().to_vec().unwrap();
        assert!(data[8..].iter().all(|&v| v == 0.0));
        assert!(data[..8].iter().any(|&v| v != 0.0));
    }

    #[test]
    fn text_beyond_padding_does_not_matter() {
        // Two nodes whose text differs only in padded positions encode equally.
        let device = Default::default();
        let encoder = config().init::<B>(&device);
        let mask = Tensor::<B, 2>::ones([1, 2], &device);

        let tags = Tensor::<B, 2, Int>::from_ints([[2, 2]], &device);
        let text = Tensor::<B, 3, Int>::from_ints([[[3, 4, 0, 0], [3, 4, 0, 0]]], &device);
        let attribs = Tensor::<B, 3, Int>::zeros([1, 2, 1], &device);
        let values = Tensor::<B, 4, Int>::from_ints([[[[5, 0]], [[6, 0]]]], &device);

        let out = encoder.forward(tags, text, attribs, values, mask);
        let data: Vec<f32> = out.into_data().to_vec().unwrap();
        // Attribute slots are padding, so their values are ignored too.
        for i in 0..8 {
            assert!((data[i] - data[8 + i]).abs() < 1e-6);
        }
    }
}
