//! Composite hier2hier model: node encoder + propagator + output decoder.
//!
//! Wraps the three learned stages into a single `Module` so parameters are
//! saved and loaded as a unit. `forward` runs the whole pipeline from raw
//! trees: index, extract features, encode, propagate, decode.

use burn::module::Module;
use burn::prelude::*;
use rand::Rng;
use tracing::debug;

use super::decoder::OutputDecoder;
use super::encoder::NodeInfoEncoder;
use super::propagator::NodeInfoPropagator;
use crate::data::features::{FeatureLimits, FeatureVocabs, NodeFeatures};
use crate::data::index::index_batch;
use crate::data::layout::BatchLayout;
use crate::data::target::TargetBatch;
use crate::data::tree::XmlTree;
use crate::data::vocab::Vocab;
use crate::error::{Error, Result};
use crate::hook::HistogramHook;
use crate::inference::text::TextDecoder;

/// Every vocabulary the model reads.
#[derive(Debug, Clone)]
pub struct Vocabularies {
    pub tags: Vocab,
    /// Node text characters.
    pub text: Vocab,
    /// Attribute names.
    pub attribs: Vocab,
    /// Attribute value characters.
    pub attrib_values: Vocab,
    /// Output tokens, SOS and EOS included.
    pub output: Vocab,
}

impl Vocabularies {
    pub fn feature_vocabs(&self) -> FeatureVocabs<'_> {
        FeatureVocabs {
            tags: &self.tags,
            text: &self.text,
            attribs: &self.attribs,
            attrib_values: &self.attrib_values,
        }
    }
}

/// Result of a composite forward pass.
pub struct Hier2HierOutput<B: Backend> {
    /// [batch, steps, output_vocab], step `t` predicts position `t + 1`.
    pub log_probs: Tensor<B, 3>,
    /// Emitted token ids per tree, SOS first.
    pub symbols: Vec<Vec<usize>>,
    /// [batch, max_nodes, propagated_info_len]
    pub propagated: Tensor<B, 3>,
}

/// Composite model. Built by `ModelConfig::init`.
#[derive(Module, Debug)]
pub struct Hier2Hier<B: Backend> {
    pub encoder: NodeInfoEncoder<B>,
    pub propagator: NodeInfoPropagator<B>,
    pub decoder: OutputDecoder<B>,
    pub max_node_count: usize,
    pub max_node_text_len: usize,
    pub max_attrib_count: usize,
    pub max_attrib_value_len: usize,
}

impl<B: Backend> Hier2Hier<B> {
    /// Run the full pipeline over a batch of trees.
    ///
    /// Every tree is padded or cut to `max_node_count` slots, so output
    /// shapes do not depend on the batch contents. With `target`, decoding runs with teacher forcing
    /// and `target` must hold one sequence per tree. `hook` receives the
    /// `node_info`, `node_info_propagated` and `output_log_probs`
    /// distributions.
    pub fn forward<R: Rng + ?Sized>(
        &self,
        trees: &[XmlTree],
        vocabs: &Vocabularies,
        target: Option<&TargetBatch>,
        mut hook: Option<&mut dyn HistogramHook>,
        rng: &mut R,
        device: &B::Device,
    ) -> Result<Hier2HierOutput<B>> {
        if trees.is_empty() {
            return Err(Error::EmptyBatch);
        }

        let index = index_batch(trees);
        let max_nodes = self.max_node_count.max(1);
        let layout = BatchLayout::new(&index, max_nodes);
        let limits = FeatureLimits {
            max_nodes,
            max_text_len: self.max_node_text_len,
            max_attrib_count: self.max_attrib_count,
            max_attrib_value_len: self.max_attrib_value_len,
        };
        let features = NodeFeatures::extract(trees, &index, &vocabs.feature_vocabs(), limits);

        debug!(
            trees = trees.len(),
            max_nodes,
            largest_tree = index.max_node_count(),
            edges = layout.edges().len(),
            "hier2hier forward"
        );

        let node_info = self.encoder.forward(
            features.tag_tensor(device),
            features.text_tensor(device),
            features.attrib_tensor(device),
            features.attrib_value_tensor(device),
            layout.node_mask(device),
        );
        report(&mut hook, "node_info", &node_info);

        let propagated = self.propagator.forward(node_info, &layout);
        report(&mut hook, "node_info_propagated", &propagated);

        let decoded =
            self.decoder
                .forward(propagated.clone(), layout.padding_mask(device), target, rng)?;
        report(&mut hook, "output_log_probs", &decoded.log_probs);

        Ok(Hier2HierOutput {
            log_probs: decoded.log_probs,
            symbols: decoded.symbols,
            propagated,
        })
    }

    /// Decode emitted or target token sequences to text with the output
    /// vocabulary.
    pub fn decode_output(
        &self,
        vocabs: &Vocabularies,
        symbols: &[Vec<usize>],
        lengths: Option<&[usize]>,
    ) -> Result<Vec<String>> {
        let decoder = TextDecoder::new(
            &vocabs.output,
            self.decoder.sos_id(),
            self.decoder.eos_id(),
            self.decoder.max_output_len(),
        );
        Ok(decoder.decode(symbols, lengths)?)
    }
}

fn report<B: Backend, const D: usize>(
    hook: &mut Option<&mut dyn HistogramHook>,
    name: &str,
    tensor: &Tensor<B, D>,
) {
    if let Some(hook) = hook.as_mut() {
        let values: Vec<f32> = tensor.clone().into_data().iter::<f32>().collect();
        hook.add_histogram(name, &values);
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::data::tree::XmlNode;
    use crate::hook::{NoopHook, SummaryHook};
    use burn::backend::NdArray;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    type B = NdArray;

    fn vocabs() -> Vocabularies {
        Vocabularies {
            tags: Vocab::new(["doc", "item", "note"]),
            text: Vocab::from_chars("abc"),
            attribs: Vocab::new(["id"]),
            attrib_values: Vocab::from_chars("0123"),
            output: Vocab::new(["<sos>", "<eos>", "a", "b", "c"]),
        }
    }

    fn model(vocabs: &Vocabularies) -> Hier2Hier<B> {
        ModelConfig::new()
            .with_max_output_len(6)
            .with_max_node_count(4)
            .with_max_node_text_len(3)
            .with_max_attrib_count(1)
            .with_max_attrib_value_len(2)
            .with_tag_vec_len(4)
            .with_char_vec_len(4)
            .with_node_text_vec_len(4)
            .with_attrib_value_vec_len(4)
            .with_propagated_info_len(8)
            .with_output_decoder_state_width(8)
            .with_teacher_forcing_ratio(1.0)
            .init(
                vocabs,
                vocabs.output.encode("<sos>"),
                vocabs.output.encode("<eos>"),
                &Default::default(),
            )
            .unwrap()
    }

    fn trees() -> Vec<XmlTree> {
        let mut big = XmlTree::new(XmlNode::new("doc"));
        let item = big.add_child(big.root(), XmlNode::new("item").with_attribute("id", "12"));
        big.add_child(item, XmlNode::new("note").with_text("abc"));
        big.add_child(big.root(), XmlNode::new("item").with_text("cab"));
        big.add_child(big.root(), XmlNode::new("item"));

        let small = XmlTree::new(XmlNode::new("note").with_text("a"));
        vec![big, small]
    }

    #[test]
    fn empty_batch_is_rejected() {
        let vocabs = vocabs();
        let model = model(&vocabs);
        let mut rng = StdRng::seed_from_u64(0);
        let err = model
            .forward(&[], &vocabs, None, None, &mut rng, &Default::default())
            .err()
            .unwrap();
        assert!(matches!(err, Error::EmptyBatch));
    }

    #[test]
    fn forward_shapes_cap_node_count() {
        let vocabs = vocabs();
        let model = model(&vocabs);
        let mut rng = StdRng::seed_from_u64(1);
        let mut hook = NoopHook;
        let out = model
            .forward(
                &trees(),
                &vocabs,
                None,
                Some(&mut hook),
                &mut rng,
                &Default::default(),
            )
            .unwrap();

        // The five-node tree is cut to max_node_count.
        assert_eq!(out.propagated.dims(), [2, 4, 8]);
        let [batch, steps, vocab] = out.log_probs.dims();
        assert_eq!((batch, vocab), (2, vocabs.output.len()));
        assert!(steps >= 1 && steps <= 5);
        assert_eq!(out.symbols.len(), 2);
    }

    #[test]
    fn small_batches_pad_to_max_node_count() {
        let vocabs = vocabs();
        let model = model(&vocabs);
        let roots = vec![
            XmlTree::new(XmlNode::new("doc")),
            XmlTree::new(XmlNode::new("note").with_text("b")),
        ];
        let mut rng = StdRng::seed_from_u64(5);
        let out = model
            .forward(&roots, &vocabs, None, None, &mut rng, &Default::default())
            .unwrap();
        assert_eq!(out.propagated.dims(), [2, 4, 8]);
    }

    #[test]
    fn padding_slots_of_small_tree_stay_zero() {
        let vocabs = vocabs();
        let model = model(&vocabs);
        let mut rng = StdRng::seed_from_u64(2);
        let out = model
            .forward(&trees(), &vocabs, None, None, &mut rng, &Default::default())
            .unwrap();
        let data: Vec<f32> = out.propagated.into_data().to_vec().unwrap();
        // Tree 1 has one real node; its slots 1..4 are padding.
        let padding = &data[(4 + 1) * 8..];
        assert!(padding.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn hook_sees_every_stage() {
        let vocabs = vocabs();
        let model = model(&vocabs);
        let mut rng = StdRng::seed_from_u64(3);
        let mut hook = SummaryHook::new();
        model
            .forward(
                &trees(),
                &vocabs,
                None,
                Some(&mut hook),
                &mut rng,
                &Default::default(),
            )
            .unwrap();

        let names: Vec<&str> = hook.summaries().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["node_info", "node_info_propagated", "output_log_probs"]
        );
        assert_eq!(hook.latest("node_info").unwrap().count, 2 * 4 * 8);
        assert!(hook.latest("output_log_probs").unwrap().max <= 0.0);
    }

    #[test]
    fn target_length_sets_steps() {
        let vocabs = vocabs();
        let model = model(&vocabs);
        let target = TargetBatch::from_texts(
            &["ab", "c"],
            &vocabs.output,
            model.decoder.sos_id(),
            model.decoder.eos_id(),
            6,
        );
        let mut rng = StdRng::seed_from_u64(4);
        let out = model
            .forward(
                &trees(),
                &vocabs,
                Some(&target),
                None,
                &mut rng,
                &Default::default(),
            )
            .unwrap();
        assert_eq!(out.log_probs.dims(), [2, 3, vocabs.output.len()]);
    }

    #[test]
    fn decode_output_uses_output_vocab() {
        let vocabs = vocabs();
        let model = model(&vocabs);
        let target = TargetBatch::from_texts(
            &["abc", ""],
            &vocabs.output,
            model.decoder.sos_id(),
            model.decoder.eos_id(),
            6,
        );
        let lengths = target.lengths();
        let text = model
            .decode_output(&vocabs, target.tokens(), Some(&lengths))
            .unwrap();
        assert_eq!(text, vec!["abc".to_string(), String::new()]);

        let err = model
            .decode_output(&vocabs, &[vec![4, 3]], None)
            .err()
            .unwrap();
        assert!(matches!(err, Error::Decode(_)));
    }
}
