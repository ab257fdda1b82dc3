//! Model configuration.
//!
//! `ModelConfig` carries every size, probability and switch of the
//! composite model. It is a burn `Config`, so it serializes to JSON with
//! `save`/`load`, and builds the model with `init`.

use burn::backend::wgpu::WgpuDevice;
use burn::config::Config;
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::composite::{Hier2Hier, Vocabularies};
use crate::model::decoder::OutputDecoderConfig;
use crate::model::encoder::NodeInfoEncoderConfig;
use crate::model::propagator::{NeighborAggregation, NodeInfoPropagatorConfig};

/// Compute device selection for the wgpu backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Software adapter.
    Cpu,
    /// Discrete GPU by adapter index.
    Gpu(usize),
    /// Whatever wgpu picks first.
    #[default]
    Default,
}

#[derive(Config, Debug)]
pub struct ModelConfig {
    /// Maximum output length, SOS and EOS included.
    #[config(default = 50)]
    pub max_output_len: usize,
    /// Nodes per tree beyond this are dropped.
    #[config(default = 32)]
    pub max_node_count: usize,
    /// Characters of node text beyond this are dropped.
    #[config(default = 32)]
    pub max_node_text_len: usize,
    #[config(default = 64)]
    pub node_text_vec_len: usize,
    /// Attributes per node beyond this are dropped.
    #[config(default = 4)]
    pub max_attrib_count: usize,
    /// Characters of an attribute value beyond this are dropped.
    #[config(default = 16)]
    pub max_attrib_value_len: usize,
    #[config(default = 32)]
    pub attrib_value_vec_len: usize,
    #[config(default = 16)]
    pub tag_vec_len: usize,
    #[config(default = 16)]
    pub char_vec_len: usize,
    /// Width of node vectors before and after propagation.
    #[config(default = 128)]
    pub propagated_info_len: usize,
    /// Number of propagation rounds.
    #[config(default = 3)]
    pub node_info_propagator_stack_depth: usize,
    #[config(default = "NeighborAggregation::Mean")]
    pub neighbor_aggregation: NeighborAggregation,
    #[config(default = 128)]
    pub output_decoder_state_width: usize,
    #[config(default = 1)]
    pub output_decoder_stack_depth: usize,
    #[config(default = 0.5)]
    pub teacher_forcing_ratio: f64,
    #[config(default = 0.0)]
    pub input_dropout_p: f64,
    #[config(default = 0.0)]
    pub dropout_p: f64,
    #[config(default = true)]
    pub use_attention: bool,
    #[config(default = "DeviceKind::Default")]
    pub device: DeviceKind,
}

impl ModelConfig {
    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("teacher_forcing_ratio", self.teacher_forcing_ratio),
            ("input_dropout_p", self.input_dropout_p),
            ("dropout_p", self.dropout_p),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidProbability { name, value });
            }
        }

        for (name, value) in [
            ("max_node_count", self.max_node_count),
            ("max_node_text_len", self.max_node_text_len),
            ("node_text_vec_len", self.node_text_vec_len),
            ("max_attrib_count", self.max_attrib_count),
            ("max_attrib_value_len", self.max_attrib_value_len),
            ("attrib_value_vec_len", self.attrib_value_vec_len),
            ("tag_vec_len", self.tag_vec_len),
            ("char_vec_len", self.char_vec_len),
            ("propagated_info_len", self.propagated_info_len),
            ("output_decoder_state_width", self.output_decoder_state_width),
            ("output_decoder_stack_depth", self.output_decoder_stack_depth),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroSize { name });
            }
        }

        if self.max_output_len < 2 {
            return Err(ConfigError::OutputTooShort {
                max_output_len: self.max_output_len,
            });
        }
        Ok(())
    }

    /// The wgpu device named by `device`.
    pub fn wgpu_device(&self) -> WgpuDevice {
        match self.device {
            DeviceKind::Cpu => WgpuDevice::Cpu,
            DeviceKind::Gpu(index) => WgpuDevice::DiscreteGpu(index),
            DeviceKind::Default => WgpuDevice::DefaultDevice,
        }
    }

    /// Validate and build the composite model.
    ///
    /// Embedding tables are sized from `vocabs`; `sos_id` and `eos_id` are
    /// output vocabulary ids.
    pub fn init<B: Backend>(
        &self,
        vocabs: &Vocabularies,
        sos_id: usize,
        eos_id: usize,
        device: &B::Device,
    ) -> Result<Hier2Hier<B>, ConfigError> {
        self.validate()?;
        let vocab_size = vocabs.output.len();
        for (name, id) in [("sos", sos_id), ("eos", eos_id)] {
            if id >= vocab_size {
                return Err(ConfigError::SpecialTokenOutOfRange {
                    name,
                    id,
                    vocab_size,
                });
            }
        }

        let encoder = NodeInfoEncoderConfig::new(
            vocabs.tags.len(),
            vocabs.text.len(),
            vocabs.attribs.len(),
            vocabs.attrib_values.len(),
        )
        .with_tag_vec_len(self.tag_vec_len)
        .with_char_vec_len(self.char_vec_len)
        .with_node_text_vec_len(self.node_text_vec_len)
        .with_attrib_value_vec_len(self.attrib_value_vec_len)
        .with_output_vec_len(self.propagated_info_len)
        .init(device);

        let propagator =
            NodeInfoPropagatorConfig::new(self.propagated_info_len, self.propagated_info_len)
                .with_stack_depth(self.node_info_propagator_stack_depth)
                .with_aggregation(self.neighbor_aggregation)
                .init(device);

        let decoder = OutputDecoderConfig::new(vocab_size, self.propagated_info_len, sos_id, eos_id)
            .with_state_width(self.output_decoder_state_width)
            .with_stack_depth(self.output_decoder_stack_depth)
            .with_max_output_len(self.max_output_len)
            .with_teacher_forcing_ratio(self.teacher_forcing_ratio)
            .with_input_dropout_p(self.input_dropout_p)
            .with_dropout_p(self.dropout_p)
            .with_use_attention(self.use_attention)
            .init(device);

        Ok(Hier2Hier {
            encoder,
            propagator,
            decoder,
            max_node_count: self.max_node_count,
            max_node_text_len: self.max_node_text_len,
            max_attrib_count: self.max_attrib_count,
            max_attrib_value_len: self.max_attrib_value_len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::vocab::Vocab;
    use burn::backend::NdArray;

    type B = NdArray;

    fn vocabs() -> Vocabularies {
        Vocabularies {
            tags: Vocab::new(["a", "b"]),
            text: Vocab::from_chars("xyz"),
            attribs: Vocab::new(["k"]),
            attrib_values: Vocab::from_chars("01"),
            output: Vocab::new(["<sos>", "<eos>", "x"]),
        }
    }

    fn small() -> ModelConfig {
        ModelConfig::new()
            .with_propagated_info_len(8)
            .with_output_decoder_state_width(8)
            .with_node_text_vec_len(4)
            .with_attrib_value_vec_len(4)
            .with_tag_vec_len(4)
            .with_char_vec_len(4)
    }

    #[test]
    fn defaults_are_valid() {
        let config = ModelConfig::new();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.device, DeviceKind::Default);
        assert_eq!(config.neighbor_aggregation, NeighborAggregation::Mean);
    }

    #[test]
    fn probabilities_are_range_checked() {
        let err = ModelConfig::new()
            .with_teacher_forcing_ratio(1.5)
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidProbability {
                name: "teacher_forcing_ratio",
                value: 1.5
            }
        );
        assert!(ModelConfig::new().with_dropout_p(f64::NAN).validate().is_err());
    }

    #[test]
    fn sizes_must_be_positive() {
        let err = ModelConfig::new().with_propagated_info_len(0).validate().unwrap_err();
        assert_eq!(err, ConfigError::ZeroSize { name: "propagated_info_len" });
        let err = ModelConfig::new().with_max_output_len(1).validate().unwrap_err();
        assert_eq!(err, ConfigError::OutputTooShort { max_output_len: 1 });
    }

    #[test]
    fn zero_propagation_rounds_are_allowed() {
        let config = ModelConfig::new().with_node_info_propagator_stack_depth(0);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn device_mapping() {
        let config = ModelConfig::new().with_device(DeviceKind::Gpu(1));
        assert_eq!(config.wgpu_device(), WgpuDevice::DiscreteGpu(1));
        let config = ModelConfig::new().with_device(DeviceKind::Cpu);
        assert_eq!(config.wgpu_device(), WgpuDevice::Cpu);
        assert_eq!(ModelConfig::new().wgpu_device(), WgpuDevice::DefaultDevice);
    }

    #[test]
    fn init_checks_special_tokens() {
        let vocabs = vocabs();
        let err = small()
            .init::<B>(&vocabs, 2, 9, &Default::default())
            .err()
            .unwrap();
        assert_eq!(
            err,
            ConfigError::SpecialTokenOutOfRange {
                name: "eos",
                id: 9,
                vocab_size: 5
            }
        );
    }

    #[test]
    fn init_builds_model() {
        let vocabs = vocabs();
        let sos = vocabs.output.encode("<sos>");
        let eos = vocabs.output.encode("<eos>");
        let model = small()
            .with_node_info_propagator_stack_depth(2)
            .init::<B>(&vocabs, sos, eos, &Default::default())
            .unwrap();
        assert_eq!(model.propagator.rounds(), 2);
        assert_eq!(model.decoder.sos_id(), sos);
        assert_eq!(model.decoder.max_output_len(), 50);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let config = small()
            .with_neighbor_aggregation(NeighborAggregation::Attention)
            .with_device(DeviceKind::Gpu(0))
            .with_teacher_forcing_ratio(0.25);
        config.save(&path).unwrap();

        let loaded = ModelConfig::load(&path).unwrap();
        assert_eq!(loaded.neighbor_aggregation, NeighborAggregation::Attention);
        assert_eq!(loaded.device, DeviceKind::Gpu(0));
        assert_eq!(loaded.teacher_forcing_ratio, 0.25);
        assert_eq!(loaded.propagated_info_len, 8);
    }
}
