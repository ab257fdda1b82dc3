//! Tree-to-sequence learning over XML-like documents.
//!
//! Pipeline: `data::index` assigns node indices and adjacency,
//! `data::features` extracts padded id tables, `model::encoder` embeds
//! them, `model::propagator` runs message passing over the tree edges and
//! `model::decoder` emits output tokens with attention over the result.
//! `model::composite::Hier2Hier` wires the stages into one module.

pub mod config;
pub mod data;
pub mod error;
pub mod hook;
pub mod inference;
pub mod model;
pub mod training;

pub use config::{DeviceKind, ModelConfig};
pub use data::target::TargetBatch;
pub use data::tree::{NodeId, XmlNode, XmlTree};
pub use data::vocab::Vocab;
pub use error::{ConfigError, DecodeError, Error, Result};
pub use hook::{HistogramHook, NoopHook, SummaryHook};
pub use model::composite::{Hier2Hier, Hier2HierOutput, Vocabularies};
pub use model::propagator::NeighborAggregation;
