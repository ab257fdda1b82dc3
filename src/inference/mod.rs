//! Inference-side post-processing.

pub mod text;
