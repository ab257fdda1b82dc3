//! Learned model stages and the composite model wiring them together.

pub mod composite;
pub mod decoder;
pub mod encoder;
pub mod gnn_ops;
pub mod propagator;
