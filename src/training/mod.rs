//! Training-side helpers: sequence loss and supervised optimizer steps.

pub mod loss;
pub mod supervised;
