//! Host-side data structures: trees, indexing, batch layout, vocabularies
//! and id tables fed to the model.

pub mod features;
pub mod index;
pub mod layout;
pub mod target;
pub mod tree;
pub mod vocab;
