//! Error types.
//!
//! Decode validation and configuration checks get their own enums so
//! callers can match on the failing sample or option; `Error` wraps both
//! for the composite model entry points.

use thiserror::Error;

/// Result alias for composite model operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Validation failures while turning token-index sequences into text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Position 0 does not hold the start-of-sequence token.
    #[error("sample {sample}: start-of-sequence token missing at index 0")]
    MissingSos { sample: usize },

    /// The last position of a stated length does not hold end-of-sequence.
    #[error("sample {sample}: end-of-sequence token missing at end index {length}")]
    MissingEos { sample: usize, length: usize },

    /// A length slice was supplied but has no entry for this sample.
    #[error("sample {sample}: no output length supplied")]
    MissingLength { sample: usize },

    /// A token index outside the output vocabulary.
    #[error("sample {sample}: token {token} at position {position} is not in the output vocabulary")]
    UnknownToken {
        sample: usize,
        position: usize,
        token: usize,
    },
}

/// Invalid model configuration values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A probability outside `[0, 1]`.
    #[error("{name} must be within [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f64 },

    /// A width or length that must be positive is zero.
    #[error("{name} must be greater than zero")]
    ZeroSize { name: &'static str },

    /// Output sequences need room for at least SOS and EOS.
    #[error("max_output_len must be at least 2, got {max_output_len}")]
    OutputTooShort { max_output_len: usize },

    /// SOS or EOS id does not index into the output vocabulary.
    #[error("{name} id {id} is outside the output vocabulary of size {vocab_size}")]
    SpecialTokenOutOfRange {
        name: &'static str,
        id: usize,
        vocab_size: usize,
    },
}

/// Errors raised by the composite model.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A forward pass was requested for zero trees.
    #[error("tree batch is empty")]
    EmptyBatch,

    /// Target sequences do not line up with the tree batch.
    #[error("target batch has {actual} sequences for {expected} trees")]
    TargetBatchMismatch { expected: usize, actual: usize },
}
