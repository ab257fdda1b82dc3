//! Target output sequences for teacher forcing and loss computation.

use super::vocab::Vocab;

/// Ground-truth token sequences, one per tree. Each sequence starts with
/// SOS and, unless truncated, ends with EOS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetBatch {
    tokens: Vec<Vec<usize>>,
}

impl TargetBatch {
    pub fn new(tokens: Vec<Vec<usize>>) -> Self {
        TargetBatch { tokens }
    }

    /// Encode `texts` character by character as `SOS text EOS`, truncated
    /// to `max_len` tokens.
    pub fn from_texts<S: AsRef<str>>(
        texts: &[S],
        vocab: &Vocab,
        sos_id: usize,
        eos_id: usize,
        max_len: usize,
    ) -> Self {
        let tokens = texts
            .iter()
            .map(|text| {
                let mut seq = Vec::with_capacity(max_len);
                seq.push(sos_id);
                seq.extend(vocab.encode_chars(text.as_ref(), max_len.saturating_sub(2)));
                seq.push(eos_id);
                seq.truncate(max_len);
                seq
            })
            .collect();
        TargetBatch { tokens }
    }

    pub fn tokens(&self) -> &[Vec<usize>] {
        &self.tokens
    }

    pub fn sequence(&self, sample: usize) -> &[usize] {
        &self.tokens[sample]
    }

    pub fn lengths(&self) -> Vec<usize> {
        self.tokens.iter().map(Vec::len).collect()
    }

    pub fn max_len(&self) -> usize {
        self.tokens.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
