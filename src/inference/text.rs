//! Turning emitted token-index sequences back into text.

use crate::data::vocab::Vocab;
use crate::error::DecodeError;

/// Suffix marking output that never reached end-of-sequence.
pub const INCOMPLETE_SUFFIX: &str = "...";

/// Decodes token-index sequences that start with SOS.
#[derive(Debug, Clone, Copy)]
pub struct TextDecoder<'a> {
    vocab: &'a Vocab,
    sos_id: usize,
    eos_id: usize,
    max_output_len: usize,
}

impl<'a> TextDecoder<'a> {
    pub fn new(vocab: &'a Vocab, sos_id: usize, eos_id: usize, max_output_len: usize) -> Self {
        TextDecoder {
            vocab,
            sos_id,
            eos_id,
            max_output_len,
        }
    }

    /// Decode every sequence.
    ///
    /// Scanning starts at index 1 and stops at EOS. With `lengths`, sample
    /// `i` must end with EOS at `lengths[i] - 1`; without, scanning runs to
    /// `max_output_len` or the end of the sequence. Sequences with no EOS
    /// in range get `INCOMPLETE_SUFFIX` appended.
    pub fn decode(
        &self,
        outputs: &[Vec<usize>],
        lengths: Option<&[usize]>,
    ) -> Result<Vec<String>, DecodeError> {
        outputs
            .iter()
            .enumerate()
            .map(|(sample, seq)| {
                let length = match lengths {
                    Some(lengths) => Some(
                        *lengths
                            .get(sample)
                            .ok_or(DecodeError::MissingLength { sample })?,
                    ),
                    None => None,
                };
                self.decode_one(sample, seq, length)
            })
            .collect()
    }

    fn decode_one(
        &self,
        sample: usize,
        seq: &[usize],
        length: Option<usize>,
    ) -> Result<String, DecodeError> {
        if seq.first() != Some(&self.sos_id) {
            return Err(DecodeError::MissingSos { sample });
        }

        let end = match length {
            Some(length) => {
                let last = length.checked_sub(1).and_then(|i| seq.get(i));
                if last != Some(&self.eos_id) {
                    return Err(DecodeError::MissingEos { sample, length });
                }
                length
            }
            None => self.max_output_len.min(seq.len()),
        };

        let mut text = String::new();
        for (position, &token) in seq.iter().enumerate().take(end).skip(1) {
            if token == self.eos_id {
                return Ok(text);
            }
            let symbol = self.vocab.decode(token).ok_or(DecodeError::UnknownToken {
                sample,
                position,
                token,
            })?;
            text.push_str(symbol);
        }
        text.push_str(INCOMPLETE_SUFFIX);
        Ok(text)
    }
}

// ─── Tests ────────────────────────────────────────────────────────
