//! Symbol vocabularies.
//!
//! Index 0 is always `<pad>` and index 1 `<unk>`; caller-supplied symbols
//! follow in the order given. Vocabularies are built outside the model and
//! only read during a forward pass.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Padding symbol id.
pub const PAD_ID: usize = 0;
/// Unknown-symbol id.
pub const UNK_ID: usize = 1;

pub const PAD: &str = "<pad>";
pub const UNK: &str = "<unk>";

/// Ordered symbol table with `<pad>` and `<unk>` reserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocab {
    encode_map: HashMap<String, usize>,
    decode_map: Vec<String>,
}

impl Vocab {
    /// Build a vocabulary from symbols. Duplicates keep their first id.
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocab = Vocab {
            encode_map: HashMap::new(),
            decode_map: Vec::new(),
        };
        vocab.push(PAD.to_string());
        vocab.push(UNK.to_string());
        for symbol in symbols {
            vocab.push(symbol.into());
        }
        vocab
    }

    /// One symbol per character of `alphabet`.
    pub fn from_chars(alphabet: &str) -> Self {
        Vocab::new(alphabet.chars().map(String::from))
    }

    fn push(&mut self, symbol: String) {
        if self.encode_map.contains_key(&symbol) {
            return;
        }
        self.encode_map.insert(symbol.clone(), self.decode_map.len());
        self.decode_map.push(symbol);
    }

    /// Id of `symbol`, if present.
    pub fn get(&self, symbol: &str) -> Option<usize> {
        self.encode_map.get(symbol).copied()
    }

    /// Id of `symbol`, falling back to `<unk>`.
    pub fn encode(&self, symbol: &str) -> usize {
        self.get(symbol).unwrap_or(UNK_ID)
    }

    /// Character ids of `text`, truncated to `max_len`.
    pub fn encode_chars(&self, text: &str, max_len: usize) -> Vec<usize> {
        let mut buf = [0u8; 4];
        text.chars()
            .take(max_len)
            .map(|c| self.encode(c.encode_utf8(&mut buf)))
            .collect()
    }

    /// Symbol for an id.
    pub fn decode(&self, id: usize) -> Option<&str> {
        self.decode_map.get(id).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.decode_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decode_map.is_empty()
    }
}

// ─── Tests ────────────────────────────────────────────────────────
