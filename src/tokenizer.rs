//! Vocabulary loading and detokenization.

use crate::error::{CaptionError, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// GPT-2 byte-level BPE marker for a leading space.
pub const SPACE_MARKER: char = 'Ġ';

/// Marker strings that never reach the output text.
pub const SPECIAL_TOKENS: [&str; 2] = ["<|endoftext|>", "<|pad|>"];

const FALLBACK_WORDS: [&str; 94] = [
    "a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "man", "woman", "person", "people", "child", "children", "boy", "girl", "dog", "cat",
    "car", "truck", "bus", "bike", "motorcycle", "train", "plane", "boat", "house", "building",
    "tree", "flower", "grass", "sky", "cloud", "sun", "moon", "water", "river", "ocean",
    "red", "blue", "green", "yellow", "black", "white", "brown", "orange", "purple", "pink",
    "big", "small", "tall", "short", "old", "young", "new", "beautiful", "ugly", "good", "bad",
    "sitting", "standing", "walking", "running", "eating", "drinking", "playing", "working",
    "is", "are", "was", "were", "has", "have", "had", "will", "would", "could", "should",
    "very", "quite", "really", "too", "also", "just", "only", "even", "still", "already",
];

/// Token id to text table.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    tokens: HashMap<u32, String>,
}

impl Vocabulary {
    /// Build from a token-string to id mapping, as stored in `vocab.json`.
    ///
    /// When several strings share an id, the last one in iteration order
    /// wins.
    pub fn from_token_ids<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, u32)>,
    {
        let tokens = entries.into_iter().map(|(token, id)| (id, token)).collect();
        Vocabulary { tokens }
    }

    /// Small built-in table used when `vocab.json` is unavailable.
    ///
    /// Ids 0.. map to common caption words; 50256 and 50257 are the
    /// end-of-text and padding markers.
    pub fn fallback() -> Self {
        let mut tokens: HashMap<u32, String> = FALLBACK_WORDS
            .iter()
            .zip(0u32..)
            .map(|(word, id)| (id, (*word).to_string()))
            .collect();
        tokens.insert(50256, SPECIAL_TOKENS[0].to_string());
        tokens.insert(50257, SPECIAL_TOKENS[1].to_string());
        Vocabulary { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Look up the text fragment for a token id.
    pub fn token(&self, id: u32) -> Option<&str> {
        self.tokens.get(&id).map(String::as_str)
    }

    /// Turn generated ids into caption text.
    ///
    /// Unknown ids and marker tokens are dropped, surviving fragments are
    /// joined with single spaces, `Ġ` becomes a space, whitespace runs
    /// collapse to one space and the ends are trimmed.
    pub fn decode(&self, ids: &[u32]) -> String {
        let joined = ids
            .iter()
            .filter_map(|&id| self.token(id))
            .filter(|token| !SPECIAL_TOKENS.contains(token))
            .collect::<Vec<_>>()
            .join(" ")
            .replace(SPACE_MARKER, " ");

        joined
            .split(is_space)
            .filter(|word| !word.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Whitespace as understood by regex `\s`: Unicode White_Space plus the
/// ASCII information separators.
fn is_space(c: char) -> bool {
    c.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&c)
}

/// Load `vocab.json`, falling back to the built-in table on any failure.
pub fn load_vocab<P: AsRef<Path>>(path: P) -> Vocabulary {
    let path = path.as_ref();
    match read_vocab(path) {
        Ok(vocab) => {
            info!(tokens = vocab.len(), path = %path.display(), "loaded vocabulary");
            vocab
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "using fallback vocabulary");
            Vocabulary::fallback()
        }
    }
}

fn read_vocab(path: &Path) -> Result<Vocabulary> {
    let bytes = fs::read(path)?;
    // serde_json's preserve_order keeps document order, so a repeated id
    // resolves to the string written last in the file
    let entries: Map<String, Value> = serde_json::from_slice(&bytes)
        .map_err(|e| CaptionError::Tokenizer(format!("parse {}: {e}", path.display())))?;
    let pairs = entries
        .into_iter()
        .map(|(token, id)| {
            id.as_u64()
                .and_then(|id| u32::try_from(id).ok())
                .map(|id| (token.clone(), id))
                .ok_or_else(|| CaptionError::Tokenizer(format!("invalid id {id} for {token:?}")))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Vocabulary::from_token_ids(pairs))
}
