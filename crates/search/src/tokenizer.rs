//! Text tokenizer for full-text indexes
//!
//! Pipeline: UAX#29 word boundaries → lowercase → de-duplicate
//!
//! The same tokenizer must be used to derive index words from rows and to
//! break up search phrases, otherwise terms will not line up with keys.

use std::collections::HashSet;
use tidepool_core::codec::get_value_for_single_keypath;
use tidepool_core::{KeyPath, Row};
use unicode_segmentation::UnicodeSegmentation;

/// Derives index words from text
///
/// Tokenizers must be Send + Sync; a provider shares one across every
/// transaction.
pub trait Tokenizer: Send + Sync {
    /// Break text into unique, normalized words
    fn words_for_text(&self, text: &str) -> Vec<String>;

    /// Words for the text a row carries at `key_path`
    ///
    /// Only single key paths over string fields produce words; anything
    /// else (missing field, non-string, compound path) yields none.
    fn words_for_item(&self, key_path: &KeyPath, item: &Row) -> Vec<String> {
        let KeyPath::Single(field) = key_path else {
            return Vec::new();
        };
        match get_value_for_single_keypath(item, field).and_then(|v| v.as_str()) {
            Some(text) => self.words_for_text(text),
            None => Vec::new(),
        }
    }

    /// Name for debugging and logging
    fn name(&self) -> &str;
}

/// Default tokenizer: unicode words, lowercased, first occurrence kept
///
/// # Example
///
/// ```
/// use tidepool_search::{Tokenizer, WordTokenizer};
///
/// let words = WordTokenizer.words_for_text("The quick, QUICK fox");
/// assert_eq!(words, vec!["the", "quick", "fox"]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn words_for_text(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        text.unicode_words()
            .map(str::to_lowercase)
            .filter(|word| seen.insert(word.clone()))
            .collect()
    }

    fn name(&self) -> &str {
        "word"
    }
}
