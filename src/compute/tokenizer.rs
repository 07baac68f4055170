//! Character vocabulary and tokenizer.
//!
//! A [`Vocabulary`] is an immutable snapshot mapping characters to indices
//! `[0, V)`. The [`Tokenizer`] owns the current snapshot and replaces it
//! wholesale on rebuild.

use std::collections::HashMap;

/// Characters always present in a vocabulary.
pub const ESSENTIAL_CHARS: [char; 11] = [' ', '\n', '.', '!', '?', ',', '-', '"', '\'', ':', ';'];

/// Character returned for indices outside the vocabulary.
pub const FALLBACK_CHAR: char = ' ';

/// Immutable character vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    chars: Vec<char>,
    index: HashMap<char, usize>,
}

impl Vocabulary {
    /// Build a vocabulary from the characters of `text` plus [`ESSENTIAL_CHARS`].
    ///
    /// Observed characters come first in code point order, followed by any
    /// essentials not already present.
    pub fn build(text: &str) -> Self {
        let mut observed: Vec<char> = text.chars().collect();
        observed.sort_unstable();
        observed.dedup();

        let mut chars = observed;
        for &c in &ESSENTIAL_CHARS {
            if !chars.contains(&c) {
                chars.push(c);
            }
        }

        let index = chars.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        Self { chars, index }
    }

    /// Vocabulary size V. Never zero.
    #[inline]
    pub fn len(&self) -> usize {
        self.chars.len().max(1)
    }

    /// Always false; kept for API symmetry with `len`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Characters in index order.
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    /// Index of `c`, or 0 for unknown characters.
    #[inline]
    pub fn index_of(&self, c: char) -> usize {
        self.index.get(&c).copied().unwrap_or(0)
    }

    /// Whether `c` has its own index.
    pub fn contains(&self, c: char) -> bool {
        self.index.contains_key(&c)
    }

    /// Map each character of `text` to its index.
    pub fn encode(&self, text: &str) -> Vec<usize> {
        text.chars().map(|c| self.index_of(c)).collect()
    }

    /// Character at `index`, or [`FALLBACK_CHAR`] when out of range.
    #[inline]
    pub fn decode(&self, index: usize) -> char {
        self.chars.get(index).copied().unwrap_or(FALLBACK_CHAR)
    }

    /// Decode a sequence of indices into a string.
    pub fn decode_all(&self, indices: &[usize]) -> String {
        indices.iter().map(|&i| self.decode(i)).collect()
    }

    /// Scale an index into `[0, 1]` as `index / (V - 1)`. A single-entry vocabulary maps to 0.
    #[inline]
    pub fn normalize(&self, index: usize) -> f32 {
        self.normalize_signed(index as i64)
    }

    /// Like [`normalize`](Self::normalize) but accepts indices produced by
    /// rounding a network output, which may be negative or past the end.
    #[inline]
    pub fn normalize_signed(&self, index: i64) -> f32 {
        let denom = self.len() - 1;
        if denom == 0 {
            0.0
        } else {
            index as f32 / denom as f32
        }
    }

    /// Round a scalar back to an index: `round(value * (V - 1))`.
    ///
    /// Non-finite values map to 0.
    #[inline]
    pub fn denormalize(&self, value: f32) -> i64 {
        if !value.is_finite() {
            return 0;
        }
        (value * (self.len() - 1) as f32).round() as i64
    }

    /// Decode a scalar network output into a character.
    pub fn decode_scalar(&self, value: f32) -> char {
        match usize::try_from(self.denormalize(value)) {
            Ok(index) => self.decode(index),
            Err(_) => FALLBACK_CHAR,
        }
    }
}

/// Owner of the current vocabulary snapshot.
#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    vocabulary: Option<Vocabulary>,
}

impl Tokenizer {
    /// Create a tokenizer with no vocabulary yet.
    pub fn new() -> Self {
        Self { vocabulary: None }
    }

    /// Replace the vocabulary with one built from `text`.
    pub fn build(&mut self, text: &str) -> &Vocabulary {
        self.vocabulary.insert(Vocabulary::build(text))
    }

    /// Current vocabulary, if built.
    pub fn vocabulary(&self) -> Option<&Vocabulary> {
        self.vocabulary.as_ref()
    }

    /// Vocabulary size, or 0 before the first build.
    pub fn vocab_size(&self) -> usize {
        self.vocabulary.as_ref().map_or(0, Vocabulary::len)
    }

    /// Encode `text`, building the vocabulary from it first if none exists.
    pub fn encode(&mut self, text: &str) -> Vec<usize> {
        self.vocabulary
            .get_or_insert_with(|| Vocabulary::build(text))
            .encode(text)
    }

    /// Decode an index; falls back to a space when out of range or unbuilt.
    pub fn decode(&self, index: usize) -> char {
        self.vocabulary
            .as_ref()
            .map_or(FALLBACK_CHAR, |v| v.decode(index))
    }
}
