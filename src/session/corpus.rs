//! The shared, growing training text.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use rand::Rng;

/// Conventional file name for an exported corpus.
pub const EXPORT_FILE_NAME: &str = "spaic_corpus.txt";

/// Mutable corpus owned by a session.
///
/// Lengths are counted in characters, not bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    text: String,
}

impl Corpus {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Replace the whole text.
    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Append a generated block on its own line.
    pub fn append_block(&mut self, block: &str) {
        self.text.push('\n');
        self.text.push_str(block);
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Up to `len` characters starting at a random offset in
    /// `[0, max(1, char_len - len))`.
    pub fn random_window<R: Rng + ?Sized>(&self, len: usize, rng: &mut R) -> String {
        let span = self.char_len().saturating_sub(len).max(1);
        let start = rng.gen_range(0..span);
        self.text.chars().skip(start).take(len).collect()
    }

    /// Write the corpus as plain text.
    pub fn export(&self, path: impl AsRef<Path>) -> io::Result<()> {
        fs::write(path, &self.text)
    }
}

impl fmt::Display for Corpus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<String> for Corpus {
    fn from(text: String) -> Self {
        Self { text }
    }
}
