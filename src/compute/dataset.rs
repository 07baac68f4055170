//! Sliding-window training pairs.
//!
//! Both predictor families train on the same `(window -> next token)` stream.
//! The sequence model consumes it one-hot encoded, agents consume it as
//! normalized scalars.

use super::Vocabulary;

/// One `(context -> next token)` example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingPair {
    pub context: Vec<usize>,
    pub target: usize,
}

/// A window of tokens in one-hot form.
///
/// Stored sparsely as one hot index per row; [`to_dense`](Self::to_dense)
/// expands it to the `(window_length x depth)` matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneHot {
    indices: Vec<usize>,
    depth: usize,
}

impl OneHot {
    /// Encode `indices` against a vocabulary of `depth` entries.
    pub fn new(indices: Vec<usize>, depth: usize) -> Self {
        Self { indices, depth }
    }

    /// Hot index of each row.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.indices.len()
    }

    /// Width of each row.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Row-major dense matrix. Rows whose index is out of range stay all zero.
    pub fn to_dense(&self) -> Vec<f32> {
        let mut dense = vec![0.0; self.indices.len() * self.depth];
        for (row, &idx) in self.indices.iter().enumerate() {
            if idx < self.depth {
                dense[row * self.depth + idx] = 1.0;
            }
        }
        dense
    }
}

/// Scalar-normalized example for agents.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarSample {
    pub input: Vec<f32>,
    pub target: f32,
}

/// Training pairs built from one corpus snapshot.
#[derive(Debug, Clone)]
pub struct Dataset {
    pairs: Vec<TrainingPair>,
    window_length: usize,
    vocab_size: usize,
    /// Tokens in the source text.
    token_count: usize,
}

impl Dataset {
    /// Slide a `window_length` window over the tokenized `text` with stride 1.
    ///
    /// Produces `min(max_examples, tokens - window_length)` pairs, or none when
    /// the text has no more tokens than the window.
    pub fn build(
        vocabulary: &Vocabulary,
        text: &str,
        window_length: usize,
        max_examples: usize,
    ) -> Self {
        let tokens = vocabulary.encode(text);
        let pairs = if window_length == 0 {
            Vec::new()
        } else {
            tokens
                .windows(window_length + 1)
                .take(max_examples)
                .map(|w| TrainingPair {
                    context: w[..window_length].to_vec(),
                    target: w[window_length],
                })
                .collect()
        };

        Self {
            pairs,
            window_length,
            vocab_size: vocabulary.len(),
            token_count: tokens.len(),
        }
    }

    pub fn pairs(&self) -> &[TrainingPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn window_length(&self) -> usize {
        self.window_length
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Tokens the text must contain for at least one pair.
    pub fn tokens_needed(&self) -> usize {
        self.window_length + 1
    }

    pub fn token_count(&self) -> usize {
        self.token_count
    }

    /// One-hot encoded contexts with their target index.
    pub fn one_hot(&self) -> Vec<(OneHot, usize)> {
        self.pairs
            .iter()
            .map(|p| (OneHot::new(p.context.clone(), self.vocab_size), p.target))
            .collect()
    }

    /// Contexts and targets scaled by `index / (V - 1)`.
    pub fn normalized(&self) -> Vec<ScalarSample> {
        let scale = |i: usize| {
            if self.vocab_size <= 1 {
                0.0
            } else {
                i as f32 / (self.vocab_size - 1) as f32
            }
        };
        self.pairs
            .iter()
            .map(|p| ScalarSample {
                input: p.context.iter().map(|&i| scale(i)).collect(),
                target: scale(p.target),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pairs_slide_by_one() {
        let vocab = Vocabulary::build("abcde");
        let ds = Dataset::build(&vocab, "abcde", 2, 100);
        assert_eq!(ds.len(), 3);
        assert_eq!(vocab.decode_all(&ds.pairs()[0].context), "ab");
        assert_eq!(vocab.decode(ds.pairs()[0].target), 'c');
        assert_eq!(vocab.decode_all(&ds.pairs()[2].context), "cd");
        assert_eq!(vocab.decode(ds.pairs()[2].target), 'e');
    }

    #[test]
    fn test_short_text_is_empty() {
        let vocab = Vocabulary::build("ab");
        let ds = Dataset::build(&vocab, "ab", 2, 100);
        assert!(ds.is_empty());
        assert_eq!(ds.tokens_needed(), 3);
        assert_eq!(ds.token_count(), 2);
    }

    #[test]
    fn test_max_examples_caps() {
        let text = "abcabcabcabcabc";
        let vocab = Vocabulary::build(text);
        let ds = Dataset::build(&vocab, text, 3, 4);
        assert_eq!(ds.len(), 4);
    }

    #[test]
    fn test_zero_window_is_empty() {
        let vocab = Vocabulary::build("abc");
        assert!(Dataset::build(&vocab, "abc", 0, 10).is_empty());
    }

    #[test]
    fn test_one_hot_shape() {
        let vocab = Vocabulary::build("ab ab");
        let ds = Dataset::build(&vocab, "ab ab", 2, 10);
        let (window, target) = &ds.one_hot()[0];
        assert_eq!(window.rows(), 2);
        assert_eq!(window.depth(), vocab.len());

        let dense = window.to_dense();
        assert_eq!(dense.len(), 2 * vocab.len());
        assert_eq!(dense.iter().sum::<f32>(), 2.0);
        assert_eq!(dense[vocab.index_of('a')], 1.0);
        assert_eq!(dense[vocab.len() + vocab.index_of('b')], 1.0);
        assert_eq!(*target, vocab.index_of(' '));
    }

    #[test]
    fn test_normalized_range() {
        let text = "the quick brown fox";
        let vocab = Vocabulary::build(text);
        let ds = Dataset::build(&vocab, text, 4, 100);
        for sample in ds.normalized() {
            assert_eq!(sample.input.len(), 4);
            assert!(sample.input.iter().all(|v| (0.0..=1.0).contains(v)));
            assert!((0.0..=1.0).contains(&sample.target));
        }
    }

    proptest! {
        #[test]
        fn prop_pair_count(text in "[a-d ]{0,60}", window in 1usize..8, max in 1usize..80) {
            let vocab = Vocabulary::build(&text);
            let ds = Dataset::build(&vocab, &text, window, max);
            let tokens = text.chars().count();
            if tokens <= window {
                prop_assert!(ds.is_empty());
            } else {
                prop_assert_eq!(ds.len(), max.min(tokens - window));
            }
        }
    }
}
