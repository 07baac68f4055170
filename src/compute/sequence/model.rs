//! Trainable next-character model with temperature sampling.

use rand::Rng;
use rand::seq::SliceRandom;
use rayon::prelude::*;

use crate::compute::{Dataset, OneHot, Vocabulary, sample_with_temperature};
use crate::schema::{Architecture, ModelConfig};

use super::dense::DenseNetwork;
use super::layers::clip_global_norm;
use super::lstm::LstmNetwork;
use super::optimizer::Adam;

/// Sequence model errors.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error(
        "No supported architecture for window {window_length} x vocabulary {vocab_size}: {reasons}"
    )]
    NoSupportedArchitecture {
        window_length: usize,
        vocab_size: usize,
        reasons: String,
    },
    #[error(
        "Model is bound to a different vocabulary ({expected} characters, got {actual}); rebuild required"
    )]
    VocabularyMismatch { expected: usize, actual: usize },
    #[error(
        "Window is {actual_rows}x{actual_depth}, model expects {expected_rows}x{expected_depth}"
    )]
    WindowMismatch {
        expected_rows: usize,
        expected_depth: usize,
        actual_rows: usize,
        actual_depth: usize,
    },
}

/// Lifecycle of a [`SequenceModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelPhase {
    Unbuilt,
    Built,
    Trained,
}

/// Result of a training request.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainOutcome {
    /// The corpus was too short for a single training pair.
    NothingTrained { tokens: usize, needed: usize },
    Trained {
        epochs: usize,
        examples: usize,
        /// Mean cross-entropy over the final epoch.
        loss: f32,
    },
}

/// Progress reported after every epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochProgress {
    pub epoch: usize,
    pub epochs: usize,
    pub loss: f32,
}

/// Allocated network of one architecture.
#[derive(Debug, Clone)]
pub enum Network {
    Lstm(LstmNetwork),
    Dense(DenseNetwork),
}

impl Network {
    /// Allocate `architecture`, or explain why it is unsupported for this shape.
    pub fn allocate<R: Rng + ?Sized>(
        architecture: Architecture,
        config: &ModelConfig,
        window_length: usize,
        vocab_size: usize,
        rng: &mut R,
    ) -> Result<Self, String> {
        if window_length == 0 || config.units == 0 || vocab_size == 0 {
            return Err(format!("{architecture:?}: zero-sized dimension"));
        }
        let count = match architecture {
            Architecture::Lstm => LstmNetwork::parameter_count(vocab_size, config.units),
            Architecture::Dense => {
                DenseNetwork::parameter_count(window_length, vocab_size, config.units)
            }
        };
        if count > config.max_parameters {
            return Err(format!(
                "{architecture:?}: {count} parameters exceeds limit {}",
                config.max_parameters
            ));
        }

        Ok(match architecture {
            Architecture::Lstm => {
                if window_length > config.max_recurrent_steps {
                    return Err(format!(
                        "Lstm: window {window_length} exceeds {} recurrent steps",
                        config.max_recurrent_steps
                    ));
                }
                Network::Lstm(LstmNetwork::new(window_length, vocab_size, config.units, rng))
            }
            Architecture::Dense => {
                Network::Dense(DenseNetwork::new(window_length, vocab_size, config.units, rng))
            }
        })
    }

    pub fn architecture(&self) -> Architecture {
        match self {
            Network::Lstm(_) => Architecture::Lstm,
            Network::Dense(_) => Architecture::Dense,
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.params().len()
    }

    pub fn params(&self) -> &[f32] {
        match self {
            Network::Lstm(n) => n.params(),
            Network::Dense(n) => n.params(),
        }
    }

    pub fn params_mut(&mut self) -> &mut [f32] {
        match self {
            Network::Lstm(n) => n.params_mut(),
            Network::Dense(n) => n.params_mut(),
        }
    }

    fn predict(&self, tokens: &[usize]) -> Vec<f32> {
        match self {
            Network::Lstm(n) => n.predict(tokens),
            Network::Dense(n) => n.predict(tokens),
        }
    }

    fn accumulate_gradient(&self, tokens: &[usize], target: usize, grad: &mut [f32]) -> f32 {
        match self {
            Network::Lstm(n) => n.accumulate_gradient(tokens, target, grad),
            Network::Dense(n) => n.accumulate_gradient(tokens, target, grad),
        }
    }
}

/// A built network with its optimiser state.
#[derive(Debug, Clone)]
struct Trainable {
    network: Network,
    optimizer: Adam,
}

/// Next-character predictor bound to a window length and vocabulary.
#[derive(Debug, Clone)]
pub struct SequenceModel {
    config: ModelConfig,
    window_length: usize,
    vocabulary: Vocabulary,
    state: Option<Trainable>,
    epochs_trained: usize,
}

impl SequenceModel {
    /// Create an unbuilt model.
    pub fn new(config: ModelConfig, window_length: usize, vocabulary: &Vocabulary) -> Self {
        Self {
            config,
            window_length,
            vocabulary: vocabulary.clone(),
            state: None,
            epochs_trained: 0,
        }
    }

    pub fn phase(&self) -> ModelPhase {
        match (&self.state, self.epochs_trained) {
            (None, _) => ModelPhase::Unbuilt,
            (Some(_), 0) => ModelPhase::Built,
            (Some(_), _) => ModelPhase::Trained,
        }
    }

    pub fn is_built(&self) -> bool {
        self.state.is_some()
    }

    pub fn architecture(&self) -> Option<Architecture> {
        self.state.as_ref().map(|s| s.network.architecture())
    }

    pub fn window_length(&self) -> usize {
        self.window_length
    }

    pub fn vocab_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// The vocabulary the model's indices refer to.
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn epochs_trained(&self) -> usize {
        self.epochs_trained
    }

    pub fn parameter_count(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.network.parameter_count())
    }

    /// Allocate the network, trying the preferred architecture first.
    ///
    /// Building an already-built model is a no-op returning its architecture.
    pub fn build<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Architecture, ModelError> {
        self.ensure_built(rng).map(|s| s.network.architecture())
    }

    fn ensure_built<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<&mut Trainable, ModelError> {
        let state = match self.state.take() {
            Some(state) => state,
            None => self.allocate(rng)?,
        };
        Ok(self.state.insert(state))
    }

    fn allocate<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Trainable, ModelError> {
        let mut reasons = Vec::new();
        for &architecture in self.config.architecture.candidates() {
            match Network::allocate(
                architecture,
                &self.config,
                self.window_length,
                self.vocab_size(),
                rng,
            ) {
                Ok(network) => {
                    if !reasons.is_empty() {
                        log::info!("Falling back to {architecture:?} ({})", reasons.join("; "));
                    }
                    log::debug!(
                        "Built {architecture:?} model: window {}, vocabulary {}, {} parameters",
                        self.window_length,
                        self.vocab_size(),
                        network.parameter_count()
                    );
                    let optimizer = Adam::new(&self.config, network.parameter_count());
                    return Ok(Trainable { network, optimizer });
                }
                Err(reason) => reasons.push(reason),
            }
        }

        Err(ModelError::NoSupportedArchitecture {
            window_length: self.window_length,
            vocab_size: self.vocab_size(),
            reasons: reasons.join("; "),
        })
    }

    /// Replace the network with a freshly built one bound to `vocabulary`.
    ///
    /// On failure the model is left exactly as it was.
    pub fn rebuild<R: Rng + ?Sized>(
        &mut self,
        vocabulary: &Vocabulary,
        rng: &mut R,
    ) -> Result<Architecture, ModelError> {
        let mut fresh = Self::new(self.config.clone(), self.window_length, vocabulary);
        let architecture = fresh.build(rng)?;
        *self = fresh;
        Ok(architecture)
    }

    fn check_vocabulary(&self, vocabulary: &Vocabulary) -> Result<(), ModelError> {
        if vocabulary != &self.vocabulary {
            return Err(ModelError::VocabularyMismatch {
                expected: self.vocab_size(),
                actual: vocabulary.len(),
            });
        }
        Ok(())
    }

    /// Next-token distribution for a one-hot window. Unbuilt models return an empty vector.
    pub fn predict(&self, window: &OneHot) -> Result<Vec<f32>, ModelError> {
        if window.rows() != self.window_length || window.depth() != self.vocab_size() {
            return Err(ModelError::WindowMismatch {
                expected_rows: self.window_length,
                expected_depth: self.vocab_size(),
                actual_rows: window.rows(),
                actual_depth: window.depth(),
            });
        }
        Ok(self
            .state
            .as_ref()
            .map(|s| s.network.predict(window.indices()))
            .unwrap_or_default())
    }

    /// Train for `epochs` passes over the windows of `text`.
    pub fn train<R: Rng + ?Sized>(
        &mut self,
        vocabulary: &Vocabulary,
        text: &str,
        epochs: usize,
        batch_size: usize,
        rng: &mut R,
    ) -> Result<TrainOutcome, ModelError> {
        self.train_with_progress(vocabulary, text, epochs, batch_size, rng, |_| {})
    }

    /// Like [`train`](Self::train), invoking `progress` after each epoch.
    pub fn train_with_progress<R, F>(
        &mut self,
        vocabulary: &Vocabulary,
        text: &str,
        epochs: usize,
        batch_size: usize,
        rng: &mut R,
        mut progress: F,
    ) -> Result<TrainOutcome, ModelError>
    where
        R: Rng + ?Sized,
        F: FnMut(EpochProgress),
    {
        self.check_vocabulary(vocabulary)?;
        let dataset = Dataset::build(
            vocabulary,
            text,
            self.window_length,
            self.config.max_examples,
        );
        let clip_norm = self.config.clip_norm;
        let Trainable { network, optimizer } = self.ensure_built(rng)?;

        if dataset.is_empty() {
            return Ok(TrainOutcome::NothingTrained {
                tokens: dataset.token_count(),
                needed: dataset.tokens_needed(),
            });
        }
        let examples = dataset.one_hot();
        let size = network.parameter_count();
        let mut completed = 0;
        let batch_size = batch_size.max(1);
        let mut order: Vec<usize> = (0..examples.len()).collect();
        let mut loss = 0.0;

        for epoch in 0..epochs {
            order.shuffle(rng);
            let mut epoch_loss = 0.0;

            for batch in order.chunks(batch_size) {
                let net: &Network = network;
                let (batch_loss, mut grad) = batch
                    .par_iter()
                    .fold(
                        || (0.0f32, vec![0.0f32; size]),
                        |(loss, mut grad), &i| {
                            let (window, target) = &examples[i];
                            let l = net.accumulate_gradient(window.indices(), *target, &mut grad);
                            (loss + l, grad)
                        },
                    )
                    .reduce(
                        || (0.0f32, vec![0.0f32; size]),
                        |(la, mut ga), (lb, gb)| {
                            for (a, b) in ga.iter_mut().zip(&gb) {
                                *a += b;
                            }
                            (la + lb, ga)
                        },
                    );

                let scale = 1.0 / batch.len() as f32;
                for g in grad.iter_mut() {
                    *g *= scale;
                }
                if let Some(max_norm) = clip_norm {
                    clip_global_norm(&mut grad, max_norm);
                }
                optimizer.update(network.params_mut(), &grad);
                epoch_loss += batch_loss;
            }

            loss = epoch_loss / examples.len() as f32;
            completed += 1;
            log::debug!("Epoch {}/{}: loss={:.4}", epoch + 1, epochs, loss);
            progress(EpochProgress {
                epoch: epoch + 1,
                epochs,
                loss,
            });
        }

        self.epochs_trained += completed;
        Ok(TrainOutcome::Trained {
            epochs,
            examples: examples.len(),
            loss,
        })
    }

    /// Continue `seed` by `length` sampled characters.
    ///
    /// The seed is left-padded with index 0 to the window length. Returns the
    /// seed followed by the generated characters, or an empty string when the
    /// model has not been built.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        vocabulary: &Vocabulary,
        seed: &str,
        length: usize,
        temperature: f32,
        rng: &mut R,
    ) -> Result<String, ModelError> {
        let Some(Trainable { network, .. }) = &self.state else {
            return Ok(String::new());
        };
        self.check_vocabulary(vocabulary)?;

        let w = self.window_length;
        let mut tokens = vocabulary.encode(seed);
        if tokens.len() < w {
            let mut padded = vec![0; w - tokens.len()];
            padded.append(&mut tokens);
            tokens = padded;
        }

        let mut out = String::with_capacity(seed.len() + length);
        out.push_str(seed);
        for _ in 0..length {
            let window = OneHot::new(tokens[tokens.len() - w..].to_vec(), self.vocab_size());
            let probs = network.predict(window.indices());
            let next = sample_with_temperature(&probs, temperature, rng);
            out.push(vocabulary.decode(next));
            tokens.push(next);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn small_config() -> ModelConfig {
        ModelConfig {
            units: 12,
            ..Default::default()
        }
    }

    #[test]
    fn test_state_machine() {
        let mut rng = StdRng::seed_from_u64(1);
        let text = "ab ab ab ab ab";
        let vocab = Vocabulary::build(text);
        let mut model = SequenceModel::new(small_config(), 2, &vocab);
        assert_eq!(model.phase(), ModelPhase::Unbuilt);

        assert_eq!(model.build(&mut rng).unwrap(), Architecture::Lstm);
        assert_eq!(model.phase(), ModelPhase::Built);

        model.train(&vocab, text, 1, 4, &mut rng).unwrap();
        assert_eq!(model.phase(), ModelPhase::Trained);

        // rebuilding an already-built model keeps the trained weights
        let before = model.parameter_count();
        model.build(&mut rng).unwrap();
        assert_eq!(model.phase(), ModelPhase::Trained);
        assert_eq!(model.parameter_count(), before);
    }

    #[test]
    fn test_falls_back_to_dense() {
        let mut rng = StdRng::seed_from_u64(2);
        let config = ModelConfig {
            max_recurrent_steps: 4,
            ..small_config()
        };
        let vocab = Vocabulary::build("abcdefghi");
        let mut model = SequenceModel::new(config, 8, &vocab);
        assert_eq!(model.build(&mut rng).unwrap(), Architecture::Dense);
    }

    #[test]
    fn test_no_supported_architecture() {
        let mut rng = StdRng::seed_from_u64(3);
        let config = ModelConfig {
            max_parameters: 10,
            ..small_config()
        };
        let vocab = Vocabulary::build("abcdefghi");
        let mut model = SequenceModel::new(config, 4, &vocab);
        let err = model.build(&mut rng).unwrap_err();
        assert!(matches!(err, ModelError::NoSupportedArchitecture { .. }));
        assert_eq!(model.phase(), ModelPhase::Unbuilt);
    }

    #[test]
    fn test_nothing_trained_on_short_text() {
        let mut rng = StdRng::seed_from_u64(4);
        let vocab = Vocabulary::build("ab");
        let mut model = SequenceModel::new(small_config(), 5, &vocab);
        let outcome = model.train(&vocab, "ab", 3, 8, &mut rng).unwrap();
        assert_eq!(
            outcome,
            TrainOutcome::NothingTrained {
                tokens: 2,
                needed: 6
            }
        );
        // train still builds the model
        assert_eq!(model.phase(), ModelPhase::Built);
    }

    #[test]
    fn test_vocabulary_mismatch() {
        let mut rng = StdRng::seed_from_u64(5);
        let vocab = Vocabulary::build("abc");
        let mut model = SequenceModel::new(small_config(), 2, &Vocabulary::build("abcd"));
        model.build(&mut rng).unwrap();
        assert!(matches!(
            model.generate(&vocab, "a", 3, 1.0, &mut rng),
            Err(ModelError::VocabularyMismatch { .. })
        ));

        model.rebuild(&vocab, &mut rng).unwrap();
        assert_eq!(model.vocabulary(), &vocab);
        assert_eq!(model.generate(&vocab, "a", 3, 1.0, &mut rng).unwrap().chars().count(), 4);
    }

    #[test]
    fn test_same_size_vocabulary_mismatch() {
        let mut rng = StdRng::seed_from_u64(10);
        let old = Vocabulary::build("abab abab");
        let new = Vocabulary::build("xyxy xyxy");
        assert_eq!(old.len(), new.len());

        let mut model = SequenceModel::new(small_config(), 2, &old);
        model.train(&old, "abab abab", 1, 4, &mut rng).unwrap();
        assert!(matches!(
            model.train(&new, "xyxy xyxy", 1, 4, &mut rng),
            Err(ModelError::VocabularyMismatch { .. })
        ));
        assert!(matches!(
            model.generate(&new, "xy", 3, 1.0, &mut rng),
            Err(ModelError::VocabularyMismatch { .. })
        ));
        assert_eq!(model.epochs_trained(), 1);
    }

    #[test]
    fn test_failed_rebuild_keeps_model() {
        let mut rng = StdRng::seed_from_u64(11);
        let config = ModelConfig {
            max_parameters: 1500,
            ..small_config()
        };
        let vocab = Vocabulary::build("abc");
        let mut model = SequenceModel::new(config, 2, &vocab);
        model.train(&vocab, "abcabcabc", 1, 4, &mut rng).unwrap();
        let params = model.parameter_count();

        let wide = Vocabulary::build("abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ");
        assert!(matches!(
            model.rebuild(&wide, &mut rng),
            Err(ModelError::NoSupportedArchitecture { .. })
        ));
        assert_eq!(model.vocabulary(), &vocab);
        assert_eq!(model.phase(), ModelPhase::Trained);
        assert_eq!(model.parameter_count(), params);
    }

    #[test]
    fn test_unbuilt_generates_nothing() {
        let mut rng = StdRng::seed_from_u64(6);
        let vocab = Vocabulary::build("abc");
        let model = SequenceModel::new(small_config(), 2, &vocab);
        assert_eq!(model.generate(&vocab, "ab", 10, 1.0, &mut rng).unwrap(), "");
    }

    #[test]
    fn test_predict_checks_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let vocab = Vocabulary::build("abc");
        let mut model = SequenceModel::new(small_config(), 2, &vocab);
        model.build(&mut rng).unwrap();

        let probs = model.predict(&OneHot::new(vec![0, 1], vocab.len())).unwrap();
        assert_eq!(probs.len(), vocab.len());
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);

        assert!(matches!(
            model.predict(&OneHot::new(vec![0], vocab.len())),
            Err(ModelError::WindowMismatch { .. })
        ));
    }

    #[test]
    fn test_end_to_end_repetitive_corpus() {
        let mut rng = StdRng::seed_from_u64(8);
        let text = "ab ab ab ab ab";
        let vocab = Vocabulary::build(text);
        let dataset = Dataset::build(&vocab, text, 2, 2000);
        assert_eq!(dataset.len(), text.chars().count() - 2);

        let mut model = SequenceModel::new(small_config(), 2, &vocab);
        let outcome = model.train(&vocab, text, 4, 32, &mut rng).unwrap();
        assert!(matches!(outcome, TrainOutcome::Trained { examples: 12, .. }));

        let length = 25;
        let out = model.generate(&vocab, "ab", length, 1.0, &mut rng).unwrap();
        assert!(out.starts_with("ab"));
        assert_eq!(out.chars().count(), 2 + length);
    }

    #[test]
    fn test_training_reduces_loss() {
        let mut rng = StdRng::seed_from_u64(9);
        let text = "abcabcabcabcabcabcabcabcabcabc";
        let vocab = Vocabulary::build(text);

        for architecture in [Architecture::Lstm, Architecture::Dense] {
            let config = ModelConfig {
                architecture,
                units: 16,
                ..Default::default()
            };
            let mut model = SequenceModel::new(config, 3, &vocab);
            let mut losses = Vec::new();
            model
                .train_with_progress(&vocab, text, 40, 8, &mut rng, |p| losses.push(p.loss))
                .unwrap();
            assert_eq!(losses.len(), 40);
            assert!(
                losses[39] < losses[0] * 0.5,
                "{architecture:?}: {} -> {}",
                losses[0],
                losses[39]
            );
        }
    }
}
