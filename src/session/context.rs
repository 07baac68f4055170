//! Session state and the trigger operations that drive it.

use std::path::Path;

use rand::prelude::*;
use serde::Serialize;

use crate::compute::agent::{Agent, AgentProgress, Population};
use crate::compute::sequence::{EpochProgress, ModelError, SequenceModel, TrainOutcome};
use crate::compute::{Dataset, Generator, Predictor, Tokenizer, Vocabulary};
use crate::schema::{ConfigError, NetworkSnapshot, SessionConfig};

use super::corpus::Corpus;

/// Session operation errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Not enough data: need {needed} characters, corpus has {available}")]
    InsufficientData { needed: usize, available: usize },
    #[error("{0}")]
    ModelUnavailable(String),
    #[error("Unknown agent: {0}")]
    AgentNotFound(String),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Corpus I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Text produced by one predictor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedBlock {
    /// `"sequence model"` or the agent id.
    pub source: String,
    pub text: String,
}

/// What a tick did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    /// Blocks appended to the corpus, in order.
    pub generated: Vec<GeneratedBlock>,
    /// Final-epoch loss of the retraining pass, if one ran.
    pub retrain_loss: Option<f32>,
    pub corpus_before: usize,
    pub corpus_after: usize,
}

/// Explicit context for one self-training run.
pub struct Session {
    config: SessionConfig,
    corpus: Corpus,
    tokenizer: Tokenizer,
    model: Option<SequenceModel>,
    population: Population,
    agent_counter: usize,
    rng: StdRng,
}

impl Session {
    /// Create a session with an empty corpus.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        Self::with_corpus(config, "")
    }

    pub fn with_corpus(
        config: SessionConfig,
        text: impl Into<String>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            config,
            corpus: Corpus::new(text),
            tokenizer: Tokenizer::new(),
            model: None,
            population: Population::new(),
            agent_counter: 0,
            rng,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn vocabulary(&self) -> Option<&Vocabulary> {
        self.tokenizer.vocabulary()
    }

    pub fn model(&self) -> Option<&SequenceModel> {
        self.model.as_ref()
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn set_corpus(&mut self, text: impl Into<String>) {
        self.corpus.set(text);
    }

    pub fn clear_corpus(&mut self) {
        self.corpus.clear();
    }

    /// Write the corpus to `path` as plain text.
    pub fn export_corpus(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        self.corpus.export(path.as_ref())?;
        log::info!(
            "Exported {} characters to {}",
            self.corpus.char_len(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// Rebuild the vocabulary from the corpus (`" "` when it is empty).
    pub fn refresh_vocabulary(&mut self) -> &Vocabulary {
        let text = if self.corpus.is_empty() {
            " "
        } else {
            self.corpus.as_str()
        };
        self.tokenizer.build(text)
    }

    /// The current vocabulary, building one if none exists yet.
    fn current_vocabulary(&mut self) -> Vocabulary {
        if let Some(vocabulary) = self.tokenizer.vocabulary() {
            return vocabulary.clone();
        }
        self.refresh_vocabulary().clone()
    }

    /// Create the model if absent, or rebuild it when the vocabulary changed.
    ///
    /// A failed rebuild leaves the previous model in place.
    fn prepare_model<'m>(
        slot: &'m mut Option<SequenceModel>,
        config: &SessionConfig,
        vocabulary: &Vocabulary,
        rng: &mut StdRng,
    ) -> Result<&'m mut SequenceModel, ModelError> {
        let model = match slot.take() {
            Some(mut model) => {
                if model.vocabulary() != vocabulary {
                    log::warn!(
                        "Vocabulary changed ({} -> {} characters); rebuilding the sequence model",
                        model.vocab_size(),
                        vocabulary.len()
                    );
                    if let Err(err) = model.rebuild(vocabulary, rng) {
                        log::warn!("Rebuild failed, keeping the previous model: {err}");
                        *slot = Some(model);
                        return Err(err);
                    }
                }
                model
            }
            None => {
                let mut model =
                    SequenceModel::new(config.model.clone(), config.window_length, vocabulary);
                let architecture = model.build(rng)?;
                log::info!(
                    "Created {architecture:?} sequence model with {} parameters",
                    model.parameter_count()
                );
                model
            }
        };
        Ok(slot.insert(model))
    }

    /// Train the sequence model on the corpus.
    pub fn train_model(&mut self) -> Result<TrainOutcome, SessionError> {
        self.train_model_with_progress(|_| {})
    }

    /// Like [`train_model`](Self::train_model), reporting each epoch.
    pub fn train_model_with_progress<F>(
        &mut self,
        progress: F,
    ) -> Result<TrainOutcome, SessionError>
    where
        F: FnMut(EpochProgress),
    {
        let vocabulary = self.refresh_vocabulary().clone();
        let model =
            Self::prepare_model(&mut self.model, &self.config, &vocabulary, &mut self.rng)?;
        let outcome = model.train_with_progress(
            &vocabulary,
            self.corpus.as_str(),
            self.config.training.explicit_epochs,
            self.config.training.batch_size,
            &mut self.rng,
            progress,
        )?;

        match outcome {
            TrainOutcome::NothingTrained { tokens, needed } => Err(SessionError::InsufficientData {
                needed,
                available: tokens,
            }),
            TrainOutcome::Trained {
                epochs,
                examples,
                loss,
            } => {
                log::info!(
                    "Trained sequence model: {epochs} epochs on {examples} windows, loss {loss:.4}"
                );
                Ok(outcome)
            }
        }
    }

    /// Add agent `A<n>` with the configured hidden size. Returns its id.
    pub fn spawn_agent(&mut self) -> String {
        self.agent_counter += 1;
        let id = format!("A{}", self.agent_counter);
        let agent = Agent::new(
            id.clone(),
            self.config.window_length,
            self.config.agents.spawn_hidden,
            &mut self.rng,
        );
        self.population.push(agent);
        log::info!("Spawned agent {id}");
        id
    }

    /// Add child `C<n>` of `parent_id`. Returns the child's id.
    pub fn spawn_child(&mut self, parent_id: &str) -> Result<String, SessionError> {
        if self.population.get(parent_id).is_none() {
            return Err(SessionError::AgentNotFound(parent_id.to_string()));
        }
        self.agent_counter += 1;
        let child_id = format!("C{}", self.agent_counter);
        let child = self
            .population
            .spawn_child(parent_id, child_id, &mut self.rng)
            .ok_or_else(|| SessionError::AgentNotFound(parent_id.to_string()))?;
        log::info!("Spawned {} from {parent_id}", child.id());
        Ok(child.id().to_string())
    }

    /// Evolve the agent population on the corpus.
    pub fn evolve_population(&mut self) -> Result<usize, SessionError> {
        self.evolve_population_with_progress(|_| {})
    }

    /// Reseed (when configured) and evolve every agent, reporting each one.
    ///
    /// When the corpus is too short the population is left untouched.
    pub fn evolve_population_with_progress<F>(&mut self, progress: F) -> Result<usize, SessionError>
    where
        F: FnMut(&AgentProgress),
    {
        let vocabulary = self.refresh_vocabulary().clone();
        let dataset = Dataset::build(
            &vocabulary,
            self.corpus.as_str(),
            self.config.window_length,
            self.config.agents.max_examples,
        );
        if dataset.is_empty() {
            return Err(SessionError::InsufficientData {
                needed: dataset.tokens_needed(),
                available: dataset.token_count(),
            });
        }
        let samples = dataset.normalized();

        if self.config.evolution.reseed_population {
            self.population = Population::randomized(
                self.config.population_size,
                self.config.window_length,
                self.config.agents.hidden_bounds,
                &mut self.rng,
            );
        }
        let evolved = self.population.evolve_population(
            &samples,
            &self.config.evolution,
            &mut self.rng,
            progress,
        );
        log::info!(
            "Evolved {evolved}/{} agents on {} windows",
            self.population.len(),
            samples.len()
        );
        Ok(evolved)
    }

    /// One self-training step.
    ///
    /// The model (if any) generates from the loop seed, each agent generates
    /// from a random corpus window, every block is appended on its own line,
    /// and the model is briefly retrained on the grown corpus.
    pub fn tick(&mut self) -> Result<TickReport, SessionError> {
        if self.model.is_none() && self.population.is_empty() {
            return Err(SessionError::ModelUnavailable(
                "Nothing to tick: train the model or spawn an agent first".to_string(),
            ));
        }

        let vocabulary = self.refresh_vocabulary().clone();
        let corpus_before = self.corpus.char_len();
        let generation = &self.config.generation;
        let mut generated = Vec::new();

        if self.model.is_some() {
            let model =
                Self::prepare_model(&mut self.model, &self.config, &vocabulary, &mut self.rng)?;
            let predictor = Predictor::Sequence {
                model,
                temperature: generation.loop_temperature,
            };
            let text = predictor.generate(
                &vocabulary,
                &generation.loop_seed,
                generation.loop_length,
                &mut self.rng,
            )?;
            self.corpus.append_block(&text);
            generated.push(GeneratedBlock {
                source: predictor.label().to_string(),
                text,
            });
        }

        for agent in self.population.iter() {
            let seed = self.corpus.random_window(agent.window_length(), &mut self.rng);
            let predictor = Predictor::Agent(agent);
            let text = predictor.generate(
                &vocabulary,
                &seed,
                generation.agent_loop_length,
                &mut self.rng,
            )?;
            self.corpus.append_block(&text);
            generated.push(GeneratedBlock {
                source: predictor.label().to_string(),
                text,
            });
        }

        let mut retrain_loss = None;
        if let Some(model) = self.model.as_mut() {
            match model.train(
                &vocabulary,
                self.corpus.as_str(),
                self.config.training.loop_epochs,
                self.config.training.batch_size,
                &mut self.rng,
            )? {
                TrainOutcome::Trained { loss, .. } => retrain_loss = Some(loss),
                TrainOutcome::NothingTrained { tokens, needed } => {
                    log::debug!("Skipped retraining: {tokens} tokens, {needed} needed");
                }
            }
        }

        let report = TickReport {
            generated,
            retrain_loss,
            corpus_before,
            corpus_after: self.corpus.char_len(),
        };
        log::info!(
            "Tick appended {} blocks; corpus {} -> {} characters",
            report.generated.len(),
            report.corpus_before,
            report.corpus_after
        );
        Ok(report)
    }

    /// Sample the display text from the sequence model, rebuilding it first
    /// if the vocabulary changed.
    pub fn generate_from_model(&mut self) -> Result<GeneratedBlock, SessionError> {
        if self.model.is_none() {
            return Err(SessionError::ModelUnavailable(
                "No sequence model yet; train one first".to_string(),
            ));
        }
        let vocabulary = self.current_vocabulary();
        let model =
            Self::prepare_model(&mut self.model, &self.config, &vocabulary, &mut self.rng)?;
        let generation = &self.config.generation;
        let predictor = Predictor::Sequence {
            model: &*model,
            temperature: generation.display_temperature,
        };
        let text = predictor.generate(
            &vocabulary,
            &generation.display_seed,
            generation.display_length,
            &mut self.rng,
        )?;
        Ok(GeneratedBlock {
            source: predictor.label().to_string(),
            text,
        })
    }

    /// Sample the display text from a random agent.
    pub fn generate_from_agent(&mut self) -> Result<GeneratedBlock, SessionError> {
        let vocabulary = self.current_vocabulary();
        let Some(agent) = self.population.choose(&mut self.rng) else {
            return Err(SessionError::ModelUnavailable(
                "No agents yet; spawn one first".to_string(),
            ));
        };
        let seed = self.corpus.random_window(agent.window_length(), &mut self.rng);
        let predictor = Predictor::Agent(agent);
        let text = predictor.generate(
            &vocabulary,
            &seed,
            self.config.generation.agent_display_length,
            &mut self.rng,
        )?;
        Ok(GeneratedBlock {
            source: predictor.label().to_string(),
            text,
        })
    }

    /// Structure of agent `id` for rendering.
    pub fn agent_snapshot(&self, id: &str) -> Result<NetworkSnapshot, SessionError> {
        self.population
            .get(id)
            .map(|agent| agent.snapshot())
            .ok_or_else(|| SessionError::AgentNotFound(id.to_string()))
    }
}
