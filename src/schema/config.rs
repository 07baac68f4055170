//! Configuration types for a self-training session.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_window_length() -> usize {
    20
}
fn default_population_size() -> usize {
    10
}
fn default_tick_interval_ms() -> u64 {
    4000
}

/// Top-level session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Trailing tokens used as predictor context. Shared by both predictor families.
    #[serde(default = "default_window_length")]
    pub window_length: usize,
    /// Number of agents created when the population is reseeded.
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Interval between recurring ticks, in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Sequence model settings.
    #[serde(default)]
    pub model: ModelConfig,
    /// Epoch and batch settings per call site.
    #[serde(default)]
    pub training: TrainingConfig,
    /// Seeds, lengths and temperatures per call site.
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Agent construction settings.
    #[serde(default)]
    pub agents: AgentConfig,
    /// Per-agent evolutionary search settings.
    #[serde(default)]
    pub evolution: EvolutionOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            window_length: default_window_length(),
            population_size: default_population_size(),
            tick_interval_ms: default_tick_interval_ms(),
            random_seed: None,
            model: ModelConfig::default(),
            training: TrainingConfig::default(),
            generation: GenerationConfig::default(),
            agents: AgentConfig::default(),
            evolution: EvolutionOptions::default(),
        }
    }
}

/// Sequence model architecture.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Architecture {
    /// Single LSTM layer over the window, then a softmax layer.
    #[default]
    Lstm,
    /// Flattened window through one ReLU layer, then a softmax layer.
    Dense,
}

impl Architecture {
    /// Candidates to try in order, starting with `self`.
    pub fn candidates(self) -> &'static [Architecture] {
        match self {
            Architecture::Lstm => &[Architecture::Lstm, Architecture::Dense],
            Architecture::Dense => &[Architecture::Dense],
        }
    }
}

/// Sequence model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Preferred architecture. Falls back to simpler ones when unsupported.
    #[serde(default)]
    pub architecture: Architecture,
    /// Hidden units (LSTM cells or dense neurons).
    #[serde(default = "default_units")]
    pub units: usize,
    /// Adam learning rate.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    #[serde(default = "default_beta1")]
    pub beta1: f32,
    #[serde(default = "default_beta2")]
    pub beta2: f32,
    #[serde(default = "default_epsilon")]
    pub epsilon: f32,
    /// Global gradient norm clip. `None` disables clipping.
    #[serde(default = "default_clip_norm")]
    pub clip_norm: Option<f32>,
    /// Maximum training pairs drawn from the corpus.
    #[serde(default = "default_model_max_examples")]
    pub max_examples: usize,
    /// Largest parameter count an architecture may allocate.
    #[serde(default = "default_max_parameters")]
    pub max_parameters: usize,
    /// Longest window the recurrent architecture will unroll.
    #[serde(default = "default_max_recurrent_steps")]
    pub max_recurrent_steps: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            architecture: Architecture::default(),
            units: default_units(),
            learning_rate: default_learning_rate(),
            beta1: default_beta1(),
            beta2: default_beta2(),
            epsilon: default_epsilon(),
            clip_norm: default_clip_norm(),
            max_examples: default_model_max_examples(),
            max_parameters: default_max_parameters(),
            max_recurrent_steps: default_max_recurrent_steps(),
        }
    }
}

fn default_units() -> usize {
    48
}
fn default_learning_rate() -> f32 {
    0.01
}
fn default_beta1() -> f32 {
    0.9
}
fn default_beta2() -> f32 {
    0.999
}
fn default_epsilon() -> f32 {
    1e-7
}
fn default_clip_norm() -> Option<f32> {
    Some(5.0)
}
fn default_model_max_examples() -> usize {
    2000
}
fn default_max_parameters() -> usize {
    4_000_000
}
fn default_max_recurrent_steps() -> usize {
    256
}

/// Training schedule per call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Epochs for an explicit training request.
    #[serde(default = "default_explicit_epochs")]
    pub explicit_epochs: usize,
    /// Epochs for the retraining step of a tick.
    #[serde(default = "default_loop_epochs")]
    pub loop_epochs: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            explicit_epochs: default_explicit_epochs(),
            loop_epochs: default_loop_epochs(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_explicit_epochs() -> usize {
    4
}
fn default_loop_epochs() -> usize {
    2
}
fn default_batch_size() -> usize {
    32
}

/// Generation parameters per call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_loop_seed")]
    pub loop_seed: String,
    #[serde(default = "default_loop_length")]
    pub loop_length: usize,
    #[serde(default = "default_loop_temperature")]
    pub loop_temperature: f32,
    #[serde(default = "default_display_seed")]
    pub display_seed: String,
    #[serde(default = "default_display_length")]
    pub display_length: usize,
    #[serde(default = "default_display_temperature")]
    pub display_temperature: f32,
    /// Characters each agent contributes per tick.
    #[serde(default = "default_agent_loop_length")]
    pub agent_loop_length: usize,
    #[serde(default = "default_agent_display_length")]
    pub agent_display_length: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            loop_seed: default_loop_seed(),
            loop_length: default_loop_length(),
            loop_temperature: default_loop_temperature(),
            display_seed: default_display_seed(),
            display_length: default_display_length(),
            display_temperature: default_display_temperature(),
            agent_loop_length: default_agent_loop_length(),
            agent_display_length: default_agent_display_length(),
        }
    }
}

fn default_loop_seed() -> String {
    "S:".to_string()
}
fn default_loop_length() -> usize {
    150
}
fn default_loop_temperature() -> f32 {
    0.9
}
fn default_display_seed() -> String {
    "Seed ".to_string()
}
fn default_display_length() -> usize {
    400
}
fn default_display_temperature() -> f32 {
    0.8
}
fn default_agent_loop_length() -> usize {
    80
}
fn default_agent_display_length() -> usize {
    200
}

/// Agent construction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Hidden size hint for explicitly spawned agents.
    #[serde(default = "default_spawn_hidden")]
    pub spawn_hidden: usize,
    /// Inclusive bounds of the randomized hidden size hint for population members.
    #[serde(default = "default_hidden_bounds")]
    pub hidden_bounds: (usize, usize),
    /// Maximum training pairs drawn from the corpus for evolution.
    #[serde(default = "default_agent_max_examples")]
    pub max_examples: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            spawn_hidden: default_spawn_hidden(),
            hidden_bounds: default_hidden_bounds(),
            max_examples: default_agent_max_examples(),
        }
    }
}

fn default_spawn_hidden() -> usize {
    20
}
fn default_hidden_bounds() -> (usize, usize) {
    (8, 35)
}
fn default_agent_max_examples() -> usize {
    800
}

/// Settings for one agent's evolutionary search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionOptions {
    /// Maximum generations per agent.
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Stop once the best mean squared error reaches this value.
    #[serde(default = "default_target_error")]
    pub target_error: f32,
    /// Candidate networks per generation.
    #[serde(default = "default_candidates")]
    pub population_size: usize,
    /// Best candidates carried over unchanged.
    #[serde(default = "default_elitism")]
    pub elitism: usize,
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,
    /// Probability that an offspring is mutated at all.
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f32,
    /// Mutation operators applied to a mutated offspring.
    #[serde(default = "default_mutation_amount")]
    pub mutation_amount: usize,
    /// Fitness penalty per hidden node and connection.
    #[serde(default = "default_growth")]
    pub growth: f32,
    /// Stop if the best fitness does not improve for this many generations.
    #[serde(default)]
    pub stagnation_limit: Option<usize>,
    /// Replace the population with fresh agents before evolving it.
    #[serde(default = "default_reseed_population")]
    pub reseed_population: bool,
}

impl Default for EvolutionOptions {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            target_error: default_target_error(),
            population_size: default_candidates(),
            elitism: default_elitism(),
            tournament_size: default_tournament_size(),
            mutation_rate: default_mutation_rate(),
            mutation_amount: default_mutation_amount(),
            growth: default_growth(),
            stagnation_limit: None,
            reseed_population: default_reseed_population(),
        }
    }
}

fn default_iterations() -> usize {
    40
}
fn default_target_error() -> f32 {
    0.1
}
fn default_candidates() -> usize {
    50
}
fn default_elitism() -> usize {
    1
}
fn default_tournament_size() -> usize {
    3
}
fn default_mutation_rate() -> f32 {
    0.3
}
fn default_mutation_amount() -> usize {
    1
}
fn default_growth() -> f32 {
    0.0001
}
fn default_reseed_population() -> bool {
    true
}

impl SessionConfig {
    /// Default period of the recurring tick loop.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_length == 0 {
            return Err(ConfigError::InvalidWindowLength);
        }
        if self.population_size == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        if self.training.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        if self.model.units == 0 {
            return Err(ConfigError::InvalidUnits);
        }
        if !(self.model.learning_rate > 0.0) {
            return Err(ConfigError::InvalidLearningRate(self.model.learning_rate));
        }
        if self.evolution.population_size < 2 {
            return Err(ConfigError::SearchPopulationTooSmall);
        }
        if self.evolution.tournament_size == 0 {
            return Err(ConfigError::InvalidTournamentSize);
        }
        if !(0.0..=1.0).contains(&self.evolution.mutation_rate) {
            return Err(ConfigError::InvalidMutationRate(self.evolution.mutation_rate));
        }
        let (lo, hi) = self.agents.hidden_bounds;
        if lo > hi {
            return Err(ConfigError::InvalidBounds(format!(
                "hidden_bounds min ({lo}) > max ({hi})"
            )));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Window length must be non-zero")]
    InvalidWindowLength,
    #[error("Population size must be non-zero")]
    EmptyPopulation,
    #[error("Batch size must be non-zero")]
    InvalidBatchSize,
    #[error("Model unit count must be non-zero")]
    InvalidUnits,
    #[error("Learning rate must be positive, got {0}")]
    InvalidLearningRate(f32),
    #[error("Evolution search population must be at least 2")]
    SearchPopulationTooSmall,
    #[error("Tournament size must be non-zero")]
    InvalidTournamentSize,
    #[error("Mutation rate must be within [0, 1], got {0}")]
    InvalidMutationRate(f32),
    #[error("Invalid parameter bounds: {0}")]
    InvalidBounds(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window_length, 20);
        assert_eq!(config.population_size, 10);
        assert_eq!(config.tick_interval_ms, 4000);
        assert_eq!(config.tick_interval(), Duration::from_secs(4));
        assert_eq!(config.training.explicit_epochs, 4);
        assert_eq!(config.training.loop_epochs, 2);
        assert_eq!(config.training.batch_size, 32);
        assert_eq!(config.evolution.iterations, 40);
    }

    #[test]
    fn test_serialization() {
        let config = SessionConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SessionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.window_length, config.window_length);
        assert_eq!(parsed.generation.loop_seed, "S:");
        assert_eq!(parsed.model.architecture, Architecture::Lstm);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let parsed: SessionConfig =
            serde_json::from_str(r#"{"window_length": 8, "model": {"units": 16}}"#).unwrap();
        assert_eq!(parsed.window_length, 8);
        assert_eq!(parsed.model.units, 16);
        assert_eq!(parsed.model.max_examples, 2000);
        assert_eq!(parsed.agents.max_examples, 800);
    }

    #[test]
    fn test_invalid_window() {
        let config = SessionConfig {
            window_length: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWindowLength)
        ));
    }

    #[test]
    fn test_invalid_hidden_bounds() {
        let mut config = SessionConfig::default();
        config.agents.hidden_bounds = (10, 2);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBounds(_))
        ));
    }

    #[test]
    fn test_architecture_candidates() {
        assert_eq!(
            Architecture::Lstm.candidates(),
            &[Architecture::Lstm, Architecture::Dense]
        );
        assert_eq!(Architecture::Dense.candidates(), &[Architecture::Dense]);
    }
}
