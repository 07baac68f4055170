//! A single evolvable agent.

use rand::Rng;

use crate::compute::{ScalarSample, Vocabulary};
use crate::schema::{EvolutionOptions, NetworkSnapshot};

use super::mutation::SPAWN_MUTATIONS;
use super::network::Network;
use super::search::{
    EvolutionEngine, EvolutionError, StopReason, fitness, mean_squared_error,
};

/// Summary of a successful [`Agent::try_evolve`].
#[derive(Debug, Clone, PartialEq)]
pub struct EvolveReport {
    pub generations: usize,
    pub stop_reason: StopReason,
    /// Error of the network before evolution.
    pub initial_error: f32,
    /// Error of the network the agent holds afterwards.
    pub final_error: f32,
    /// Whether the network was replaced.
    pub improved: bool,
}

/// Agent predicting the next normalized character index from a window.
#[derive(Debug, Clone)]
pub struct Agent {
    id: String,
    window_length: usize,
    network: Network,
}

impl Agent {
    /// New agent with a `window_length -> hidden -> 1` perceptron.
    pub fn new<R: Rng + ?Sized>(
        id: impl Into<String>,
        window_length: usize,
        hidden: usize,
        rng: &mut R,
    ) -> Self {
        Self {
            id: id.into(),
            window_length,
            network: Network::perceptron(window_length, hidden, rng),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn window_length(&self) -> usize {
        self.window_length
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Output in `[0, 1]` for a normalized window.
    pub fn activate(&self, window: &[f32]) -> f32 {
        self.network.activate(window)
    }

    /// Evolve against `samples`; on failure the agent is unchanged and a
    /// warning is logged.
    pub fn evolve<R: Rng + ?Sized>(
        &mut self,
        samples: &[ScalarSample],
        options: &EvolutionOptions,
        rng: &mut R,
    ) -> bool {
        match self.try_evolve(samples, options, rng) {
            Ok(report) => {
                log::debug!(
                    "Agent {} evolved for {} generations ({:?}): error {:.4} -> {:.4}",
                    self.id,
                    report.generations,
                    report.stop_reason,
                    report.initial_error,
                    report.final_error
                );
                true
            }
            Err(err) => {
                log::warn!("Evolution failed for agent {}: {err}", self.id);
                false
            }
        }
    }

    /// Evolve against `samples`, keeping the result only if it beats the
    /// current network without raising its error.
    pub fn try_evolve<R: Rng + ?Sized>(
        &mut self,
        samples: &[ScalarSample],
        options: &EvolutionOptions,
        rng: &mut R,
    ) -> Result<EvolveReport, EvolutionError> {
        let mut engine = EvolutionEngine::new(options.clone(), samples, rng.r#gen());
        let outcome = engine.run_with_callback(&self.network, |progress| {
            log::trace!(
                "{} generation {}/{}: best error {:.4}",
                self.id,
                progress.generation,
                progress.iterations,
                progress.best_error
            );
        })?;

        let initial_error = mean_squared_error(&self.network, samples);
        let current_fitness = fitness(initial_error, self.network.complexity(), options.growth);
        let best = outcome.best;
        let improved = best.error <= initial_error && best.fitness > current_fitness;
        if improved {
            self.network = best.network;
        }

        Ok(EvolveReport {
            generations: outcome.generations,
            stop_reason: outcome.stop_reason,
            initial_error,
            final_error: if improved { best.error } else { initial_error },
            improved,
        })
    }

    /// Deep copy under `id` with [`SPAWN_MUTATIONS`] applied.
    pub fn spawn<R: Rng + ?Sized>(&self, id: impl Into<String>, rng: &mut R) -> Agent {
        let mut network = self.network.clone();
        for mutation in SPAWN_MUTATIONS {
            network.mutate(mutation, rng);
        }
        Agent {
            id: id.into(),
            window_length: self.window_length,
            network,
        }
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        self.network.snapshot()
    }

    /// Generate `length` characters auto-regressively from `seed`.
    ///
    /// The seed is normalized and left-padded with zeros to the window
    /// length. Each output is rounded to an index, decoded, and fed back.
    /// Only the generated characters are returned.
    pub fn generate(&self, vocabulary: &Vocabulary, seed: &str, length: usize) -> String {
        let w = self.window_length;
        let encoded: Vec<f32> = vocabulary
            .encode(seed)
            .into_iter()
            .map(|i| vocabulary.normalize(i))
            .collect();
        let mut window = vec![0.0; w.saturating_sub(encoded.len())];
        window.extend_from_slice(&encoded[encoded.len().saturating_sub(w)..]);

        let mut out = String::with_capacity(length);
        for _ in 0..length {
            let value = self.activate(&window);
            out.push(vocabulary.decode_scalar(value));
            if w > 0 {
                window.remove(0);
                window.push(vocabulary.normalize_signed(vocabulary.denormalize(value)));
            }
        }
        out
    }
}
