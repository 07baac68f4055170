//! Population search over agent networks.
//!
//! A generational genetic algorithm: the population starts as copies of the
//! agent's network, candidates are scored in parallel, the best survive
//! unchanged (elitism) and the rest of the next generation are mutated
//! tournament winners.

use rand::prelude::*;
use rayon::prelude::*;

use crate::compute::ScalarSample;
use crate::schema::EvolutionOptions;

use super::mutation::Mutation;
use super::network::Network;

/// Errors that abort an evolution run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvolutionError {
    #[error("Training set is empty")]
    EmptyDataset,
    #[error("Sample has {actual} inputs, network expects {expected}")]
    InputWidthMismatch { expected: usize, actual: usize },
    #[error("Best candidate has a non-finite error")]
    NonFiniteError,
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    MaxGenerations,
    Stagnation,
}

/// Random number generator wrapper for mutation operations.
pub struct EvolutionRng {
    rng: StdRng,
}

impl EvolutionRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Apply `amount` operators, each drawn uniformly and applied with
    /// probability `rate`. Returns how many changed the network.
    pub fn mutate(&mut self, network: &mut Network, rate: f32, amount: usize) -> usize {
        let mut applied = 0;
        for _ in 0..amount {
            if self.rng.r#gen::<f32>() >= rate {
                continue;
            }
            let mutation = Mutation::ALL[self.rng.gen_range(0..Mutation::ALL.len())];
            if network.mutate(mutation, &mut self.rng) {
                applied += 1;
            }
        }
        applied
    }

    /// Uniform index below `len`.
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

/// Mean squared error of `network` over `samples`.
pub fn mean_squared_error(network: &Network, samples: &[ScalarSample]) -> f32 {
    if samples.is_empty() {
        return f32::NAN;
    }
    let total: f32 = samples
        .iter()
        .map(|s| {
            let diff = network.activate(&s.input) - s.target;
            diff * diff
        })
        .sum();
    total / samples.len() as f32
}

/// Fitness of a network: negative error minus a size penalty.
pub fn fitness(error: f32, complexity: usize, growth: f32) -> f32 {
    if error.is_finite() {
        -error - growth * complexity as f32
    } else {
        f32::NEG_INFINITY
    }
}

/// A candidate individual in the population.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub network: Network,
    /// Mean squared error over the training set.
    pub error: f32,
    pub fitness: f32,
}

/// Snapshot reported after every evaluated generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationProgress {
    pub generation: usize,
    pub iterations: usize,
    pub best_error: f32,
    pub best_fitness: f32,
    pub mean_error: f32,
}

/// Final state of a run.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best: Candidate,
    pub generations: usize,
    pub stop_reason: StopReason,
}

/// Evolution engine for one agent lineage.
pub struct EvolutionEngine<'a> {
    options: EvolutionOptions,
    samples: &'a [ScalarSample],
    rng: EvolutionRng,
    population: Vec<Candidate>,
    best: Option<Candidate>,
    generation: usize,
    stagnation_count: usize,
}

impl<'a> EvolutionEngine<'a> {
    pub fn new(options: EvolutionOptions, samples: &'a [ScalarSample], seed: u64) -> Self {
        Self {
            options,
            samples,
            rng: EvolutionRng::new(seed),
            population: Vec::new(),
            best: None,
            generation: 0,
            stagnation_count: 0,
        }
    }

    fn validate(&self, network: &Network) -> Result<(), EvolutionError> {
        if self.samples.is_empty() {
            return Err(EvolutionError::EmptyDataset);
        }
        if let Some(sample) = self
            .samples
            .iter()
            .find(|s| s.input.len() != network.input_size())
        {
            return Err(EvolutionError::InputWidthMismatch {
                expected: network.input_size(),
                actual: sample.input.len(),
            });
        }
        Ok(())
    }

    fn push_candidate(&mut self, network: Network) {
        self.population.push(Candidate {
            network,
            error: f32::NAN,
            fitness: f32::NEG_INFINITY,
        });
    }

    /// Seed the population with copies of `network`; all but the first are mutated.
    pub fn initialize(&mut self, network: &Network) {
        self.population.clear();
        self.best = None;
        self.generation = 0;
        self.stagnation_count = 0;

        let size = self.options.population_size.max(1);
        self.push_candidate(network.clone());
        for _ in 1..size {
            let mut variant = network.clone();
            self.rng
                .mutate(&mut variant, 1.0, self.options.mutation_amount.max(1));
            self.push_candidate(variant);
        }
    }

    /// Evaluate all candidates in the population.
    fn evaluate_population(&mut self) {
        let samples = self.samples;
        let growth = self.options.growth;

        self.population.par_iter_mut().for_each(|candidate| {
            candidate.error = mean_squared_error(&candidate.network, samples);
            candidate.fitness = fitness(
                candidate.error,
                candidate.network.complexity(),
                growth,
            );
        });

        let Some(generation_best) = self
            .population
            .iter()
            .max_by(|a, b| a.fitness.total_cmp(&b.fitness))
        else {
            return;
        };
        match &self.best {
            Some(best) if best.fitness >= generation_best.fitness => {
                self.stagnation_count += 1;
            }
            _ => {
                self.best = Some(generation_best.clone());
                self.stagnation_count = 0;
            }
        }
    }

    /// Run a single generation step.
    fn step_generation(&mut self) {
        self.population
            .sort_by(|a, b| b.fitness.total_cmp(&a.fitness));

        let size = self.options.population_size.max(1);
        let parents = std::mem::take(&mut self.population);
        self.generation += 1;

        self.population
            .extend(parents.iter().take(self.options.elitism.min(size)).cloned());

        while self.population.len() < size {
            let idx = self.select_index(&parents);
            let mut child = parents[idx].network.clone();
            self.rng.mutate(
                &mut child,
                self.options.mutation_rate,
                self.options.mutation_amount,
            );
            self.push_candidate(child);
        }
    }

    /// Tournament selection over `pool`.
    fn select_index(&mut self, pool: &[Candidate]) -> usize {
        let mut best_idx = 0;
        let mut best_fitness = f32::NEG_INFINITY;
        for _ in 0..self.options.tournament_size.max(1) {
            let idx = self.rng.index(pool.len());
            if pool[idx].fitness > best_fitness {
                best_fitness = pool[idx].fitness;
                best_idx = idx;
            }
        }
        best_idx
    }

    /// Get current progress.
    pub fn progress(&self) -> GenerationProgress {
        let finite: Vec<f32> = self
            .population
            .iter()
            .map(|c| c.error)
            .filter(|e| e.is_finite())
            .collect();
        let mean_error = if finite.is_empty() {
            f32::NAN
        } else {
            finite.iter().sum::<f32>() / finite.len() as f32
        };

        GenerationProgress {
            generation: self.generation,
            iterations: self.options.iterations,
            best_error: self.best.as_ref().map_or(f32::NAN, |b| b.error),
            best_fitness: self.best.as_ref().map_or(f32::NEG_INFINITY, |b| b.fitness),
            mean_error,
        }
    }

    /// Check if evolution should stop.
    fn should_stop(&self) -> Option<StopReason> {
        if let Some(best) = &self.best
            && best.error <= self.options.target_error
        {
            return Some(StopReason::TargetReached);
        }

        if self.generation >= self.options.iterations {
            return Some(StopReason::MaxGenerations);
        }

        if let Some(limit) = self.options.stagnation_limit
            && self.stagnation_count >= limit
        {
            return Some(StopReason::Stagnation);
        }

        None
    }

    /// Evolve `network` with a progress callback after each generation.
    pub fn run_with_callback<F>(
        &mut self,
        network: &Network,
        mut callback: F,
    ) -> Result<SearchOutcome, EvolutionError>
    where
        F: FnMut(&GenerationProgress),
    {
        self.validate(network)?;

        self.initialize(network);
        self.evaluate_population();
        callback(&self.progress());

        let stop_reason = loop {
            if let Some(reason) = self.should_stop() {
                break reason;
            }
            self.step_generation();
            self.evaluate_population();
            callback(&self.progress());
        };

        match self.best.take() {
            Some(best) if best.error.is_finite() => Ok(SearchOutcome {
                best,
                generations: self.generation,
                stop_reason,
            }),
            _ => Err(EvolutionError::NonFiniteError),
        }
    }

    /// Evolve `network` (blocking).
    pub fn run(&mut self, network: &Network) -> Result<SearchOutcome, EvolutionError> {
        self.run_with_callback(network, |_| {})
    }
}
