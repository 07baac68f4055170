//! Ordered collection of agents.

use rand::Rng;

use crate::compute::ScalarSample;
use crate::schema::EvolutionOptions;

use super::evolvable::Agent;

/// Reported after each agent of [`Population::evolve_population`].
#[derive(Debug, Clone, PartialEq)]
pub struct AgentProgress {
    /// 1-based position of the agent just evolved.
    pub index: usize,
    pub total: usize,
    pub id: String,
    pub evolved: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Population {
    agents: Vec<Agent>,
}

impl Population {
    pub fn new() -> Self {
        Self::default()
    }

    /// `size` agents `G1..Gsize` with hidden sizes uniform in `hidden_bounds` (inclusive).
    pub fn randomized<R: Rng + ?Sized>(
        size: usize,
        window_length: usize,
        hidden_bounds: (usize, usize),
        rng: &mut R,
    ) -> Self {
        let (lo, hi) = (
            hidden_bounds.0.min(hidden_bounds.1),
            hidden_bounds.0.max(hidden_bounds.1),
        );
        let agents = (1..=size)
            .map(|i| {
                let hidden = rng.gen_range(lo..=hi);
                Agent::new(format!("G{i}"), window_length, hidden, rng)
            })
            .collect();
        Self { agents }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id() == id)
    }

    pub fn push(&mut self, agent: Agent) {
        self.agents.push(agent);
    }

    /// Spawn a child of `parent_id` and append it. Returns `None` for an unknown parent.
    pub fn spawn_child<R: Rng + ?Sized>(
        &mut self,
        parent_id: &str,
        child_id: impl Into<String>,
        rng: &mut R,
    ) -> Option<&Agent> {
        let child = self.get(parent_id)?.spawn(child_id, rng);
        self.agents.push(child);
        self.agents.last()
    }

    /// Uniformly random agent.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Agent> {
        if self.agents.is_empty() {
            return None;
        }
        self.agents.get(rng.gen_range(0..self.agents.len()))
    }

    /// Evolve every agent in order against the same samples.
    ///
    /// Each agent gets its own search, so lineages stay independent.
    /// Returns the number of agents whose evolution succeeded.
    pub fn evolve_population<R, F>(
        &mut self,
        samples: &[ScalarSample],
        options: &EvolutionOptions,
        rng: &mut R,
        mut progress: F,
    ) -> usize
    where
        R: Rng + ?Sized,
        F: FnMut(&AgentProgress),
    {
        let total = self.agents.len();
        let mut evolved = 0;
        for (i, agent) in self.agents.iter_mut().enumerate() {
            let ok = agent.evolve(samples, options, rng);
            if ok {
                evolved += 1;
            }
            progress(&AgentProgress {
                index: i + 1,
                total,
                id: agent.id().to_string(),
                evolved: ok,
            });
        }
        evolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_randomized_ids_and_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        let population = Population::randomized(4, 5, (8, 35), &mut rng);
        let ids: Vec<&str> = population.iter().map(Agent::id).collect();
        assert_eq!(ids, ["G1", "G2", "G3", "G4"]);
        for agent in population.iter() {
            let hidden = agent.network().hidden_count();
            assert!((8..=35).contains(&hidden), "{hidden}");
            assert_eq!(agent.window_length(), 5);
        }
    }

    #[test]
    fn test_spawn_child() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut population = Population::randomized(1, 3, (2, 2), &mut rng);
        let child = population.spawn_child("G1", "C2", &mut rng).unwrap();
        assert_eq!(child.id(), "C2");
        assert_eq!(population.len(), 2);
        assert!(population.spawn_child("nope", "C3", &mut rng).is_none());
        assert_eq!(population.len(), 2);
    }

    #[test]
    fn test_choose() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(Population::new().choose(&mut rng).is_none());
        let population = Population::randomized(3, 2, (1, 2), &mut rng);
        assert!(population.choose(&mut rng).is_some());
    }

    #[test]
    fn test_evolve_population_reports_each_agent() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut population = Population::randomized(3, 2, (1, 3), &mut rng);
        let samples: Vec<ScalarSample> = (0..6)
            .map(|i| ScalarSample {
                input: vec![i as f32 / 6.0, 0.5],
                target: 0.25,
            })
            .collect();
        let options = EvolutionOptions {
            iterations: 2,
            population_size: 4,
            ..Default::default()
        };

        let mut seen = Vec::new();
        let evolved =
            population.evolve_population(&samples, &options, &mut rng, |p| seen.push(p.clone()));
        assert_eq!(evolved, 3);
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2].index, 3);
        assert_eq!(seen[0].id, "G1");
    }
}
