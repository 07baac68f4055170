//! Common text-generation capability over both predictor families.

use rand::RngCore;

use crate::compute::Vocabulary;
use crate::compute::agent::Agent;
use crate::compute::sequence::{ModelError, SequenceModel};

/// Anything that can continue a seed with `length` characters.
pub trait Generator {
    fn generate(
        &self,
        vocabulary: &Vocabulary,
        seed: &str,
        length: usize,
        rng: &mut dyn RngCore,
    ) -> Result<String, ModelError>;
}

/// The closed set of predictors a session drives.
#[derive(Debug, Clone, Copy)]
pub enum Predictor<'a> {
    /// Output is the seed followed by the sampled characters.
    Sequence {
        model: &'a SequenceModel,
        temperature: f32,
    },
    /// Output is only the generated characters.
    Agent(&'a Agent),
}

impl Predictor<'_> {
    pub fn label(&self) -> &str {
        match self {
            Predictor::Sequence { .. } => "sequence model",
            Predictor::Agent(agent) => agent.id(),
        }
    }
}

impl Generator for Predictor<'_> {
    fn generate(
        &self,
        vocabulary: &Vocabulary,
        seed: &str,
        length: usize,
        rng: &mut dyn RngCore,
    ) -> Result<String, ModelError> {
        match *self {
            Predictor::Sequence { model, temperature } => {
                model.generate(vocabulary, seed, length, temperature, rng)
            }
            Predictor::Agent(agent) => Ok(agent.generate(vocabulary, seed, length)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ModelConfig;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_dispatch() {
        let mut rng = StdRng::seed_from_u64(1);
        let vocab = Vocabulary::build("abc abc");
        let agent = Agent::new("A1", 3, 2, &mut rng);
        let mut model = SequenceModel::new(
            ModelConfig {
                units: 4,
                ..Default::default()
            },
            3,
            &vocab,
        );
        model.build(&mut rng).unwrap();

        let predictors = [
            Predictor::Sequence {
                model: &model,
                temperature: 1.0,
            },
            Predictor::Agent(&agent),
        ];
        let sequence = predictors[0].generate(&vocab, "ab", 5, &mut rng).unwrap();
        assert_eq!(sequence.chars().count(), 7);
        assert!(sequence.starts_with("ab"));

        let agent_text = predictors[1].generate(&vocab, "ab", 5, &mut rng).unwrap();
        assert_eq!(agent_text.chars().count(), 5);
        assert_eq!(predictors[1].label(), "A1");
    }
}
