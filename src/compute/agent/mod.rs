//! Evolvable agents for next-character prediction.
//!
//! # Overview
//!
//! An agent reads the last `window_length` characters as scalars in `[0, 1]`
//! (index / (V - 1)) and predicts the next one as a single scalar. Its
//! network starts as a perceptron and grows or shrinks through mutation.
//!
//! - **Network** (`network`): node/connection graph in activation order
//! - **Mutation** (`mutation`): enumerated structural and weight operators
//! - **Search** (`search`): generational GA used by [`Agent::evolve`]
//! - **Agent / Population**: identity, spawning, generation, bulk evolution
//!
//! # Example
//!
//! ```rust,no_run
//! use rand::SeedableRng;
//! use spaic::compute::{Dataset, Vocabulary};
//! use spaic::compute::agent::Agent;
//! use spaic::schema::EvolutionOptions;
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(7);
//! let text = "a small corpus of text";
//! let vocabulary = Vocabulary::build(text);
//! let samples = Dataset::build(&vocabulary, text, 4, 800).normalized();
//!
//! let mut agent = Agent::new("A1", 4, 20, &mut rng);
//! agent.evolve(&samples, &EvolutionOptions::default(), &mut rng);
//! println!("{}", agent.generate(&vocabulary, "a sm", 40));
//! ```

mod evolvable;
mod mutation;
mod network;
mod population;
mod search;

pub use evolvable::{Agent, EvolveReport};
pub use mutation::{Mutation, SPAWN_MUTATIONS};
pub use network::{Connection, INIT_RANGE, Network, Node};
pub use population::{AgentProgress, Population};
pub use search::{
    Candidate, EvolutionEngine, EvolutionError, EvolutionRng, GenerationProgress, SearchOutcome,
    StopReason, fitness, mean_squared_error,
};
