//! spaic - a self-feeding character-level text generator.
//!
//! Two independently trained predictors learn from a shared corpus and write
//! their own output back into it: a differentiable sequence model (LSTM with
//! a dense fallback) and a population of small evolvable networks.
//!
//! # Architecture
//!
//! The crate is split into three modules:
//!
//! - `schema`: Configuration types and network snapshots
//! - `compute`: Tokenizer, datasets, sampling, the sequence model, agents and layout
//! - `session`: The self-training loop and its background worker
//!
//! # Example
//!
//! ```rust,no_run
//! use spaic::{Session, SessionConfig};
//!
//! let text = "the cat sat on the mat. the dog sat on the log.";
//! let mut session = Session::with_corpus(SessionConfig::default(), text)?;
//!
//! session.train_model()?;
//! session.evolve_population()?;
//! for _ in 0..3 {
//!     let report = session.tick()?;
//!     println!("corpus: {} characters", report.corpus_after);
//! }
//! println!("{}", session.generate_from_model()?.text);
//! # Ok::<(), spaic::SessionError>(())
//! ```

pub mod compute;
pub mod schema;
pub mod session;

// Re-export commonly used types
pub use compute::{Vocabulary, agent::Agent, sequence::SequenceModel};
pub use schema::SessionConfig;
pub use session::{Command, Event, Session, SessionError, Worker};
