//! Session module - the self-training feedback loop.
//!
//! A [`Session`] owns the corpus, vocabulary, sequence model and agent
//! population, and exposes each user-triggered operation as a method. A
//! [`Worker`] runs a session on a background thread for interactive use.

mod context;
mod corpus;
mod worker;

pub use context::*;
pub use corpus::*;
pub use worker::*;
