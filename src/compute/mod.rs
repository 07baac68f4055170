//! Compute module - tokenization, datasets and the two predictor families.

mod dataset;
mod generator;
mod layout;
mod sampling;
mod tokenizer;

pub mod agent;
pub mod sequence;

pub use dataset::*;
pub use generator::*;
pub use layout::*;
pub use sampling::*;
pub use tokenizer::*;
