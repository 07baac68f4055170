//! Differentiable next-character model.
//!
//! A [`SequenceModel`] maps a one-hot window of `window_length` tokens to a
//! softmax distribution over the vocabulary. An LSTM is preferred; when the
//! window or parameter budget rules it out, a flatten -> dense network is
//! built instead. Training uses Adam over categorical cross-entropy, with
//! per-example gradients computed in parallel.

mod dense;
mod layers;
mod lstm;
mod model;
mod optimizer;

pub use dense::DenseNetwork;
pub use lstm::LstmNetwork;
pub use model::*;
pub use optimizer::Adam;
