//! Schema module - Configuration and snapshot types for self-training sessions.

mod config;
mod snapshot;

pub use config::*;
pub use snapshot::*;
