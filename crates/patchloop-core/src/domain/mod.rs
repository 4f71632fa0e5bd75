//! Domain types shared by every stage of a repair pass.

pub mod candidate;
pub mod error;

pub use candidate::{Candidate, Patch};
pub use error::{AttemptError, ConfigError, LoopFailure, Result};
