//! Supervised attempts: one black-box computation per candidate, run on a
//! dedicated worker thread under a hard wall-clock deadline.
//!
//! The caller regains control at the deadline whatever the computation is
//! doing. Cancellation is advisory: the worker is told to stop through a
//! [`CancelSignal`] and then detached, so a computation that ignores the
//! signal keeps running in the background.
//!
//! # Modules
//!
//! - [`computation`]: `Computation`, `ComputationFactory`, `CancelSignal`
//! - [`runner`]: `AttemptRunner`, `AttemptOutcome`, `AttemptRecord`

pub mod computation;
pub mod runner;

pub use computation::{computation, CancelSignal, Computation, ComputationFactory};
pub use runner::{AttemptOutcome, AttemptRecord, AttemptRunner, OutcomeTag};
