//! patchloop core library
//!
//! Runs a black-box repair computation against ranked candidates, one at a
//! time, under a single global time budget:
//! - [`budget`] halves the remaining budget for each attempt, with a floor
//! - [`attempt`] runs each computation on its own worker under a deadline
//! - [`orchestrator`] drives the sequential pass
//! - [`aggregator`] collects patches and diagnostics into a [`Report`]

pub mod aggregator;
pub mod attempt;
pub mod budget;
pub mod command;
pub mod config;
pub mod domain;
pub mod obs;
pub mod orchestrator;
pub mod telemetry;

pub use aggregator::{AttemptSummary, Diagnostic, Report, ResultAggregator, ResultSet};
pub use attempt::{
    computation, AttemptOutcome, AttemptRecord, AttemptRunner, CancelSignal, Computation,
    ComputationFactory, OutcomeTag,
};
pub use budget::{elapsed_minutes, BudgetLedger};
pub use command::{CommandComputation, CommandFactory, CommandSpec};
pub use config::SchedulerConfig;
pub use domain::{AttemptError, Candidate, ConfigError, LoopFailure, Patch};
pub use orchestrator::{LoopState, RepairLoop};
pub use telemetry::init_tracing;
