//! Repair loop: one sequential pass over ranked candidates under a shared
//! time budget.
//!
//! For each candidate, in input order: derive a deadline from the ledger,
//! run the candidate's computation under it, charge the elapsed time and
//! hand the outcome to the aggregator. Failures and timeouts never stop the
//! pass.

use std::collections::HashSet;

use tracing::Instrument;
use uuid::Uuid;

use crate::aggregator::{Report, ResultAggregator};
use crate::attempt::{AttemptRunner, ComputationFactory};
use crate::budget::BudgetLedger;
use crate::config::SchedulerConfig;
use crate::domain::{Candidate, Result};
use crate::obs;

/// Orchestrator state within one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Iterating,
    Done,
}

/// Drives repair passes with a fixed configuration and computation factory.
pub struct RepairLoop<F> {
    config: SchedulerConfig,
    factory: F,
    runner: AttemptRunner,
}

impl<F> RepairLoop<F> {
    /// Fails when `config` would yield zero-length deadlines.
    pub fn new(config: SchedulerConfig, factory: F) -> Result<Self> {
        config.validate()?;
        let runner = AttemptRunner::new(config.minute());
        Ok(Self {
            config,
            factory,
            runner,
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run one full pass over `candidates` with a fresh ledger.
    ///
    /// Always returns a report; per-candidate errors end up in its
    /// diagnostics.
    pub async fn run<P>(&self, candidates: &[Candidate]) -> Report<P>
    where
        F: ComputationFactory<P>,
        P: Send + 'static,
    {
        let run_id = Uuid::new_v4().to_string();
        let span = obs::pass_span(&run_id);
        self.run_pass(run_id, candidates).instrument(span).await
    }

    async fn run_pass<P>(&self, run_id: String, candidates: &[Candidate]) -> Report<P>
    where
        F: ComputationFactory<P>,
        P: Send + 'static,
    {
        let mut ledger = BudgetLedger::new(self.config.total_budget_minutes);
        let mut aggregator = ResultAggregator::new(run_id.clone());
        let mut state = LoopState::Idle;

        obs::emit_pass_started(&run_id, candidates.len(), ledger.total_budget_minutes());

        if candidates.is_empty() {
            transition(&run_id, &mut state, LoopState::Done);
            aggregator.no_candidates();
            return finish(&run_id, aggregator, &ledger);
        }

        transition(&run_id, &mut state, LoopState::Iterating);

        let mut attempted: HashSet<&Candidate> = HashSet::new();
        for candidate in candidates {
            if !attempted.insert(candidate) {
                obs::emit_duplicate_skipped(&run_id, candidate.as_str());
                continue;
            }

            let deadline = ledger.next_deadline(self.config.min_floor_minutes);
            obs::emit_attempt_started(&run_id, candidate.as_str(), deadline);

            let computation = self.factory.build(candidate, deadline);
            let record = self.runner.run(candidate, computation, deadline).await;

            let elapsed_minutes = ledger.record_elapsed(record.elapsed, self.config.minute());
            obs::emit_attempt_finished(
                &run_id,
                candidate.as_str(),
                record.outcome.tag(),
                elapsed_minutes,
                ledger.remaining(),
            );
            if let Some(err) = record.error() {
                obs::emit_attempt_diagnostic(&run_id, candidate.as_str(), &err);
            }

            aggregator.record(record, elapsed_minutes);
        }

        transition(&run_id, &mut state, LoopState::Done);
        finish(&run_id, aggregator, &ledger)
    }
}

fn transition(run_id: &str, state: &mut LoopState, to: LoopState) {
    obs::emit_state_changed(run_id, *state, to);
    *state = to;
}

fn finish<P>(run_id: &str, aggregator: ResultAggregator<P>, ledger: &BudgetLedger) -> Report<P> {
    let report = aggregator.finalize(ledger.total_budget_minutes(), ledger.consumed_minutes());
    if let Some(reason) = &report.failure {
        obs::emit_pass_failed(run_id, reason);
    }
    obs::emit_pass_finished(
        run_id,
        report.success,
        report.attempts.len(),
        report.results.len(),
        report.consumed_minutes,
    );
    report
}
