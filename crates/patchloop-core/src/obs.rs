//! Structured observability hooks for repair-pass lifecycle events.
//!
//! Events are emitted through `tracing` with an `event` key so they can be
//! filtered and aggregated. For JSON output, initialise the subscriber with
//! [`crate::telemetry::init_tracing`] and `json = true`.

use tracing::{debug, info, warn};

use crate::attempt::OutcomeTag;
use crate::orchestrator::LoopState;

/// Span shared by every event of one pass.
pub fn pass_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("patchloop.pass", run_id = %run_id)
}

/// Emit event: pass started.
pub fn emit_pass_started(run_id: &str, candidates: usize, total_budget_minutes: u64) {
    info!(
        event = "pass.started",
        run_id = %run_id,
        candidates = candidates,
        total_budget_minutes = total_budget_minutes,
    );
}

/// Emit event: orchestrator state transition.
pub fn emit_state_changed(run_id: &str, from: LoopState, to: LoopState) {
    debug!(event = "pass.state", run_id = %run_id, from = ?from, to = ?to);
}

/// Emit event: attempt launched for a candidate.
pub fn emit_attempt_started(run_id: &str, candidate: &str, deadline_minutes: u64) {
    debug!(
        event = "attempt.started",
        run_id = %run_id,
        candidate = %candidate,
        deadline_minutes = deadline_minutes,
        "launching repair for {} (should time out in {} minutes)",
        candidate,
        deadline_minutes,
    );
}

/// Emit event: attempt finished, whatever its outcome.
pub fn emit_attempt_finished(
    run_id: &str,
    candidate: &str,
    outcome: OutcomeTag,
    elapsed_minutes: u64,
    remaining_minutes: u64,
) {
    info!(
        event = "attempt.finished",
        run_id = %run_id,
        candidate = %candidate,
        outcome = outcome.as_str(),
        elapsed_minutes = elapsed_minutes,
        remaining_minutes = remaining_minutes,
    );
}

/// Emit event: attempt produced a diagnostic (warning level).
pub fn emit_attempt_diagnostic(run_id: &str, candidate: &str, message: &dyn std::fmt::Display) {
    warn!(
        event = "attempt.diagnostic",
        run_id = %run_id,
        candidate = %candidate,
        message = %message,
    );
}

/// Emit event: candidate skipped because it was already attempted.
pub fn emit_duplicate_skipped(run_id: &str, candidate: &str) {
    warn!(event = "attempt.duplicate_skipped", run_id = %run_id, candidate = %candidate);
}

/// Emit event: pass finished.
pub fn emit_pass_finished(
    run_id: &str,
    success: bool,
    attempts: usize,
    patched: usize,
    consumed_minutes: u64,
) {
    info!(
        event = "pass.finished",
        run_id = %run_id,
        success = success,
        attempts = attempts,
        patched_candidates = patched,
        consumed_minutes = consumed_minutes,
    );
}

/// Emit event: pass failed overall (warning level).
pub fn emit_pass_failed(run_id: &str, reason: &dyn std::fmt::Display) {
    warn!(event = "pass.failed", run_id = %run_id, reason = %reason);
}
