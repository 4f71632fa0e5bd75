//! Global time budget shared by every attempt of a pass.
//!
//! Each attempt gets half of what is left, never less than a floor. The
//! ledger only ever sees whole minutes: elapsed wall-clock time is rounded
//! before it is recorded.

use std::time::Duration;

/// Remaining-time ledger for one pass over the candidate list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetLedger {
    total_budget_minutes: u64,
    consumed_minutes: u64,
    attempts: u32,
}

impl BudgetLedger {
    pub fn new(total_budget_minutes: u64) -> Self {
        Self {
            total_budget_minutes,
            consumed_minutes: 0,
            attempts: 0,
        }
    }

    pub fn total_budget_minutes(&self) -> u64 {
        self.total_budget_minutes
    }

    pub fn consumed_minutes(&self) -> u64 {
        self.consumed_minutes
    }

    /// Number of attempts recorded so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Minutes left, zero once the budget is overrun.
    pub fn remaining(&self) -> u64 {
        self.total_budget_minutes.saturating_sub(self.consumed_minutes)
    }

    /// Deadline for the next attempt: half the remaining budget, raised to
    /// `min_floor` when below it.
    pub fn next_deadline(&self, min_floor: u64) -> u64 {
        (self.remaining() / 2).max(min_floor)
    }

    /// Charge one attempt's elapsed minutes. No upper clamp: an overrun
    /// simply drives `remaining()` to zero.
    pub fn record(&mut self, elapsed_minutes: u64) {
        self.consumed_minutes = self.consumed_minutes.saturating_add(elapsed_minutes);
        self.attempts += 1;
    }

    /// Round `elapsed` to whole budget minutes, charge it and return the
    /// charged amount.
    pub fn record_elapsed(&mut self, elapsed: Duration, minute: Duration) -> u64 {
        let minutes = elapsed_minutes(elapsed, minute);
        self.record(minutes);
        minutes
    }
}

/// Whole minutes in `elapsed`, half rounding up.
pub fn elapsed_minutes(elapsed: Duration, minute: Duration) -> u64 {
    if minute.is_zero() {
        return 0;
    }
    (elapsed.as_secs_f64() / minute.as_secs_f64()).round() as u64
}
