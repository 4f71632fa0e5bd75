//! The black-box work a supervised attempt executes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::domain::Candidate;

/// Advisory cancellation flag shared between the caller and one worker.
///
/// Raised when the attempt's deadline expires. Computations may poll it;
/// nothing forces them to.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    cancelled: Arc<AtomicBool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// A long-running, possibly non-terminating call producing patches.
///
/// Runs exactly once, on its own worker thread.
pub trait Computation<P>: Send + 'static {
    fn execute(self: Box<Self>, cancel: &CancelSignal) -> anyhow::Result<Vec<P>>;
}

impl<P, F> Computation<P> for F
where
    F: FnOnce(&CancelSignal) -> anyhow::Result<Vec<P>> + Send + 'static,
{
    fn execute(self: Box<Self>, cancel: &CancelSignal) -> anyhow::Result<Vec<P>> {
        (*self)(cancel)
    }
}

/// Box a closure as a [`Computation`].
pub fn computation<P, F>(f: F) -> Box<dyn Computation<P>>
where
    P: 'static,
    F: FnOnce(&CancelSignal) -> anyhow::Result<Vec<P>> + Send + 'static,
{
    Box::new(f)
}

/// Binds a candidate to the computation that repairs it.
///
/// `deadline_minutes` is passed as a hint so engines with their own time
/// limit can be configured to match the supervisor's.
pub trait ComputationFactory<P> {
    fn build(&self, candidate: &Candidate, deadline_minutes: u64) -> Box<dyn Computation<P>>;
}

impl<P, F> ComputationFactory<P> for F
where
    F: Fn(&Candidate, u64) -> Box<dyn Computation<P>>,
{
    fn build(&self, candidate: &Candidate, deadline_minutes: u64) -> Box<dyn Computation<P>> {
        self(candidate, deadline_minutes)
    }
}
