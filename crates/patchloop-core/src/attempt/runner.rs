//! Deadline-bounded execution of one computation on a dedicated worker.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use super::computation::{CancelSignal, Computation};
use crate::domain::{AttemptError, Candidate};

const WORKER_THREAD_NAME: &str = "patchloop-attempt";

/// What a single attempt produced. Exactly one per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome<P> {
    /// The computation returned at least one patch in time.
    Produced(Vec<P>),
    /// The computation returned in time, with nothing.
    EmptyResult,
    /// The deadline expired first; the worker was signalled and detached.
    TimedOut,
    /// The computation returned an error or panicked.
    Failed(String),
}

/// Serializable tag of an [`AttemptOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeTag {
    Produced,
    EmptyResult,
    TimedOut,
    Failed,
}

impl OutcomeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeTag::Produced => "produced",
            OutcomeTag::EmptyResult => "empty_result",
            OutcomeTag::TimedOut => "timed_out",
            OutcomeTag::Failed => "failed",
        }
    }
}

impl<P> AttemptOutcome<P> {
    pub fn tag(&self) -> OutcomeTag {
        match self {
            AttemptOutcome::Produced(_) => OutcomeTag::Produced,
            AttemptOutcome::EmptyResult => OutcomeTag::EmptyResult,
            AttemptOutcome::TimedOut => OutcomeTag::TimedOut,
            AttemptOutcome::Failed(_) => OutcomeTag::Failed,
        }
    }

    fn from_result(result: anyhow::Result<Vec<P>>) -> Self {
        match result {
            Ok(patches) if patches.is_empty() => AttemptOutcome::EmptyResult,
            Ok(patches) => AttemptOutcome::Produced(patches),
            Err(err) => AttemptOutcome::Failed(failure_reason(&err)),
        }
    }
}

/// One finished attempt: what ran, under which deadline, for how long.
#[derive(Debug, Clone)]
pub struct AttemptRecord<P> {
    pub candidate: Candidate,
    pub deadline_minutes: u64,
    /// Caller-side wall clock, from worker submission to outcome.
    pub elapsed: Duration,
    pub outcome: AttemptOutcome<P>,
}

impl<P> AttemptRecord<P> {
    /// The diagnostic-worthy error of this attempt, if any.
    pub fn error(&self) -> Option<AttemptError> {
        match &self.outcome {
            AttemptOutcome::TimedOut => Some(AttemptError::Timeout {
                deadline_minutes: self.deadline_minutes,
            }),
            AttemptOutcome::Failed(reason) => Some(AttemptError::Failure {
                reason: reason.clone(),
            }),
            AttemptOutcome::Produced(_) | AttemptOutcome::EmptyResult => None,
        }
    }
}

type WorkerResult<P> = Result<anyhow::Result<Vec<P>>, String>;

/// Runs computations one at a time, each on a fresh worker thread.
#[derive(Debug, Clone)]
pub struct AttemptRunner {
    minute: Duration,
}

impl Default for AttemptRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl AttemptRunner {
    /// `minute` is the wall-clock length of one deadline minute.
    pub fn new(minute: Duration) -> Self {
        Self { minute }
    }

    /// Wall-clock limit for a deadline expressed in minutes.
    pub fn limit_for(&self, deadline_minutes: u64) -> Duration {
        let minutes = u32::try_from(deadline_minutes).unwrap_or(u32::MAX);
        self.minute.saturating_mul(minutes)
    }

    /// Execute `computation` for `candidate`, returning once it finishes or
    /// `deadline_minutes` elapse, whichever comes first.
    ///
    /// Never fails: spawn errors, computation errors and panics all become
    /// [`AttemptOutcome::Failed`].
    pub async fn run<P>(
        &self,
        candidate: &Candidate,
        computation: Box<dyn Computation<P>>,
        deadline_minutes: u64,
    ) -> AttemptRecord<P>
    where
        P: Send + 'static,
    {
        let limit = self.limit_for(deadline_minutes);
        let cancel = CancelSignal::new();
        let (tx, rx) = oneshot::channel::<WorkerResult<P>>();

        let start = Instant::now();

        let worker_cancel = cancel.clone();
        let spawned = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let result =
                    panic::catch_unwind(AssertUnwindSafe(|| computation.execute(&worker_cancel)))
                        .map_err(panic_message);
                // The caller may have stopped listening after a timeout.
                let _ = tx.send(result);
            });

        let outcome = match spawned {
            Err(e) => AttemptOutcome::Failed(format!("failed to spawn attempt worker: {e}")),
            // Dropping the handle detaches the worker; it is never joined.
            Ok(_handle) => match tokio::time::timeout(limit, rx).await {
                Ok(Ok(Ok(result))) => AttemptOutcome::from_result(result),
                Ok(Ok(Err(panic_msg))) => {
                    AttemptOutcome::Failed(format!("computation panicked: {panic_msg}"))
                }
                Ok(Err(_)) => AttemptOutcome::Failed(
                    "attempt worker exited without reporting an outcome".to_string(),
                ),
                Err(_elapsed) => {
                    cancel.cancel();
                    AttemptOutcome::TimedOut
                }
            },
        };

        let elapsed = start.elapsed();

        AttemptRecord {
            candidate: candidate.clone(),
            deadline_minutes,
            elapsed,
            outcome,
        }
    }
}

fn failure_reason(err: &anyhow::Error) -> String {
    let reason = format!("{err:#}");
    if reason.trim().is_empty() {
        "computation failed without an error message".to_string()
    } else {
        reason
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::computation::computation;

    fn runner() -> AttemptRunner {
        AttemptRunner::new(Duration::from_millis(20))
    }

    #[test]
    fn test_limit_for_scales_minute() {
        let r = AttemptRunner::default();
        assert_eq!(r.limit_for(2), Duration::from_secs(120));
        assert_eq!(runner().limit_for(5), Duration::from_millis(100));
    }

    #[test]
    fn test_outcome_tags() {
        assert_eq!(AttemptOutcome::Produced(vec![1]).tag(), OutcomeTag::Produced);
        assert_eq!(AttemptOutcome::<u8>::EmptyResult.tag(), OutcomeTag::EmptyResult);
        assert_eq!(AttemptOutcome::<u8>::TimedOut.tag().as_str(), "timed_out");
        assert_eq!(
            AttemptOutcome::<u8>::Failed("x".into()).tag(),
            OutcomeTag::Failed
        );
    }

    #[test]
    fn test_blank_error_gets_generic_reason() {
        let err = anyhow::anyhow!("   ");
        assert_eq!(
            failure_reason(&err),
            "computation failed without an error message"
        );
    }

    #[test]
    fn test_error_chain_kept_in_reason() {
        let err = anyhow::anyhow!("solver exited").context("synthesis failed");
        assert_eq!(failure_reason(&err), "synthesis failed: solver exited");
    }

    #[tokio::test]
    async fn test_run_produced() {
        let record = runner()
            .run(
                &Candidate::new("A"),
                computation(|_: &CancelSignal| Ok(vec!["p1", "p2"])),
                5,
            )
            .await;
        assert_eq!(record.outcome, AttemptOutcome::Produced(vec!["p1", "p2"]));
        assert!(record.error().is_none());
        assert_eq!(record.deadline_minutes, 5);
    }

    #[tokio::test]
    async fn test_run_empty() {
        let record = runner()
            .run(
                &Candidate::new("A"),
                computation(|_: &CancelSignal| Ok(Vec::<String>::new())),
                5,
            )
            .await;
        assert_eq!(record.outcome, AttemptOutcome::EmptyResult);
        assert!(record.error().is_none());
    }

    #[tokio::test]
    async fn test_run_failed() {
        let record = runner()
            .run(
                &Candidate::new("A"),
                computation(|_: &CancelSignal| -> anyhow::Result<Vec<String>> {
                    anyhow::bail!("classpath is empty")
                }),
                5,
            )
            .await;
        assert_eq!(
            record.outcome,
            AttemptOutcome::Failed("classpath is empty".to_string())
        );
        assert_eq!(
            record.error(),
            Some(AttemptError::Failure {
                reason: "classpath is empty".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_run_panic_becomes_failure() {
        let record = runner()
            .run(
                &Candidate::new("A"),
                computation(|_: &CancelSignal| -> anyhow::Result<Vec<String>> {
                    panic!("solver state corrupted")
                }),
                5,
            )
            .await;
        match record.outcome {
            AttemptOutcome::Failed(reason) => {
                assert!(reason.contains("panicked"));
                assert!(reason.contains("solver state corrupted"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_timeout_signals_cancel() {
        let (seen_tx, seen_rx) = std::sync::mpsc::channel();
        let record = runner()
            .run(
                &Candidate::new("A"),
                computation(move |cancel: &CancelSignal| -> anyhow::Result<Vec<String>> {
                    while !cancel.is_cancelled() {
                        thread::sleep(Duration::from_millis(5));
                    }
                    let _ = seen_tx.send(());
                    Ok(vec!["too late".to_string()])
                }),
                2,
            )
            .await;
        assert_eq!(record.outcome, AttemptOutcome::TimedOut);
        assert_eq!(
            record.error(),
            Some(AttemptError::Timeout {
                deadline_minutes: 2
            })
        );
        assert!(record.elapsed >= Duration::from_millis(40));
        seen_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("worker never observed cancellation");
    }

    #[tokio::test]
    async fn test_run_timeout_does_not_wait_for_stubborn_worker() {
        let record = runner()
            .run(
                &Candidate::new("A"),
                computation(|_: &CancelSignal| -> anyhow::Result<Vec<String>> {
                    thread::sleep(Duration::from_secs(2));
                    Ok(Vec::new())
                }),
                1,
            )
            .await;
        assert_eq!(record.outcome, AttemptOutcome::TimedOut);
        assert!(record.elapsed < Duration::from_secs(1));
    }
}
