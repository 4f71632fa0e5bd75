//! Collects per-candidate results and diagnostics into the final report.

use std::fmt;
use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::attempt::{AttemptOutcome, AttemptRecord, OutcomeTag};
use crate::domain::{Candidate, LoopFailure};

/// Patches per candidate, in the order candidates were attempted.
///
/// Serializes as a JSON object whose keys keep that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet<P> {
    entries: Vec<(Candidate, Vec<P>)>,
}

impl<P: Serialize> Serialize for ResultSet<P> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (candidate, patches) in &self.entries {
            map.serialize_entry(candidate, patches)?;
        }
        map.end()
    }
}

impl<'de, P: Deserialize<'de>> Deserialize<'de> for ResultSet<P> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ResultSetVisitor<P>(PhantomData<P>);

        impl<'de, P: Deserialize<'de>> Visitor<'de> for ResultSetVisitor<P> {
            type Value = ResultSet<P>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of candidate to patches")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut set = ResultSet::new();
                while let Some((candidate, patches)) =
                    access.next_entry::<Candidate, Vec<P>>()?
                {
                    if !set.insert(candidate.clone(), patches) {
                        return Err(de::Error::custom(format!(
                            "duplicate candidate: {candidate}"
                        )));
                    }
                }
                Ok(set)
            }
        }

        deserializer.deserialize_map(ResultSetVisitor(PhantomData))
    }
}

impl<P> Default for ResultSet<P> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<P> ResultSet<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert patches for `candidate`. Returns `false` and leaves the set
    /// untouched when the candidate already has an entry.
    pub fn insert(&mut self, candidate: Candidate, patches: Vec<P>) -> bool {
        if self.contains(&candidate) {
            return false;
        }
        self.entries.push((candidate, patches));
        true
    }

    pub fn get(&self, candidate: &Candidate) -> Option<&[P]> {
        self.entries
            .iter()
            .find(|(c, _)| c == candidate)
            .map(|(_, patches)| patches.as_slice())
    }

    pub fn contains(&self, candidate: &Candidate) -> bool {
        self.entries.iter().any(|(c, _)| c == candidate)
    }

    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.entries.iter().map(|(c, _)| c)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Candidate, &[P])> {
        self.entries.iter().map(|(c, p)| (c, p.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of patches across all candidates.
    pub fn patch_count(&self) -> usize {
        self.entries.iter().map(|(_, p)| p.len()).sum()
    }
}

/// Human-readable note about a candidate that failed or timed out, or about
/// the pass as a whole when `candidate` is absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<Candidate>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.candidate {
            Some(c) => write!(f, "{c}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// One row of the attempt timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub candidate: Candidate,
    pub outcome: OutcomeTag,
    pub deadline_minutes: u64,
    pub elapsed_minutes: u64,
    pub elapsed_ms: u64,
    pub patch_count: usize,
}

/// Final outcome of one pass over the candidate list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "P: Serialize",
    deserialize = "P: serde::de::DeserializeOwned"
))]
pub struct Report<P> {
    pub run_id: String,
    /// True iff at least one candidate produced patches.
    pub success: bool,
    pub results: ResultSet<P>,
    pub diagnostics: Vec<Diagnostic>,
    pub attempts: Vec<AttemptSummary>,
    /// Why the pass failed overall; `None` on success.
    pub failure: Option<LoopFailure>,
    pub total_budget_minutes: u64,
    pub consumed_minutes: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl<P> Report<P> {
    /// Number of attempts with the given outcome.
    pub fn count(&self, tag: OutcomeTag) -> usize {
        self.attempts.iter().filter(|a| a.outcome == tag).count()
    }
}

/// Accumulator owned by the orchestrator for the duration of one pass.
#[derive(Debug)]
pub struct ResultAggregator<P> {
    run_id: String,
    results: ResultSet<P>,
    diagnostics: Vec<Diagnostic>,
    attempts: Vec<AttemptSummary>,
    no_candidates: bool,
    started_at: DateTime<Utc>,
}

impl<P> ResultAggregator<P> {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            results: ResultSet::new(),
            diagnostics: Vec::new(),
            attempts: Vec::new(),
            no_candidates: false,
            started_at: Utc::now(),
        }
    }

    /// Mark the pass as having had nothing to attempt.
    pub fn no_candidates(&mut self) {
        self.no_candidates = true;
        self.diagnostics.push(Diagnostic {
            candidate: None,
            message: LoopFailure::NoCandidates.to_string(),
        });
    }

    /// Fold one finished attempt in. `elapsed_minutes` is the amount charged
    /// to the budget for it.
    pub fn record(&mut self, record: AttemptRecord<P>, elapsed_minutes: u64) {
        let error = record.error();
        let AttemptRecord {
            candidate,
            deadline_minutes,
            elapsed,
            outcome,
        } = record;

        let tag = outcome.tag();
        let patch_count = match &outcome {
            AttemptOutcome::Produced(patches) => patches.len(),
            _ => 0,
        };

        self.attempts.push(AttemptSummary {
            candidate: candidate.clone(),
            outcome: tag,
            deadline_minutes,
            elapsed_minutes,
            elapsed_ms: elapsed.as_millis() as u64,
            patch_count,
        });

        if let Some(err) = error {
            self.diagnostics.push(Diagnostic {
                candidate: Some(candidate.clone()),
                message: err.to_string(),
            });
        }

        if let AttemptOutcome::Produced(patches) = outcome {
            self.results.insert(candidate, patches);
        }
    }

    pub fn results(&self) -> &ResultSet<P> {
        &self.results
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn finalize(self, total_budget_minutes: u64, consumed_minutes: u64) -> Report<P> {
        let success = !self.results.is_empty();
        let failure = if self.no_candidates {
            Some(LoopFailure::NoCandidates)
        } else if !success {
            Some(LoopFailure::NoUsableResult {
                candidates: self.attempts.len(),
            })
        } else {
            None
        };

        Report {
            run_id: self.run_id,
            success,
            results: self.results,
            diagnostics: self.diagnostics,
            attempts: self.attempts,
            failure,
            total_budget_minutes,
            consumed_minutes,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn record(id: &str, outcome: AttemptOutcome<&'static str>) -> AttemptRecord<&'static str> {
        AttemptRecord {
            candidate: Candidate::new(id),
            deadline_minutes: 5,
            elapsed: Duration::from_millis(10),
            outcome,
        }
    }

    #[test]
    fn test_result_set_keeps_insertion_order_and_unique_keys() {
        let mut set = ResultSet::new();
        assert!(set.insert(Candidate::new("B"), vec![1]));
        assert!(set.insert(Candidate::new("A"), vec![2, 3]));
        assert!(!set.insert(Candidate::new("B"), vec![9]));

        let keys: Vec<_> = set.candidates().map(|c| c.as_str()).collect();
        assert_eq!(keys, vec!["B", "A"]);
        assert_eq!(set.get(&Candidate::new("B")), Some(&[1][..]));
        assert_eq!(set.patch_count(), 3);
    }

    #[test]
    fn test_finalize_success() {
        let mut agg = ResultAggregator::new("run-1");
        agg.record(record("A", AttemptOutcome::Failed("boom".into())), 0);
        agg.record(record("B", AttemptOutcome::Produced(vec!["p"])), 1);
        let report = agg.finalize(10, 1);

        assert!(report.success);
        assert!(report.failure.is_none());
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].to_string(), "A: boom");
        assert_eq!(report.count(OutcomeTag::Failed), 1);
        assert_eq!(report.attempts[1].patch_count, 1);
    }

    #[test]
    fn test_empty_results_are_not_diagnosed() {
        let mut agg = ResultAggregator::<&str>::new("run-2");
        agg.record(record("A", AttemptOutcome::EmptyResult), 0);
        agg.record(record("B", AttemptOutcome::EmptyResult), 0);
        let report = agg.finalize(10, 0);

        assert!(!report.success);
        assert!(report.diagnostics.is_empty());
        assert_eq!(
            report.failure,
            Some(LoopFailure::NoUsableResult { candidates: 2 })
        );
    }

    #[test]
    fn test_timeout_diagnostic_names_deadline() {
        let mut agg = ResultAggregator::<&str>::new("run-3");
        agg.record(record("A", AttemptOutcome::TimedOut), 5);
        assert_eq!(
            agg.diagnostics()[0].message,
            "Timeout: execution time > 5 minute(s)"
        );
    }

    #[test]
    fn test_no_candidates() {
        let mut agg = ResultAggregator::<&str>::new("run-4");
        agg.no_candidates();
        let report = agg.finalize(10, 0);
        assert!(!report.success);
        assert_eq!(report.failure, Some(LoopFailure::NoCandidates));
        assert_eq!(report.diagnostics.len(), 1);
        assert!(report.diagnostics[0].candidate.is_none());
    }

    #[test]
    fn test_report_serializes() {
        let mut agg = ResultAggregator::new("run-5");
        agg.record(record("A", AttemptOutcome::Produced(vec!["x > 0"])), 1);
        let report = agg.finalize(10, 1);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["attempts"][0]["outcome"], "produced");
        assert_eq!(json["results"]["A"][0], "x > 0");
    }

    #[test]
    fn test_result_set_json_keeps_order() {
        let mut set = ResultSet::new();
        set.insert(Candidate::new("Zeta"), vec!["z".to_string()]);
        set.insert(Candidate::new("Alpha"), vec!["a".to_string()]);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"{"Zeta":["z"],"Alpha":["a"]}"#);

        let back: ResultSet<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
