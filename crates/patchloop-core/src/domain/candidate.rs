//! Repair targets and the artifacts produced for them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One repair target, typically the class name of a failing test.
///
/// Candidates are opaque to the scheduler; their order is decided by whoever
/// ranked the failure locations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Candidate(String);

impl Candidate {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Candidate {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Candidate {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A synthesized patch as reported by an external repair command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// Patch text, e.g. the synthesized condition.
    pub content: String,

    /// Where the patch applies (`path:line`), when the engine reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_location: Option<String>,
}

impl Patch {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source_location: None,
        }
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.source_location = Some(location.into());
        self
    }

    /// Parse one line of engine output.
    ///
    /// Lines of the form `<location>\t<content>` carry a source location;
    /// anything else is taken verbatim as patch content. Blank lines yield
    /// `None`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return None;
        }
        match line.split_once('\t') {
            Some((location, content)) if !location.trim().is_empty() => {
                Some(Self::new(content.trim()).at(location.trim()))
            }
            _ => Some(Self::new(line.trim())),
        }
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source_location {
            Some(location) => write!(f, "{location}: {}", self.content),
            None => f.write_str(&self.content),
        }
    }
}
