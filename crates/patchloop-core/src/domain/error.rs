//! Error taxonomy for repair passes.

/// Why a single attempt produced no patches.
///
/// Both variants are recovered by the loop; they only surface as
/// diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptError {
    #[error("Timeout: execution time > {deadline_minutes} minute(s)")]
    Timeout { deadline_minutes: u64 },

    #[error("{reason}")]
    Failure { reason: String },
}

/// Why a whole pass ended without a usable result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoopFailure {
    #[error("no repair candidates to attempt")]
    NoCandidates,

    #[error("no usable result across {candidates} candidate(s)")]
    NoUsableResult { candidates: usize },
}

/// Invalid scheduler configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid scheduler configuration: {0}")]
    Invalid(String),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for configuration handling.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = AttemptError::Timeout {
            deadline_minutes: 5,
        };
        assert_eq!(err.to_string(), "Timeout: execution time > 5 minute(s)");
    }

    #[test]
    fn test_failure_display_is_reason() {
        let err = AttemptError::Failure {
            reason: "solver crashed".to_string(),
        };
        assert_eq!(err.to_string(), "solver crashed");
    }

    #[test]
    fn test_loop_failure_display() {
        assert!(LoopFailure::NoCandidates
            .to_string()
            .contains("no repair candidates"));
        let err = LoopFailure::NoUsableResult { candidates: 3 };
        assert_eq!(err.to_string(), "no usable result across 3 candidate(s)");
    }

    #[test]
    fn test_loop_failure_serde_tag() {
        let json = serde_json::to_value(LoopFailure::NoUsableResult { candidates: 2 }).unwrap();
        assert_eq!(json["kind"], "no_usable_result");
        assert_eq!(json["candidates"], 2);
    }
}
