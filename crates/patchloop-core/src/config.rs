//! Scheduler configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{ConfigError, Result};

/// Budget settings for one repair pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Ceiling on total wall-clock spend across all candidates, in minutes.
    pub total_budget_minutes: u64,

    /// Minimum deadline granted to every attempt, in minutes.
    pub min_floor_minutes: u64,

    /// Wall-clock length of one budget minute, in milliseconds.
    pub minute_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            total_budget_minutes: 10,
            min_floor_minutes: 2,
            minute_ms: 60_000,
        }
    }
}

impl SchedulerConfig {
    pub fn new(total_budget_minutes: u64, min_floor_minutes: u64) -> Self {
        Self {
            total_budget_minutes,
            min_floor_minutes,
            ..Self::default()
        }
    }

    /// Shrink or stretch the budget minute. Mostly useful in tests.
    ///
    /// Sub-millisecond minutes become 0 and fail [`validate`](Self::validate).
    pub fn with_minute(mut self, minute: Duration) -> Self {
        self.minute_ms = u64::try_from(minute.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Wall-clock length of one budget minute.
    pub fn minute(&self) -> Duration {
        Duration::from_millis(self.minute_ms)
    }

    /// Load a config from a TOML file. Missing keys take their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Both budget scalars and the minute length must be positive.
    pub fn validate(&self) -> Result<()> {
        if self.total_budget_minutes == 0 {
            return Err(ConfigError::Invalid(
                "total_budget_minutes must be positive".to_string(),
            ));
        }
        if self.min_floor_minutes == 0 {
            return Err(ConfigError::Invalid(
                "min_floor_minutes must be positive".to_string(),
            ));
        }
        if self.minute_ms == 0 {
            return Err(ConfigError::Invalid("minute_ms must be positive".to_string()));
        }
        Ok(())
    }
}
