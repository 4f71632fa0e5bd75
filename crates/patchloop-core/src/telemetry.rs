//! Tracing initialisation for patchloop binaries.
//!
//! Filtering comes from `PATCHLOOP_LOG` (standard `EnvFilter` directives,
//! e.g. `patchloop_core=debug`). Logs go to stderr so stdout stays free for
//! reports.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "PATCHLOOP_LOG";

/// Initialise the global tracing subscriber. Only the first call takes
/// effect.
///
/// * `json`: emit newline-delimited JSON log lines.
/// * `level`: verbosity used when `PATCHLOOP_LOG` is unset or unparsable.
pub fn init_tracing(json: bool, level: Level) {
    let directives = std::env::var(LOG_ENV).ok();
    let filter = log_filter(directives.as_deref(), level);

    let text_layer = (!json).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });
    let json_layer = json.then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .try_init()
        .ok();
}

/// Filter from `directives`, falling back to `level` when they are absent
/// or invalid.
fn log_filter(directives: Option<&str>, level: Level) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(level.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_uses_directives() {
        let filter = log_filter(Some("patchloop_core=trace"), Level::INFO);
        assert!(filter.to_string().contains("patchloop_core=trace"));
    }

    #[test]
    fn test_log_filter_falls_back_to_level() {
        let unset = log_filter(None, Level::DEBUG);
        assert!(unset.to_string().to_lowercase().contains("debug"));

        let blank = log_filter(Some("  "), Level::WARN);
        assert!(blank.to_string().to_lowercase().contains("warn"));

        let invalid = log_filter(Some("patchloop_core=loudest"), Level::WARN);
        assert!(invalid.to_string().to_lowercase().contains("warn"));
    }

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing(false, Level::INFO);
        init_tracing(true, Level::DEBUG);
    }
}
