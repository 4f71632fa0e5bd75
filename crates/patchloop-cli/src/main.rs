//! patchloop - budgeted repair attempts over ranked failure locations
//!
//! ## Commands
//!
//! - `run`: attempt an external repair command against each candidate in turn
//! - `plan`: preview the per-attempt deadlines for simulated elapsed times

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use patchloop_core::{
    BudgetLedger, Candidate, CommandFactory, CommandSpec, Patch, RepairLoop, Report,
    SchedulerConfig,
};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "patchloop")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Budgeted, supervised repair attempts over ranked failure locations", long_about = None)]
struct Cli {
    /// Enable verbose output (PATCHLOOP_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    log_json: bool,

    /// TOML file with scheduler settings
    #[arg(long, global = true, env = "PATCHLOOP_CONFIG")]
    config: Option<PathBuf>,

    /// Total budget in minutes (overrides the config file)
    #[arg(long, global = true, env = "PATCHLOOP_TOTAL_BUDGET")]
    total_budget: Option<u64>,

    /// Minimum per-attempt deadline in minutes (overrides the config file)
    #[arg(long, global = true, env = "PATCHLOOP_MIN_FLOOR")]
    min_floor: Option<u64>,

    /// Length of one budget minute in milliseconds
    #[arg(long, global = true, env = "PATCHLOOP_MINUTE_MS")]
    minute_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Attempt a repair command against each candidate, in order
    Run {
        /// Candidate to attempt (repeatable, kept in the given order)
        #[arg(short = 'c', long = "candidate")]
        candidates: Vec<String>,

        /// File with one candidate per line, appended after --candidate
        #[arg(long)]
        candidates_file: Option<PathBuf>,

        /// Repair program to execute for each candidate
        #[arg(long)]
        command: String,

        /// Program argument; `{candidate}` and `{timeout}` are substituted
        #[arg(long = "arg", allow_hyphen_values = true)]
        args: Vec<String>,

        /// Working directory for the repair program
        #[arg(long)]
        workdir: Option<PathBuf>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the deadline each attempt would get
    Plan {
        /// Simulated elapsed minutes of successive attempts (repeatable)
        #[arg(long = "elapsed")]
        elapsed: Vec<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    patchloop_core::init_tracing(cli.log_json, level);

    let config = resolve_config(
        cli.config.as_deref(),
        cli.total_budget,
        cli.min_floor,
        cli.minute_ms,
    )?;

    match cli.command {
        Commands::Run {
            candidates,
            candidates_file,
            command,
            args,
            workdir,
            json,
        } => {
            let mut all: Vec<Candidate> = candidates.into_iter().map(Candidate::from).collect();
            if let Some(path) = candidates_file {
                all.extend(read_candidates(&path)?);
            }
            let mut spec = CommandSpec::new(command, args);
            if let Some(dir) = workdir {
                spec = spec.in_dir(dir);
            }
            let success = cmd_run(config, spec, &all, json).await?;
            Ok(if success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Plan { elapsed } => {
            cmd_plan(&config, &elapsed);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Defaults, then the TOML file, then explicit overrides.
fn resolve_config(
    path: Option<&Path>,
    total_budget: Option<u64>,
    min_floor: Option<u64>,
    minute_ms: Option<u64>,
) -> Result<SchedulerConfig> {
    let mut config = match path {
        Some(path) => SchedulerConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => SchedulerConfig::default(),
    };
    if let Some(total) = total_budget {
        config.total_budget_minutes = total;
    }
    if let Some(floor) = min_floor {
        config.min_floor_minutes = floor;
    }
    if let Some(ms) = minute_ms {
        config.minute_ms = ms;
    }
    config.validate().context("Invalid scheduler settings")?;
    Ok(config)
}

/// One candidate per line; blank lines and `#` comments are skipped.
fn read_candidates(path: &Path) -> Result<Vec<Candidate>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read candidates from {}", path.display()))?;
    Ok(parse_candidates(&raw))
}

fn parse_candidates(raw: &str) -> Vec<Candidate> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(Candidate::from)
        .collect()
}

async fn cmd_run(
    config: SchedulerConfig,
    spec: CommandSpec,
    candidates: &[Candidate],
    json: bool,
) -> Result<bool> {
    info!(
        candidates = candidates.len(),
        program = %spec.program,
        "Starting repair pass"
    );

    let repair = RepairLoop::new(config, CommandFactory::new(spec))
        .context("Invalid scheduler settings")?;
    let report: Report<Patch> = repair.run(candidates).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(report.success)
}

fn print_report(report: &Report<Patch>) {
    println!("Run {}", report.run_id);
    for attempt in &report.attempts {
        println!(
            "  {:<40} {:<13} deadline {:>3}m  elapsed {:>3}m  patches {}",
            attempt.candidate.as_str(),
            attempt.outcome.as_str(),
            attempt.deadline_minutes,
            attempt.elapsed_minutes,
            attempt.patch_count,
        );
    }

    if !report.results.is_empty() {
        println!();
        println!("Patches:");
        for (candidate, patches) in report.results.iter() {
            println!("  {candidate}");
            for patch in patches {
                println!("    {patch}");
            }
        }
    }

    if !report.diagnostics.is_empty() {
        println!();
        println!("Diagnostics:");
        for diagnostic in &report.diagnostics {
            println!("  {diagnostic}");
        }
    }

    println!();
    println!(
        "Budget: {}/{} minutes consumed",
        report.consumed_minutes, report.total_budget_minutes
    );
    match &report.failure {
        None => println!("✓ {} candidate(s) patched", report.results.len()),
        Some(reason) => println!("✗ {reason}"),
    }
}

fn cmd_plan(config: &SchedulerConfig, elapsed: &[u64]) {
    for line in plan_lines(config, elapsed) {
        println!("{line}");
    }
}

fn plan_lines(config: &SchedulerConfig, elapsed: &[u64]) -> Vec<String> {
    let mut ledger = BudgetLedger::new(config.total_budget_minutes);
    let mut lines = vec![format!(
        "Budget {} minutes, floor {} minutes",
        config.total_budget_minutes, config.min_floor_minutes
    )];

    for (i, spent) in elapsed.iter().enumerate() {
        let deadline = ledger.next_deadline(config.min_floor_minutes);
        lines.push(format!(
            "  attempt {}: deadline {}m (remaining {}m), spends {}m",
            i + 1,
            deadline,
            ledger.remaining(),
            spent
        ));
        ledger.record(*spent);
    }

    lines.push(format!(
        "  next attempt: deadline {}m (remaining {}m)",
        ledger.next_deadline(config.min_floor_minutes),
        ledger.remaining()
    ));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_candidates_skips_comments_and_blanks() {
        let parsed = parse_candidates("# ranked by suspiciousness\nFooTest\n\n  BarTest  \n#Baz\n");
        let ids: Vec<_> = parsed.iter().map(|c| c.as_str()).collect();
        assert_eq!(ids, vec!["FooTest", "BarTest"]);
    }

    #[test]
    fn test_resolve_config_defaults() {
        let cfg = resolve_config(None, None, None, None).unwrap();
        assert_eq!(cfg, SchedulerConfig::default());
    }

    #[test]
    fn test_resolve_config_file_then_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "total_budget_minutes = 240\nmin_floor_minutes = 5").unwrap();

        let cfg = resolve_config(Some(file.path()), None, Some(3), Some(100)).unwrap();
        assert_eq!(cfg.total_budget_minutes, 240);
        assert_eq!(cfg.min_floor_minutes, 3);
        assert_eq!(cfg.minute_ms, 100);
    }

    #[test]
    fn test_resolve_config_rejects_zero_floor() {
        let err = resolve_config(None, None, Some(0), None).unwrap_err();
        assert!(format!("{err:#}").contains("min_floor_minutes"));
    }

    #[test]
    fn test_read_candidates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_candidates(&dir.path().join("nope.txt")).unwrap_err();
        assert!(err.to_string().contains("Failed to read candidates"));
    }

    #[test]
    fn test_plan_lines() {
        let cfg = SchedulerConfig::new(10, 2);
        let lines = plan_lines(&cfg, &[10]);
        assert_eq!(lines[0], "Budget 10 minutes, floor 2 minutes");
        assert!(lines[1].contains("deadline 5m"));
        assert!(lines[2].contains("deadline 2m (remaining 0m)"));
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "patchloop",
            "--total-budget",
            "30",
            "run",
            "-c",
            "FooTest",
            "--command",
            "nopol",
            "--arg",
            "--test={candidate}",
            "--arg",
            "{timeout}",
        ])
        .unwrap();
        assert_eq!(cli.total_budget, Some(30));
        match cli.command {
            Commands::Run {
                candidates, args, ..
            } => {
                assert_eq!(candidates, vec!["FooTest"]);
                assert_eq!(args, vec!["--test={candidate}", "{timeout}"]);
            }
            Commands::Plan { .. } => panic!("expected run"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cmd_run_reports_patches() {
        let config = SchedulerConfig::new(10, 2).with_minute(std::time::Duration::from_millis(50));
        let spec = CommandSpec::new(
            "sh",
            vec![
                "-c".to_string(),
                "[ \"$0\" = FooTest ] && echo 'x != null' || exit 0".to_string(),
                "{candidate}".to_string(),
            ],
        );
        let success = cmd_run(
            config,
            spec,
            &[Candidate::new("BarTest"), Candidate::new("FooTest")],
            true,
        )
        .await
        .unwrap();
        assert!(success);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cmd_run_without_patches_is_unsuccessful() {
        let config = SchedulerConfig::new(10, 2).with_minute(std::time::Duration::from_millis(50));
        let spec = CommandSpec::new("sh", vec!["-c".to_string(), "exit 2".to_string()]);
        let success = cmd_run(config, spec, &[Candidate::new("FooTest")], false)
            .await
            .unwrap();
        assert!(!success);
    }
}
