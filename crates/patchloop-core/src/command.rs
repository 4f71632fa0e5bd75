//! Repair engines driven as external commands.
//!
//! Each attempt spawns the configured program with `{candidate}` and
//! `{timeout}` substituted into its arguments. Every non-blank stdout line is
//! one [`Patch`]; a non-zero exit status fails the attempt with stderr as the
//! reason. When the attempt is cancelled the child process is killed.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::attempt::{CancelSignal, Computation, ComputationFactory};
use crate::domain::{Candidate, Patch};

const CANDIDATE_PLACEHOLDER: &str = "{candidate}";
const TIMEOUT_PLACEHOLDER: &str = "{timeout}";

/// Command line template for an external repair engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Executable to run.
    pub program: String,

    /// Arguments; `{candidate}` and `{timeout}` (minutes) are substituted.
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the child process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: None,
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Arguments with placeholders filled in.
    pub fn render_args(&self, candidate: &Candidate, deadline_minutes: u64) -> Vec<String> {
        let timeout = deadline_minutes.to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(CANDIDATE_PLACEHOLDER, candidate.as_str())
                    .replace(TIMEOUT_PLACEHOLDER, &timeout)
            })
            .collect()
    }
}

/// One external engine invocation.
#[derive(Debug, Clone)]
pub struct CommandComputation {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    poll_interval: Duration,
}

impl CommandComputation {
    pub fn new(spec: &CommandSpec, candidate: &Candidate, deadline_minutes: u64) -> Self {
        Self {
            program: spec.program.clone(),
            args: spec.render_args(candidate, deadline_minutes),
            working_dir: spec.working_dir.clone(),
            poll_interval: Duration::from_millis(50),
        }
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn spawn(&self) -> anyhow::Result<Child> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
            .spawn()
            .with_context(|| format!("failed to spawn repair command `{}`", self.program))
    }

    /// Poll the child until it exits or `cancel` is raised.
    fn wait(
        &self,
        child: &mut Child,
        cancel: &CancelSignal,
    ) -> anyhow::Result<Option<ExitStatus>> {
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(Some(status)),
                Ok(None) => {}
                Err(e) => {
                    stop(child);
                    return Err(e).with_context(|| {
                        format!("failed to poll repair command `{}`", self.program)
                    });
                }
            }
            if cancel.is_cancelled() {
                stop(child);
                return Ok(None);
            }
            thread::sleep(self.poll_interval);
        }
    }
}

/// Kill and reap `child`. Already-exited races are fine; wait() reaps
/// either way.
fn stop(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

impl Computation<Patch> for CommandComputation {
    fn execute(self: Box<Self>, cancel: &CancelSignal) -> anyhow::Result<Vec<Patch>> {
        let mut child = self.spawn()?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let Some(status) = self.wait(&mut child, cancel)? else {
            // Grandchildren may still hold the pipes; leave the readers behind.
            bail!("repair command `{}` cancelled", self.program);
        };

        let stdout = collect(stdout);
        let stderr = collect(stderr);
        if !status.success() {
            let stderr = stderr.trim();
            if stderr.is_empty() {
                bail!("repair command `{}` exited with {}", self.program, status);
            }
            bail!(
                "repair command `{}` exited with {}: {}",
                self.program,
                status,
                stderr
            );
        }

        Ok(stdout.lines().filter_map(Patch::parse_line).collect())
    }
}

/// Builds a [`CommandComputation`] per candidate from one template.
#[derive(Debug, Clone)]
pub struct CommandFactory {
    spec: CommandSpec,
}

impl CommandFactory {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

impl ComputationFactory<Patch> for CommandFactory {
    fn build(&self, candidate: &Candidate, deadline_minutes: u64) -> Box<dyn Computation<Patch>> {
        Box::new(CommandComputation::new(&self.spec, candidate, deadline_minutes))
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}
