use crate::output::{parse_output, ParseError, RunResult};
use crate::space::Configuration;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

/// Why a single iteration produced no result. Never fatal to the grid.
#[derive(Debug, Error)]
pub enum IterationError {
    #[error("failed to launch {exe}: {source}")]
    Launch { exe: String, source: io::Error },
    #[error("subject exited with status {status}: {stderr_tail}")]
    Exit { status: String, stderr_tail: String },
    #[error("unreadable subject output: {0}")]
    Parse(#[from] ParseError),
}

#[derive(Debug, Error)]
#[error("subject executable not found: {} (build it first)", .0.display())]
pub struct MissingSubject(pub PathBuf);

/// The benchmark executable, invoked once per call.
pub trait Subject {
    /// Run one iteration of `config` and return the captured stdout.
    fn invoke(&mut self, config: &Configuration) -> Result<String, IterationError>;
}

/// A subject that is a separate executable on this host.
#[derive(Debug, Clone)]
pub struct ProcessSubject {
    exe: PathBuf,
}

impl ProcessSubject {
    pub fn new(exe: impl Into<PathBuf>) -> Self {
        Self { exe: exe.into() }
    }

    pub fn exe(&self) -> &Path {
        &self.exe
    }

    /// Fail early when `exe` is written as a path and nothing is there. Bare
    /// names are left to the `PATH` lookup at spawn time.
    pub fn verify(&self) -> Result<(), MissingSubject> {
        if looks_like_path(&self.exe) && !self.exe.is_file() {
            return Err(MissingSubject(self.exe.clone()));
        }
        Ok(())
    }

    /// Flags for one invocation, one per configuration field.
    pub fn args(config: &Configuration) -> Vec<String> {
        vec![
            "--scenario".to_string(),
            config.scenario().as_str().to_string(),
            "--threads".to_string(),
            config.thread_count().to_string(),
            "--events".to_string(),
            config.event_count().to_string(),
            "--min".to_string(),
            config.min_payload_size().to_string(),
            "--max".to_string(),
            config.max_payload_size().to_string(),
            "--capacity".to_string(),
            config.global_capacity().to_string(),
            "--cache-capacity".to_string(),
            config.cache_capacity().to_string(),
            "--read-write-ratio".to_string(),
            config.read_write_ratio().to_string(),
        ]
    }
}

impl Subject for ProcessSubject {
    fn invoke(&mut self, config: &Configuration) -> Result<String, IterationError> {
        let args = Self::args(config);
        tracing::debug!(exe = %self.exe.display(), args = ?args, "invoking subject");
        let output = Command::new(&self.exe)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| IterationError::Launch {
                exe: self.exe.display().to_string(),
                source,
            })?;
        if !output.status.success() {
            let status = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            let stderr_tail = String::from_utf8_lossy(&output.stderr)
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no stderr output")
                .trim()
                .to_string();
            return Err(IterationError::Exit {
                status,
                stderr_tail,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn looks_like_path(exe: &Path) -> bool {
    exe.is_absolute() || exe.components().count() > 1
}

/// Outcome of all iterations of one configuration.
#[derive(Debug, Default)]
pub struct Batch {
    pub results: Vec<RunResult>,
    pub failures: usize,
}

/// Invoke `subject` `iterations` times for `config`, parsing each output.
/// Failed iterations are logged, counted and skipped. `on_iteration` sees each
/// outcome as it happens, with a zero-based iteration index.
pub fn run_iterations<S, F>(
    subject: &mut S,
    config: &Configuration,
    iterations: usize,
    mut on_iteration: F,
) -> Batch
where
    S: Subject + ?Sized,
    F: FnMut(usize, Result<&RunResult, &IterationError>),
{
    let mut batch = Batch::default();
    for i in 0..iterations {
        match subject
            .invoke(config)
            .and_then(|stdout| parse_output(&stdout).map_err(IterationError::from))
        {
            Ok(result) => {
                on_iteration(i, Ok(&result));
                batch.results.push(result);
            }
            Err(err) => {
                tracing::warn!(
                    run = i + 1,
                    scenario = %config.scenario(),
                    error = %err,
                    "iteration failed"
                );
                on_iteration(i, Err(&err));
                batch.failures += 1;
            }
        }
    }
    batch
}
