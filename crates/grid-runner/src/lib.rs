//! Grid-search driver for an external benchmark executable.
//!
//! [`run_grid`] walks every configuration of a [`GridPlan`], runs the subject
//! several times per configuration, and appends one aggregated row per
//! configuration to a [`ResultSink`].

pub mod config;
pub mod output;
pub mod sink;
pub mod space;
pub mod stats;
pub mod subject;

pub use config::{load_axes, parse_axes, validate_axes, ConfigError};
pub use output::{parse_output, ParseError, RunResult};
pub use sink::{ConfigurationSummary, ResultSink, StorageError};
pub use space::{Configuration, GridAxes, Scenario};
pub use stats::{aggregate, RunSet, Stats, TimingSummary};
pub use subject::{run_iterations, Batch, IterationError, MissingSubject, ProcessSubject, Subject};

use chrono::{DateTime, Utc};
use sink::whole_millis;
use serde::Serialize;
use std::io::Write;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GridError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What a run will do: the axes and how often each configuration is invoked.
#[derive(Debug, Clone, Serialize)]
pub struct GridPlan {
    axes: GridAxes,
    runs: usize,
    configurations: usize,
    invocations: usize,
}

impl GridPlan {
    pub fn new(axes: GridAxes, runs: usize) -> Result<Self, ConfigError> {
        if runs == 0 {
            return Err(ConfigError::ZeroRuns);
        }
        validate_axes(&axes)?;
        let configurations = axes.configuration_count();
        let (configurations, invocations) = configurations
            .and_then(|n| Some((n, n.checked_mul(runs)?)))
            .ok_or(ConfigError::TooLarge { runs })?;
        Ok(Self {
            axes,
            runs,
            configurations,
            invocations,
        })
    }

    pub fn axes(&self) -> &GridAxes {
        &self.axes
    }

    pub fn runs(&self) -> usize {
        self.runs
    }

    pub fn configuration_count(&self) -> usize {
        self.configurations
    }

    pub fn planned_invocations(&self) -> usize {
        self.invocations
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GridReport {
    pub total_configurations: usize,
    pub runs_per_configuration: usize,
    pub tested: usize,
    pub skipped: usize,
    pub successful_iterations: usize,
    pub failed_iterations: usize,
    pub rows_written: usize,
    pub output: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Human-readable progress. Write failures are dropped: nothing downstream
/// depends on this stream.
struct Status<'a, P: Write + ?Sized>(&'a mut P);

impl<P: Write + ?Sized> Status<'_, P> {
    fn emit(&mut self, text: &str) {
        let _ = self.0.write_all(text.as_bytes());
        let _ = self.0.flush();
    }

    fn line(&mut self, text: &str) {
        self.emit(text);
        self.emit("\n");
    }
}

const RULE: &str =
    "================================================================================";

/// Print the pre-run summary of `plan` to `out`.
pub fn describe_plan<P: Write + ?Sized>(plan: &GridPlan, output: &str, out: &mut P) {
    let mut status = Status(out);
    write_plan(plan, output, &mut status);
}

fn write_plan<P: Write + ?Sized>(plan: &GridPlan, output: &str, status: &mut Status<'_, P>) {
    let axes = plan.axes();
    let scenarios = axes
        .scenarios
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    status.line("Grid Search Benchmark");
    status.line(RULE);
    status.line(&format!(
        "Total configurations to test: {}",
        plan.configuration_count()
    ));
    status.line(&format!("Runs per configuration: {}", plan.runs()));
    status.line(&format!("Total benchmark runs: {}", plan.planned_invocations()));
    status.line(&format!("Output file: {}", output));
    status.line("");
    status.line("Parameters:");
    status.line(&format!("  Scenarios         : {}", scenarios));
    status.line(&format!("  Capacities        : {:?}", axes.capacities));
    status.line(&format!("  Cache capacities  : {:?}", axes.cache_capacities));
    status.line(&format!("  Events            : {:?}", axes.event_counts));
    status.line(&format!("  Threads           : {:?}", axes.thread_counts));
    status.line(&format!("  Read/Write ratios : {:?}", axes.read_write_ratios));
    status.line(&format!("  Min size          : {}", axes.min_payload_size));
    status.line(&format!("  Max size          : {}", axes.max_payload_size));
    status.line(RULE);
}

/// Run the whole grid. Configurations are processed strictly in order, one
/// subject invocation at a time. Iteration failures and configurations with no
/// successful iteration are reported and skipped; only a failing `sink` ends
/// the run early.
pub fn run_grid<S, W, P>(
    plan: &GridPlan,
    subject: &mut S,
    sink: &mut ResultSink<W>,
    status: &mut P,
) -> Result<GridReport, GridError>
where
    S: Subject + ?Sized,
    W: Write,
    P: Write + ?Sized,
{
    let started_at = Utc::now();
    let total = plan.configuration_count();
    let mut status = Status(status);
    write_plan(plan, sink.target(), &mut status);
    tracing::info!(
        configurations = total,
        runs = plan.runs(),
        output = sink.target(),
        "grid search started"
    );

    let mut tested = 0;
    let mut skipped = 0;
    let mut successful_iterations = 0;
    let mut failed_iterations = 0;
    for (index, config) in plan.axes().configurations().enumerate() {
        status.line("");
        status.line(&format!("[{}/{}] Testing configuration:", index + 1, total));
        status.line(&format!("  Scenario         : {}", config.scenario()));
        status.line(&format!("  Capacity         : {}", config.global_capacity()));
        status.line(&format!("  Cache capacity   : {}", config.cache_capacity()));
        status.line(&format!("  Events           : {}", grouped(config.event_count())));
        status.line(&format!("  Threads          : {}", config.thread_count()));
        status.line(&format!("  Read/Write ratio : {}", config.read_write_ratio()));
        status.emit(&format!("  Running {} iterations... ", plan.runs()));

        let batch = run_iterations(subject, &config, plan.runs(), |_, outcome| {
            if outcome.is_ok() {
                status.emit(".");
            }
        });
        status.line("");
        failed_iterations += batch.failures;

        let Some(runs) = RunSet::new(batch.results) else {
            tracing::warn!(
                configuration = index + 1,
                scenario = %config.scenario(),
                "no successful runs, skipping configuration"
            );
            status.line("  No successful runs - skipping");
            skipped += 1;
            continue;
        };

        let summary = ConfigurationSummary {
            configuration: config,
            successful_runs: runs.count(),
            timings: aggregate(&runs),
        };
        let exec = &summary.timings.exec;
        status.line(&format!(
            "  Exec time: Avg={}ms, Median={}ms, Max={}ms ({}/{} runs ok)",
            whole_millis(exec.average),
            whole_millis(exec.median),
            whole_millis(exec.maximum),
            summary.successful_runs,
            plan.runs()
        ));
        sink.append(&summary)?;
        successful_iterations += summary.successful_runs;
        tested += 1;
    }

    let report = GridReport {
        total_configurations: total,
        runs_per_configuration: plan.runs(),
        tested,
        skipped,
        successful_iterations,
        failed_iterations,
        rows_written: sink.rows_written(),
        output: sink.target().to_string(),
        started_at,
        finished_at: Utc::now(),
    };
    status.line("");
    status.line(RULE);
    status.line("GRID SEARCH COMPLETE");
    status.line(&format!("Results saved to: {}", report.output));
    status.line(&format!(
        "Total configurations tested: {} (skipped: {}, failed iterations: {})",
        report.tested, report.skipped, report.failed_iterations
    ));
    status.line(RULE);
    tracing::info!(
        tested = report.tested,
        skipped = report.skipped,
        failed_iterations = report.failed_iterations,
        "grid search finished"
    );
    Ok(report)
}

/// `500000` -> `500,000`
fn grouped(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
