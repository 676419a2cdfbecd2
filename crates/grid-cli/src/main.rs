use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use grid_runner::config::{DEFAULT_GRID_FILE, DEFAULT_OUTPUT, DEFAULT_RUNS, DEFAULT_SUBJECT};
use grid_runner::{GridAxes, GridPlan, GridReport, ProcessSubject, ResultSink};
use serde_json::{json, Value};
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "gridbench",
    version,
    about = "Grid-search benchmark runner for memdb_test"
)]
struct Cli {
    /// Debug-level logging
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every configuration of the grid and write one CSV row per configuration
    Run {
        #[arg(long, default_value = DEFAULT_SUBJECT)]
        exe: PathBuf,
        #[arg(long, default_value_t = DEFAULT_RUNS)]
        runs: usize,
        #[arg(long, default_value = DEFAULT_OUTPUT)]
        output: PathBuf,
        /// YAML file with the grid axes; the built-in grid is used when omitted
        #[arg(long)]
        grid: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Show what a run would do without invoking the subject
    Describe {
        #[arg(long, default_value_t = DEFAULT_RUNS)]
        runs: usize,
        #[arg(long, default_value = DEFAULT_OUTPUT)]
        output: PathBuf,
        #[arg(long)]
        grid: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Write a grid file holding the built-in axes
    Init {
        #[arg(long, default_value = DEFAULT_GRID_FILE)]
        path: PathBuf,
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let json_mode = command_json_mode(&cli.command);
    let result = run_command(cli.command);
    match result {
        Ok(Some(payload)) => {
            emit_json(&payload);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            if json_mode {
                emit_json(&json_error(&err));
                std::process::exit(1);
            }
            Err(err)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "gridbench=debug,grid_runner=debug"
    } else {
        "gridbench=info,grid_runner=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run_command(command: Commands) -> Result<Option<Value>> {
    match command {
        Commands::Run {
            exe,
            runs,
            output,
            grid,
            json,
        } => {
            let plan = load_plan(grid.as_deref(), runs)?;
            let mut subject = ProcessSubject::new(exe);
            subject.verify()?;
            let mut sink = ResultSink::create(&output)?;
            tracing::debug!(exe = %subject.exe().display(), "subject resolved");

            let report = if json {
                grid_runner::run_grid(&plan, &mut subject, &mut sink, &mut io::sink())?
            } else {
                grid_runner::run_grid(&plan, &mut subject, &mut sink, &mut io::stdout().lock())?
            };
            sink.into_inner()?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "run",
                    "plan": plan_to_json(&plan),
                    "report": report_to_json(&report)?,
                    "exe": subject.exe().display().to_string(),
                })));
            }
        }
        Commands::Describe {
            runs,
            output,
            grid,
            json,
        } => {
            let plan = load_plan(grid.as_deref(), runs)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "describe",
                    "plan": plan_to_json(&plan),
                    "output": output.display().to_string(),
                })));
            }
            grid_runner::describe_plan(&plan, &output.display().to_string(), &mut io::stdout().lock());
        }
        Commands::Init { path, force } => {
            if !force && path.exists() {
                return Err(anyhow::anyhow!(
                    "grid file already exists (use --force): {}",
                    path.display()
                ));
            }
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            let template = grid_runner::config::axes_template()?;
            std::fs::write(&path, template)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("wrote: {}", path.display());
            println!("next: gridbench describe --grid {}", path.display());
        }
    }
    Ok(None)
}

fn load_plan(grid: Option<&Path>, runs: usize) -> Result<GridPlan> {
    let axes = match grid {
        Some(path) => grid_runner::load_axes(path)?,
        None => GridAxes::default(),
    };
    Ok(GridPlan::new(axes, runs)?)
}

fn emit_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!("{{\"ok\":false,\"error\":\"failed to serialize JSON payload\"}}"),
    }
}

fn json_error(err: &anyhow::Error) -> Value {
    json!({
        "ok": false,
        "error": format!("{:#}", err),
    })
}

fn command_json_mode(command: &Commands) -> bool {
    match command {
        Commands::Run { json, .. } | Commands::Describe { json, .. } => *json,
        Commands::Init { .. } => false,
    }
}

fn plan_to_json(plan: &GridPlan) -> Value {
    let axes = plan.axes();
    json!({
        "configurations": plan.configuration_count(),
        "runs_per_configuration": plan.runs(),
        "total_invocations": plan.planned_invocations(),
        "axes": {
            "scenarios": axes.scenarios.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            "capacities": axes.capacities,
            "cache_capacities": axes.cache_capacities,
            "event_counts": axes.event_counts,
            "thread_counts": axes.thread_counts,
            "read_write_ratios": axes.read_write_ratios,
            "min_payload_size": axes.min_payload_size,
            "max_payload_size": axes.max_payload_size,
        }
    })
}

fn report_to_json(report: &GridReport) -> Result<Value> {
    Ok(serde_json::to_value(report)?)
}
