use crate::space::{GridAxes, Scenario};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_SUBJECT: &str = "./target/release/memdb_test";
pub const DEFAULT_RUNS: usize = 10;
pub const DEFAULT_OUTPUT: &str = "benchmark_results.csv";
pub const DEFAULT_GRID_FILE: &str = "grid.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read grid file {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid grid file {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("{axis} must only contain values greater than zero")]
    ZeroValue { axis: &'static str },
    #[error("min_payload_size ({min}) exceeds max_payload_size ({max})")]
    PayloadBounds { min: u64, max: u64 },
    #[error("runs per configuration must be greater than zero")]
    ZeroRuns,
    #[error("grid is too large: {runs} runs per configuration over this grid overflows the invocation count")]
    TooLarge { runs: usize },
}

/// Read axes from a YAML file. Keys left out keep their default values.
pub fn load_axes(path: &Path) -> Result<GridAxes, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_axes(&raw, path)
}

/// Parse grid YAML; `origin` only labels errors. Blank input is the default grid.
pub fn parse_axes(raw: &str, origin: &Path) -> Result<GridAxes, ConfigError> {
    let axes: GridAxes = if raw.trim().is_empty() {
        GridAxes::default()
    } else {
        serde_yaml::from_str(raw).map_err(|source| ConfigError::Yaml {
            path: origin.to_path_buf(),
            source,
        })?
    };
    validate_axes(&axes)?;
    Ok(axes)
}

/// Empty axis lists are allowed; they just produce no configurations.
pub fn validate_axes(axes: &GridAxes) -> Result<(), ConfigError> {
    let lists: [(&'static str, &[u64]); 5] = [
        ("capacities", &axes.capacities),
        ("cache_capacities", &axes.cache_capacities),
        ("event_counts", &axes.event_counts),
        ("thread_counts", &axes.thread_counts),
        ("read_write_ratios", &axes.read_write_ratios),
    ];
    for (axis, values) in lists {
        if values.contains(&0) {
            return Err(ConfigError::ZeroValue { axis });
        }
    }
    if axes.min_payload_size == 0 {
        return Err(ConfigError::ZeroValue {
            axis: "min_payload_size",
        });
    }
    if axes.min_payload_size > axes.max_payload_size {
        return Err(ConfigError::PayloadBounds {
            min: axes.min_payload_size,
            max: axes.max_payload_size,
        });
    }
    Ok(())
}

/// Grid file contents for `gridbench init`: the default axes, annotated.
pub fn axes_template() -> Result<String, serde_yaml::Error> {
    let body = serde_yaml::to_string(&GridAxes::default())?;
    let scenarios = Scenario::ALL
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(" | ");
    Ok(format!(
        "\
# Grid searched by `gridbench run --grid <this file>`.
# Configurations with capacity <= cache capacity are never generated.
# scenarios: {scenarios}
{body}"
    ))
}
