use crate::space::Configuration;
use crate::stats::{Stats, TimingSummary};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

pub const HEADER: [&str; 18] = [
    "Global capacity",
    "Cache capacity",
    "Events",
    "Threads",
    "Read/Write Ratio",
    "Scenario",
    "Avg Total Time (ms)",
    "Median Total Time (ms)",
    "Max Total Time (ms)",
    "Avg Exec Time (ms)",
    "Median Exec Time (ms)",
    "Max Exec Time (ms)",
    "Avg Write Time (ms)",
    "Median Write Time (ms)",
    "Max Write Time (ms)",
    "Avg Read Time (ms)",
    "Median Read Time (ms)",
    "Max Read Time (ms)",
];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("cannot create results file {target}: {source}")]
    Open { target: String, source: io::Error },
    #[error("cannot write results to {target}: {source}")]
    Write { target: String, source: io::Error },
}

/// The persisted unit: one configuration and its aggregated timings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigurationSummary {
    pub configuration: Configuration,
    pub successful_runs: usize,
    pub timings: TimingSummary,
}

impl ConfigurationSummary {
    fn row(&self) -> Vec<String> {
        let c = &self.configuration;
        let mut row = vec![
            c.global_capacity().to_string(),
            c.cache_capacity().to_string(),
            c.event_count().to_string(),
            c.thread_count().to_string(),
            c.read_write_ratio().to_string(),
            c.scenario().to_string(),
        ];
        let t = &self.timings;
        for stats in [&t.total, &t.exec, &t.write, &t.read] {
            row.extend(stat_cells(stats));
        }
        row
    }
}

fn stat_cells(stats: &Stats) -> [String; 3] {
    [
        whole_millis(stats.average).to_string(),
        whole_millis(stats.median).to_string(),
        whole_millis(stats.maximum).to_string(),
    ]
}

/// Drops the fractional part, as the table only holds whole milliseconds.
pub fn whole_millis(ms: f64) -> u64 {
    ms.trunc() as u64
}

/// Append-only CSV table of [`ConfigurationSummary`] rows. The header is written
/// on creation and the writer is flushed after every row.
#[derive(Debug)]
pub struct ResultSink<W: Write> {
    writer: W,
    target: String,
    rows: usize,
}

impl ResultSink<BufWriter<File>> {
    /// Create (truncating) the results file at `path`.
    pub fn create(path: &Path) -> Result<Self, StorageError> {
        let target = path.display().to_string();
        let file = File::create(path).map_err(|source| StorageError::Open {
            target: target.clone(),
            source,
        })?;
        Self::new(BufWriter::new(file), target)
    }
}

impl<W: Write> ResultSink<W> {
    pub fn new(writer: W, target: impl Into<String>) -> Result<Self, StorageError> {
        let mut sink = Self {
            writer,
            target: target.into(),
            rows: 0,
        };
        sink.write_record(&HEADER[..])?;
        Ok(sink)
    }

    pub fn append(&mut self, summary: &ConfigurationSummary) -> Result<(), StorageError> {
        self.write_record(summary.row().as_slice())?;
        self.rows += 1;
        Ok(())
    }

    /// Data rows written so far, header excluded.
    pub fn rows_written(&self) -> usize {
        self.rows
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn into_inner(mut self) -> Result<W, StorageError> {
        self.writer.flush().map_err(|source| StorageError::Write {
            target: self.target.clone(),
            source,
        })?;
        Ok(self.writer)
    }

    fn write_record<S: AsRef<str>>(&mut self, cells: &[S]) -> Result<(), StorageError> {
        let mut line = cells
            .iter()
            .map(|c| csv_field(c.as_ref()))
            .collect::<Vec<_>>()
            .join(",");
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(|source| StorageError::Write {
                target: self.target.clone(),
                source,
            })
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
