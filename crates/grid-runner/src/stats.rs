//! Repeated-run statistics.
//!
//! A [`RunSet`] can only be built from at least one [`RunResult`], so every
//! statistic here is defined.

use crate::output::RunResult;
use serde::Serialize;

/// Mean, median and maximum of one timing series, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stats {
    pub average: f64,
    pub median: f64,
    pub maximum: f64,
}

impl Stats {
    /// `None` for an empty series.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let average = sorted.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };
        Some(Self {
            average,
            median,
            maximum: sorted[n - 1],
        })
    }
}

/// Successful runs of one configuration. Never empty.
#[derive(Debug, Clone)]
pub struct RunSet(Vec<RunResult>);

impl RunSet {
    pub fn new(results: Vec<RunResult>) -> Option<Self> {
        (!results.is_empty()).then_some(Self(results))
    }

    pub fn count(&self) -> usize {
        self.0.len()
    }

    fn series(&self, timing: fn(&RunResult) -> f64) -> Stats {
        let samples: Vec<f64> = self.0.iter().map(timing).collect();
        match Stats::from_samples(&samples) {
            Some(stats) => stats,
            None => unreachable!("RunSet is never empty"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimingSummary {
    pub total: Stats,
    pub exec: Stats,
    pub write: Stats,
    pub read: Stats,
}

pub fn aggregate(runs: &RunSet) -> TimingSummary {
    TimingSummary {
        total: runs.series(|r| r.total_time_ms),
        exec: runs.series(|r| r.exec_time_ms),
        write: runs.series(|r| r.write_time_ms),
        read: runs.series(|r| r.read_time_ms),
    }
}
