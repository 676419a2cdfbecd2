use serde::{Deserialize, Serialize};
use std::fmt;

/// Strategy the subject benchmarks. Opaque to the orchestrator beyond its names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    MutexVector,
    RwLockVector,
    MutexArcVector,
    RwLockArcVector,
    DoubleMoka,
    DashMapMoka,
    PapayaMoka,
    FlurryMoka,
}

impl Scenario {
    pub const ALL: [Scenario; 8] = [
        Scenario::MutexVector,
        Scenario::RwLockVector,
        Scenario::MutexArcVector,
        Scenario::RwLockArcVector,
        Scenario::DoubleMoka,
        Scenario::DashMapMoka,
        Scenario::PapayaMoka,
        Scenario::FlurryMoka,
    ];

    /// Name passed to the subject's `--scenario` flag and written to the table.
    pub fn as_str(self) -> &'static str {
        match self {
            Scenario::MutexVector => "mutex-vector",
            Scenario::RwLockVector => "rw-lock-vector",
            Scenario::MutexArcVector => "mutex-arc-vector",
            Scenario::RwLockArcVector => "rw-lock-arc-vector",
            Scenario::DoubleMoka => "double-moka",
            Scenario::DashMapMoka => "dash-map-moka",
            Scenario::PapayaMoka => "papaya-moka",
            Scenario::FlurryMoka => "flurry-moka",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One point of the grid. Only [`GridAxes::configurations`] builds these, so
/// `global_capacity > cache_capacity` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Configuration {
    scenario: Scenario,
    global_capacity: u64,
    cache_capacity: u64,
    event_count: u64,
    thread_count: u64,
    read_write_ratio: u64,
    min_payload_size: u64,
    max_payload_size: u64,
}

impl Configuration {
    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    pub fn global_capacity(&self) -> u64 {
        self.global_capacity
    }

    pub fn cache_capacity(&self) -> u64 {
        self.cache_capacity
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn thread_count(&self) -> u64 {
        self.thread_count
    }

    pub fn read_write_ratio(&self) -> u64 {
        self.read_write_ratio
    }

    pub fn min_payload_size(&self) -> u64 {
        self.min_payload_size
    }

    pub fn max_payload_size(&self) -> u64 {
        self.max_payload_size
    }
}

/// Value lists spanning the grid, plus the fixed payload bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridAxes {
    pub scenarios: Vec<Scenario>,
    pub capacities: Vec<u64>,
    pub cache_capacities: Vec<u64>,
    pub event_counts: Vec<u64>,
    pub thread_counts: Vec<u64>,
    pub read_write_ratios: Vec<u64>,
    pub min_payload_size: u64,
    pub max_payload_size: u64,
}

impl Default for GridAxes {
    fn default() -> Self {
        Self {
            scenarios: vec![
                Scenario::MutexVector,
                Scenario::RwLockVector,
                Scenario::DoubleMoka,
                Scenario::MutexArcVector,
                Scenario::RwLockArcVector,
            ],
            capacities: vec![256, 512, 1024, 2048, 4096],
            cache_capacities: vec![64, 128, 256],
            event_counts: vec![500_000],
            thread_counts: vec![6, 10, 12, 16],
            read_write_ratios: vec![6, 10, 16],
            min_payload_size: 173,
            max_payload_size: 3538,
        }
    }
}

impl GridAxes {
    /// Every configuration with `capacity > cache_capacity`, ordered capacity,
    /// cache capacity, events, threads, read/write ratio, scenario (outermost
    /// first). Calling this again yields the same sequence.
    pub fn configurations(&self) -> impl Iterator<Item = Configuration> + '_ {
        let (min_payload_size, max_payload_size) = (self.min_payload_size, self.max_payload_size);
        self.capacities.iter().flat_map(move |&global_capacity| {
            self.cache_capacities
                .iter()
                .filter(move |&&cache_capacity| global_capacity > cache_capacity)
                .flat_map(move |&cache_capacity| {
                    self.event_counts.iter().flat_map(move |&event_count| {
                        self.thread_counts.iter().flat_map(move |&thread_count| {
                            self.read_write_ratios
                                .iter()
                                .flat_map(move |&read_write_ratio| {
                                    self.scenarios.iter().map(move |&scenario| Configuration {
                                        scenario,
                                        global_capacity,
                                        cache_capacity,
                                        event_count,
                                        thread_count,
                                        read_write_ratio,
                                        min_payload_size,
                                        max_payload_size,
                                    })
                                })
                        })
                    })
                })
        })
    }

    /// Number of configurations [`configurations`](Self::configurations) yields,
    /// or `None` if it does not fit in `usize`.
    pub fn configuration_count(&self) -> Option<usize> {
        let capacity_pairs = self
            .capacities
            .iter()
            .map(|&global| {
                self.cache_capacities
                    .iter()
                    .filter(|&&cache| global > cache)
                    .count()
            })
            .sum::<usize>();
        [
            self.event_counts.len(),
            self.thread_counts.len(),
            self.read_write_ratios.len(),
            self.scenarios.len(),
        ]
        .into_iter()
        .try_fold(capacity_pairs, usize::checked_mul)
    }
}
