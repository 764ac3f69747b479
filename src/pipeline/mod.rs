//! # Aggregation Pipeline
//!
//! Fork/join worker pool that visits every driver of a [`TripDataSource`],
//! loads its raw trips and derives one feature vector per trip.
//!
//! Each batch spawns a fixed number of scoped worker threads that share two
//! mutexes: the pending driver queue (pop only) and the output collection
//! (append only, progress is posted under the same lock). Loading and
//! feature extraction run without any lock held. The call returns once every
//! worker has joined.
//!
//! Output is grouped per driver (each driver's trips stay contiguous and in
//! stored order) but drivers appear in completion order. Use
//! [`sort_by_driver`] before relying on order.
//!
//! The first error aborts the batch: the queue is drained so idle workers
//! exit, and the error is returned once all workers have joined.

pub mod progress;

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::driver::Driver;
use crate::error::{Result, TripScoreError};
use crate::metrics::{MetricsConfig, TripMetrics};
use crate::segmentation::SegmentationConfig;
use crate::store::{DriverStore, DriverTripData, parse_driver_id};

pub use progress::{
    NoopProgress, PhaseCounts, PhaseTracker, PipelinePhase, ProcessLogger, ProgressCallback,
};

/// Configuration of a pipeline batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of worker threads.
    /// Default: 6
    pub workers: usize,

    /// Segmentation thresholds applied to every trip.
    pub segmentation: SegmentationConfig,

    /// Feature extraction thresholds.
    pub metrics: MetricsConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 6,
            segmentation: SegmentationConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(TripScoreError::invalid_config("workers must be at least 1"));
        }
        self.segmentation.validate()
    }
}

/// Keyed access to per-driver raw trip data.
pub trait TripDataSource: Sync {
    /// Keys of all drivers, in the order they should be queued.
    fn driver_keys(&self) -> Result<Vec<String>>;

    /// Load the raw trips of the driver named by `key`.
    fn load(&self, key: &str) -> Result<DriverTripData>;
}

impl TripDataSource for DriverStore {
    fn driver_keys(&self) -> Result<Vec<String>> {
        self.list_driver_keys()
    }

    fn load(&self, key: &str) -> Result<DriverTripData> {
        self.read_key(key)
    }
}

/// Driver data held in memory, keyed by driver id.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    drivers: Vec<DriverTripData>,
}

impl InMemorySource {
    pub fn new(drivers: Vec<DriverTripData>) -> Self {
        Self { drivers }
    }
}

impl TripDataSource for InMemorySource {
    fn driver_keys(&self) -> Result<Vec<String>> {
        Ok(self.drivers.iter().map(|d| d.driver_id.to_string()).collect())
    }

    fn load(&self, key: &str) -> Result<DriverTripData> {
        let driver_id = parse_driver_id(key)?;
        self.drivers
            .iter()
            .find(|d| d.driver_id == driver_id)
            .cloned()
            .ok_or_else(|| TripScoreError::InvalidDriverKey(key.to_string()))
    }
}

/// Derive the feature vectors of every trip of every driver in `source`.
pub fn produce_trip_metrics<S: TripDataSource>(
    source: &S,
    config: &PipelineConfig,
    progress: &dyn ProgressCallback,
) -> Result<Vec<TripMetrics>> {
    config.validate()?;
    let keys = source.driver_keys()?;
    info!(
        "extracting trip metrics for {} drivers on {} workers",
        keys.len(),
        config.workers
    );

    let metrics = run_workers(
        keys,
        config.workers,
        PipelinePhase::ExtractingMetrics,
        progress,
        |key| {
            let data = source.load(key)?;
            let driver = Driver::from_trip_data(data, &config.segmentation);
            Ok(driver.trip_metrics(&config.metrics))
        },
    )?;

    info!("extracted {} trip feature vectors", metrics.len());
    Ok(metrics)
}

/// Load every driver in `source` into memory.
pub fn load_all_drivers<S: TripDataSource>(
    source: &S,
    config: &PipelineConfig,
    progress: &dyn ProgressCallback,
) -> Result<Vec<Driver>> {
    config.validate()?;
    let keys = source.driver_keys()?;
    info!("loading {} drivers on {} workers", keys.len(), config.workers);

    run_workers(
        keys,
        config.workers,
        PipelinePhase::LoadingDrivers,
        progress,
        |key| {
            let data = source.load(key)?;
            Ok(vec![Driver::from_trip_data(data, &config.segmentation)])
        },
    )
}

/// Order feature vectors by `(driver_id, trip_id)`.
pub fn sort_by_driver(metrics: &mut [TripMetrics]) {
    metrics.sort_by_key(|m| (m.driver_id, m.trip_id));
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Queue and output are only ever popped or appended; a panicking
    // worker cannot leave them half-updated.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drain `keys` with `workers` threads, appending each key's items as one block.
fn run_workers<T, F>(
    keys: Vec<String>,
    workers: usize,
    phase: PipelinePhase,
    progress: &dyn ProgressCallback,
    work: F,
) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(&str) -> Result<Vec<T>> + Sync,
{
    let total = keys.len();
    progress.on_phase(phase, u32::try_from(total).unwrap_or(u32::MAX));
    if total == 0 {
        return Ok(Vec::new());
    }

    let queue = Mutex::new(VecDeque::from(keys));
    let output: Mutex<Vec<T>> = Mutex::new(Vec::new());
    let failure: Mutex<Option<TripScoreError>> = Mutex::new(None);
    let worker_count = workers.clamp(1, total);

    let worker = || {
        loop {
            let Some(key) = lock(&queue).pop_front() else {
                break;
            };
            match work(&key) {
                Ok(items) => {
                    let mut output = lock(&output);
                    output.extend(items);
                    progress.on_progress();
                }
                Err(err) => {
                    debug!("driver {key} failed: {err}");
                    lock(&queue).clear();
                    lock(&failure).get_or_insert(err);
                    break;
                }
            }
        }
    };

    let panicked = thread::scope(|scope| {
        let handles: Vec<_> = (0..worker_count).map(|_| scope.spawn(&worker)).collect();
        handles
            .into_iter()
            .map(|handle| handle.join().is_err())
            .fold(false, |any, failed| any || failed)
    });

    if let Some(err) = failure.into_inner().unwrap_or_else(PoisonError::into_inner) {
        return Err(err);
    }
    if panicked {
        return Err(TripScoreError::WorkerPanicked);
    }
    Ok(output.into_inner().unwrap_or_else(PoisonError::into_inner))
}
