//! Progress reporting for batch phases.
//!
//! Progress is posted from worker threads, so implementations must be
//! `Send + Sync`.

use std::io::{self, Write};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Batch phases, ordered by execution sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    /// Reading driver files into trips
    LoadingDrivers,
    /// Segmenting trips and deriving feature vectors
    ExtractingMetrics,
    /// Building driver references and scoring trips
    Scoring,
}

impl PipelinePhase {
    pub const ALL: [PipelinePhase; 3] = [
        PipelinePhase::LoadingDrivers,
        PipelinePhase::ExtractingMetrics,
        PipelinePhase::Scoring,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelinePhase::LoadingDrivers => "loading_drivers",
            PipelinePhase::ExtractingMetrics => "extracting_metrics",
            PipelinePhase::Scoring => "scoring",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Receives progress updates from a batch phase.
///
/// Both hooks default to doing nothing, so an observer only overrides what
/// it cares about.
pub trait ProgressCallback: Send + Sync {
    /// Entering `phase`, which has `total` work items.
    fn on_phase(&self, _phase: PipelinePhase, _total: u32) {}
    /// One work item of the current phase is done.
    fn on_progress(&self) {}
}

/// Discards all progress.
pub struct NoopProgress;

impl ProgressCallback for NoopProgress {}

/// Counters of one phase at the time of a [`PhaseTracker::snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhaseCounts {
    pub completed: u32,
    pub total: u32,
}

impl PhaseCounts {
    /// Completed share in [0, 1]; an empty phase counts as done.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            f64::from(self.completed) / f64::from(self.total)
        }
    }
}

const NO_PHASE: usize = usize::MAX;

/// Keeps separate counters for every phase of a run.
///
/// A full batch loads, extracts and scores through the same tracker; earlier
/// phases keep their counts after the next one starts, so another thread can
/// poll the whole run.
pub struct PhaseTracker {
    current: AtomicUsize,
    completed: [AtomicU32; PipelinePhase::ALL.len()],
    totals: [AtomicU32; PipelinePhase::ALL.len()],
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            current: AtomicUsize::new(NO_PHASE),
            completed: Default::default(),
            totals: Default::default(),
        }
    }

    /// Phase entered most recently, `None` before the first one.
    pub fn current_phase(&self) -> Option<PipelinePhase> {
        PipelinePhase::ALL
            .get(self.current.load(Ordering::Acquire))
            .copied()
    }

    /// Counters of `phase`; zero if it never started.
    pub fn counts(&self, phase: PipelinePhase) -> PhaseCounts {
        let slot = phase.slot();
        PhaseCounts {
            completed: self.completed[slot].load(Ordering::Acquire),
            total: self.totals[slot].load(Ordering::Acquire),
        }
    }

    /// Current phase with its counters.
    pub fn snapshot(&self) -> Option<(PipelinePhase, PhaseCounts)> {
        self.current_phase().map(|phase| (phase, self.counts(phase)))
    }
}

impl ProgressCallback for PhaseTracker {
    fn on_phase(&self, phase: PipelinePhase, total: u32) {
        let slot = phase.slot();
        self.completed[slot].store(0, Ordering::Release);
        self.totals[slot].store(total, Ordering::Release);
        self.current.store(slot, Ordering::Release);
    }

    fn on_progress(&self) {
        let Some(phase) = self.current_phase() else {
            return;
        };
        let slot = phase.slot();
        let total = self.totals[slot].load(Ordering::Acquire);
        // Saturates at the phase total
        let _ = self.completed[slot].fetch_update(Ordering::AcqRel, Ordering::Acquire, |done| {
            (done < total).then_some(done + 1)
        });
    }
}

struct LoggerState {
    processed: u32,
    total: u32,
    writer: Box<dyn Write + Send>,
}

/// Prints a carriage-return refreshed completion line.
///
/// The counter saturates at the phase total; the line is terminated with a
/// newline once the phase completes.
pub struct ProcessLogger {
    state: Mutex<LoggerState>,
}

impl ProcessLogger {
    /// Logger writing to stderr.
    pub fn stderr() -> Self {
        Self::with_writer(io::stderr())
    }

    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            state: Mutex::new(LoggerState {
                processed: 0,
                total: 0,
                writer: Box::new(writer),
            }),
        }
    }

    /// Items completed in the current phase.
    pub fn processed(&self) -> u32 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .processed
    }
}

impl Default for ProcessLogger {
    fn default() -> Self {
        Self::stderr()
    }
}

impl ProgressCallback for ProcessLogger {
    fn on_phase(&self, _phase: PipelinePhase, total: u32) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.processed = 0;
        state.total = total;
    }

    fn on_progress(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.processed >= state.total {
            return;
        }
        state.processed += 1;

        let (processed, total) = (state.processed, state.total);
        let percent = 100.0 * processed as f64 / total as f64;
        // Progress output is best effort.
        let _ = write!(
            state.writer,
            "\rTasks processed: {processed} / {total} ({percent:.2}%)"
        );
        if processed == total {
            let _ = writeln!(state.writer);
        }
        let _ = state.writer.flush();
    }
}
