//! # Trajectory Segmentation
//!
//! Splits a noisy raw trajectory (one position per time unit) into clean
//! movement segments.
//!
//! ## Passes
//! 1. **Stops** - cut wherever the speed drops below the stationary tolerance
//! 2. **Gaps and jitter** - an abrupt speed jump above the trigger speed is
//!    either a gap (missing samples, the run is cut and the skipped distance
//!    and time are booked as extra travel) or a chain of spurious samples
//!    (skipped until two consecutive steps agree again, bridged likewise)
//! 3. **Sharp turns** - a heading change above the turn limit within one step
//!    drops the apex point and books the two bridged steps as extra travel
//! 4. **Refinement** - the gap/jitter pass again, on what survived the turn pass
//!
//! Every pass works on index ranges into the raw data, so surviving segments
//! are always ordered, non-overlapping sub-runs of the input. Runs shorter
//! than [`SegmentationConfig::min_segment_points`] are dropped at every cut.

mod gaps;
mod stops;
mod turns;

use std::ops::Range;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TripScoreError};
use crate::geometry::Position;
use crate::segment::Segment;

pub(crate) use gaps::split_at_gaps;
pub(crate) use stops::split_at_stops;
pub(crate) use turns::split_at_sharp_turns;

/// Tuning of the segmentation passes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Speed (distance per time unit) strictly below which the vehicle is
    /// considered stationary.
    /// Default: 1.0, not the historical 1.5: a straight trace moving one unit
    /// per step must stay a single segment instead of being cut as a stop.
    pub stationary_speed: f64,

    /// Largest plausible change of speed between two consecutive steps.
    /// Default: 5.0
    pub max_acceleration: f64,

    /// A speed jump only counts as a gap or jitter above this speed.
    /// Default: 10.0
    pub jump_speed: f64,

    /// Largest plausible heading change within one time step (radians).
    /// Default: 100 degrees
    pub max_turn_angle: f64,

    /// Minimum number of points for a run to survive a cut.
    /// Default: 3
    pub min_segment_points: usize,

    /// Re-run the gap/jitter pass after the sharp-turn pass.
    /// Default: true
    pub refine_after_turns: bool,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            stationary_speed: 1.0,
            max_acceleration: 5.0,
            jump_speed: 10.0,
            max_turn_angle: 100.0_f64.to_radians(),
            min_segment_points: 3,
            refine_after_turns: true,
        }
    }
}

impl SegmentationConfig {
    /// Check that the thresholds describe a usable configuration.
    pub fn validate(&self) -> Result<()> {
        let thresholds = [
            ("stationary_speed", self.stationary_speed),
            ("max_acceleration", self.max_acceleration),
            ("jump_speed", self.jump_speed),
            ("max_turn_angle", self.max_turn_angle),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(TripScoreError::invalid_config(format!(
                    "{name} must be a non-negative finite number, got {value}"
                )));
            }
        }
        if self.min_segment_points < 2 {
            return Err(TripScoreError::invalid_config(
                "min_segment_points must be at least 2",
            ));
        }
        Ok(())
    }
}

/// Distance and time spent in removed gaps, spikes and turns.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExtraTravel {
    pub duration: u64,
    pub length: f64,
}

impl ExtraTravel {
    /// Book a bridged stretch whose duration is estimated from an average speed.
    ///
    /// `fallback_steps` is used when the average speed is not usable.
    pub(crate) fn add_bridge(&mut self, distance: f64, average_speed: f64, fallback_steps: u64) {
        let steps = if average_speed > 0.0 && average_speed.is_finite() {
            ((distance / average_speed).round() as u64).max(1)
        } else {
            fallback_steps
        };
        self.duration += steps;
        self.length += distance;
    }

    /// Book a bridged stretch with a known number of time steps.
    pub(crate) fn add_steps(&mut self, distance: f64, steps: u64) {
        self.duration += steps;
        self.length += distance;
    }
}

/// Result of segmenting one trajectory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segmentation {
    pub segments: Vec<Segment>,
    pub extra: ExtraTravel,
}

impl Segmentation {
    /// Total number of points kept in segments.
    pub fn valid_point_count(&self) -> usize {
        self.segments.iter().map(Segment::point_count).sum()
    }
}

/// Segment a raw trajectory.
///
/// Trajectories with fewer than two points yield no segments.
///
/// # Example
/// ```
/// use tripscore::geometry::Position;
/// use tripscore::segmentation::{segment_positions, SegmentationConfig};
///
/// // 30 points at 12 m/s with a single spurious sample at index 15
/// let mut points: Vec<Position> = (0..30).map(|i| Position::new(12.0 * i as f32, 0.0)).collect();
/// points[15].y = 80.0;
///
/// let result = segment_positions(&points, &SegmentationConfig::default());
/// assert_eq!(result.segments.len(), 2);
/// assert_eq!(result.segments[0].source_range(), 0..15);
/// assert_eq!(result.segments[1].source_range(), 16..30);
/// ```
pub fn segment_positions(points: &[Position], config: &SegmentationConfig) -> Segmentation {
    let mut extra = ExtraTravel::default();
    if points.len() < 2 {
        return Segmentation::default();
    }

    let mut runs = vec![0..points.len()];

    runs = apply_pass(runs, |run, out| split_at_stops(points, run, config, out));
    runs = apply_pass(runs, |run, out| {
        split_at_gaps(points, run, config, &mut extra, out)
    });
    runs = apply_pass(runs, |run, out| {
        split_at_sharp_turns(points, run, config, &mut extra, out)
    });
    if config.refine_after_turns {
        runs = apply_pass(runs, |run, out| {
            split_at_gaps(points, run, config, &mut extra, out)
        });
    }

    debug_assert!(
        runs.iter().all(|r| r.start < r.end && r.end <= points.len()),
        "segment run out of bounds"
    );
    debug_assert!(
        runs.windows(2).all(|w| w[0].end <= w[1].start),
        "segment runs overlap or are out of order"
    );

    let segments: Vec<Segment> = runs
        .into_iter()
        .map(|run| Segment::from_points(&points[run.clone()], run.start))
        .collect();

    debug!(
        "segmented {} points into {} segments (extra duration {}, extra length {:.1})",
        points.len(),
        segments.len(),
        extra.duration,
        extra.length
    );

    Segmentation { segments, extra }
}

/// Feed every run through one pass, collecting the sub-runs it keeps.
fn apply_pass<F>(runs: Vec<Range<usize>>, mut pass: F) -> Vec<Range<usize>>
where
    F: FnMut(Range<usize>, &mut Vec<Range<usize>>),
{
    let mut out = Vec::with_capacity(runs.len());
    for run in runs {
        pass(run, &mut out);
    }
    out
}
