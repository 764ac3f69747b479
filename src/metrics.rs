//! Per-trip feature vectors.
//!
//! A [`TripMetrics`] holds the raw (untransformed) kinematic summary of one
//! trip in the fixed order of [`Feature::ALL`]: twenty continuous features
//! followed by the two binary flags. Trips that are flagged carry NaN in all
//! continuous features; the statistical reference scores them against the
//! population rate of the flag instead.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TripScoreError};

/// Percent levels extracted from every value distribution.
pub const QUANTILE_PERCENTS: [f64; 5] = [5.0, 25.0, 50.0, 75.0, 95.0];

/// Number of values in a feature vector (continuous features plus flags).
pub const FEATURE_COUNT: usize = 22;

/// Number of continuous features modelled by histograms.
pub const HISTOGRAM_FEATURE_COUNT: usize = 20;

/// Thresholds used when deriving features from a segmented trip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Trips keeping fewer points than this after segmentation are flagged.
    /// Default: 20
    pub min_valid_points: usize,

    /// Heading changes up to this magnitude (radians) are noise, not turns.
    /// Default: 0.035 (2 degrees)
    pub direction_noise: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            min_valid_points: 20,
            direction_noise: 0.035,
        }
    }
}

/// One dimension of the feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Duration,
    Length,
    SpeedP25,
    SpeedP50,
    SpeedP75,
    SpeedP95,
    AccelerationP05,
    AccelerationP25,
    AccelerationP75,
    AccelerationP95,
    DirectionP05,
    DirectionP25,
    DirectionP75,
    DirectionP95,
    SpeedXAccelerationP05,
    SpeedXAccelerationP25,
    SpeedXAccelerationP75,
    SpeedXAccelerationP95,
    NegativeTurns,
    PositiveTurns,
    ZeroSegments,
    TooFewPoints,
}

impl Feature {
    /// All features in vector order.
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::Duration,
        Feature::Length,
        Feature::SpeedP25,
        Feature::SpeedP50,
        Feature::SpeedP75,
        Feature::SpeedP95,
        Feature::AccelerationP05,
        Feature::AccelerationP25,
        Feature::AccelerationP75,
        Feature::AccelerationP95,
        Feature::DirectionP05,
        Feature::DirectionP25,
        Feature::DirectionP75,
        Feature::DirectionP95,
        Feature::SpeedXAccelerationP05,
        Feature::SpeedXAccelerationP25,
        Feature::SpeedXAccelerationP75,
        Feature::SpeedXAccelerationP95,
        Feature::NegativeTurns,
        Feature::PositiveTurns,
        Feature::ZeroSegments,
        Feature::TooFewPoints,
    ];

    /// The continuous features, in vector order.
    pub fn continuous() -> &'static [Feature] {
        &Self::ALL[..HISTOGRAM_FEATURE_COUNT]
    }

    /// Position of the feature in the vector.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Duration => "duration",
            Feature::Length => "length",
            Feature::SpeedP25 => "speed_p25",
            Feature::SpeedP50 => "speed_p50",
            Feature::SpeedP75 => "speed_p75",
            Feature::SpeedP95 => "speed_p95",
            Feature::AccelerationP05 => "acceleration_p05",
            Feature::AccelerationP25 => "acceleration_p25",
            Feature::AccelerationP75 => "acceleration_p75",
            Feature::AccelerationP95 => "acceleration_p95",
            Feature::DirectionP05 => "direction_p05",
            Feature::DirectionP25 => "direction_p25",
            Feature::DirectionP75 => "direction_p75",
            Feature::DirectionP95 => "direction_p95",
            Feature::SpeedXAccelerationP05 => "speed_x_acceleration_p05",
            Feature::SpeedXAccelerationP25 => "speed_x_acceleration_p25",
            Feature::SpeedXAccelerationP75 => "speed_x_acceleration_p75",
            Feature::SpeedXAccelerationP95 => "speed_x_acceleration_p95",
            Feature::NegativeTurns => "negative_turns",
            Feature::PositiveTurns => "positive_turns",
            Feature::ZeroSegments => "zero_segments",
            Feature::TooFewPoints => "too_few_points",
        }
    }

    /// Transform compressing the feature's distribution, `None` for the flags.
    pub fn transform(self) -> Option<FeatureTransform> {
        use Feature::*;
        match self {
            Duration | Length => Some(FeatureTransform::LogShifted(1.0)),
            SpeedP25 | SpeedP50 | SpeedP75 | SpeedP95 => Some(FeatureTransform::LogShifted(0.1)),
            AccelerationP05 | AccelerationP25 | DirectionP05 | DirectionP25
            | SpeedXAccelerationP05 | SpeedXAccelerationP25 => Some(FeatureTransform::LogNegated),
            AccelerationP75 | AccelerationP95 | DirectionP75 | DirectionP95
            | SpeedXAccelerationP75 | SpeedXAccelerationP95 => Some(FeatureTransform::LogShifted(0.0)),
            NegativeTurns | PositiveTurns => Some(FeatureTransform::LogShifted(0.001)),
            ZeroSegments | TooFewPoints => None,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monotonic transform applied to a feature before histogramming.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureTransform {
    /// `log10(shift + v)`, defined for `v > -shift`.
    LogShifted(f64),
    /// `log10(-v)`, defined for `v < 0`. Reverses the order of values.
    LogNegated,
}

impl FeatureTransform {
    /// Whether `value` lies inside the transform's domain.
    pub fn is_valid(&self, value: f64) -> bool {
        match *self {
            FeatureTransform::LogShifted(shift) => value + shift > 0.0,
            FeatureTransform::LogNegated => value < 0.0,
        }
    }

    pub fn apply(&self, value: f64) -> f64 {
        match *self {
            FeatureTransform::LogShifted(shift) => (shift + value).log10(),
            FeatureTransform::LogNegated => (-value).log10(),
        }
    }

    /// Whether the transform maps low raw values to high transformed ones.
    pub fn is_reversing(&self) -> bool {
        matches!(self, FeatureTransform::LogNegated)
    }
}

/// Feature vector of one trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripMetrics {
    pub driver_id: i32,
    pub trip_id: i32,
    values: Vec<f64>,
}

impl TripMetrics {
    /// Create a feature vector, checking its dimensionality.
    pub fn new(driver_id: i32, trip_id: i32, values: Vec<f64>) -> Result<Self> {
        if values.len() != FEATURE_COUNT {
            return Err(TripScoreError::DimensionMismatch {
                expected: FEATURE_COUNT,
                actual: values.len(),
            });
        }
        Ok(Self {
            driver_id,
            trip_id,
            values,
        })
    }

    /// Feature vector of a trip that kept no segment at all.
    pub fn zero_segments(driver_id: i32, trip_id: i32) -> Self {
        Self::flagged(driver_id, trip_id, Feature::ZeroSegments)
    }

    /// Feature vector of a trip that kept too few points to summarise.
    pub fn too_few_points(driver_id: i32, trip_id: i32) -> Self {
        Self::flagged(driver_id, trip_id, Feature::TooFewPoints)
    }

    fn flagged(driver_id: i32, trip_id: i32, flag: Feature) -> Self {
        let mut values = vec![f64::NAN; FEATURE_COUNT];
        values[Feature::ZeroSegments.index()] = 0.0;
        values[Feature::TooFewPoints.index()] = 0.0;
        values[flag.index()] = 1.0;
        Self {
            driver_id,
            trip_id,
            values,
        }
    }

    /// Build from the continuous features of an unflagged trip.
    pub(crate) fn from_continuous(
        driver_id: i32,
        trip_id: i32,
        continuous: [f64; HISTOGRAM_FEATURE_COUNT],
    ) -> Self {
        let mut values = Vec::with_capacity(FEATURE_COUNT);
        values.extend_from_slice(&continuous);
        values.push(0.0);
        values.push(0.0);
        Self {
            driver_id,
            trip_id,
            values,
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn value(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    /// The twenty continuous features.
    pub fn continuous_values(&self) -> &[f64] {
        &self.values[..HISTOGRAM_FEATURE_COUNT]
    }

    pub fn has_zero_segments(&self) -> bool {
        self.value(Feature::ZeroSegments) == 1.0
    }

    pub fn has_too_few_points(&self) -> bool {
        self.value(Feature::TooFewPoints) == 1.0
    }

    /// Whether the trip is routed through a flag rate instead of the histograms.
    pub fn is_flagged(&self) -> bool {
        self.has_zero_segments() || self.has_too_few_points()
    }

    /// Space-separated header matching the [`Display`](fmt::Display) output.
    pub fn variable_names() -> String {
        let mut names = vec!["driver_id", "trip_id"];
        names.extend(Feature::ALL.iter().map(Feature::as_str));
        names.join(" ")
    }
}

impl fmt::Display for TripMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.driver_id, self.trip_id)?;
        for value in &self.values {
            write!(f, " {value}")?;
        }
        Ok(())
    }
}

/// Nearest-rank quantiles of `values` at the given percent levels.
///
/// The levels must be ascending. `values` is partially reordered. Returns
/// `None` for an empty slice.
///
/// # Example
/// ```
/// use tripscore::metrics::{quantiles, QUANTILE_PERCENTS};
///
/// let mut values: Vec<f64> = (1..=100).rev().map(f64::from).collect();
/// assert_eq!(quantiles(&mut values, QUANTILE_PERCENTS), Some([5.0, 25.0, 50.0, 75.0, 95.0]));
/// ```
pub fn quantiles<const N: usize>(values: &mut [f64], percents: [f64; N]) -> Option<[f64; N]> {
    let len = values.len();
    if len == 0 {
        return None;
    }

    let mut result = [f64::NAN; N];
    let mut lowest_unsorted = 0;
    for (slot, percent) in result.iter_mut().zip(percents) {
        let rank = ((percent * len as f64) / 100.0).ceil() as usize;
        let index = rank.clamp(1, len) - 1;
        if index >= lowest_unsorted {
            values[lowest_unsorted..].select_nth_unstable_by(index - lowest_unsorted, f64::total_cmp);
            lowest_unsorted = index + 1;
        }
        *slot = values[index];
    }
    Some(result)
}

/// Quantiles at [`QUANTILE_PERCENTS`], NaN when there are no values.
pub fn standard_quantiles(mut values: Vec<f64>) -> [f64; 5] {
    quantiles(&mut values, QUANTILE_PERCENTS).unwrap_or([f64::NAN; 5])
}
