//! A single raw trajectory and its lazily derived segmentation.

use std::sync::OnceLock;

use crate::geometry::Position;
use crate::metrics::{Feature, HISTOGRAM_FEATURE_COUNT, MetricsConfig, TripMetrics, standard_quantiles};
use crate::segment::Segment;
use crate::segmentation::{Segmentation, SegmentationConfig, segment_positions};

/// One trajectory: raw positions sampled once per time unit.
///
/// Segmentation runs on first access and is cached until the raw data is
/// replaced through [`Trip::set_raw_data`].
#[derive(Debug, Clone)]
pub struct Trip {
    id: i32,
    raw: Vec<Position>,
    config: SegmentationConfig,
    segmentation: OnceLock<Segmentation>,
}

impl Trip {
    pub fn new(id: i32, raw: Vec<Position>) -> Self {
        Self::with_config(id, raw, SegmentationConfig::default())
    }

    pub fn with_config(id: i32, raw: Vec<Position>, config: SegmentationConfig) -> Self {
        Self {
            id,
            raw,
            config,
            segmentation: OnceLock::new(),
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn raw_data(&self) -> &[Position] {
        &self.raw
    }

    /// Replace the raw positions, discarding any cached segmentation.
    pub fn set_raw_data(&mut self, raw: Vec<Position>) {
        self.raw = raw;
        self.segmentation = OnceLock::new();
    }

    pub fn segmentation_config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Whether the segmentation has been computed for the current raw data.
    pub fn is_segmented(&self) -> bool {
        self.segmentation.get().is_some()
    }

    /// Segmentation of the current raw data, computed once.
    pub fn segmentation(&self) -> &Segmentation {
        self.segmentation
            .get_or_init(|| segment_positions(&self.raw, &self.config))
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segmentation().segments
    }

    pub fn number_of_segments(&self) -> usize {
        self.segments().len()
    }

    /// Points kept in segments after cleaning.
    pub fn number_of_valid_points(&self) -> usize {
        self.segmentation().valid_point_count()
    }

    /// Time units travelled, including bridged gaps, spikes and turns.
    pub fn travel_duration(&self) -> u64 {
        let segmentation = self.segmentation();
        segmentation
            .segments
            .iter()
            .map(Segment::travel_duration)
            .sum::<u64>()
            + segmentation.extra.duration
    }

    /// Distance travelled, including bridged gaps, spikes and turns.
    pub fn travel_length(&self) -> f64 {
        let segmentation = self.segmentation();
        segmentation
            .segments
            .iter()
            .map(Segment::travel_length)
            .sum::<f64>()
            + segmentation.extra.length
    }

    /// Distance of the last raw point from the frame origin.
    ///
    /// Traces are recorded relative to where the trip started, so this is how
    /// far the trip ended from home.
    pub fn distance_of_end_point(&self) -> f64 {
        self.raw
            .last()
            .map_or(0.0, |last| last.distance_to(Position::default()))
    }

    pub fn speed_values(&self) -> Vec<f64> {
        self.collect_values(Segment::speed_values)
    }

    pub fn acceleration_values(&self) -> Vec<f64> {
        self.collect_values(Segment::acceleration_values)
    }

    pub fn direction_values(&self) -> Vec<f64> {
        self.collect_values(Segment::direction_values)
    }

    pub fn speed_x_acceleration_values(&self) -> Vec<f64> {
        self.collect_values(Segment::speed_x_acceleration_values)
    }

    fn collect_values(&self, per_segment: fn(&Segment) -> Vec<f64>) -> Vec<f64> {
        self.segments().iter().flat_map(per_segment).collect()
    }

    /// Accumulated heading change per unit length, split by turn direction.
    ///
    /// Changes no larger than `noise` are ignored. Returns `(negative, positive)`
    /// as non-negative magnitudes.
    pub fn turn_totals(&self, noise: f64) -> (f64, f64) {
        let (mut negative, mut positive) = (0.0, 0.0);
        for angle in self.direction_values() {
            if angle < -noise {
                negative -= angle;
            } else if angle > noise {
                positive += angle;
            }
        }
        let length = self.travel_length();
        if length > 0.0 {
            (negative / length, positive / length)
        } else {
            (0.0, 0.0)
        }
    }

    /// Feature vector of this trip.
    pub fn metrics(&self, driver_id: i32, config: &MetricsConfig) -> TripMetrics {
        if self.segments().is_empty() {
            return TripMetrics::zero_segments(driver_id, self.id);
        }
        if self.number_of_valid_points() < config.min_valid_points {
            return TripMetrics::too_few_points(driver_id, self.id);
        }

        let speed = standard_quantiles(self.speed_values());
        let acceleration = standard_quantiles(self.acceleration_values());
        let direction = standard_quantiles(self.direction_values());
        let speed_x_acceleration = standard_quantiles(self.speed_x_acceleration_values());
        let (negative_turns, positive_turns) = self.turn_totals(config.direction_noise);

        let mut values = [f64::NAN; HISTOGRAM_FEATURE_COUNT];
        values[Feature::Duration.index()] = self.travel_duration() as f64;
        values[Feature::Length.index()] = self.travel_length();
        values[Feature::SpeedP25.index()..=Feature::SpeedP95.index()].copy_from_slice(&speed[1..]);
        for (block, q) in [
            (Feature::AccelerationP05, acceleration),
            (Feature::DirectionP05, direction),
            (Feature::SpeedXAccelerationP05, speed_x_acceleration),
        ] {
            let at = block.index();
            values[at] = q[0];
            values[at + 1] = q[1];
            values[at + 2] = q[3];
            values[at + 3] = q[4];
        }
        values[Feature::NegativeTurns.index()] = negative_turns;
        values[Feature::PositiveTurns.index()] = positive_turns;

        TripMetrics::from_continuous(driver_id, self.id, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_trip_has_no_segments() {
        let trip = Trip::new(1, Vec::new());
        assert_eq!(trip.number_of_segments(), 0);
        assert_eq!(trip.travel_duration(), 0);
        assert_eq!(trip.distance_of_end_point(), 0.0);
        assert!(trip.metrics(3, &MetricsConfig::default()).has_zero_segments());
    }
}
