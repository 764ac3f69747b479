//! Stationary-period removal.

use std::ops::Range;

use super::SegmentationConfig;
use crate::geometry::Position;

/// Cut a run wherever the vehicle stands still.
///
/// Every step slower than the stationary tolerance ends the current moving
/// run; the next run starts at the last stationary point. Time spent standing
/// is not travel, so nothing is booked as extra.
pub(crate) fn split_at_stops(
    points: &[Position],
    run: Range<usize>,
    config: &SegmentationConfig,
    out: &mut Vec<Range<usize>>,
) {
    let offset = run.start;
    let p = &points[run];
    let n = p.len();
    let min = config.min_segment_points;

    let mut start = 0;
    let mut stationary = false;
    for i in 1..n {
        let speed = p[i - 1].distance_to(p[i]);
        if speed < config.stationary_speed {
            // First stationary step closes the moving run at i - 1.
            if !stationary && i - start >= min {
                out.push(offset + start..offset + i);
            }
            stationary = true;
            start = i;
        } else {
            stationary = false;
        }
    }

    if n - start >= min {
        out.push(offset + start..offset + n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_with_stop() -> Vec<Position> {
        // 0..=5 moving at 5/step, 5..=8 stationary, 8..=13 moving again
        let mut points: Vec<Position> = (0..=5).map(|i| Position::new(5.0 * i as f32, 0.0)).collect();
        points.extend((0..3).map(|_| Position::new(25.0, 0.0)));
        points.extend((1..=5).map(|i| Position::new(25.0 + 5.0 * i as f32, 0.0)));
        points
    }

    #[test]
    fn test_stop_splits_run() {
        let points = run_with_stop();
        let mut out = Vec::new();
        split_at_stops(&points, 0..points.len(), &SegmentationConfig::default(), &mut out);
        assert_eq!(out, vec![0..6, 8..14]);
    }

    #[test]
    fn test_offset_is_applied() {
        let points = run_with_stop();
        let mut out = Vec::new();
        split_at_stops(&points, 2..points.len(), &SegmentationConfig::default(), &mut out);
        assert_eq!(out, vec![2..6, 8..14]);
    }

    #[test]
    fn test_fully_stationary_run_is_dropped() {
        let points = vec![Position::new(1.0, 1.0); 10];
        let mut out = Vec::new();
        split_at_stops(&points, 0..points.len(), &SegmentationConfig::default(), &mut out);
        assert!(out.is_empty());
    }
}
