//! Sharp-turn removal.

use std::ops::Range;

use super::{ExtraTravel, SegmentationConfig};
use crate::geometry::{Position, signed_angle};

/// Cut a run at heading changes no vehicle can make within one time step.
///
/// The apex point of such a turn is dropped; the two steps around it are
/// bridged by the straight line between its neighbours.
pub(crate) fn split_at_sharp_turns(
    points: &[Position],
    run: Range<usize>,
    config: &SegmentationConfig,
    extra: &mut ExtraTravel,
    out: &mut Vec<Range<usize>>,
) {
    let offset = run.start;
    let p = &points[run];
    let n = p.len();
    let min = config.min_segment_points;
    if n < 3 {
        if n >= min {
            out.push(offset..offset + n);
        }
        return;
    }

    let mut start = 0;
    let mut v_prev = p[0].displacement_to(p[1]);
    let mut i = 2;
    while i < n {
        let v = p[i - 1].displacement_to(p[i]);
        if signed_angle(v_prev, v).abs() > config.max_turn_angle {
            // Apex at i - 1: keep the run up to i - 2, resume at i.
            if i - 1 - start >= min {
                out.push(offset + start..offset + i - 1);
            }
            extra.add_steps(p[i - 2].distance_to(p[i]), 2);

            start = i;
            i += 2;
            if i - 1 < n {
                v_prev = p[i - 2].displacement_to(p[i - 1]);
            }
            continue;
        }
        v_prev = v;
        i += 1;
    }

    if n - start >= min {
        out.push(offset + start..offset + n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hairpin_apex_is_dropped() {
        // Eastwards to x = 60 (points 0..=6), then straight back west
        let mut points: Vec<Position> = (0..=6).map(|i| Position::new(10.0 * i as f32, 0.0)).collect();
        points.extend((1..=6).map(|i| Position::new(60.0 - 10.0 * i as f32, 1.0)));

        let mut out = Vec::new();
        let mut extra = ExtraTravel::default();
        split_at_sharp_turns(
            &points,
            0..points.len(),
            &SegmentationConfig::default(),
            &mut extra,
            &mut out,
        );

        assert_eq!(out, vec![0..6, 7..13]);
        assert_eq!(extra.duration, 2);
        assert!((extra.length - points[5].distance_to(points[7])).abs() < 1e-9);
    }

    #[test]
    fn test_gentle_curve_is_kept() {
        let points: Vec<Position> = (0..20)
            .map(|i| {
                let a = 0.1 * i as f64;
                Position::new((100.0 * a.cos()) as f32, (100.0 * a.sin()) as f32)
            })
            .collect();
        let mut out = Vec::new();
        let mut extra = ExtraTravel::default();
        split_at_sharp_turns(
            &points,
            0..points.len(),
            &SegmentationConfig::default(),
            &mut extra,
            &mut out,
        );
        assert_eq!(out, vec![0..20]);
        assert_eq!(extra, ExtraTravel::default());
    }
}
