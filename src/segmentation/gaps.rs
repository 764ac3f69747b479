//! Gap detection and jitter correction.
//!
//! Both defects show up as a speed jump: one step covers far more ground than
//! the step before it. What follows the jump tells them apart:
//! - **gap**: the next step is back to a normal speed, so samples were lost
//!   and the vehicle genuinely travelled the jump distance
//! - **jitter**: the next step is just as fast (jumping back), so the sample
//!   itself is spurious; consecutive spurious samples form a chain that ends
//!   where two consecutive steps agree again

use std::ops::Range;

use super::{ExtraTravel, SegmentationConfig};
use crate::geometry::Position;

/// Cut a run at gaps and skip spurious samples.
pub(crate) fn split_at_gaps(
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
    if n < 2 {
        return;
    }

    let speed = |a: usize, b: usize| p[a].distance_to(p[b]);
    let is_jump = |v: f64, v_prev: f64| {
        (v - v_prev).abs() > config.max_acceleration && v > config.jump_speed
    };

    let mut start = 0;
    let mut v_prev = speed(0, 1);
    // i is the end point of the step under inspection (i - 1 -> i)
    let mut i = 2;

    // A run often opens with a gap (the vehicle resumed far from where it
    // stopped); only the step after it can tell.
    if n >= 3 {
        let v_next = speed(1, 2);
        if is_jump(v_prev, v_next) {
            extra.add_bridge(v_prev, v_next, 1);
            start = 1;
            v_prev = v_next;
            i = 3;
        }
    }
    while i < n {
        let v = speed(i - 1, i);
        if !is_jump(v, v_prev) {
            v_prev = v;
            i += 1;
            continue;
        }

        if i - start >= min {
            out.push(offset + start..offset + i);
        }

        if i + 1 >= n {
            // Jump on the final step: nothing left to resume from.
            start = n;
            break;
        }

        let v_next = speed(i, i + 1);
        if (v - v_next).abs() > config.max_acceleration {
            extra.add_bridge(v, 0.5 * (v_prev + v_next), 1);
            start = i;
            v_prev = v_next;
            i += 2;
            continue;
        }

        match find_resume_point(p, i, config.max_acceleration) {
            Some(resume) => {
                let resumed_speed = speed(resume, resume + 1);
                extra.add_bridge(
                    p[i - 1].distance_to(p[resume]),
                    0.5 * (v_prev + resumed_speed),
                    (resume - (i - 1)) as u64,
                );
                start = resume;
                v_prev = resumed_speed;
                i = resume + 2;
            }
            None => {
                start = n;
                break;
            }
        }
    }

    if n - start >= min {
        out.push(offset + start..offset + n);
    }
}

/// First point after a spurious sample at which two consecutive steps agree.
fn find_resume_point(p: &[Position], first_spurious: usize, max_acceleration: f64) -> Option<usize> {
    let n = p.len();
    (first_spurious + 1..n.saturating_sub(2)).find(|&r| {
        let s1 = p[r].distance_to(p[r + 1]);
        let s2 = p[r + 1].distance_to(p[r + 2]);
        (s2 - s1).abs() < max_acceleration
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight(count: usize, step: f32) -> Vec<Position> {
        (0..count).map(|i| Position::new(step * i as f32, 0.0)).collect()
    }

    fn run(points: &[Position]) -> (Vec<Range<usize>>, ExtraTravel) {
        let mut out = Vec::new();
        let mut extra = ExtraTravel::default();
        split_at_gaps(points, 0..points.len(), &SegmentationConfig::default(), &mut extra, &mut out);
        (out, extra)
    }

    #[test]
    fn test_clean_run_is_untouched() {
        let points = straight(20, 12.0);
        let (out, extra) = run(&points);
        assert_eq!(out, vec![0..20]);
        assert_eq!(extra, ExtraTravel::default());
    }

    #[test]
    fn test_gap_cuts_and_books_extra_travel() {
        // 10 m/s, then a 120 m jump between points 9 and 10, then 10 m/s again
        let mut points = straight(10, 10.0);
        points.extend((0..10).map(|i| Position::new(210.0 + 10.0 * i as f32, 0.0)));
        let (out, extra) = run(&points);
        assert_eq!(out, vec![0..10, 10..20]);
        assert_eq!(extra.length, 120.0);
        assert_eq!(extra.duration, 12);
    }

    #[test]
    fn test_jitter_chain_is_skipped() {
        // Two consecutive spurious samples drifting away at 8 and 9
        let mut points = straight(20, 12.0);
        points[8].y = 60.0;
        points[9].y = 120.0;
        let (out, extra) = run(&points);
        assert_eq!(out, vec![0..8, 10..20]);
        assert_eq!(extra.length, 36.0);
        assert_eq!(extra.duration, 3);
    }

    #[test]
    fn test_gap_on_first_step() {
        let mut points = vec![Position::new(0.0, 0.0)];
        points.extend((0..20).map(|i| Position::new(200.0 + 12.0 * i as f32, 0.0)));
        let (out, extra) = run(&points);
        assert_eq!(out, vec![1..21]);
        assert_eq!(extra.length, 200.0);
        assert_eq!(extra.duration, 17);
    }

    #[test]
    fn test_fast_start_is_not_a_gap() {
        let points = straight(20, 40.0);
        let (out, extra) = run(&points);
        assert_eq!(out, vec![0..20]);
        assert_eq!(extra, ExtraTravel::default());
    }

    #[test]
    fn test_jump_on_last_step_drops_tail() {
        let mut points = straight(10, 12.0);
        points.push(Position::new(400.0, 0.0));
        let (out, _) = run(&points);
        assert_eq!(out, vec![0..10]);
    }
}
