//! Integration tests for planar geometry helpers

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use approx::assert_relative_eq;
use tripscore::{Vec2, signed_angle};

#[test]
fn test_signed_angle_quadrants() {
    let east = Vec2::new(1.0, 0.0);

    assert_eq!(signed_angle(east, east), 0.0);
    assert_relative_eq!(signed_angle(east, Vec2::new(0.0, 2.0)), FRAC_PI_2, epsilon = 1e-12);
    assert_relative_eq!(signed_angle(east, Vec2::new(0.0, -3.0)), -FRAC_PI_2, epsilon = 1e-12);
    assert_relative_eq!(signed_angle(east, Vec2::new(-1.0, 1.0)), 3.0 * FRAC_PI_4, epsilon = 1e-12);
    assert_relative_eq!(signed_angle(east, Vec2::new(-1.0, -1.0)), -3.0 * FRAC_PI_4, epsilon = 1e-12);
}

#[test]
fn test_signed_angle_reversal() {
    let angle = signed_angle(Vec2::new(5.0, 0.0), Vec2::new(-2.0, 0.0));
    assert_relative_eq!(angle.abs(), PI, epsilon = 1e-12);
}

#[test]
fn test_signed_angle_degenerate_vectors() {
    assert_eq!(signed_angle(Vec2::ZERO, Vec2::new(1.0, 1.0)), 0.0);
    assert_eq!(signed_angle(Vec2::new(1.0, 1.0), Vec2::ZERO), 0.0);
}

#[test]
fn test_signed_angle_survives_round_off() {
    // Nearly parallel vectors where |cos| can exceed 1 by round-off
    let a = Vec2::new(1e8, 1.0);
    let b = Vec2::new(1e8 + 1.0, 1.0);
    let angle = signed_angle(a, b);
    assert!(angle.is_finite());
    assert!(angle.abs() < 1e-6);
}
