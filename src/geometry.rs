//! Planar vector geometry.
//!
//! Positions are stored exactly as they arrive from the binary store (a pair
//! of `f32` in a local metric frame). All arithmetic happens on [`Vec2`],
//! an `f64` value type with named operations.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// A sampled position in a local planar frame (metres).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// The position as an `f64` vector from the frame origin.
    pub fn to_vec2(self) -> Vec2 {
        Vec2::new(f64::from(self.x), f64::from(self.y))
    }

    /// Displacement vector from `self` to `other`.
    pub fn displacement_to(self, other: Position) -> Vec2 {
        other.to_vec2().subtract(self.to_vec2())
    }

    /// Euclidean distance between two positions.
    pub fn distance_to(self, other: Position) -> f64 {
        self.displacement_to(other).magnitude()
    }

    /// Translate the position by a displacement.
    pub fn offset_by(self, v: Vec2) -> Position {
        Position::new((f64::from(self.x) + v.x) as f32, (f64::from(self.y) + v.y) as f32)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A 2D vector (velocity, displacement) with explicit named operations.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }

    pub fn subtract(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }

    pub fn scale(self, factor: f64) -> Vec2 {
        Vec2::new(self.x * factor, self.y * factor)
    }

    pub fn dot(self, other: Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// z-component of the 3D cross product (positive for a counter-clockwise turn).
    pub fn cross(self, other: Vec2) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn magnitude(self) -> f64 {
        self.dot(self).sqrt()
    }
}

/// Signed angle (radians, in [-π, π]) turning `from` onto `to`.
///
/// Counter-clockwise turns are positive. A zero-length vector on either side
/// yields 0, since a direction change is undefined while standing still.
///
/// # Example
/// ```
/// use tripscore::geometry::{signed_angle, Vec2};
///
/// let east = Vec2::new(1.0, 0.0);
/// let north = Vec2::new(0.0, 1.0);
/// assert!((signed_angle(east, north) - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
/// assert!((signed_angle(north, east) + std::f64::consts::FRAC_PI_2).abs() < 1e-12);
/// ```
pub fn signed_angle(from: Vec2, to: Vec2) -> f64 {
    let m1 = from.magnitude();
    if m1 == 0.0 {
        return 0.0;
    }
    let m2 = to.magnitude();
    if m2 == 0.0 {
        return 0.0;
    }
    let norm = m1 * m2;
    let sin = (from.cross(to) / norm).clamp(-1.0, 1.0);
    let cos = (from.dot(to) / norm).clamp(-1.0, 1.0);

    if cos >= 0.0 {
        sin.asin()
    } else if sin > 0.0 {
        PI - sin.asin()
    } else {
        -cos.acos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_operations() {
        let a = Vec2::new(3.0, 4.0);
        let b = Vec2::new(1.0, -2.0);
        assert_eq!(a.magnitude(), 5.0);
        assert_eq!(a.add(b), Vec2::new(4.0, 2.0));
        assert_eq!(a.subtract(b), Vec2::new(2.0, 6.0));
        assert_eq!(a.scale(2.0), Vec2::new(6.0, 8.0));
        assert_eq!(a.dot(b), -5.0);
        assert_eq!(a.cross(b), -10.0);
    }

    #[test]
    fn test_position_displacement() {
        let p = Position::new(1.0, 1.0);
        let q = Position::new(4.0, 5.0);
        assert_eq!(p.displacement_to(q), Vec2::new(3.0, 4.0));
        assert_eq!(p.distance_to(q), 5.0);
        assert_eq!(p.offset_by(Vec2::new(3.0, 4.0)), q);
    }
}
