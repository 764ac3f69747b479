//! Clean movement segments.
//!
//! A segment is a contiguous run of raw positions judged free of stops,
//! jitter spikes, gaps and impossible turns. It is stored as an origin plus
//! the velocity vectors between consecutive points (one time unit apart), so
//! every derived quantity is a function of those velocities.

use std::ops::Range;

use crate::geometry::{Position, Vec2, signed_angle};

/// A jitter-free run of positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    origin: Position,
    velocities: Vec<Vec2>,
    /// Index of the first point in the trip's raw data.
    first_index: usize,
}

impl Segment {
    /// Build a segment from a run of raw points starting at `first_index`.
    ///
    /// The segmentation engine only emits runs of at least two points.
    pub(crate) fn from_points(points: &[Position], first_index: usize) -> Self {
        debug_assert!(points.len() >= 2, "segment needs at least two points");
        let velocities = points
            .windows(2)
            .map(|pair| pair[0].displacement_to(pair[1]))
            .collect();
        Self {
            origin: points[0],
            velocities,
            first_index,
        }
    }

    pub fn origin(&self) -> Position {
        self.origin
    }

    pub fn velocities(&self) -> &[Vec2] {
        &self.velocities
    }

    /// Number of underlying points (velocity count + 1).
    pub fn point_count(&self) -> usize {
        self.velocities.len() + 1
    }

    /// Indices of the segment's points in the owning trip's raw data.
    pub fn source_range(&self) -> Range<usize> {
        self.first_index..self.first_index + self.point_count()
    }

    /// Reconstruct the positions from the origin and the velocity vectors.
    pub fn data_points(&self) -> Vec<Position> {
        let mut points = Vec::with_capacity(self.point_count());
        let mut current = self.origin.to_vec2();
        points.push(self.origin);
        for v in &self.velocities {
            current = current.add(*v);
            points.push(Position::new(current.x as f32, current.y as f32));
        }
        points
    }

    /// Speed per time step (distance covered between consecutive points).
    pub fn speed_values(&self) -> Vec<f64> {
        self.velocities.iter().map(|v| v.magnitude()).collect()
    }

    /// Change of speed between consecutive steps.
    pub fn acceleration_values(&self) -> Vec<f64> {
        self.speed_values()
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect()
    }

    /// Mean speed of two consecutive steps times the acceleration between them.
    pub fn speed_x_acceleration_values(&self) -> Vec<f64> {
        self.speed_values()
            .windows(2)
            .map(|pair| 0.5 * (pair[0] + pair[1]) * (pair[1] - pair[0]))
            .collect()
    }

    /// Signed heading change between consecutive velocity vectors (radians).
    pub fn direction_values(&self) -> Vec<f64> {
        self.velocities
            .windows(2)
            .map(|pair| signed_angle(pair[0], pair[1]))
            .collect()
    }

    /// Distance travelled along the segment.
    pub fn travel_length(&self) -> f64 {
        self.velocities.iter().map(|v| v.magnitude()).sum()
    }

    /// Time spent in the segment, in time steps.
    pub fn travel_duration(&self) -> u64 {
        self.velocities.len() as u64
    }
}
