//! Synthetic driver data for tests and benchmarks.
//!
//! Generates fleets of drivers whose trips carry the defects real position
//! traces show (stops, spurious samples, gaps, hairpin artefacts) on top of
//! Gaussian position noise. Every driver has its own driving style, and a
//! configurable fraction of each driver's trips is driven in another
//! driver's style, providing ground truth for scoring.
//!
//! # Example
//!
//! ```rust
//! use tripscore::synthetic::SyntheticScenario;
//!
//! let dataset = SyntheticScenario::small_fleet().generate();
//! assert_eq!(dataset.drivers.len(), 4);
//! assert!(dataset.drivers.iter().all(|d| d.trips.len() == 20));
//! ```

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geometry::Position;
use crate::store::{DriverTripData, RawTrip};

// ============================================================================
// Types
// ============================================================================

/// Rates of the recording defects injected into every trip, per time step.
#[derive(Debug, Clone, Copy)]
pub struct DefectRates {
    /// Probability of the vehicle stopping for a few steps.
    pub stop: f64,
    /// Probability of a single spurious sample far off the track.
    pub spike: f64,
    /// Probability of losing several consecutive samples.
    pub gap: f64,
    /// Probability of a recorded U-turn within one step.
    pub hairpin: f64,
}

impl Default for DefectRates {
    fn default() -> Self {
        Self {
            stop: 0.005,
            spike: 0.004,
            gap: 0.002,
            hairpin: 0.001,
        }
    }
}

/// Description of a synthetic fleet.
#[derive(Debug, Clone)]
pub struct SyntheticScenario {
    pub driver_count: usize,
    pub trips_per_driver: usize,
    /// Range of trip lengths in time steps.
    pub trip_steps: (usize, usize),
    /// Range of the drivers' preferred cruise speeds (distance per step).
    pub cruise_speed: (f64, f64),
    /// Standard deviation of the position noise.
    pub noise_sigma: f64,
    pub defects: DefectRates,
    /// Fraction of each driver's trips driven in another driver's style.
    pub foreign_trip_fraction: f64,
    pub seed: u64,
}

/// A generated fleet.
#[derive(Debug, Clone)]
pub struct SyntheticDataset {
    pub drivers: Vec<DriverTripData>,
    /// `(driver_id, trip_id)` of every trip driven in a foreign style.
    pub foreign_trips: Vec<(i32, i32)>,
}

impl SyntheticDataset {
    pub fn trip_count(&self) -> usize {
        self.drivers.iter().map(|d| d.trips.len()).sum()
    }

    pub fn is_foreign(&self, driver_id: i32, trip_id: i32) -> bool {
        self.foreign_trips.contains(&(driver_id, trip_id))
    }
}

/// How one driver drives.
#[derive(Debug, Clone, Copy)]
struct DrivingStyle {
    cruise_speed: f64,
    /// Standard deviation of the per-step speed change.
    speed_variation: f64,
    /// Largest heading change per step on a regular road (radians).
    turn_rate: f64,
}

// ============================================================================
// Generation
// ============================================================================

/// Standard normal sample (Box-Muller).
fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(0.0001..1.0);
    let u2: f64 = rng.r#gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn random_style(rng: &mut StdRng, cruise_speed: (f64, f64)) -> DrivingStyle {
    DrivingStyle {
        cruise_speed: rng.gen_range(cruise_speed.0..=cruise_speed.1),
        speed_variation: rng.gen_range(0.3..1.5),
        turn_rate: rng.gen_range(0.02..0.25),
    }
}

fn noisy(x: f64, y: f64, sigma: f64, rng: &mut StdRng) -> Position {
    Position::new(
        (x + sigma * gaussian(rng)) as f32,
        (y + sigma * gaussian(rng)) as f32,
    )
}

/// Generate the raw positions of one trip.
fn generate_trip(
    style: &DrivingStyle,
    steps: usize,
    noise_sigma: f64,
    defects: &DefectRates,
    rng: &mut StdRng,
) -> Vec<Position> {
    let mut points = Vec::with_capacity(steps + 1);
    let (mut x, mut y) = (0.0f64, 0.0f64);
    let mut heading: f64 = rng.gen_range(0.0..(2.0 * PI));
    let mut speed = style.cruise_speed;
    points.push(noisy(x, y, noise_sigma, rng));

    let mut step = 0;
    while step < steps {
        let roll: f64 = rng.r#gen();
        if roll < defects.stop {
            // Standing still: repeated samples at the same spot
            let duration = rng.gen_range(3..15);
            for _ in 0..duration {
                points.push(Position::new(x as f32, y as f32));
            }
            speed = 0.3 * style.cruise_speed;
            step += duration;
            continue;
        }

        heading += rng.gen_range(-style.turn_rate..=style.turn_rate);
        let pull = 0.1 * (style.cruise_speed - speed);
        speed = (speed + pull + style.speed_variation * gaussian(rng))
            .min(3.0 * style.cruise_speed)
            .max(2.0);

        if roll < defects.stop + defects.hairpin {
            heading += PI;
        }
        x += speed * heading.cos();
        y += speed * heading.sin();
        step += 1;

        if roll < defects.stop + defects.hairpin + defects.gap {
            // Lost samples: the vehicle moves on unrecorded
            let lost = rng.gen_range(5..20);
            for _ in 0..lost {
                x += speed * heading.cos();
                y += speed * heading.sin();
            }
            step += lost;
        } else if roll < defects.stop + defects.hairpin + defects.gap + defects.spike {
            let offset = rng.gen_range(60.0..200.0);
            let side = heading + PI / 2.0;
            points.push(noisy(x + offset * side.cos(), y + offset * side.sin(), noise_sigma, rng));
            continue;
        }

        points.push(noisy(x, y, noise_sigma, rng));
    }

    points
}

impl SyntheticScenario {
    /// Generate the fleet described by this scenario.
    pub fn generate(&self) -> SyntheticDataset {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let styles: Vec<DrivingStyle> = (0..self.driver_count)
            .map(|_| random_style(&mut rng, self.cruise_speed))
            .collect();

        let mut drivers = Vec::with_capacity(self.driver_count);
        let mut foreign_trips = Vec::new();
        for (index, own_style) in styles.iter().enumerate() {
            let driver_id = index as i32 + 1;
            let mut trips = Vec::with_capacity(self.trips_per_driver);
            for trip_index in 0..self.trips_per_driver {
                let trip_id = trip_index as i32 + 1;
                let foreign = self.driver_count > 1 && rng.r#gen::<f64>() < self.foreign_trip_fraction;
                let style = if foreign {
                    foreign_trips.push((driver_id, trip_id));
                    let other = (index + rng.gen_range(1..self.driver_count)) % self.driver_count;
                    &styles[other]
                } else {
                    own_style
                };
                let steps = rng.gen_range(self.trip_steps.0..=self.trip_steps.1);
                let points = generate_trip(style, steps, self.noise_sigma, &self.defects, &mut rng);
                trips.push(RawTrip { trip_id, points });
            }
            drivers.push(DriverTripData { driver_id, trips });
        }

        SyntheticDataset {
            drivers,
            foreign_trips,
        }
    }
}

// ============================================================================
// Predefined Scenarios
// ============================================================================

impl SyntheticScenario {
    /// 4 drivers with 20 short trips each. Fast enough for unit tests.
    pub fn small_fleet() -> Self {
        Self {
            driver_count: 4,
            trips_per_driver: 20,
            trip_steps: (60, 200),
            cruise_speed: (8.0, 20.0),
            noise_sigma: 0.5,
            defects: DefectRates::default(),
            foreign_trip_fraction: 0.1,
            seed: 42,
        }
    }

    /// 50 drivers with 200 trips each. Benchmark baseline.
    pub fn benchmark_fleet() -> Self {
        Self {
            driver_count: 50,
            trips_per_driver: 200,
            trip_steps: (200, 1500),
            cruise_speed: (6.0, 30.0),
            noise_sigma: 1.0,
            defects: DefectRates::default(),
            foreign_trip_fraction: 0.05,
            seed: 7,
        }
    }

    /// Defect-free fleet with noise-free positions.
    pub fn clean_fleet(driver_count: usize, trips_per_driver: usize) -> Self {
        Self {
            driver_count,
            trips_per_driver,
            trip_steps: (80, 160),
            cruise_speed: (8.0, 20.0),
            noise_sigma: 0.0,
            defects: DefectRates {
                stop: 0.0,
                spike: 0.0,
                gap: 0.0,
                hairpin: 0.0,
            },
            foreign_trip_fraction: 0.0,
            seed: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_is_deterministic() {
        let a = SyntheticScenario::small_fleet().generate();
        let b = SyntheticScenario::small_fleet().generate();
        assert_eq!(a.drivers, b.drivers);
        assert_eq!(a.foreign_trips, b.foreign_trips);
    }

    #[test]
    fn test_clean_fleet_has_one_point_per_step() {
        let dataset = SyntheticScenario::clean_fleet(2, 3).generate();
        for driver in &dataset.drivers {
            for trip in &driver.trips {
                assert!(trip.points.len() >= 81 && trip.points.len() <= 161);
            }
        }
        assert!(dataset.foreign_trips.is_empty());
    }
}
