//! # Trip Scoring
//!
//! Scores every trip by how much more plausible it is under its own driver's
//! reference than under the population reference.
//!
//! For every scoring dimension the population density `p` and the driver
//! density `e` give a ratio `e / (p + e)`; a [`ScoreCombiner`] merges the
//! ratios of one trip into a probability in `[0, 1]`. Dimensions whose ratio is
//! not a finite number are skipped; a trip without any finite ratio scores 0.5.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TripScoreError};
use crate::metrics::TripMetrics;
use crate::pipeline::progress::{PipelinePhase, ProgressCallback};
use crate::pipeline::sort_by_driver;
use crate::stats::reference::{ReferenceConfig, TripMetricsReference};

/// Score given when no dimension yields a usable ratio.
pub const UNDECIDED_SCORE: f64 = 0.5;

/// Merges per-dimension densities of one trip into a single probability.
pub trait ScoreCombiner: Send + Sync {
    /// Combine `population[i]` and `driver[i]` densities. `importance[i]` is the
    /// population histogram's normalised standard deviation of dimension `i`.
    fn combine(&self, population: &[f64], driver: &[f64], importance: &[f64]) -> f64;
}

/// Built-in combination strategies.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "prior", rename_all = "snake_case")]
pub enum Combination {
    /// Plain mean of the ratios.
    #[default]
    Unweighted,
    /// Mean weighted by each dimension's importance.
    StdWeighted,
    /// Ratios `πe / (πe + (1 - π)p)` with prior proportion `π` of driver trips.
    Prior(f64),
}

impl Combination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Combination::Unweighted => "unweighted",
            Combination::StdWeighted => "std_weighted",
            Combination::Prior(_) => "prior",
        }
    }

    fn ratio(&self, population: f64, driver: f64) -> f64 {
        match *self {
            Combination::Prior(prior) => {
                prior * driver / (prior * driver + (1.0 - prior) * population)
            }
            _ => driver / (population + driver),
        }
    }
}

impl ScoreCombiner for Combination {
    fn combine(&self, population: &[f64], driver: &[f64], importance: &[f64]) -> f64 {
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        for (i, (&p, &e)) in population.iter().zip(driver).enumerate() {
            let ratio = self.ratio(p, e);
            let weight = match self {
                Combination::StdWeighted => importance.get(i).copied().unwrap_or(1.0),
                _ => 1.0,
            };
            if !ratio.is_finite() || !weight.is_finite() || weight <= 0.0 {
                continue;
            }
            weighted_sum += weight * ratio;
            weight_total += weight;
        }
        if weight_total > 0.0 {
            weighted_sum / weight_total
        } else {
            UNDECIDED_SCORE
        }
    }
}

/// Scoring configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Population and driver reference settings.
    pub reference: ReferenceConfig,

    /// How per-dimension ratios are merged.
    /// Default: Unweighted
    pub combination: Combination,

    /// Reject drivers whose trip count differs from this.
    /// Default: None
    pub expected_trips_per_driver: Option<usize>,
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        self.reference.validate()?;
        if let Combination::Prior(prior) = self.combination {
            if !(prior > 0.0 && prior < 1.0) {
                return Err(TripScoreError::invalid_config(format!(
                    "prior must be in (0, 1), got {prior}"
                )));
            }
        }
        Ok(())
    }
}

/// Final anomaly probability of one trip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TripScore {
    pub driver_id: i32,
    pub trip_id: i32,
    pub probability: f64,
}

/// Score one trip against both references.
pub fn score_trip(
    metrics: &TripMetrics,
    population: &TripMetricsReference,
    driver: &TripMetricsReference,
    combiner: &dyn ScoreCombiner,
    importance: &[f64],
) -> Result<f64> {
    let population_score = population.score(metrics)?;
    let driver_score = driver.score(metrics)?;
    let (p, e) = (population_score.densities(), driver_score.densities());
    if p.len() != e.len() {
        return Err(TripScoreError::DimensionMismatch {
            expected: p.len(),
            actual: e.len(),
        });
    }
    let importance = if population_score.is_flag_rate() {
        &[1.0][..]
    } else {
        importance
    };
    Ok(combiner.combine(p, e, importance))
}

/// Score every trip with the configured combination strategy.
pub fn score_trips(
    metrics: Vec<TripMetrics>,
    config: &ScoringConfig,
    progress: &dyn ProgressCallback,
) -> Result<Vec<TripScore>> {
    score_trips_with(metrics, config, &config.combination, progress)
}

/// Score every trip with a custom combination strategy.
///
/// Builds the population reference, then for each driver (in driver id order)
/// a driver reference on the population edges, and scores the driver's trips
/// against both. Runs on the calling thread.
pub fn score_trips_with(
    mut metrics: Vec<TripMetrics>,
    config: &ScoringConfig,
    combiner: &dyn ScoreCombiner,
    progress: &dyn ProgressCallback,
) -> Result<Vec<TripScore>> {
    config.validate()?;
    sort_by_driver(&mut metrics);

    let population = TripMetricsReference::build(&metrics, &config.reference)?;
    let importance = population.normalised_standard_deviations();

    let groups: Vec<&[TripMetrics]> = metrics
        .chunk_by(|a, b| a.driver_id == b.driver_id)
        .collect();
    progress.on_phase(PipelinePhase::Scoring, u32::try_from(groups.len()).unwrap_or(u32::MAX));
    info!("scoring {} trips of {} drivers", metrics.len(), groups.len());

    let mut scores = Vec::with_capacity(metrics.len());
    for group in groups {
        let driver_id = group[0].driver_id;
        if let Some(expected) = config.expected_trips_per_driver {
            if group.len() != expected {
                return Err(TripScoreError::GroupSizeMismatch {
                    driver_id,
                    expected,
                    actual: group.len(),
                });
            }
        }

        let driver = population.generate(group, &config.reference)?;
        for trip in group {
            let probability = score_trip(trip, &population, &driver, combiner, &importance)?;
            scores.push(TripScore {
                driver_id,
                trip_id: trip.trip_id,
                probability,
            });
        }
        debug!("scored {} trips of driver {}", group.len(), driver_id);
        progress.on_progress();
    }

    info!("scored {} trips", scores.len());
    Ok(scores)
}
