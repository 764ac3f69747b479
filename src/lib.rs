//! # Trip Score
//!
//! Batch analytics over noisy position traces of a population of drivers.
//!
//! This library provides:
//! - Trajectory segmentation that removes stops, spurious samples, gaps and
//!   impossible turns from raw traces
//! - Per-trip kinematic feature vectors (speed, acceleration, heading change
//!   quantiles, turn accumulation, data quality flags)
//! - A fork/join worker pool extracting feature vectors for every driver of a
//!   store, with thread-safe progress reporting
//! - Empirical histogram references (optionally refined by principal
//!   components) for the whole population and for each driver
//! - Scoring of every trip by how well it fits its driver compared to the population
//!
//! ## Features
//!
//! - **`parallel`** - Build reference histograms in parallel with rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use tripscore::{MetricsConfig, Position, Trip};
//!
//! // A straight trip at one unit per time step
//! let points: Vec<Position> = (0..20).map(|i| Position::new(i as f32, 0.0)).collect();
//! let trip = Trip::new(1, points);
//!
//! assert_eq!(trip.segments().len(), 1);
//! assert_eq!(trip.travel_duration(), 19);
//!
//! let metrics = trip.metrics(7, &MetricsConfig::default());
//! assert!(!metrics.is_flagged());
//! ```

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, TripScoreError};

// Planar positions, velocity vectors and turn angles
pub mod geometry;
pub use geometry::{Position, Vec2, signed_angle};

// Multi-pass trajectory cleaning
pub mod segmentation;
pub use segmentation::{ExtraTravel, Segmentation, SegmentationConfig, segment_positions};

pub mod segment;
pub use segment::Segment;

pub mod trip;
pub use trip::Trip;

// Feature vectors
pub mod metrics;
pub use metrics::{
    FEATURE_COUNT, Feature, FeatureTransform, HISTOGRAM_FEATURE_COUNT, MetricsConfig,
    QUANTILE_PERCENTS, TripMetrics, quantiles,
};

pub mod driver;
pub use driver::Driver;

// Histograms, PCA and population references
pub mod stats;
pub use stats::{Histogram, MetricsScore, Pca, PcaConfig, ReferenceConfig, TripMetricsReference};

// Concurrent loading and feature extraction
pub mod pipeline;
pub use pipeline::{
    InMemorySource, NoopProgress, PhaseCounts, PhaseTracker, PipelineConfig, PipelinePhase,
    ProcessLogger, ProgressCallback, TripDataSource, load_all_drivers, produce_trip_metrics,
    sort_by_driver,
};

// Population vs driver scoring
pub mod scoring;
pub use scoring::{
    Combination, ScoreCombiner, ScoringConfig, TripScore, score_trip, score_trips,
    score_trips_with,
};

// Per-driver binary store and CSV import
pub mod store;
pub use store::{DriverStore, DriverTripData, RawTrip, parse_driver_id};

// Score and feature text export
pub mod export;

// Synthetic driver fleets for tests and benchmarks
pub mod synthetic;
