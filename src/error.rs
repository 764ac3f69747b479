//! Unified error handling.
//!
//! Every fallible operation in the crate returns [`Result`]. There is no
//! partial-failure mode: an error anywhere in a batch aborts the batch and is
//! handed back to the orchestrating caller.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading, segmenting, modelling or scoring trips.
#[derive(Error, Debug)]
pub enum TripScoreError {
    /// A driver file or directory could not be read or written.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A driver key could not be turned into a numeric driver id.
    #[error("invalid driver key '{0}': expected a numeric id")]
    InvalidDriverKey(String),

    /// A text record (CSV trip file) could not be parsed.
    #[error("malformed record in {} at line {line}", path.display())]
    MalformedRecord { path: PathBuf, line: usize },

    /// A feature vector does not have the dimensionality the model expects.
    #[error("dimension mismatch: expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A driver group does not contain the expected number of trips.
    #[error("driver {driver_id} has {actual} trips, expected {expected}")]
    GroupSizeMismatch {
        driver_id: i32,
        expected: usize,
        actual: usize,
    },

    /// A reference was requested for an empty population.
    #[error("cannot build a reference from an empty population")]
    EmptyPopulation,

    /// No sample of the population has a value inside the feature's domain.
    #[error("feature '{feature}' has no valid values in the population")]
    DegenerateFeature { feature: &'static str },

    /// Histogram parameters do not describe a usable binning.
    #[error("invalid histogram: {bins} bins over [{low_edge}, {high_edge}]")]
    InvalidHistogram {
        bins: usize,
        low_edge: f64,
        high_edge: f64,
    },

    /// NaN or infinite input where finite numbers are required.
    #[error("non-finite input: {context}")]
    NonFiniteInput { context: String },

    /// Linear algebra failure (eigendecomposition).
    #[error("linear algebra error: {0}")]
    Linalg(String),

    /// A value outside the transform domain that cannot be mapped to a boundary bucket.
    #[error("cannot score value {value} for feature '{feature}'")]
    UnscorableValue { feature: &'static str, value: f64 },

    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A worker thread panicked while processing a batch.
    #[error("a worker thread panicked")]
    WorkerPanicked,
}

/// Result type alias for trip scoring operations.
pub type Result<T> = std::result::Result<T, TripScoreError>;

impl TripScoreError {
    /// Wrap an I/O error together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a non-finite input error.
    pub fn non_finite(context: impl Into<String>) -> Self {
        Self::NonFiniteInput {
            context: context.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Extension trait turning empty options into crate errors.
pub trait OptionExt<T> {
    /// Convert `None` into [`TripScoreError::DegenerateFeature`].
    fn ok_or_degenerate(self, feature: &'static str) -> Result<T>;

    /// Convert `None` into [`TripScoreError::EmptyPopulation`].
    fn ok_or_empty_population(self) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_degenerate(self, feature: &'static str) -> Result<T> {
        self.ok_or(TripScoreError::DegenerateFeature { feature })
    }

    fn ok_or_empty_population(self) -> Result<T> {
        self.ok_or(TripScoreError::EmptyPopulation)
    }
}
