//! Statistical models of feature vector populations.
//!
//! This module provides:
//! - [`histogram`]: binned density estimator with underflow/overflow buckets
//! - [`pca`]: principal component projection (symmetric eigendecomposition)
//! - [`reference`]: per-feature histogram bundles that score feature vectors

pub mod histogram;
pub mod pca;
pub mod reference;

pub use histogram::Histogram;
pub use pca::Pca;
pub use reference::{MetricsScore, PcaConfig, ReferenceConfig, TripMetricsReference};
