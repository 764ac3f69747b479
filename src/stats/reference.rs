//! # Trip Metrics Reference
//!
//! Empirical model of a feature vector population: the rates of the two flags
//! plus one histogram per continuous feature, each built over the feature's
//! transformed values. Optionally, the fully valid vectors are standardised and
//! projected onto principal components, and every retained component gets a
//! histogram too.
//!
//! ## Population and driver references
//! [`TripMetricsReference::build`] fits a reference on the whole population,
//! choosing histogram edges at a high percentile cutoff of the sorted values.
//! [`TripMetricsReference::generate`] builds a driver reference on the same
//! edges with fewer bins, reusing the population's PCA projector and
//! standardisation, so both references score on the same axes and scales.
//!
//! ## Out-of-domain values
//! Values outside a transform's domain are folded into the underflow or
//! overflow bucket according to which side of the population's raw edges they
//! lie on and whether the transform reverses order. A feature with no
//! population value inside its domain at all (every trip drove at constant
//! speed, say) is kept as a degenerate dimension: it scores NaN, which the
//! combiners skip, and it is left out of the principal components.

use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{OptionExt, Result, TripScoreError};
use crate::metrics::{FEATURE_COUNT, Feature, FeatureTransform, TripMetrics};
use crate::stats::histogram::Histogram;
use crate::stats::pca::Pca;

/// Histogram and projection settings of a reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    /// Bins of every population histogram.
    /// Default: 200
    pub bins: usize,

    /// Bins of every driver (generated) histogram.
    /// Default: 35
    pub generated_bins: usize,

    /// Central percentage of the sorted population values that determines
    /// the histogram edges; the rest lands in underflow/overflow.
    /// Default: 99.9
    pub percentage_to_keep: f64,

    /// Principal component refinement, disabled when `None`.
    /// Default: None
    pub pca: Option<PcaConfig>,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            bins: 200,
            generated_bins: 35,
            percentage_to_keep: 99.9,
            pca: None,
        }
    }
}

/// Principal component refinement settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcaConfig {
    /// Cumulative explained variance the retained components must reach.
    /// Default: 0.95
    pub variance_to_retain: f64,

    /// Central percentage of each standardised feature kept when fitting the
    /// projector; samples outside it in any feature are left out of the fit.
    /// Default: 99.0
    pub outlier_percentage_to_keep: f64,
}

impl Default for PcaConfig {
    fn default() -> Self {
        Self {
            variance_to_retain: 0.95,
            outlier_percentage_to_keep: 99.0,
        }
    }
}

fn is_percentage(value: f64) -> bool {
    value > 0.0 && value <= 100.0
}

impl ReferenceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bins == 0 || self.generated_bins == 0 {
            return Err(TripScoreError::invalid_config("histogram bins must be at least 1"));
        }
        if !is_percentage(self.percentage_to_keep) {
            return Err(TripScoreError::invalid_config(format!(
                "percentage_to_keep must be in (0, 100], got {}",
                self.percentage_to_keep
            )));
        }
        if let Some(pca) = &self.pca {
            if !(pca.variance_to_retain > 0.0 && pca.variance_to_retain <= 1.0) {
                return Err(TripScoreError::invalid_config(format!(
                    "variance_to_retain must be in (0, 1], got {}",
                    pca.variance_to_retain
                )));
            }
            if !is_percentage(pca.outlier_percentage_to_keep) {
                return Err(TripScoreError::invalid_config(format!(
                    "outlier_percentage_to_keep must be in (0, 100], got {}",
                    pca.outlier_percentage_to_keep
                )));
            }
        }
        Ok(())
    }
}

/// Score of one feature vector against a reference.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricsScore {
    /// The trip kept no segment; the population rate of such trips.
    ZeroSegments(f64),
    /// The trip kept too few points; the population rate of such trips.
    TooFewPoints(f64),
    /// Density per feature, followed by the density per principal component.
    Densities(Vec<f64>),
}

impl MetricsScore {
    /// Densities of the score; a flag rate counts as a single dimension.
    pub fn densities(&self) -> &[f64] {
        match self {
            MetricsScore::ZeroSegments(rate) | MetricsScore::TooFewPoints(rate) => {
                std::slice::from_ref(rate)
            }
            MetricsScore::Densities(densities) => densities,
        }
    }

    pub fn is_flag_rate(&self) -> bool {
        !matches!(self, MetricsScore::Densities(_))
    }
}

/// One continuous feature: its transform and, unless the feature is
/// degenerate, the histogram its mapped values fall into.
#[derive(Debug, Clone)]
struct FeatureModel {
    feature: Feature,
    transform: FeatureTransform,
    /// `None` when no population value lies inside the transform's domain.
    binning: Option<FeatureBinning>,
}

/// Histogram of one feature plus what is needed to map raw values onto it.
#[derive(Debug, Clone)]
struct FeatureBinning {
    /// Raw values at the low and high edge index of the sorted population.
    raw_low: f64,
    raw_high: f64,
    reversed: bool,
    histogram: Histogram,
}

impl FeatureModel {
    fn fit(feature: Feature, values: Vec<f64>, bins: usize, percentage_to_keep: f64) -> Result<Self> {
        let transform = feature
            .transform()
            .ok_or_degenerate(feature.as_str())?;
        let mut sorted: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
        sorted.sort_by(f64::total_cmp);

        // Walk inwards until the edges are inside the transform's domain
        let edges = trimmed_indices(sorted.len(), percentage_to_keep).and_then(|(low, high)| {
            let low = (low..sorted.len()).find(|&i| transform.is_valid(sorted[i]))?;
            let high = (low..=high.max(low))
                .rev()
                .find(|&i| transform.is_valid(sorted[i]))?;
            Some((sorted[low], sorted[high]))
        });
        let Some((raw_low, raw_high)) = edges else {
            warn!("feature '{feature}' has no value inside its domain; it will not be scored");
            return Ok(Self {
                feature,
                transform,
                binning: None,
            });
        };

        let (mut low_edge, mut high_edge) = (transform.apply(raw_low), transform.apply(raw_high));
        let reversed = low_edge > high_edge;
        if reversed {
            std::mem::swap(&mut low_edge, &mut high_edge);
        }
        let (low_edge, high_edge) = widen_collapsed(feature.as_str(), low_edge, high_edge);

        let mut binning = FeatureBinning {
            raw_low,
            raw_high,
            reversed,
            histogram: Histogram::new(&[], bins, low_edge, high_edge)?,
        };
        let mapped = binning.map_all(feature, transform, &sorted)?;
        binning.histogram = Histogram::new(&mapped, bins, low_edge, high_edge)?;
        Ok(Self {
            feature,
            transform,
            binning: Some(binning),
        })
    }

    /// Same edges and domain mapping, different sample and bin count.
    fn regenerate(&self, values: &[f64], bins: usize) -> Result<Self> {
        let binning = match &self.binning {
            Some(binning) => {
                let mapped = binning.map_all(self.feature, self.transform, values)?;
                let histogram = Histogram::new(
                    &mapped,
                    bins,
                    binning.histogram.low_edge(),
                    binning.histogram.high_edge(),
                )?;
                Some(FeatureBinning {
                    histogram,
                    ..binning.clone()
                })
            }
            None => None,
        };
        Ok(Self {
            binning,
            ..self.clone()
        })
    }

    fn histogram(&self) -> Option<&Histogram> {
        self.binning.as_ref().map(|b| &b.histogram)
    }

    /// NaN for a degenerate feature.
    fn density(&self, value: f64) -> Result<f64> {
        match &self.binning {
            Some(binning) => {
                let mapped = binning.map_value(self.feature, self.transform, value)?;
                Ok(binning.histogram.probability(mapped))
            }
            None => Ok(f64::NAN),
        }
    }
}

impl FeatureBinning {
    fn map_all(&self, feature: Feature, transform: FeatureTransform, values: &[f64]) -> Result<Vec<f64>> {
        values
            .iter()
            .map(|&v| self.map_value(feature, transform, v))
            .collect()
    }

    /// Transformed value, or a value inside the matching boundary bucket.
    fn map_value(&self, feature: Feature, transform: FeatureTransform, value: f64) -> Result<f64> {
        if value.is_nan() {
            return Ok(f64::NAN);
        }
        if transform.is_valid(value) {
            return Ok(transform.apply(value));
        }

        let below = self.histogram.low_edge() - 1.0;
        let above = self.histogram.high_edge() + 1.0;
        let (under_raw_low, over_raw_high) = if self.reversed {
            (above, below)
        } else {
            (below, above)
        };
        if value < self.raw_low {
            Ok(under_raw_low)
        } else if value > self.raw_high {
            Ok(over_raw_high)
        } else {
            Err(TripScoreError::UnscorableValue {
                feature: feature.as_str(),
                value,
            })
        }
    }
}

/// Principal component histograms with the standardisation they were built on.
#[derive(Debug, Clone)]
struct ComponentModel {
    pca: Arc<Pca>,
    means: Vec<f64>,
    stds: Vec<f64>,
    components: usize,
    histograms: Vec<Histogram>,
}

impl ComponentModel {
    fn fit(
        features: &[FeatureModel],
        population: &[&TripMetrics],
        config: &ReferenceConfig,
        pca_config: &PcaConfig,
    ) -> Result<Self> {
        let usable: Vec<Feature> = features
            .iter()
            .filter(|m| m.binning.is_some())
            .map(|m| m.feature)
            .collect();
        let rows = transformed_rows(features, population);
        if rows.is_empty() || usable.is_empty() {
            return Err(TripScoreError::EmptyPopulation);
        }
        let width = usable.len();

        // Per-feature outlier windows on the transformed values
        let mut windows = Vec::with_capacity(width);
        for j in 0..width {
            let mut column: Vec<f64> = rows.iter().map(|row| row[j]).collect();
            column.sort_by(f64::total_cmp);
            let (lo, hi) = trimmed_indices(column.len(), pca_config.outlier_percentage_to_keep)
                .ok_or_empty_population()?;
            windows.push((column[lo], column[hi]));
        }
        let trimmed: Vec<&Vec<f64>> = rows
            .iter()
            .filter(|row| {
                row.iter()
                    .zip(&windows)
                    .all(|(v, (lo, hi))| v >= lo && v <= hi)
            })
            .collect();
        if trimmed.is_empty() {
            return Err(TripScoreError::EmptyPopulation);
        }

        let n = trimmed.len() as f64;
        let mut means = vec![0.0; width];
        let mut stds = vec![0.0; width];
        for j in 0..width {
            let mean = trimmed.iter().map(|row| row[j]).sum::<f64>() / n;
            let variance = trimmed.iter().map(|row| (row[j] - mean).powi(2)).sum::<f64>() / n;
            means[j] = mean;
            stds[j] = if variance > 0.0 {
                variance.sqrt()
            } else {
                warn!(
                    "feature '{}' is constant in the PCA sample; not scaling it",
                    usable[j]
                );
                1.0
            };
        }

        let standardise = |row: &[f64]| -> Vec<f64> {
            row.iter()
                .zip(means.iter().zip(&stds))
                .map(|(v, (mean, std))| (v - mean) / std)
                .collect()
        };
        let fit_sample: Vec<Vec<f64>> = trimmed.iter().map(|row| standardise(row.as_slice())).collect();
        let pca = Pca::fit(&fit_sample)?;
        let components = pca.retained_components(pca_config.variance_to_retain);
        info!(
            "PCA retains {} of {} components ({:.1}% of the variance)",
            components,
            pca.dimension(),
            100.0 * pca.explained_variance_ratios()[..components].iter().sum::<f64>()
        );

        let mut projected = Vec::with_capacity(rows.len());
        for row in &rows {
            projected.push(pca.project(&standardise(row.as_slice()), components)?);
        }

        let mut histograms = Vec::with_capacity(components);
        for c in 0..components {
            let mut column: Vec<f64> = projected.iter().map(|p| p[c]).collect();
            column.sort_by(f64::total_cmp);
            let (lo, hi) = trimmed_indices(column.len(), config.percentage_to_keep)
                .ok_or_empty_population()?;
            let (low_edge, high_edge) = widen_collapsed("principal component", column[lo], column[hi]);
            histograms.push(Histogram::new(&column, config.bins, low_edge, high_edge)?);
        }

        Ok(Self {
            pca: Arc::new(pca),
            means,
            stds,
            components,
            histograms,
        })
    }

    fn regenerate(
        &self,
        features: &[FeatureModel],
        population: &[&TripMetrics],
        bins: usize,
    ) -> Result<Self> {
        let mut projected = Vec::new();
        for row in transformed_rows(features, population) {
            projected.push(self.project(&row)?);
        }
        let mut histograms = Vec::with_capacity(self.components);
        for (c, reference) in self.histograms.iter().enumerate() {
            let column: Vec<f64> = projected.iter().map(|p| p[c]).collect();
            histograms.push(Histogram::new(
                &column,
                bins,
                reference.low_edge(),
                reference.high_edge(),
            )?);
        }
        Ok(Self {
            histograms,
            ..self.clone()
        })
    }

    fn project(&self, transformed: &[f64]) -> Result<Vec<f64>> {
        let standardised: Vec<f64> = transformed
            .iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(v, (mean, std))| (v - mean) / std)
            .collect();
        self.pca.project(&standardised, self.components)
    }

    /// Densities per component, NaN when any feature is outside its domain.
    fn densities(&self, features: &[FeatureModel], metrics: &TripMetrics) -> Result<Vec<f64>> {
        match transformed_row(features, metrics) {
            Some(row) => Ok(self
                .project(&row)?
                .into_iter()
                .zip(&self.histograms)
                .map(|(v, h)| h.probability(v))
                .collect()),
            None => Ok(vec![f64::NAN; self.components]),
        }
    }
}

/// Transformed non-degenerate features of a vector, `None` if any is outside its domain.
fn transformed_row(features: &[FeatureModel], metrics: &TripMetrics) -> Option<Vec<f64>> {
    features
        .iter()
        .zip(metrics.continuous_values())
        .filter(|(model, _)| model.binning.is_some())
        .map(|(model, &v)| model.transform.is_valid(v).then(|| model.transform.apply(v)))
        .collect()
}

fn transformed_rows(features: &[FeatureModel], population: &[&TripMetrics]) -> Vec<Vec<f64>> {
    population
        .iter()
        .filter_map(|m| transformed_row(features, m))
        .collect()
}

/// Indices bounding the central `percentage` of `len` sorted values.
fn trimmed_indices(len: usize, percentage: f64) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let tail = (len as f64 * (100.0 - percentage) / 200.0).floor() as usize;
    let low = tail.min(len - 1);
    let high = (len - 1).saturating_sub(tail).max(low);
    Some((low, high))
}

/// Give a histogram whose edges coincide a unit-wide range around them.
fn widen_collapsed(name: &str, low_edge: f64, high_edge: f64) -> (f64, f64) {
    if high_edge - low_edge > f64::EPSILON * low_edge.abs().max(1.0) {
        (low_edge, high_edge)
    } else {
        warn!("histogram edges of '{name}' collapse at {low_edge}; widening by 0.5");
        (low_edge - 0.5, high_edge + 0.5)
    }
}

fn flag_rates(metrics: &[TripMetrics]) -> (f64, f64) {
    let n = metrics.len() as f64;
    let zero = metrics.iter().filter(|m| m.has_zero_segments()).count() as f64;
    let few = metrics
        .iter()
        .filter(|m| !m.has_zero_segments() && m.has_too_few_points())
        .count() as f64;
    (zero / n, few / n)
}

fn check_dimension(metrics: &TripMetrics) -> Result<()> {
    if metrics.values().len() != FEATURE_COUNT {
        return Err(TripScoreError::DimensionMismatch {
            expected: FEATURE_COUNT,
            actual: metrics.values().len(),
        });
    }
    Ok(())
}

/// One feature's values across `population`.
fn feature_column(population: &[&TripMetrics], feature: Feature) -> Vec<f64> {
    population.iter().map(|m| m.value(feature)).collect()
}

/// Statistical model of a feature vector population.
#[derive(Debug, Clone)]
pub struct TripMetricsReference {
    zero_segments_rate: f64,
    too_few_points_rate: f64,
    features: Vec<FeatureModel>,
    components: Option<ComponentModel>,
    generated: bool,
}

impl TripMetricsReference {
    /// Fit a population-wide reference.
    pub fn build(population: &[TripMetrics], config: &ReferenceConfig) -> Result<Self> {
        config.validate()?;
        if population.is_empty() {
            return Err(TripScoreError::EmptyPopulation);
        }
        population.iter().try_for_each(check_dimension)?;

        let (zero_segments_rate, too_few_points_rate) = flag_rates(population);
        let unflagged: Vec<&TripMetrics> = population.iter().filter(|m| !m.is_flagged()).collect();
        if unflagged.is_empty() {
            return Err(TripScoreError::EmptyPopulation);
        }

        let fit = |feature: &Feature| {
            FeatureModel::fit(
                *feature,
                feature_column(&unflagged, *feature),
                config.bins,
                config.percentage_to_keep,
            )
        };
        #[cfg(feature = "parallel")]
        let features: Vec<FeatureModel> = {
            use rayon::prelude::*;
            Feature::continuous()
                .par_iter()
                .map(fit)
                .collect::<Result<_>>()?
        };
        #[cfg(not(feature = "parallel"))]
        let features: Vec<FeatureModel> = Feature::continuous()
            .iter()
            .map(fit)
            .collect::<Result<_>>()?;

        let components = match &config.pca {
            Some(pca_config) => Some(ComponentModel::fit(&features, &unflagged, config, pca_config)?),
            None => None,
        };

        info!(
            "built population reference from {} trips ({} unflagged, {} histograms)",
            population.len(),
            unflagged.len(),
            features.len() + components.as_ref().map_or(0, |c| c.components)
        );

        Ok(Self {
            zero_segments_rate,
            too_few_points_rate,
            features,
            components,
            generated: false,
        })
    }

    /// Build a driver reference on this reference's edges and projector.
    ///
    /// A driver whose trips are all flagged gets empty (all-zero) histograms.
    pub fn generate(&self, driver_metrics: &[TripMetrics], config: &ReferenceConfig) -> Result<Self> {
        config.validate()?;
        if driver_metrics.is_empty() {
            return Err(TripScoreError::EmptyPopulation);
        }
        driver_metrics.iter().try_for_each(check_dimension)?;

        let (zero_segments_rate, too_few_points_rate) = flag_rates(driver_metrics);
        let unflagged: Vec<&TripMetrics> = driver_metrics.iter().filter(|m| !m.is_flagged()).collect();

        let features = self
            .features
            .iter()
            .map(|model| model.regenerate(&feature_column(&unflagged, model.feature), config.generated_bins))
            .collect::<Result<Vec<_>>>()?;

        let components = match &self.components {
            Some(model) => Some(model.regenerate(&self.features, &unflagged, config.generated_bins)?),
            None => None,
        };

        debug!(
            "generated reference from {} trips ({} unflagged)",
            driver_metrics.len(),
            unflagged.len()
        );

        Ok(Self {
            zero_segments_rate,
            too_few_points_rate,
            features,
            components,
            generated: true,
        })
    }

    /// Score a feature vector.
    ///
    /// Flagged vectors get the matching flag rate; others one density per
    /// scoring dimension (see [`dimension`](Self::dimension)).
    pub fn score(&self, metrics: &TripMetrics) -> Result<MetricsScore> {
        check_dimension(metrics)?;
        if metrics.has_zero_segments() {
            return Ok(MetricsScore::ZeroSegments(self.zero_segments_rate));
        }
        if metrics.has_too_few_points() {
            return Ok(MetricsScore::TooFewPoints(self.too_few_points_rate));
        }

        let mut densities = Vec::with_capacity(self.dimension());
        for (model, &value) in self.features.iter().zip(metrics.continuous_values()) {
            densities.push(model.density(value)?);
        }
        if let Some(components) = &self.components {
            densities.extend(components.densities(&self.features, metrics)?);
        }
        Ok(MetricsScore::Densities(densities))
    }

    /// Number of densities in a [`MetricsScore::Densities`].
    pub fn dimension(&self) -> usize {
        self.features.len() + self.components.as_ref().map_or(0, |c| c.components)
    }

    /// Histograms of the scored dimensions, in scoring-dimension order.
    /// Degenerate features have none.
    pub fn histograms(&self) -> impl Iterator<Item = &Histogram> {
        self.features
            .iter()
            .filter_map(FeatureModel::histogram)
            .chain(self.components.iter().flat_map(|c| c.histograms.iter()))
    }

    /// Histogram of a continuous feature, `None` if the feature is degenerate.
    pub fn feature_histogram(&self, feature: Feature) -> Option<&Histogram> {
        self.features
            .iter()
            .find(|m| m.feature == feature)
            .and_then(FeatureModel::histogram)
    }

    /// Features without any population value inside their transform's domain.
    ///
    /// They keep their place in the scoring dimensions but always score NaN.
    pub fn degenerate_features(&self) -> Vec<Feature> {
        self.features
            .iter()
            .filter(|m| m.binning.is_none())
            .map(|m| m.feature)
            .collect()
    }

    /// Normalised standard deviation per scoring dimension (NaN for degenerate features).
    pub fn normalised_standard_deviations(&self) -> Vec<f64> {
        let features = self.features.iter().map(|m| {
            m.histogram()
                .map_or(f64::NAN, Histogram::normalised_standard_deviation)
        });
        let components = self
            .components
            .iter()
            .flat_map(|c| c.histograms.iter())
            .map(Histogram::normalised_standard_deviation);
        features.chain(components).collect()
    }

    /// Projector shared by this reference and the references generated from it.
    pub fn pca(&self) -> Option<&Arc<Pca>> {
        self.components.as_ref().map(|c| &c.pca)
    }

    pub fn zero_segments_rate(&self) -> f64 {
        self.zero_segments_rate
    }

    pub fn too_few_points_rate(&self) -> f64 {
        self.too_few_points_rate
    }

    /// Whether this is a driver reference built by [`generate`](Self::generate).
    pub fn is_generated(&self) -> bool {
        self.generated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trimmed_indices() {
        assert_eq!(trimmed_indices(0, 99.9), None);
        assert_eq!(trimmed_indices(1, 99.9), Some((0, 0)));
        assert_eq!(trimmed_indices(1000, 99.0), Some((5, 994)));
        assert_eq!(trimmed_indices(10, 100.0), Some((0, 9)));
    }

    #[test]
    fn test_widen_collapsed() {
        assert_eq!(widen_collapsed("x", 1.0, 1.0), (0.5, 1.5));
        assert_eq!(widen_collapsed("x", 1.0, 2.0), (1.0, 2.0));
    }

    #[test]
    fn test_out_of_domain_values_fold_by_direction() {
        // Lower acceleration quantile: log10(-v), valid for v < 0, reversing order
        let values = vec![-8.0, -4.0, -2.0, -1.0, 0.5];
        let model = FeatureModel::fit(Feature::AccelerationP05, values, 10, 100.0).unwrap();
        let binning = model.binning.as_ref().unwrap();
        assert!(binning.reversed);
        assert_eq!(binning.raw_low, -8.0);
        assert_eq!(binning.raw_high, -1.0);

        // Positive raw values lie above raw_high; reversed, they map to underflow
        let folded = binning.map_value(model.feature, model.transform, 3.0).unwrap();
        assert!(folded < binning.histogram.low_edge());
        assert!(model.density(3.0).unwrap() > 0.0);
    }

    #[test]
    fn test_feature_without_domain_values_is_degenerate() {
        let model = FeatureModel::fit(Feature::AccelerationP05, vec![0.0, 0.0, 1.0], 10, 100.0).unwrap();
        assert!(model.binning.is_none());
        assert!(model.density(-1.0).unwrap().is_nan());
        assert!(model.regenerate(&[-2.0], 5).unwrap().binning.is_none());
    }
}
