//! Principal component analysis.

use nalgebra::{DMatrix, DVector, SymmetricEigen};

use crate::error::{Result, TripScoreError};

/// Fitted principal component projector.
///
/// Components are ordered by decreasing explained variance.
#[derive(Debug, Clone, PartialEq)]
pub struct Pca {
    means: DVector<f64>,
    /// Eigenvalue magnitudes normalised to sum to one.
    explained_variance: Vec<f64>,
    /// Unit eigenvectors, one per column, in component order.
    components: DMatrix<f64>,
}

impl Pca {
    /// Fit on `samples` (one row per sample, equal lengths, finite values).
    pub fn fit(samples: &[Vec<f64>]) -> Result<Self> {
        let first = samples.first().ok_or(TripScoreError::EmptyPopulation)?;
        let dimension = first.len();
        if dimension == 0 {
            return Err(TripScoreError::DimensionMismatch {
                expected: 1,
                actual: 0,
            });
        }

        let n = samples.len() as f64;
        let mut means = DVector::<f64>::zeros(dimension);
        for sample in samples {
            if sample.len() != dimension {
                return Err(TripScoreError::DimensionMismatch {
                    expected: dimension,
                    actual: sample.len(),
                });
            }
            if sample.iter().any(|v| !v.is_finite()) {
                return Err(TripScoreError::non_finite("PCA fit sample"));
            }
            means += DVector::from_column_slice(sample);
        }
        means /= n;

        // Covariance from the scatter matrix, normalised by the sample count
        let mut covariance = DMatrix::<f64>::zeros(dimension, dimension);
        for sample in samples {
            let d = DVector::from_column_slice(sample) - &means;
            covariance += &d * d.transpose();
        }
        covariance /= n;

        let eigen = SymmetricEigen::new(covariance);

        let mut pairs: Vec<(f64, DVector<f64>)> = eigen
            .eigenvalues
            .iter()
            .enumerate()
            .map(|(i, &v)| (v.abs(), eigen.eigenvectors.column(i).into_owned()))
            .collect();
        let total: f64 = pairs.iter().map(|(v, _)| v).sum();
        if !total.is_finite() || total <= 0.0 {
            return Err(TripScoreError::Linalg(format!(
                "covariance has no usable variance (eigenvalue sum {total})"
            )));
        }
        pairs.sort_by(|a, b| b.0.total_cmp(&a.0));

        let explained_variance = pairs.iter().map(|(v, _)| v / total).collect();
        let columns: Vec<DVector<f64>> = pairs.into_iter().map(|(_, vector)| vector).collect();
        let components = DMatrix::from_columns(&columns);

        Ok(Self {
            means,
            explained_variance,
            components,
        })
    }

    /// Number of input features.
    pub fn dimension(&self) -> usize {
        self.means.len()
    }

    /// Fraction of the total variance carried by each component.
    pub fn explained_variance_ratios(&self) -> &[f64] {
        &self.explained_variance
    }

    /// Smallest number of leading components whose cumulative explained
    /// variance reaches `ratio` (at least one, at most all).
    pub fn retained_components(&self, ratio: f64) -> usize {
        let mut retained = 0.0;
        for (i, v) in self.explained_variance.iter().enumerate() {
            retained += v;
            if retained >= ratio {
                return i + 1;
            }
        }
        self.dimension()
    }

    /// Project `x` onto the first `components` principal axes.
    pub fn project(&self, x: &[f64], components: usize) -> Result<Vec<f64>> {
        if x.len() != self.dimension() {
            return Err(TripScoreError::DimensionMismatch {
                expected: self.dimension(),
                actual: x.len(),
            });
        }
        let centred = DVector::from_column_slice(x) - &self.means;
        Ok((0..components.min(self.dimension()))
            .map(|j| self.components.column(j).dot(&centred))
            .collect())
    }

    /// Project `x` onto as many components as needed to retain `ratio` of the variance.
    pub fn transform(&self, x: &[f64], ratio: f64) -> Result<Vec<f64>> {
        self.project(x, self.retained_components(ratio))
    }
}
