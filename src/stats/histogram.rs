//! Empirical probability density over a fixed binning.

use std::fmt;

use crate::error::{Result, TripScoreError};

/// Binned density estimate of one scalar sample.
///
/// Bucket 0 collects values below the low edge, bucket `bins + 1` values above
/// the high edge. Every bucket stores `count / (n * bin_width)` where `n` is
/// the number of non-NaN sample values, so the masses of all buckets
/// (density times bin width) sum to one.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    bins: usize,
    low_edge: f64,
    high_edge: f64,
    bin_width: f64,
    probabilities: Vec<f64>,
}

impl Histogram {
    /// Build a histogram of `values` over `[low_edge, high_edge]`.
    ///
    /// NaN values are ignored. A sample without any non-NaN value yields an
    /// all-zero histogram.
    pub fn new(values: &[f64], bins: usize, low_edge: f64, high_edge: f64) -> Result<Self> {
        if bins == 0 || !low_edge.is_finite() || !high_edge.is_finite() || low_edge >= high_edge {
            return Err(TripScoreError::InvalidHistogram {
                bins,
                low_edge,
                high_edge,
            });
        }

        let mut histogram = Self {
            bins,
            low_edge,
            high_edge,
            bin_width: (high_edge - low_edge) / bins as f64,
            probabilities: vec![0.0; bins + 2],
        };

        let mut count = 0usize;
        for &value in values.iter().filter(|v| !v.is_nan()) {
            let bucket = histogram.bucket_index(value);
            histogram.probabilities[bucket] += 1.0;
            count += 1;
        }

        if count > 0 {
            let normalisation = 1.0 / (histogram.bin_width * count as f64);
            for p in &mut histogram.probabilities {
                *p *= normalisation;
            }
        }
        Ok(histogram)
    }

    /// Bucket a (non-NaN) value falls into.
    ///
    /// Interior bins are half-open `[lo, lo + width)`, except the last one,
    /// which also holds the high edge itself.
    pub fn bucket_index(&self, value: f64) -> usize {
        if value < self.low_edge {
            0
        } else if value > self.high_edge {
            self.bins + 1
        } else {
            let bin = ((value - self.low_edge) / self.bin_width).floor() as usize + 1;
            bin.min(self.bins)
        }
    }

    /// Density at `value`; NaN for NaN input.
    pub fn probability(&self, value: f64) -> f64 {
        if value.is_nan() {
            return f64::NAN;
        }
        self.probabilities[self.bucket_index(value)]
    }

    pub fn underflow_probability(&self) -> f64 {
        self.probabilities[0]
    }

    pub fn overflow_probability(&self) -> f64 {
        self.probabilities[self.bins + 1]
    }

    /// Fraction of the sample below the low edge.
    pub fn underflow_mass(&self) -> f64 {
        self.underflow_probability() * self.bin_width
    }

    /// Fraction of the sample above the high edge.
    pub fn overflow_mass(&self) -> f64 {
        self.overflow_probability() * self.bin_width
    }

    /// Total mass of all buckets: 1 for a non-empty sample, 0 otherwise.
    pub fn total_mass(&self) -> f64 {
        self.probabilities.iter().sum::<f64>() * self.bin_width
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn low_edge(&self) -> f64 {
        self.low_edge
    }

    pub fn high_edge(&self) -> f64 {
        self.high_edge
    }

    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    /// All densities, underflow first and overflow last.
    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    /// Standard deviation of the interior distribution in units of the edge range.
    ///
    /// Narrow, peaked histograms give small values. Returns 0 when no sample
    /// value falls inside the edges.
    pub fn normalised_standard_deviation(&self) -> f64 {
        let interior = &self.probabilities[1..=self.bins];
        let total: f64 = interior.iter().sum();
        if total <= 0.0 {
            return 0.0;
        }

        let centre = |i: usize| (i as f64 + 0.5) / self.bins as f64;
        let mean = interior
            .iter()
            .enumerate()
            .map(|(i, p)| centre(i) * p)
            .sum::<f64>()
            / total;
        let variance = interior
            .iter()
            .enumerate()
            .map(|(i, p)| (centre(i) - mean).powi(2) * p)
            .sum::<f64>()
            / total;
        variance.sqrt()
    }
}

impl fmt::Display for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Low edge  : {:.3}", self.low_edge)?;
        writeln!(f, "High edge : {:.3}", self.high_edge)?;
        writeln!(f, "Bins      : {}", self.bins)?;
        writeln!(f, "Bin width : {:.3}", self.bin_width)?;
        write!(f, "Densities :")?;
        for p in &self.probabilities {
            write!(f, " {p:.3}")?;
        }
        Ok(())
    }
}
