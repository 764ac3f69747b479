//! Integration tests for Histogram

use approx::assert_relative_eq;
use tripscore::{Histogram, TripScoreError};

fn mass(histogram: &Histogram) -> f64 {
    histogram
        .probabilities()
        .iter()
        .map(|p| p * histogram.bin_width())
        .sum()
}

#[test]
fn test_normalisation_with_outliers() {
    let mut values: Vec<f64> = (0..1000).map(|i| (i % 97) as f64 * 0.1).collect();
    values.extend([-50.0, -3.0, 42.0, f64::NAN]);
    let histogram = Histogram::new(&values, 25, 0.0, 10.0).unwrap();

    assert_relative_eq!(mass(&histogram), 1.0, epsilon = 1e-12);
    assert_relative_eq!(histogram.total_mass(), 1.0, epsilon = 1e-12);
    // NaN is not part of the sample
    assert_relative_eq!(histogram.underflow_mass(), 2.0 / 1003.0, epsilon = 1e-12);
    assert_relative_eq!(histogram.overflow_mass(), 1.0 / 1003.0, epsilon = 1e-12);
}

#[test]
fn test_normalisation_for_many_binnings() {
    let values: Vec<f64> = (0..317).map(|i| ((i * 37) % 101) as f64).collect();
    for bins in [1, 2, 7, 35, 200] {
        let histogram = Histogram::new(&values, bins, 10.0, 90.0).unwrap();
        assert_relative_eq!(mass(&histogram), 1.0, epsilon = 1e-9);
        assert_eq!(histogram.probabilities().len(), bins + 2);
    }
}

#[test]
fn test_bin_boundaries_follow_floor_rule() {
    let histogram = Histogram::new(&[0.0, 1.0, 2.0, 3.0, 4.0], 4, 0.0, 4.0).unwrap();
    assert_eq!(histogram.bin_width(), 1.0);

    // A boundary value belongs to the bin it opens
    assert_eq!(histogram.bucket_index(1.0), 2);
    assert_eq!(histogram.bucket_index(0.999), 1);
    assert_eq!(histogram.bucket_index(2.0), 3);
    // The high edge itself stays inside the last bin
    assert_eq!(histogram.bucket_index(4.0), 4);
    assert_eq!(histogram.bucket_index(4.0001), 5);
    assert_eq!(histogram.bucket_index(-0.0001), 0);

    // Bins: [0,1) -> {0}, [1,2) -> {1}, [2,3) -> {2}, [3,4] -> {3, 4}
    assert_relative_eq!(histogram.probability(0.5), 0.2);
    assert_relative_eq!(histogram.probability(3.0), 0.4);
    assert_eq!(histogram.probability(1.0), histogram.probability(1.5));
    assert!(histogram.probability(f64::NAN).is_nan());
}

#[test]
fn test_empty_sample_is_all_zero() {
    let histogram = Histogram::new(&[f64::NAN], 10, -1.0, 1.0).unwrap();
    assert!(histogram.probabilities().iter().all(|&p| p == 0.0));
    assert_eq!(histogram.total_mass(), 0.0);
    assert_eq!(histogram.normalised_standard_deviation(), 0.0);
}

#[test]
fn test_invalid_edges() {
    let err = Histogram::new(&[1.0], 10, 2.0, 1.0).unwrap_err();
    assert!(matches!(err, TripScoreError::InvalidHistogram { bins: 10, .. }));
}

#[test]
fn test_normalised_standard_deviation_orders_spread() {
    let narrow: Vec<f64> = (0..100).map(|i| 5.0 + (i % 3) as f64 * 0.1).collect();
    let wide: Vec<f64> = (0..100).map(|i| i as f64 * 0.1).collect();
    let narrow = Histogram::new(&narrow, 50, 0.0, 10.0).unwrap();
    let wide = Histogram::new(&wide, 50, 0.0, 10.0).unwrap();

    assert!(narrow.normalised_standard_deviation() < wide.normalised_standard_deviation());
    // Uniform over the full range: 1/sqrt(12) of the range
    assert_relative_eq!(wide.normalised_standard_deviation(), 12f64.sqrt().recip(), epsilon = 1e-3);
}

#[test]
fn test_display_lists_all_buckets() {
    let histogram = Histogram::new(&[0.5, 1.5], 2, 0.0, 2.0).unwrap();
    let text = histogram.to_string();
    assert!(text.contains("Bins      : 2"));
    let densities = text.lines().last().unwrap();
    assert_eq!(densities.split_whitespace().count(), 2 + 4);
}
