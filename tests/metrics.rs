//! Integration tests for feature vectors and quantiles

use tripscore::metrics::standard_quantiles;
use tripscore::{FEATURE_COUNT, Feature, QUANTILE_PERCENTS, TripMetrics, TripScoreError, quantiles};

#[test]
fn test_nearest_rank_quantiles_of_1_to_100() {
    // Interleaved order so the selection has work to do
    let mut values: Vec<f64> = (1..=50).flat_map(|i| [f64::from(101 - i), f64::from(i)]).collect();
    assert_eq!(values.len(), 100);
    assert_eq!(
        quantiles(&mut values, QUANTILE_PERCENTS),
        Some([5.0, 25.0, 50.0, 75.0, 95.0])
    );
}

#[test]
fn test_quantiles_of_small_samples() {
    assert_eq!(quantiles(&mut [7.0], QUANTILE_PERCENTS), Some([7.0; 5]));
    assert_eq!(quantiles(&mut [], QUANTILE_PERCENTS), None);

    // 10 values: ranks 1, 3, 5, 8, 10
    let mut values: Vec<f64> = (1..=10).rev().map(f64::from).collect();
    assert_eq!(quantiles(&mut values, QUANTILE_PERCENTS), Some([1.0, 3.0, 5.0, 8.0, 10.0]));

    let empty = standard_quantiles(Vec::new());
    assert!(empty.iter().all(|v| v.is_nan()));
}

#[test]
fn test_feature_names_are_unique() {
    let mut names: Vec<&str> = Feature::ALL.iter().map(Feature::as_str).collect();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), FEATURE_COUNT);
}

#[test]
fn test_metrics_dimension_is_checked() {
    let err = TripMetrics::new(1, 1, vec![0.0; 5]).unwrap_err();
    assert!(matches!(
        err,
        TripScoreError::DimensionMismatch {
            expected: FEATURE_COUNT,
            actual: 5
        }
    ));
    assert!(TripMetrics::new(1, 1, vec![0.0; FEATURE_COUNT]).is_ok());
}

#[test]
fn test_flagged_constructors() {
    let zero = TripMetrics::zero_segments(2, 5);
    assert!(zero.has_zero_segments() && !zero.has_too_few_points());
    assert!(zero.is_flagged());
    assert_eq!(zero.values().len(), FEATURE_COUNT);

    let few = TripMetrics::too_few_points(2, 6);
    assert!(few.has_too_few_points() && !few.has_zero_segments());
}

#[test]
fn test_display_is_space_separated() {
    let mut values = vec![1.5; FEATURE_COUNT];
    values[Feature::ZeroSegments.index()] = 0.0;
    values[Feature::TooFewPoints.index()] = 0.0;
    let metrics = TripMetrics::new(12, 34, values).unwrap();

    let line = metrics.to_string();
    let fields: Vec<&str> = line.split(' ').collect();
    assert_eq!(fields.len(), FEATURE_COUNT + 2);
    assert_eq!(&fields[..3], &["12", "34", "1.5"]);
    assert_eq!(
        TripMetrics::variable_names().split(' ').count(),
        FEATURE_COUNT + 2
    );
}

#[test]
fn test_lower_quantiles_use_reversing_transform() {
    for feature in [Feature::AccelerationP05, Feature::DirectionP25, Feature::SpeedXAccelerationP05] {
        assert!(feature.transform().is_some_and(|t| t.is_reversing()));
    }
    for feature in [Feature::Duration, Feature::SpeedP25, Feature::AccelerationP95] {
        assert!(feature.transform().is_some_and(|t| !t.is_reversing()));
    }
}
