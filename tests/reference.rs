//! Integration tests for TripMetricsReference and Pca

use std::sync::Arc;

use approx::assert_relative_eq;
use tripscore::synthetic::SyntheticScenario;
use tripscore::{
    Driver, FEATURE_COUNT, Feature, HISTOGRAM_FEATURE_COUNT, MetricsConfig, MetricsScore,
    PcaConfig, ReferenceConfig, SegmentationConfig, TripMetrics, TripMetricsReference,
    TripScoreError,
};

fn fleet_metrics() -> Vec<TripMetrics> {
    SyntheticScenario::small_fleet()
        .generate()
        .drivers
        .into_iter()
        .flat_map(|data| {
            Driver::from_trip_data(data, &SegmentationConfig::default())
                .trip_metrics(&MetricsConfig::default())
        })
        .collect()
}

fn pca_config() -> ReferenceConfig {
    ReferenceConfig {
        pca: Some(PcaConfig::default()),
        ..ReferenceConfig::default()
    }
}

fn densities(score: MetricsScore) -> Vec<f64> {
    match score {
        MetricsScore::Densities(d) => d,
        other => panic!("expected densities, got {other:?}"),
    }
}

#[test]
fn test_population_histograms_are_normalised() {
    let metrics = fleet_metrics();
    let reference = TripMetricsReference::build(&metrics, &ReferenceConfig::default()).unwrap();

    assert!(!reference.is_generated());
    assert_eq!(reference.dimension(), HISTOGRAM_FEATURE_COUNT);
    for histogram in reference.histograms() {
        assert_eq!(histogram.bins(), 200);
        assert_relative_eq!(histogram.total_mass(), 1.0, epsilon = 1e-9);
    }
}

#[test]
fn test_every_trip_of_the_population_scores() {
    let metrics = fleet_metrics();
    let reference = TripMetricsReference::build(&metrics, &ReferenceConfig::default()).unwrap();
    for m in metrics.iter().filter(|m| !m.is_flagged()) {
        let d = densities(reference.score(m).unwrap());
        assert_eq!(d.len(), HISTOGRAM_FEATURE_COUNT);
        assert!(d.iter().all(|p| p.is_finite() && *p >= 0.0));
    }
}

#[test]
fn test_flag_rates() {
    let mut metrics = fleet_metrics();
    let n = metrics.len() as f64;
    let flagged_zero = metrics.iter().filter(|m| m.has_zero_segments()).count() as f64;
    let flagged_few = metrics.iter().filter(|m| m.has_too_few_points()).count() as f64;
    metrics.push(TripMetrics::zero_segments(1, 1000));
    metrics.push(TripMetrics::too_few_points(1, 1001));
    metrics.push(TripMetrics::too_few_points(1, 1002));

    let reference = TripMetricsReference::build(&metrics, &ReferenceConfig::default()).unwrap();
    let zero_rate = (flagged_zero + 1.0) / (n + 3.0);
    let few_rate = (flagged_few + 2.0) / (n + 3.0);
    assert_relative_eq!(reference.zero_segments_rate(), zero_rate);
    assert_relative_eq!(reference.too_few_points_rate(), few_rate);

    assert_eq!(
        reference.score(&TripMetrics::zero_segments(2, 1)).unwrap(),
        MetricsScore::ZeroSegments(zero_rate)
    );
    assert_eq!(
        reference.score(&TripMetrics::too_few_points(2, 1)).unwrap(),
        MetricsScore::TooFewPoints(few_rate)
    );
}

#[test]
fn test_generated_reference_shares_edges() {
    let metrics = fleet_metrics();
    let config = ReferenceConfig::default();
    let population = TripMetricsReference::build(&metrics, &config).unwrap();

    let driver_trips: Vec<TripMetrics> = metrics.iter().filter(|m| m.driver_id == 2).cloned().collect();
    let driver = population.generate(&driver_trips, &config).unwrap();

    assert!(driver.is_generated());
    assert_eq!(driver.dimension(), population.dimension());
    for (own, reference) in driver.histograms().zip(population.histograms()) {
        assert_eq!(own.bins(), 35);
        assert_eq!(own.low_edge(), reference.low_edge());
        assert_eq!(own.high_edge(), reference.high_edge());
    }
}

#[test]
fn test_out_of_domain_values_use_boundary_buckets() {
    let metrics = fleet_metrics();
    let reference = TripMetricsReference::build(&metrics, &ReferenceConfig::default()).unwrap();
    let template = metrics.iter().find(|m| !m.is_flagged()).unwrap();

    let mut values = template.values().to_vec();
    // A positive lower acceleration quantile is outside log10(-v); the
    // transform reverses order, so it lands in the underflow bucket
    values[Feature::AccelerationP05.index()] = 5.0;
    // A duration below -1 is outside log10(1 + v) and below every population value
    values[Feature::Duration.index()] = -5.0;
    let odd = TripMetrics::new(template.driver_id, template.trip_id, values).unwrap();

    let d = densities(reference.score(&odd).unwrap());
    let acceleration = reference.feature_histogram(Feature::AccelerationP05).unwrap();
    let duration = reference.feature_histogram(Feature::Duration).unwrap();
    assert_eq!(d[Feature::AccelerationP05.index()], acceleration.underflow_probability());
    assert_eq!(d[Feature::Duration.index()], duration.underflow_probability());
}

#[test]
fn test_pca_components_are_shared() {
    let metrics = fleet_metrics();
    let config = pca_config();
    let population = TripMetricsReference::build(&metrics, &config).unwrap();
    assert!(population.dimension() > HISTOGRAM_FEATURE_COUNT);
    assert!(population.dimension() <= 2 * HISTOGRAM_FEATURE_COUNT);

    let driver_trips: Vec<TripMetrics> = metrics.iter().filter(|m| m.driver_id == 1).cloned().collect();
    let driver = population.generate(&driver_trips, &config).unwrap();
    assert_eq!(driver.dimension(), population.dimension());
    assert!(Arc::ptr_eq(population.pca().unwrap(), driver.pca().unwrap()));

    let pca = population.pca().unwrap();
    let ratios = pca.explained_variance_ratios();
    assert_eq!(ratios.len(), HISTOGRAM_FEATURE_COUNT);
    assert_relative_eq!(ratios.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    assert!(ratios.windows(2).all(|w| w[0] >= w[1]));

    let unflagged = metrics.iter().find(|m| !m.is_flagged()).unwrap();
    let d = densities(population.score(unflagged).unwrap());
    assert_eq!(d.len(), population.dimension());
}

#[test]
fn test_build_errors() {
    let config = ReferenceConfig::default();
    assert!(matches!(
        TripMetricsReference::build(&[], &config),
        Err(TripScoreError::EmptyPopulation)
    ));

    let all_flagged = vec![TripMetrics::zero_segments(1, 1), TripMetrics::too_few_points(1, 2)];
    assert!(matches!(
        TripMetricsReference::build(&all_flagged, &config),
        Err(TripScoreError::EmptyPopulation)
    ));

    let bad_config = ReferenceConfig {
        percentage_to_keep: 150.0,
        ..ReferenceConfig::default()
    };
    assert!(matches!(
        TripMetricsReference::build(&fleet_metrics(), &bad_config),
        Err(TripScoreError::InvalidConfig(_))
    ));
}

#[test]
fn test_scoring_rejects_wrong_dimension() {
    let metrics = fleet_metrics();
    let reference = TripMetricsReference::build(&metrics, &ReferenceConfig::default()).unwrap();

    let short: TripMetrics =
        serde_json::from_str(r#"{"driver_id": 1, "trip_id": 1, "values": [1.0, 2.0]}"#).unwrap();
    assert!(matches!(
        reference.score(&short),
        Err(TripScoreError::DimensionMismatch {
            expected: FEATURE_COUNT,
            actual: 2
        })
    ));
}

#[test]
fn test_driver_without_usable_trips_gets_empty_histograms() {
    let metrics = fleet_metrics();
    let config = ReferenceConfig::default();
    let population = TripMetricsReference::build(&metrics, &config).unwrap();

    let driver = population
        .generate(&[TripMetrics::zero_segments(9, 1)], &config)
        .unwrap();
    assert_eq!(driver.zero_segments_rate(), 1.0);
    assert!(driver.histograms().all(|h| h.total_mass() == 0.0));
}
