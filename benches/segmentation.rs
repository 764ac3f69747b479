//! Criterion benchmarks for segmentation, feature extraction and scoring.
//!
//! Run with: `cargo bench --bench segmentation`
//!
//! All inputs come from seeded synthetic fleets, so runs are comparable.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tripscore::synthetic::SyntheticScenario;
use tripscore::{
    DriverTripData, InMemorySource, MetricsConfig, NoopProgress, PcaConfig, PipelineConfig,
    ReferenceConfig, ScoringConfig, SegmentationConfig, Trip, TripMetrics, TripMetricsReference,
    produce_trip_metrics, score_trips, segment_positions,
};

/// First `driver_count` drivers of the benchmark fleet.
fn benchmark_drivers(driver_count: usize) -> Vec<DriverTripData> {
    let mut scenario = SyntheticScenario::benchmark_fleet();
    scenario.driver_count = driver_count;
    scenario.trips_per_driver = 50;
    scenario.generate().drivers
}

fn fleet_metrics(driver_count: usize) -> Vec<TripMetrics> {
    let source = InMemorySource::new(benchmark_drivers(driver_count));
    produce_trip_metrics(&source, &PipelineConfig::default(), &NoopProgress).unwrap_or_default()
}

fn bench_segmentation(c: &mut Criterion) {
    let mut group = c.benchmark_group("segmentation");
    let drivers = benchmark_drivers(2);
    let config = SegmentationConfig::default();

    group.bench_function("100_trips", |b| {
        b.iter(|| {
            for driver in &drivers {
                for trip in &driver.trips {
                    black_box(segment_positions(&trip.points, &config));
                }
            }
        });
    });

    let metrics_config = MetricsConfig::default();
    group.bench_function("100_trips_with_metrics", |b| {
        b.iter(|| {
            for driver in &drivers {
                for raw in &driver.trips {
                    let trip = Trip::with_config(raw.trip_id, raw.points.clone(), config);
                    black_box(trip.metrics(driver.driver_id, &metrics_config));
                }
            }
        });
    });

    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    let source = InMemorySource::new(benchmark_drivers(12));

    for workers in [1, 2, 6] {
        let config = PipelineConfig {
            workers,
            ..PipelineConfig::default()
        };
        group.bench_with_input(BenchmarkId::new("workers", workers), &config, |b, config| {
            b.iter(|| produce_trip_metrics(&source, config, &NoopProgress));
        });
    }

    group.finish();
}

fn bench_reference(c: &mut Criterion) {
    let mut group = c.benchmark_group("reference");
    group.sample_size(10);
    let metrics = fleet_metrics(20);

    let histograms = ReferenceConfig::default();
    group.bench_function("histograms_1000_trips", |b| {
        b.iter(|| TripMetricsReference::build(&metrics, &histograms));
    });

    let with_pca = ReferenceConfig {
        pca: Some(PcaConfig::default()),
        ..ReferenceConfig::default()
    };
    group.bench_function("pca_1000_trips", |b| {
        b.iter(|| TripMetricsReference::build(&metrics, &with_pca));
    });

    group.bench_function("score_1000_trips", |b| {
        b.iter(|| score_trips(metrics.clone(), &ScoringConfig::default(), &NoopProgress));
    });

    group.finish();
}

criterion_group!(benches, bench_segmentation, bench_pipeline, bench_reference);
criterion_main!(benches);
