//! Benchmarks for the filter and aggregation engine
//!
//! Views are recomputed on every read, so filtering, facet counting and KPI
//! derivation have to stay cheap for fleets of a few thousand drivers.
//!
//! Platform: Cross-platform (synthetic fleet, CI-safe)

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use fleetwatch::test_utils::{sample_districts, sample_drivers, sample_now};
use fleetwatch::{AlertThresholds, Driver, DriverStatus, FilterCriteria, FleetView, derive_kpis};
use std::hint::black_box;

const FLEET_SIZES: [usize; 3] = [100, 1_000, 5_000];

/// Repeat the sample fleet until it has `size` drivers, with unique ids.
fn fleet(size: usize) -> Vec<Driver> {
    sample_drivers()
        .into_iter()
        .cycle()
        .take(size)
        .enumerate()
        .map(|(i, mut d)| {
            d.id = format!("{}-{i}", d.id);
            d
        })
        .collect()
}

fn bench_filter(c: &mut Criterion) {
    let districts = sample_districts();
    let mut group = c.benchmark_group("filter");

    let criteria = [
        ("identity", FilterCriteria::default()),
        ("query", FilterCriteria::default().with_query("hakob")),
        (
            "status_and_region",
            FilterCriteria::default()
                .with_status(Some(DriverStatus::Idle))
                .with_region(Some("Кентрон".to_string())),
        ),
    ];

    for size in FLEET_SIZES {
        let drivers = fleet(size);
        let view = FleetView::new(&drivers, &districts);
        group.throughput(Throughput::Elements(size as u64));

        for (name, criteria) in &criteria {
            group.bench_with_input(BenchmarkId::new(*name, size), criteria, |b, criteria| {
                b.iter(|| black_box(view.filter(black_box(criteria))))
            });
        }
    }

    group.finish();
}

fn bench_facets(c: &mut Criterion) {
    let districts = sample_districts();
    let criteria = FilterCriteria::default().with_status(Some(DriverStatus::Online));
    let mut group = c.benchmark_group("quick_filters");

    for size in FLEET_SIZES {
        let drivers = fleet(size);
        let view = FleetView::new(&drivers, &districts);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| black_box(view.quick_filters(black_box(&criteria))))
        });
    }

    group.finish();
}

fn bench_aggregates(c: &mut Criterion) {
    let districts = sample_districts();
    let thresholds = AlertThresholds::default();
    let mut group = c.benchmark_group("aggregates");

    for size in FLEET_SIZES {
        let drivers = fleet(size);
        let view = FleetView::new(&drivers, &districts);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(BenchmarkId::new("derive_kpis", size), |b| {
            b.iter(|| black_box(derive_kpis(black_box(&drivers), &thresholds)))
        });

        group.bench_function(BenchmarkId::new("watchlist", size), |b| {
            b.iter(|| black_box(view.watchlist(sample_now(), &thresholds)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_filter, bench_facets, bench_aggregates);
criterion_main!(benches);
