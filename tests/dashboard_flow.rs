//! End-to-end dashboard flows over the public API.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use fleetwatch::{
    DashboardConfig, DashboardError, DriverStatus, EntityFamily, FacetKey, FilterCriteria,
    FixtureSource, Fleetwatch, LoadState, MemorySource, StaticIdentity, Trend, UpdateRate,
    YamlExporter,
};
use futures::StreamExt;

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test-data").join("fleet.yaml")
}

fn signed_in() -> Arc<StaticIdentity> {
    Arc::new(StaticIdentity::signed_in(StaticIdentity::fixture_user()))
}

#[tokio::test(start_paused = true)]
async fn fixture_dashboard_overview() {
    let dashboard = Fleetwatch::open(fixture_path()).await.unwrap();

    let counts = dashboard.status_counts().unwrap();
    assert_eq!(counts.total(), 8);
    assert_eq!(counts.online_total(), 5);
    assert_eq!(counts.idle, 2);
    assert_eq!(counts.offline, 1);

    let labels: Vec<String> =
        dashboard.quick_filters().unwrap().into_iter().map(|q| q.label).collect();
    assert_eq!(
        labels,
        vec![
            "Online",
            "Idle",
            "Driving",
            "Offline",
            "All regions",
            "Кентрон",
            "Арабкир",
            "Малатия",
            "Малатия-Себастия",
        ]
    );

    let alerts = dashboard.alerts().unwrap();
    let active: Vec<String> = alerts.active_alerts().into_iter().map(|a| a.id).collect();
    assert_eq!(active, vec!["al-2", "al-3", "al-1", "al-4"]);
    assert_eq!(alerts.critical_alerts().len(), 2);

    assert_eq!(dashboard.kpis().unwrap().drivers_online, 5);
    assert_eq!(dashboard.status(EntityFamily::Drivers).state, LoadState::Ready);
}

#[tokio::test(start_paused = true)]
async fn filter_facets_and_export() {
    let dashboard = Fleetwatch::open(fixture_path()).await.unwrap();

    dashboard.apply_facet(&FacetKey::Region("Кентрон".to_string())).unwrap();
    let names: Vec<String> =
        dashboard.filtered_drivers().unwrap().iter().map(|d| d.full_name()).collect();
    assert_eq!(names, vec!["Aram Petrosyan", "Narek Hakobyan"]);

    // All regions clears the region and keeps the rest
    dashboard.apply_facet(&FacetKey::AllRegions).unwrap();
    assert!(dashboard.criteria().is_empty());

    dashboard
        .set_criteria(FilterCriteria::default().with_query("+374 9").with_status(Some(DriverStatus::Idle)))
        .unwrap();
    let mut exporter = YamlExporter::new(Vec::new());
    assert_eq!(dashboard.export(&mut exporter).unwrap(), 2);
    let report = String::from_utf8(exporter.into_inner()).unwrap();
    assert!(report.contains("Armen Vardanyan"));
    assert!(report.contains("addresses: 9/19"));
}

#[tokio::test(start_paused = true)]
async fn hub_facets_narrow_the_fleet() {
    let dashboard = Fleetwatch::open(fixture_path()).await.unwrap();

    let hubs: Vec<(String, usize)> =
        dashboard.hub_filters().unwrap().into_iter().map(|f| (f.label, f.count)).collect();
    assert_eq!(hubs, vec![("hub-1".to_string(), 4), ("hub-2".to_string(), 4)]);

    dashboard.apply_facet(&FacetKey::Hub("hub-2".to_string())).unwrap();
    dashboard.apply_facet(&FacetKey::Status(DriverStatus::Idle)).unwrap();
    let ids: Vec<String> = dashboard.filtered_drivers().unwrap().into_iter().map(|d| d.id).collect();
    assert_eq!(ids, vec!["105"]);

    // Facet counts stay against the whole fleet
    assert_eq!(dashboard.hub_filters().unwrap()[1].count, 4);
}

#[tokio::test(start_paused = true)]
async fn compare_with_previous_shift() {
    let dashboard = Fleetwatch::open(fixture_path()).await.unwrap();

    let yesterday = NaiveDate::from_ymd_opt(2025, 3, 13).unwrap();
    let cmp = dashboard.compare_with(yesterday).await.unwrap();
    assert_eq!(cmp.drivers_online.change_percent, 25.0);
    assert_eq!(cmp.completed_addresses.trend, Trend::Down);
    assert_eq!(cmp.avg_idle_minutes.trend, Trend::Flat);
    assert_eq!(cmp.total_km.trend, Trend::Up);

    let unknown = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let err = dashboard.compare_with(unknown).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test(start_paused = true)]
async fn watchlist_uses_configured_thresholds() {
    let dashboard = Fleetwatch::open(fixture_path()).await.unwrap();
    let now = Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap();

    let flagged: Vec<String> =
        dashboard.watchlist(now).unwrap().into_iter().map(|w| w.driver_id).collect();
    // idle 102/105, issues 104, GPS 105 and 106; offline 108 is not flagged
    assert_eq!(flagged, vec!["102", "104", "105", "106"]);
}

#[tokio::test(start_paused = true)]
async fn acknowledge_is_idempotent() {
    let source = Arc::new(MemorySource::empty());
    let fixture = fleetwatch::FixtureDocument::parse(
        &std::fs::read_to_string(fixture_path()).unwrap(),
    )
    .unwrap();
    source.set_drivers(fixture.drivers);
    for alert in fixture.alerts {
        source.push_alert(alert);
    }

    let dashboard =
        Fleetwatch::connect(source.clone(), signed_in(), DashboardConfig::default()).await.unwrap();
    dashboard.reload(EntityFamily::Alerts).await.unwrap();
    assert_eq!(dashboard.alerts().unwrap().active_alerts().len(), 4);

    dashboard.acknowledge_alert("al-1").await.unwrap();
    dashboard.acknowledge_alert("al-1").await.unwrap();
    dashboard.acknowledge_alert("no-such-alert").await.unwrap();
    assert_eq!(source.alert_updates(), 1);

    // The next poll agrees with the local edit
    dashboard.reload(EntityFamily::Alerts).await.unwrap();
    let active = dashboard.alerts().unwrap().active_alerts();
    assert_eq!(active.len(), 3);
    assert!(active.iter().all(|a| a.id != "al-1"));
}

#[tokio::test(start_paused = true)]
async fn metrics_trend_grows_with_each_poll() {
    let source = Arc::new(MemorySource::empty());
    source.set_drivers(
        fleetwatch::FixtureDocument::parse(&std::fs::read_to_string(fixture_path()).unwrap())
            .unwrap()
            .drivers,
    );
    let dashboard =
        Fleetwatch::connect(source, signed_in(), DashboardConfig::default()).await.unwrap();

    let mut metrics = dashboard.subscribe_metrics(UpdateRate::Immediate);
    let first = metrics.next().await.unwrap();
    assert_eq!(first.drivers_online_trend.len(), 1);

    tokio::time::sleep(Duration::from_secs(31)).await;
    let kpis = dashboard.kpis().unwrap();
    assert_eq!(kpis.drivers_online_trend.len(), 2);
    assert_eq!(kpis.drivers_online_trend.latest(), Some(5.0));
}

#[tokio::test(start_paused = true)]
async fn sign_out_discards_in_flight_fetches() {
    let source = Arc::new(FixtureSource::open(fixture_path()).unwrap().with_latency(Duration::from_secs(2)));
    let mut dashboard =
        Fleetwatch::connect(source, signed_in(), DashboardConfig::default()).await.unwrap();
    let loaded = dashboard.store().drivers();

    let store = Arc::clone(dashboard.store());
    let pending = tokio::spawn(async move { store.reload(EntityFamily::Drivers).await });
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(dashboard.status(EntityFamily::Drivers).is_loading());

    dashboard.sign_out().await.unwrap();
    let result = pending.await.unwrap();
    assert!(matches!(result, Err(DashboardError::Cancelled { family: EntityFamily::Drivers })));
    assert_eq!(dashboard.store().drivers().revision, loaded.revision);
    assert!(matches!(dashboard.status_counts(), Err(DashboardError::Unauthenticated)));
}

#[tokio::test]
async fn missing_fixture_is_a_fixture_error() {
    let err = Fleetwatch::open("/definitely/not/here.yaml").await.unwrap_err();
    assert!(matches!(err, DashboardError::Fixture { .. }));
    assert!(!err.is_retryable());
}
