//! Command-line snapshot of a fleet dashboard.
//!
//! Opens a dashboard over a fixture file (or a configuration file naming a
//! backend), waits for the first load and prints status counts, quick
//! filters, active alerts and KPIs.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use fleetwatch::{
    Dashboard, DashboardConfig, DriverStatus, FilterCriteria, Fleetwatch, YamlExporter,
};
use tracing_subscriber::EnvFilter;

/// Print a one-shot view of a fleet dashboard.
#[derive(Parser)]
#[command(name = "fleetwatch")]
#[command(about = "Print a one-shot view of a fleet dashboard")]
struct Cli {
    /// YAML fixture with drivers, alerts and districts.
    fixture: Option<PathBuf>,

    /// Dashboard configuration file (overrides the fixture argument).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Search drivers by name or phone.
    #[arg(long)]
    query: Option<String>,

    /// Only show drivers with this status (online, driving, idle, offline).
    #[arg(long)]
    status: Option<DriverStatus>,

    /// Only show drivers in this region.
    #[arg(long)]
    region: Option<String>,

    /// Only show drivers dispatched from this hub.
    #[arg(long)]
    hub: Option<String>,

    /// Write the filtered drivers and KPIs as YAML to this file.
    #[arg(long)]
    export: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fleetwatch=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let dashboard = match (&cli.config, &cli.fixture) {
        (Some(config), _) => {
            let config = DashboardConfig::from_file(config)
                .with_context(|| format!("loading configuration {}", config.display()))?;
            Dashboard::from_config(config).await?
        }
        (None, Some(fixture)) => Fleetwatch::open(fixture)
            .await
            .with_context(|| format!("opening fixture {}", fixture.display()))?,
        (None, None) => bail!("pass a fixture file or --config <file>"),
    };

    let criteria = FilterCriteria::default()
        .with_query(cli.query.clone().unwrap_or_default())
        .with_status(cli.status)
        .with_region(cli.region.clone())
        .with_hub(cli.hub.clone());
    dashboard.set_criteria(criteria).context("invalid filter")?;

    print_overview(&dashboard)?;

    if let Some(path) = &cli.export {
        let file = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        let rows = dashboard.export(&mut YamlExporter::new(std::io::BufWriter::new(file)))?;
        println!("\nExported {rows} drivers to {}", path.display());
    }

    Ok(())
}

fn print_overview(dashboard: &Dashboard) -> Result<()> {
    let counts = dashboard.status_counts()?;
    println!(
        "Drivers: {} total, {} online ({} driving), {} idle, {} offline",
        counts.total(),
        counts.online_total(),
        counts.driving,
        counts.idle,
        counts.offline
    );

    println!("\nQuick filters:");
    let mut chips = dashboard.quick_filters()?;
    chips.extend(dashboard.hub_filters()?);
    for chip in chips {
        let marker = if chip.active { "*" } else { " " };
        println!("  [{marker}] {:<24} {:>4}", chip.label, chip.count);
    }

    let drivers = dashboard.filtered_drivers()?;
    println!("\nDrivers ({}):", drivers.len());
    for driver in &drivers {
        println!(
            "  {:<24} {:<8} {:>3}/{:<3} {:>6.1} km  idle {:>3} min",
            driver.full_name(),
            driver.status,
            driver.stats.completed_stops,
            driver.stats.total_stops,
            driver.stats.total_km,
            driver.stats.idle_minutes
        );
    }

    let alerts = dashboard.alerts()?;
    let severity = alerts.severity_counts();
    println!(
        "\nActive alerts: {} ({} critical, {} warning, {} info)",
        severity.total(),
        severity.critical,
        severity.warning,
        severity.info
    );
    for detail in alerts.active_with_details() {
        let who = detail
            .driver
            .as_ref()
            .map_or_else(|| "-".to_string(), |d| format!("{} {}", d.first_name, d.last_name));
        println!(
            "  {:<8} {:<16} {:<20} {}",
            format!("{:?}", detail.alert.severity),
            detail.alert.alert_type,
            who,
            detail.alert.message
        );
    }

    let kpis = dashboard.kpis()?;
    println!(
        "\nKPIs: {} online, {} addresses done, avg idle {} min ({:?}), {:.1} km",
        kpis.drivers_online,
        kpis.completed_addresses,
        kpis.avg_idle_minutes,
        kpis.idle_status,
        kpis.total_km
    );

    Ok(())
}
