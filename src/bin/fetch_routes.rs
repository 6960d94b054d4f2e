use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use flightmap::adsbx::{parse_observations, AdsbExchange};
use flightmap::geo::{GeoBounds, GeoFilter};
use flightmap::routes::{write_routes_file, RouteAggregator};

/// Fetch live aircraft positions and aggregate them into route counts.
#[derive(Parser)]
#[command(name = "fetch_routes")]
struct Cli {
    /// Output CSV path
    #[arg(short, long, default_value = "flights_realtime.csv")]
    output: PathBuf,

    /// Only keep aircraft inside this box
    #[arg(
        long,
        num_args = 4,
        value_names = ["MIN_LAT", "MIN_LON", "MAX_LAT", "MAX_LON"],
        allow_negative_numbers = true
    )]
    bounds: Option<Vec<f64>>,

    /// Center point for radius filtering
    #[arg(long, num_args = 2, value_names = ["LAT", "LON"], allow_negative_numbers = true)]
    center: Option<Vec<f64>>,

    /// Only keep aircraft within this many kilometers of --center
    #[arg(long, requires = "center")]
    radius: Option<f64>,

    /// Drop routes observed fewer times than this
    #[arg(long, default_value_t = 1)]
    min_flights: u32,

    /// Grid cell size in degrees
    #[arg(long, default_value_t = 1.0)]
    grid_resolution: f64,

    /// ADS-B Exchange API key
    #[arg(long)]
    api_key: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    flightmap::init_tracing(cli.verbose);

    let filter = GeoFilter {
        bounds: cli.bounds.as_deref().map(|b| GeoBounds {
            min_lat: b[0],
            min_lon: b[1],
            max_lat: b[2],
            max_lon: b[3],
        }),
        center: cli.center.as_deref().map(|c| (c[0], c[1])),
        radius_km: cli.radius,
    };

    let client = AdsbExchange::new(cli.api_key.clone())?;
    let aircraft = client
        .fetch_aircraft()
        .await
        .context("fetching aircraft positions")?;

    let observations = parse_observations(&aircraft, &filter);
    info!("{} aircraft passed the geographic filters", observations.len());
    if observations.is_empty() {
        warn!("no aircraft matched the filters, nothing to write");
        std::process::exit(1);
    }

    let mut aggregator = RouteAggregator::new(cli.min_flights, cli.grid_resolution);
    let mut contributed = 0usize;
    for obs in &observations {
        if aggregator.add(obs) {
            contributed += 1;
        }
    }
    info!(
        "{} of {} observations contributed to routes",
        contributed,
        observations.len()
    );

    let routes = aggregator.routes();
    if routes.is_empty() {
        warn!(
            "no route was observed at least {} times, nothing to write",
            cli.min_flights
        );
        std::process::exit(1);
    }

    write_routes_file(&cli.output, &routes)
        .with_context(|| format!("writing {}", cli.output.display()))?;
    info!("Wrote {} routes to {}", routes.len(), cli.output.display());
    Ok(())
}
