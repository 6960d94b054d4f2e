use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use flightmap::geo::GeoBounds;
use flightmap::opensky::OpenSky;
use flightmap::render::{render_track_svg, svg_to_png, usvg_options, TrackExtent, TrackPoint};
use flightmap::track::{format_position, write_track_file};
use flightmap::types::{FlightPosition, TrackSource, M_TO_FT};

/// Track a single flight through the OpenSky Network.
#[derive(Parser)]
#[command(name = "track_opensky")]
struct Cli {
    /// Flight number or callsign, e.g. 262, UA262 or UAL262
    callsign: String,

    /// Save the collected track to this CSV file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Restrict the query to this box (cuts quota use)
    #[arg(
        long,
        num_args = 4,
        value_names = ["MIN_LAT", "MIN_LON", "MAX_LAT", "MAX_LON"],
        allow_negative_numbers = true
    )]
    bounds: Option<Vec<f64>>,

    /// Keep polling until stopped
    #[arg(long)]
    follow: bool,

    /// Seconds between updates with --follow
    #[arg(long, default_value_t = 30)]
    interval: u64,

    /// Stop after this many updates
    #[arg(long)]
    updates: Option<u32>,

    /// Render the collected track to a PNG when done
    #[arg(long)]
    plot: bool,

    /// PNG path for --plot, defaults to CALLSIGN_path.png
    #[arg(long)]
    plot_output: Option<PathBuf>,

    /// OpenSky account name for authenticated access
    #[arg(long)]
    username: Option<String>,

    /// OpenSky account password
    #[arg(long, requires = "username")]
    password: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    flightmap::init_tracing(cli.verbose);

    let callsign = cli.callsign.trim().to_uppercase();
    let client = OpenSky::new(cli.username.clone(), cli.password.clone())?;
    let bounds = cli.bounds.as_deref().map(|b| GeoBounds {
        min_lat: b[0],
        min_lon: b[1],
        max_lat: b[2],
        max_lon: b[3],
    });
    let mut history: Vec<FlightPosition> = Vec::new();

    if cli.follow {
        info!(
            "Following {} every {}s, Ctrl-C to stop",
            callsign, cli.interval
        );
        let mut updates = 0u32;
        loop {
            match client.find_flight(&callsign, bounds.as_ref()).await {
                Ok(Some(position)) => {
                    print!("{}", format_position(&position, history.len() + 1));
                    history.push(position);
                }
                Ok(None) => info!("{} not currently visible", callsign),
                Err(e) => warn!("update failed: {}", e),
            }

            updates += 1;
            if let Some(max) = cli.updates {
                if updates >= max {
                    info!("Reached {} updates", max);
                    break;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(cli.interval)) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, keeping {} collected positions", history.len());
                    break;
                }
            }
        }
    } else {
        match client.find_flight(&callsign, bounds.as_ref()).await? {
            Some(position) => {
                print!("{}", format_position(&position, 1));
                history.push(position);
            }
            None => {
                warn!(
                    "{} not found; it may not be airborne right now, or may fly under a different callsign",
                    callsign
                );
                std::process::exit(1);
            }
        }
    }

    if history.is_empty() {
        warn!("no positions collected");
        std::process::exit(1);
    }

    if let Some(path) = &cli.output {
        write_track_file(path, &history, TrackSource::OpenSky)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("Saved {} positions to {}", history.len(), path.display());
    }

    if cli.plot {
        let plot_path = cli
            .plot_output
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}_path.png", callsign)));
        let points: Vec<TrackPoint> = history
            .iter()
            .map(|p| TrackPoint {
                lat: p.lat,
                lon: p.lon,
                altitude_ft: p.altitude.map(|m| m * M_TO_FT),
                timestamp: p.timestamp,
            })
            .collect();
        let svg = render_track_svg(&points, &callsign, None, TrackExtent::Auto)
            .context("rendering track")?;
        let png = svg_to_png(&svg, &usvg_options()).context("rasterizing track")?;
        std::fs::write(&plot_path, &png)
            .with_context(|| format!("writing {}", plot_path.display()))?;
        info!("Saved track plot to {}", plot_path.display());
    }

    Ok(())
}
