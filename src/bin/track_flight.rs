use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use flightmap::adsbx::AdsbExchange;
use flightmap::render::{render_track_svg, svg_to_png, usvg_options, TrackExtent, TrackPoint};
use flightmap::track::{format_position, write_track_file};
use flightmap::types::{FlightPosition, TrackSource, M_TO_FT};

/// Track a single flight through the ADS-B Exchange feed.
#[derive(Parser)]
#[command(name = "track_flight")]
struct Cli {
    /// Flight number or callsign, e.g. 262, UA262 or UAL262
    callsign: String,

    /// Save the collected track to this CSV file
    #[arg(short, long)]
    output: Option<PathBuf>,

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

    let callsign = cli.callsign.trim().to_uppercase();
    let client = AdsbExchange::new(cli.api_key.clone())?;
    let mut history: Vec<FlightPosition> = Vec::new();

    if cli.follow {
        info!(
            "Following {} every {}s, Ctrl-C to stop",
            callsign, cli.interval
        );
        let mut updates = 0u32;
        loop {
            match client.find_flight(&callsign).await {
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
        match client.find_flight(&callsign).await? {
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
        write_track_file(path, &history, TrackSource::AdsbExchange)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("Saved {} positions to {}", history.len(), path.display());
    }

    if cli.plot {
        let plot_path = cli
            .plot_output
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}_path.png", callsign)));
        plot_history(&history, &callsign, &plot_path)?;
        info!("Saved track plot to {}", plot_path.display());
    }

    Ok(())
}

fn plot_history(history: &[FlightPosition], callsign: &str, path: &PathBuf) -> Result<()> {
    let points: Vec<TrackPoint> = history
        .iter()
        .map(|p| TrackPoint {
            lat: p.lat,
            lon: p.lon,
            altitude_ft: p.altitude.map(|m| m * M_TO_FT),
            timestamp: p.timestamp,
        })
        .collect();
    let svg = render_track_svg(&points, callsign, None, TrackExtent::Auto)
        .context("rendering track")?;
    let png = svg_to_png(&svg, &usvg_options()).context("rasterizing track")?;
    std::fs::write(path, &png).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
