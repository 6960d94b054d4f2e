use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use clap::Parser;
use tracing::info;

use flightmap::render::{render_track_svg, svg_to_png, usvg_options, TrackExtent, TrackPoint};
use flightmap::track::{read_track_file, TrackStats};

/// Render a recorded track CSV onto a map PNG and print flight statistics.
#[derive(Parser)]
#[command(name = "plot_track")]
struct Cli {
    /// Track CSV produced by the tracking tools
    track_file: PathBuf,

    /// Output PNG path, defaults to the input name with a _map.png suffix
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Title to draw over the map
    #[arg(long)]
    title: Option<String>,

    /// Use a fixed continental US extent instead of fitting the track
    #[arg(long)]
    usa: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    flightmap::init_tracing(cli.verbose);

    let records = read_track_file(&cli.track_file)
        .with_context(|| format!("reading {}", cli.track_file.display()))?;
    info!(
        "Loaded {} track points from {}",
        records.len(),
        cli.track_file.display()
    );

    let output = cli.output.clone().unwrap_or_else(|| {
        let stem = cli
            .track_file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("track");
        cli.track_file.with_file_name(format!("{}_map.png", stem))
    });

    let callsign = records
        .first()
        .map(|r| r.callsign.clone())
        .unwrap_or_default();
    let points: Vec<TrackPoint> = records
        .iter()
        .map(|r| TrackPoint {
            lat: r.lat,
            lon: r.lon,
            altitude_ft: r.altitude_feet(),
            timestamp: r.timestamp,
        })
        .collect();

    let extent = if cli.usa {
        TrackExtent::Usa
    } else {
        TrackExtent::Auto
    };
    let svg = render_track_svg(&points, &callsign, cli.title.as_deref(), extent)
        .context("rendering track")?;
    let png = svg_to_png(&svg, &usvg_options()).context("rasterizing track")?;
    std::fs::write(&output, &png).with_context(|| format!("writing {}", output.display()))?;
    info!("Saved track map to {}", output.display());

    if let Some(stats) = TrackStats::from_records(&records) {
        print_stats(&stats);
    }
    Ok(())
}

fn print_stats(stats: &TrackStats) {
    println!();
    println!("Flight statistics for {} ({})", stats.callsign, stats.icao);
    println!(
        "  Duration:       {:.1} minutes ({} to {})",
        stats.duration_min,
        stats.start_time.to_rfc3339_opts(SecondsFormat::Secs, true),
        stats.end_time.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    println!("  Data points:    {}", stats.points);
    if let (Some(start), Some(end)) = (stats.alt_start_ft, stats.alt_end_ft) {
        let gain = stats.alt_gain_ft.unwrap_or(0.0);
        println!(
            "  Altitude:       {:.0} ft to {:.0} ft ({:+.0} ft)",
            start, end, gain
        );
    }
    if let Some(climb) = stats.avg_climb_fpm {
        println!("  Average climb:  {:+.0} ft/min", climb);
    }
    if let (Some(max), Some(avg)) = (stats.max_speed_kt, stats.avg_speed_kt) {
        println!("  Speed:          max {:.1} kts, average {:.1} kts", max, avg);
    }
    println!(
        "  Distance:       {:.1} km ({:.1} nm)",
        stats.distance_km, stats.distance_nm
    );
    println!(
        "  Start position: {:.6}, {:.6}",
        stats.start_position.0, stats.start_position.1
    );
    println!(
        "  End position:   {:.6}, {:.6}",
        stats.end_position.0, stats.end_position.1
    );
}
