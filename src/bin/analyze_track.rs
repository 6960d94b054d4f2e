use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use flightmap::render::{render_analysis_svg, svg_to_png, usvg_options};
use flightmap::track::read_track_file;

/// Render a multi-panel analysis figure for a recorded track CSV:
/// flight path, altitude/speed/climb profiles, and statistics.
#[derive(Parser)]
#[command(name = "analyze_track")]
struct Cli {
    /// Track CSV produced by the tracking tools
    track_file: PathBuf,

    /// Output PNG path, defaults to the input name with an _analysis.png suffix
    #[arg(short, long)]
    output: Option<PathBuf>,

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
        cli.track_file
            .with_file_name(format!("{}_analysis.png", stem))
    });

    let svg = render_analysis_svg(&records).context("rendering analysis")?;
    let png = svg_to_png(&svg, &usvg_options()).context("rasterizing analysis")?;
    std::fs::write(&output, &png).with_context(|| format!("writing {}", output.display()))?;
    info!("Saved track analysis to {}", output.display());
    Ok(())
}
