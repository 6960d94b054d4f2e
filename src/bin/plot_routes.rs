use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use flightmap::config::RenderConfig;
use flightmap::render::{render_routes_svg, svg_to_png, usvg_options};
use flightmap::routes::read_routes_file;

/// Render an aggregated route CSV onto a world map PNG.
#[derive(Parser)]
#[command(name = "plot_routes")]
struct Cli {
    /// Route CSV to plot
    #[arg(short, long, default_value = "data.csv")]
    input: PathBuf,

    /// Output PNG path
    #[arg(short, long, default_value = "flights_map.png")]
    output: PathBuf,

    /// TOML file overriding map defaults and color schemes
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Color scheme to draw with
    #[arg(long, value_parser = ["screen", "print"])]
    color_mode: Option<String>,

    /// Color by flight count instead of rank
    #[arg(long)]
    absolute: bool,

    /// Map width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Map height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    flightmap::init_tracing(cli.verbose);

    let routes = read_routes_file(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    info!("Loaded {} routes from {}", routes.len(), cli.input.display());
    if routes.is_empty() {
        warn!("input has no routes, nothing to plot");
        std::process::exit(1);
    }

    let config = RenderConfig::load(cli.config.as_deref()).with_context(|| {
        format!(
            "loading config {}",
            cli.config
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        )
    })?;
    let color_mode = cli
        .color_mode
        .as_deref()
        .unwrap_or(&config.map.color_mode)
        .to_string();
    let mut style = config.style(&color_mode)?;
    if let Some(width) = cli.width {
        style.width = width;
    }
    if let Some(height) = cli.height {
        style.height = height;
    }

    info!(
        "Rendering {}x{} map in {} mode",
        style.width, style.height, color_mode
    );
    let svg = render_routes_svg(&routes, &style, cli.absolute);
    let png = svg_to_png(&svg, &usvg_options()).context("rasterizing map")?;
    std::fs::write(&cli.output, &png)
        .with_context(|| format!("writing {}", cli.output.display()))?;
    info!(
        "Wrote {} routes to {} ({} bytes)",
        routes.len(),
        cli.output.display(),
        png.len()
    );
    Ok(())
}
