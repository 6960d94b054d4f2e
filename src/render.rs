//! Map rendering. SVG documents are assembled as strings and rasterized
//! through usvg/resvg, so the output is a plain PNG with no display stack
//! involved.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use tiny_skia::Pixmap;
use usvg::{fontdb, Tree};

use crate::error::{FlightmapError, Result};
use crate::geo::{great_circle_points, GeoBounds};
use crate::routes::Route;
use crate::track::{TrackRecord, TrackStats};

/// Red, green, blue, alpha, each in [0, 1].
pub type Rgba = [f64; 4];

const TRACK_MAP_WIDTH: u32 = 1500;
const TRACK_MAP_HEIGHT: u32 = 1000;

const USA_EXTENT: GeoBounds = GeoBounds {
    min_lat: 24.0,
    min_lon: -125.0,
    max_lat: 50.0,
    max_lon: -65.0,
};

// Low to high altitude: blue, cyan, green, yellow, orange, red.
pub const ALTITUDE_COLORS: [Rgba; 6] = [
    [0.0, 0.4, 0.8, 1.0],
    [0.0, 0.8, 1.0, 1.0],
    [0.0, 1.0, 0.0, 1.0],
    [1.0, 1.0, 0.0, 1.0],
    [1.0, 0.4, 0.0, 1.0],
    [0.8, 0.0, 0.0, 1.0],
];

/// Evenly spaced color stops with linear interpolation between them.
#[derive(Debug, Clone)]
pub struct Gradient {
    stops: Vec<Rgba>,
}

impl Gradient {
    pub fn new(stops: Vec<Rgba>) -> Self {
        assert!(!stops.is_empty(), "gradient needs at least one stop");
        Self { stops }
    }

    pub fn sample(&self, t: f64) -> Rgba {
        if self.stops.len() == 1 {
            return self.stops[0];
        }
        let t = t.clamp(0.0, 1.0);
        let scaled = t * (self.stops.len() - 1) as f64;
        let index = (scaled.floor() as usize).min(self.stops.len() - 2);
        let frac = scaled - index as f64;

        let a = self.stops[index];
        let b = self.stops[index + 1];
        [
            a[0] + (b[0] - a[0]) * frac,
            a[1] + (b[1] - a[1]) * frac,
            a[2] + (b[2] - a[2]) * frac,
            a[3] + (b[3] - a[3]) * frac,
        ]
    }

    pub fn stops(&self) -> &[Rgba] {
        &self.stops
    }
}

/// Power-law normalization of `value` into [0, 1]. A degenerate range
/// maps everything to 1.0.
pub fn power_norm(value: f64, vmin: f64, vmax: f64, gamma: f64) -> f64 {
    if vmax <= vmin {
        return 1.0;
    }
    ((value - vmin) / (vmax - vmin)).clamp(0.0, 1.0).powf(gamma)
}

/// World map projection for route rendering. Longitude is linear; the
/// latitude curve is y = 1.25 ln tan(pi/4 + 0.4 lat).
#[derive(Debug, Clone, Copy)]
pub struct MillerProjection {
    pub width: f64,
    pub height: f64,
}

impl MillerProjection {
    pub fn project(&self, lat: f64, lon: f64) -> (f64, f64) {
        let x = (lon + 180.0) / 360.0 * self.width;
        let y = (1.0 - miller_y(lat) / miller_y(90.0)) / 2.0 * self.height;
        (x, y)
    }
}

fn miller_y(lat: f64) -> f64 {
    let phi = lat.to_radians();
    1.25 * (std::f64::consts::FRAC_PI_4 + 0.4 * phi).tan().ln()
}

/// Linear lat/lon projection of a fixed extent onto a pixel rectangle.
#[derive(Debug, Clone, Copy)]
pub struct PlateCarree {
    pub extent: GeoBounds,
    pub width: f64,
    pub height: f64,
}

impl PlateCarree {
    pub fn project(&self, lat: f64, lon: f64) -> (f64, f64) {
        let x = (lon - self.extent.min_lon) / (self.extent.max_lon - self.extent.min_lon)
            * self.width;
        let y = (self.extent.max_lat - lat) / (self.extent.max_lat - self.extent.min_lat)
            * self.height;
        (x, y)
    }
}

/// Resolved drawing parameters for the route map.
#[derive(Debug, Clone)]
pub struct MapStyle {
    pub width: u32,
    pub height: u32,
    pub line_width: f64,
    pub alpha: f64,
    pub power_norm_gamma: f64,
    pub background: Rgba,
    pub grid: Rgba,
    pub gradient: Gradient,
}

fn svg_color(color: Rgba) -> String {
    format!(
        "rgb({},{},{})",
        (color[0] * 255.0).round() as u8,
        (color[1] * 255.0).round() as u8,
        (color[2] * 255.0).round() as u8
    )
}

/// Split a polyline where it jumps across the antimeridian so the map
/// does not get a horizontal smear.
fn split_at_antimeridian(points: &[(f64, f64)]) -> Vec<Vec<(f64, f64)>> {
    let mut segments = Vec::new();
    let mut current: Vec<(f64, f64)> = Vec::new();
    for point in points {
        if let Some(&(_, prev_lon)) = current.last() {
            if (point.1 - prev_lon).abs() > 180.0 {
                segments.push(std::mem::take(&mut current));
            }
        }
        current.push(*point);
    }
    segments.push(current);
    segments
}

/// Render aggregated routes onto a world map. Routes are drawn quietest
/// first so the busy ones end up on top; `absolute` switches the color
/// ramp from rank order to normalized flight count.
pub fn render_routes_svg(routes: &[Route], style: &MapStyle, absolute: bool) -> String {
    let projection = MillerProjection {
        width: style.width as f64,
        height: style.height as f64,
    };

    let mut svg = format!(
        "<svg width='{w}' height='{h}' viewBox='0 0 {w} {h}' xmlns='http://www.w3.org/2000/svg'>\n",
        w = style.width,
        h = style.height
    );
    svg.push_str(&format!(
        "  <rect width='{}' height='{}' fill='{}' fill-opacity='{:.3}' />\n",
        style.width,
        style.height,
        svg_color(style.background),
        style.background[3]
    ));

    let grid_color = svg_color(style.grid);
    for lon in (-180..=180).step_by(30) {
        let (x, _) = projection.project(0.0, lon as f64);
        svg.push_str(&format!(
            "  <line x1='{x:.2}' y1='0' x2='{x:.2}' y2='{}' stroke='{}' stroke-opacity='{:.3}' stroke-width='1' />\n",
            style.height, grid_color, style.grid[3]
        ));
    }
    for lat in [-60.0, -30.0, 0.0, 30.0, 60.0] {
        let (_, y) = projection.project(lat, 0.0);
        svg.push_str(&format!(
            "  <line x1='0' y1='{y:.2}' x2='{}' y2='{y:.2}' stroke='{}' stroke-opacity='{:.3}' stroke-width='1' />\n",
            style.width, grid_color, style.grid[3]
        ));
    }

    let mut sorted: Vec<&Route> = routes.iter().collect();
    sorted.sort_by_key(|r| r.nb_flights);
    let min_count = sorted.first().map(|r| r.nb_flights as f64).unwrap_or(0.0);
    let max_count = sorted.last().map(|r| r.nb_flights as f64).unwrap_or(0.0);

    for (rank, route) in sorted.iter().enumerate() {
        let t = if absolute {
            power_norm(
                route.nb_flights as f64,
                min_count,
                max_count,
                style.power_norm_gamma,
            )
        } else {
            rank as f64 / sorted.len() as f64
        };
        let color = style.gradient.sample(t);

        let points = great_circle_points(
            (route.dep_lat, route.dep_lon),
            (route.arr_lat, route.arr_lon),
            32,
        );
        for segment in split_at_antimeridian(&points) {
            if segment.len() < 2 {
                continue;
            }
            let path: Vec<String> = segment
                .iter()
                .map(|&(lat, lon)| {
                    let (x, y) = projection.project(lat, lon);
                    format!("{:.2},{:.2}", x, y)
                })
                .collect();
            svg.push_str(&format!(
                "  <polyline points='{}' fill='none' stroke='{}' stroke-opacity='{:.3}' stroke-width='{}' stroke-linecap='round' />\n",
                path.join(" "),
                svg_color(color),
                color[3] * style.alpha,
                style.line_width
            ));
        }
    }

    svg.push_str("</svg>\n");
    svg
}

/// One plottable sample of a recorded track.
#[derive(Debug, Clone)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    pub altitude_ft: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Map extent for track rendering: fit the track, or the fixed
/// continental US window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackExtent {
    Auto,
    Usa,
}

fn track_extent(points: &[TrackPoint], mode: TrackExtent) -> GeoBounds {
    if mode == TrackExtent::Usa {
        return USA_EXTENT;
    }
    let mut min_lat = f64::INFINITY;
    let mut max_lat = f64::NEG_INFINITY;
    let mut min_lon = f64::INFINITY;
    let mut max_lon = f64::NEG_INFINITY;
    for p in points {
        min_lat = min_lat.min(p.lat);
        max_lat = max_lat.max(p.lat);
        min_lon = min_lon.min(p.lon);
        max_lon = max_lon.max(p.lon);
    }
    let pad_lat = ((max_lat - min_lat) * 0.2).max(1.0);
    let pad_lon = ((max_lon - min_lon) * 0.2).max(1.0);
    GeoBounds {
        min_lat: min_lat - pad_lat,
        min_lon: min_lon - pad_lon,
        max_lat: max_lat + pad_lat,
        max_lon: max_lon + pad_lon,
    }
}

fn grid_step(span: f64) -> f64 {
    for step in [0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0] {
        if span / step <= 10.0 {
            return step;
        }
    }
    60.0
}

fn grid_lines(min: f64, max: f64, step: f64) -> Vec<f64> {
    let mut lines = Vec::new();
    let mut value = (min / step).ceil() * step;
    while value <= max {
        lines.push(value);
        value += step;
    }
    lines
}

/// Render a single recorded track, colored by altitude, with start/end
/// markers, a colorbar, and a time-range footer. Needs at least two
/// points.
pub fn render_track_svg(
    points: &[TrackPoint],
    callsign: &str,
    title: Option<&str>,
    extent_mode: TrackExtent,
) -> Result<String> {
    if points.len() < 2 {
        return Err(FlightmapError::Render(format!(
            "need at least 2 track points, got {}",
            points.len()
        )));
    }

    let width = TRACK_MAP_WIDTH as f64;
    let height = TRACK_MAP_HEIGHT as f64;
    let margin_left = 60.0;
    let margin_top = 60.0;
    let map_width = width - margin_left - 40.0;
    let map_height = height - margin_top - 180.0;

    let extent = track_extent(points, extent_mode);
    let projection = PlateCarree {
        extent,
        width: map_width,
        height: map_height,
    };
    let gradient = Gradient::new(ALTITUDE_COLORS.to_vec());

    let altitudes: Vec<f64> = points.iter().filter_map(|p| p.altitude_ft).collect();
    let alt_min = altitudes.iter().copied().fold(f64::INFINITY, f64::min);
    let alt_max = altitudes.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let has_altitude = !altitudes.is_empty();
    // A flat altitude profile draws in the low-altitude color.
    let normalize = |alt: Option<f64>| -> f64 {
        match alt {
            Some(a) if has_altitude && alt_max > alt_min => (a - alt_min) / (alt_max - alt_min),
            Some(_) => 0.0,
            None => 0.5,
        }
    };

    let heading = match title {
        Some(t) => t.to_string(),
        None if has_altitude => format!(
            "Flight Track: {} | Altitude: {:.0} - {:.0} ft | {} points",
            callsign,
            alt_min,
            alt_max,
            points.len()
        ),
        None => format!("Flight Track: {} | {} points", callsign, points.len()),
    };

    let mut svg = format!(
        "<svg width='{w}' height='{h}' viewBox='0 0 {w} {h}' xmlns='http://www.w3.org/2000/svg'>\n",
        w = TRACK_MAP_WIDTH,
        h = TRACK_MAP_HEIGHT
    );
    svg.push_str(&format!(
        "  <rect width='{}' height='{}' fill='white' />\n",
        TRACK_MAP_WIDTH, TRACK_MAP_HEIGHT
    ));
    svg.push_str(&format!(
        "  <text x='{:.0}' y='38' font-family='sans-serif' font-size='28' text-anchor='middle' fill='#000000' font-weight='bold'>{}</text>\n",
        width / 2.0,
        heading
    ));

    svg.push_str(&format!(
        "  <g transform='translate({},{})'>\n",
        margin_left, margin_top
    ));
    svg.push_str(&format!(
        "    <rect width='{:.0}' height='{:.0}' fill='#f4f8fb' stroke='#999999' stroke-width='1' />\n",
        map_width, map_height
    ));

    // Graticule with coordinate labels.
    let step = grid_step(
        (extent.max_lat - extent.min_lat).max(extent.max_lon - extent.min_lon),
    );
    for lon in grid_lines(extent.min_lon, extent.max_lon, step) {
        let (x, _) = projection.project(extent.min_lat, lon);
        svg.push_str(&format!(
            "    <line x1='{x:.2}' y1='0' x2='{x:.2}' y2='{:.0}' stroke='#cccccc' stroke-width='1' stroke-dasharray='4 4' />\n",
            map_height
        ));
        svg.push_str(&format!(
            "    <text x='{x:.2}' y='{:.0}' font-family='sans-serif' font-size='14' text-anchor='middle' fill='#666666'>{}</text>\n",
            map_height + 20.0,
            lon
        ));
    }
    for lat in grid_lines(extent.min_lat, extent.max_lat, step) {
        let (_, y) = projection.project(lat, extent.min_lon);
        svg.push_str(&format!(
            "    <line x1='0' y1='{y:.2}' x2='{:.0}' y2='{y:.2}' stroke='#cccccc' stroke-width='1' stroke-dasharray='4 4' />\n",
            map_width
        ));
        svg.push_str(&format!(
            "    <text x='-8' y='{:.2}' font-family='sans-serif' font-size='14' text-anchor='end' fill='#666666'>{}</text>\n",
            y + 5.0,
            lat
        ));
    }

    // Track segments, each colored by the altitude at its start.
    for pair in points.windows(2) {
        let (x1, y1) = projection.project(pair[0].lat, pair[0].lon);
        let (x2, y2) = projection.project(pair[1].lat, pair[1].lon);
        let color = gradient.sample(normalize(pair[0].altitude_ft));
        svg.push_str(&format!(
            "    <line x1='{:.2}' y1='{:.2}' x2='{:.2}' y2='{:.2}' stroke='{}' stroke-width='2.5' stroke-linecap='round' />\n",
            x1, y1, x2, y2,
            svg_color(color)
        ));
    }

    // Start and end markers.
    let (start_x, start_y) = projection.project(points[0].lat, points[0].lon);
    let (end_x, end_y) = projection.project(
        points[points.len() - 1].lat,
        points[points.len() - 1].lon,
    );
    svg.push_str(&format!(
        "    <circle cx='{:.2}' cy='{:.2}' r='9' fill='#00aa00' stroke='white' stroke-width='2.5' />\n",
        start_x, start_y
    ));
    svg.push_str(&format!(
        "    <circle cx='{:.2}' cy='{:.2}' r='9' fill='#cc0000' stroke='white' stroke-width='2.5' />\n",
        end_x, end_y
    ));
    svg.push_str("  </g>\n");

    // Altitude colorbar.
    if has_altitude {
        let bar_width = 600.0;
        let bar_x = (width - bar_width) / 2.0;
        let bar_y = height - 110.0;
        svg.push_str("  <defs>\n    <linearGradient id='altitude-scale' x1='0' y1='0' x2='1' y2='0'>\n");
        let last = ALTITUDE_COLORS.len() - 1;
        for (i, stop) in ALTITUDE_COLORS.iter().enumerate() {
            svg.push_str(&format!(
                "      <stop offset='{:.0}%' stop-color='{}' />\n",
                i as f64 / last as f64 * 100.0,
                svg_color(*stop)
            ));
        }
        svg.push_str("    </linearGradient>\n  </defs>\n");
        svg.push_str(&format!(
            "  <rect x='{:.0}' y='{:.0}' width='{:.0}' height='18' fill='url(#altitude-scale)' stroke='#999999' stroke-width='1' />\n",
            bar_x, bar_y, bar_width
        ));
        svg.push_str(&format!(
            "  <text x='{:.0}' y='{:.0}' font-family='sans-serif' font-size='16' text-anchor='end' fill='#000000'>{:.0} ft</text>\n",
            bar_x - 10.0,
            bar_y + 14.0,
            alt_min
        ));
        svg.push_str(&format!(
            "  <text x='{:.0}' y='{:.0}' font-family='sans-serif' font-size='16' text-anchor='start' fill='#000000'>{:.0} ft</text>\n",
            bar_x + bar_width + 10.0,
            bar_y + 14.0,
            alt_max
        ));
        svg.push_str(&format!(
            "  <text x='{:.0}' y='{:.0}' font-family='sans-serif' font-size='16' text-anchor='middle' fill='#000000'>Altitude (feet)</text>\n",
            width / 2.0,
            bar_y + 42.0
        ));
    }

    // Time range footer.
    let start_time = points[0]
        .timestamp
        .to_rfc3339_opts(SecondsFormat::Secs, true);
    let end_time = points[points.len() - 1]
        .timestamp
        .to_rfc3339_opts(SecondsFormat::Secs, true);
    svg.push_str(&format!(
        "  <text x='{:.0}' y='{:.0}' font-family='sans-serif' font-size='16' text-anchor='middle' fill='#666666'>{} to {}</text>\n",
        width / 2.0,
        height - 30.0,
        start_time,
        end_time
    ));

    svg.push_str("</svg>\n");
    Ok(svg)
}

const ANALYSIS_WIDTH: u32 = 1600;
const ANALYSIS_HEIGHT: u32 = 1050;

// Time-progress ramp for the speed/altitude scatter, dark to bright.
const PROGRESS_COLORS: [Rgba; 3] = [
    [0.267, 0.005, 0.329, 1.0],
    [0.128, 0.567, 0.551, 1.0],
    [0.993, 0.906, 0.144, 1.0],
];

/// One cell of the analysis figure's 3x2 layout.
struct Panel {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl Panel {
    fn grid(index: usize) -> Self {
        Self {
            x: 70.0 + (index % 3) as f64 * 520.0,
            y: 100.0 + (index / 3) as f64 * 460.0,
            width: 440.0,
            height: 360.0,
        }
    }

    fn frame(&self, title: &str) -> String {
        format!(
            "  <rect x='{:.0}' y='{:.0}' width='{:.0}' height='{:.0}' fill='#fcfcfc' stroke='#999999' stroke-width='1' />\n  \
             <text x='{:.0}' y='{:.0}' font-family='sans-serif' font-size='18' text-anchor='middle' fill='#000000' font-weight='bold'>{}</text>\n",
            self.x,
            self.y,
            self.width,
            self.height,
            self.x + self.width / 2.0,
            self.y - 12.0,
            title
        )
    }

    fn scale_x(&self, value: f64, range: (f64, f64)) -> f64 {
        self.x + (value - range.0) / (range.1 - range.0) * self.width
    }

    fn scale_y(&self, value: f64, range: (f64, f64)) -> f64 {
        self.y + self.height - (value - range.0) / (range.1 - range.0) * self.height
    }

    fn no_data(&self, message: &str) -> String {
        format!(
            "  <text x='{:.0}' y='{:.0}' font-family='sans-serif' font-size='16' text-anchor='middle' fill='#666666'>{}</text>\n",
            self.x + self.width / 2.0,
            self.y + self.height / 2.0,
            message
        )
    }

    fn y_labels(&self, range: (f64, f64), unit: &str) -> String {
        format!(
            "  <text x='{x:.0}' y='{:.0}' font-family='sans-serif' font-size='13' text-anchor='end' fill='#666666'>{:.0} {unit}</text>\n  \
             <text x='{x:.0}' y='{:.0}' font-family='sans-serif' font-size='13' text-anchor='end' fill='#666666'>{:.0} {unit}</text>\n",
            self.y + self.height - 2.0,
            range.0,
            self.y + 12.0,
            range.1,
            x = self.x - 6.0,
        )
    }

    fn x_labels(&self, left: &str, right: &str) -> String {
        format!(
            "  <text x='{:.0}' y='{y:.0}' font-family='sans-serif' font-size='13' text-anchor='start' fill='#666666'>{}</text>\n  \
             <text x='{:.0}' y='{y:.0}' font-family='sans-serif' font-size='13' text-anchor='end' fill='#666666'>{}</text>\n",
            self.x,
            left,
            self.x + self.width,
            right,
            y = self.y + self.height + 18.0,
        )
    }
}

// Value span padded on both sides so extremes stay off the frame. A flat
// series gets a fixed pad instead of a zero-width range.
fn padded_range<I: Iterator<Item = f64>>(values: I) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for value in values {
        min = min.min(value);
        max = max.max(value);
    }
    if !min.is_finite() {
        return (0.0, 1.0);
    }
    let pad = if max > min { (max - min) * 0.05 } else { 1.0 };
    (min - pad, max + pad)
}

fn svg_polyline(points: &[(f64, f64)], color: &str, stroke_width: f64) -> String {
    let path: Vec<String> = points
        .iter()
        .map(|&(x, y)| format!("{:.2},{:.2}", x, y))
        .collect();
    format!(
        "  <polyline points='{}' fill='none' stroke='{}' stroke-width='{}' stroke-linejoin='round' />\n",
        path.join(" "),
        color,
        stroke_width
    )
}

fn profile_panel(
    panel: &Panel,
    title: &str,
    series: &[(f64, f64)],
    time_range: (f64, f64),
    color: &str,
    unit: &str,
    x_labels: (&str, &str),
) -> String {
    let mut svg = panel.frame(title);
    if series.len() < 2 {
        svg.push_str(&panel.no_data("No data"));
        return svg;
    }
    let value_range = padded_range(series.iter().map(|&(_, v)| v));
    let points: Vec<(f64, f64)> = series
        .iter()
        .map(|&(t, v)| (panel.scale_x(t, time_range), panel.scale_y(v, value_range)))
        .collect();
    svg.push_str(&svg_polyline(&points, color, 2.0));
    for &(x, y) in &points {
        svg.push_str(&format!(
            "  <circle cx='{:.2}' cy='{:.2}' r='3' fill='{}' />\n",
            x, y, color
        ));
    }
    svg.push_str(&panel.y_labels(value_range, unit));
    svg.push_str(&panel.x_labels(x_labels.0, x_labels.1));
    svg
}

/// Multi-panel analysis figure for a recorded track: path, altitude and
/// speed profiles, climb/descent bars, speed against altitude, and the
/// statistics block. Needs at least two points.
pub fn render_analysis_svg(records: &[TrackRecord]) -> Result<String> {
    if records.len() < 2 {
        return Err(FlightmapError::Render(format!(
            "need at least 2 track points, got {}",
            records.len()
        )));
    }

    let start = records[0].timestamp;
    let times: Vec<f64> = records
        .iter()
        .map(|r| (r.timestamp - start).num_seconds() as f64)
        .collect();
    let time_range = padded_range(times.iter().copied());
    let time_labels = (
        records[0].timestamp.format("%H:%M:%S").to_string(),
        records[records.len() - 1]
            .timestamp
            .format("%H:%M:%S")
            .to_string(),
    );
    let time_labels = (time_labels.0.as_str(), time_labels.1.as_str());

    let mut svg = format!(
        "<svg width='{w}' height='{h}' viewBox='0 0 {w} {h}' xmlns='http://www.w3.org/2000/svg'>\n",
        w = ANALYSIS_WIDTH,
        h = ANALYSIS_HEIGHT
    );
    svg.push_str(&format!(
        "  <rect width='{}' height='{}' fill='white' />\n",
        ANALYSIS_WIDTH, ANALYSIS_HEIGHT
    ));
    svg.push_str(&format!(
        "  <text x='{:.0}' y='44' font-family='sans-serif' font-size='26' text-anchor='middle' fill='#000000' font-weight='bold'>Flight Track Analysis: {}</text>\n",
        ANALYSIS_WIDTH as f64 / 2.0,
        records[0].callsign
    ));

    // Flight path with start/end markers.
    let panel = Panel::grid(0);
    svg.push_str(&panel.frame("Flight Path"));
    let lon_range = padded_range(records.iter().map(|r| r.lon));
    let lat_range = padded_range(records.iter().map(|r| r.lat));
    let path: Vec<(f64, f64)> = records
        .iter()
        .map(|r| (panel.scale_x(r.lon, lon_range), panel.scale_y(r.lat, lat_range)))
        .collect();
    svg.push_str(&svg_polyline(&path, "#0066cc", 2.0));
    let (start_x, start_y) = path[0];
    let (end_x, end_y) = path[path.len() - 1];
    svg.push_str(&format!(
        "  <circle cx='{:.2}' cy='{:.2}' r='7' fill='#00aa00' stroke='white' stroke-width='2' />\n",
        start_x, start_y
    ));
    svg.push_str(&format!(
        "  <circle cx='{:.2}' cy='{:.2}' r='7' fill='#cc0000' stroke='white' stroke-width='2' />\n",
        end_x, end_y
    ));
    svg.push_str(&panel.x_labels("Longitude", ""));

    // Altitude and speed over time.
    let altitude_series: Vec<(f64, f64)> = times
        .iter()
        .zip(records)
        .filter_map(|(&t, r)| r.altitude_feet().map(|a| (t, a)))
        .collect();
    svg.push_str(&profile_panel(
        &Panel::grid(1),
        "Altitude Profile",
        &altitude_series,
        time_range,
        "#0066cc",
        "ft",
        time_labels,
    ));

    let speed_series: Vec<(f64, f64)> = times
        .iter()
        .zip(records)
        .filter_map(|(&t, r)| r.speed_knots().map(|v| (t, v)))
        .collect();
    svg.push_str(&profile_panel(
        &Panel::grid(2),
        "Speed Profile",
        &speed_series,
        time_range,
        "#00aa00",
        "kts",
        time_labels,
    ));

    // Climb/descent bars around a zero line, green up, red down.
    let panel = Panel::grid(3);
    svg.push_str(&panel.frame("Climb/Descent Rate"));
    let rate_series: Vec<(f64, f64)> = times
        .iter()
        .zip(records)
        .filter_map(|(&t, r)| r.vertical_rate_fpm().map(|v| (t, v)))
        .collect();
    if rate_series.is_empty() {
        svg.push_str(&panel.no_data("No vertical rate data"));
    } else {
        let mut rate_range = padded_range(rate_series.iter().map(|&(_, v)| v));
        rate_range.0 = rate_range.0.min(0.0);
        rate_range.1 = rate_range.1.max(0.0);
        let zero_y = panel.scale_y(0.0, rate_range);
        let bar_width = (panel.width / records.len() as f64 * 0.6).max(2.0);
        for &(t, rate) in &rate_series {
            let x = panel.scale_x(t, time_range);
            let y = panel.scale_y(rate, rate_range);
            let color = if rate > 0.0 { "#00aa00" } else { "#cc0000" };
            svg.push_str(&format!(
                "  <rect x='{:.2}' y='{:.2}' width='{:.2}' height='{:.2}' fill='{}' fill-opacity='0.7' />\n",
                x - bar_width / 2.0,
                y.min(zero_y),
                bar_width,
                (zero_y - y).abs().max(0.5),
                color
            ));
        }
        svg.push_str(&format!(
            "  <line x1='{:.0}' y1='{zero_y:.2}' x2='{:.0}' y2='{zero_y:.2}' stroke='black' stroke-width='0.5' />\n",
            panel.x,
            panel.x + panel.width
        ));
        svg.push_str(&panel.y_labels(rate_range, "fpm"));
        svg.push_str(&panel.x_labels(time_labels.0, time_labels.1));
    }

    // Speed against altitude, colored by time progress.
    let panel = Panel::grid(4);
    svg.push_str(&panel.frame("Speed vs Altitude"));
    let scatter: Vec<(usize, f64, f64)> = records
        .iter()
        .enumerate()
        .filter_map(|(i, r)| match (r.altitude_feet(), r.speed_knots()) {
            (Some(a), Some(v)) => Some((i, a, v)),
            _ => None,
        })
        .collect();
    if scatter.is_empty() {
        svg.push_str(&panel.no_data("No speed/altitude data"));
    } else {
        let alt_range = padded_range(scatter.iter().map(|&(_, a, _)| a));
        let speed_range = padded_range(scatter.iter().map(|&(_, _, v)| v));
        let progress = Gradient::new(PROGRESS_COLORS.to_vec());
        let last = (records.len() - 1).max(1) as f64;
        for &(i, alt, speed) in &scatter {
            let color = progress.sample(i as f64 / last);
            svg.push_str(&format!(
                "  <circle cx='{:.2}' cy='{:.2}' r='6' fill='{}' fill-opacity='0.6' stroke='black' stroke-width='0.5' />\n",
                panel.scale_x(alt, alt_range),
                panel.scale_y(speed, speed_range),
                svg_color(color)
            ));
        }
        svg.push_str(&panel.y_labels(speed_range, "kts"));
        svg.push_str(&panel.x_labels("Altitude (ft)", ""));
    }

    // Statistics block.
    let panel = Panel::grid(5);
    svg.push_str(&panel.frame("Flight Statistics"));
    if let Some(stats) = TrackStats::from_records(records) {
        let mut lines = vec![
            format!("Callsign: {}", stats.callsign),
            format!("ICAO: {}", stats.icao),
            String::new(),
            format!("Duration: {:.1} minutes", stats.duration_min),
            format!("Data points: {}", stats.points),
            String::new(),
        ];
        if let (Some(alt_start), Some(alt_end), Some(gain)) =
            (stats.alt_start_ft, stats.alt_end_ft, stats.alt_gain_ft)
        {
            lines.push(format!("Altitude: {:.0} to {:.0} ft", alt_start, alt_end));
            lines.push(format!("Gain: {:+.0} ft", gain));
        }
        if let Some(climb) = stats.avg_climb_fpm {
            lines.push(format!("Avg climb: {:+.0} ft/min", climb));
        }
        if let (Some(max), Some(avg)) = (stats.max_speed_kt, stats.avg_speed_kt) {
            lines.push(format!("Speed: max {:.0} kts, avg {:.0} kts", max, avg));
        }
        lines.push(format!(
            "Distance: {:.1} km ({:.1} nm)",
            stats.distance_km, stats.distance_nm
        ));
        lines.push(String::new());
        lines.push(format!(
            "Start: {:.4}, {:.4}",
            stats.start_position.0, stats.start_position.1
        ));
        lines.push(format!(
            "End: {:.4}, {:.4}",
            stats.end_position.0, stats.end_position.1
        ));
        for (i, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            svg.push_str(&format!(
                "  <text x='{:.0}' y='{:.0}' font-family='monospace' font-size='15' fill='#000000'>{}</text>\n",
                panel.x + 20.0,
                panel.y + 34.0 + i as f64 * 26.0,
                line
            ));
        }
    }

    svg.push_str("</svg>\n");
    Ok(svg)
}

/// usvg options with system fonts loaded, shared by the rasterizing
/// binaries.
pub fn usvg_options() -> usvg::Options<'static> {
    let mut fontdb = fontdb::Database::new();
    fontdb.load_system_fonts();
    let mut options = usvg::Options::default();
    options.fontdb = Arc::new(fontdb);
    options
}

pub fn svg_to_png(svg: &str, options: &usvg::Options) -> Result<Vec<u8>> {
    let tree = Tree::from_str(svg, options)?;

    let pixmap_size = tree.size();
    let mut pixmap = Pixmap::new(pixmap_size.width() as u32, pixmap_size.height() as u32)
        .ok_or_else(|| FlightmapError::Render("zero-sized pixmap".to_string()))?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|e| FlightmapError::Render(e.to_string()))
}
