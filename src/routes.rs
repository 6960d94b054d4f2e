//! Route aggregation. Each fast-moving observation is snapped to a grid
//! cell and extended along its heading into a synthetic departure/arrival
//! pair; identical pairs are counted together.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::geo::{heading_offsets, round_decimals, snap_to_grid};
use crate::types::{AircraftObservation, KT_TO_MPS};

// Synthetic route length in degrees, roughly 500 km.
pub const ROUTE_LENGTH_DEG: f64 = 5.0;
// Observations at or below this ground speed do not contribute routes.
pub const MIN_ROUTE_SPEED_KT: f64 = 50.0;
// Placeholder intensity until a real emissions model exists.
pub const DEFAULT_CO2_INTENSITY: f64 = 50.0;

pub const DEFAULT_GRID_RESOLUTION: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(rename = "DepLat")]
    pub dep_lat: f64,
    #[serde(rename = "DepLon")]
    pub dep_lon: f64,
    #[serde(rename = "ArrLat")]
    pub arr_lat: f64,
    #[serde(rename = "ArrLon")]
    pub arr_lon: f64,
    #[serde(rename = "NbFlights")]
    pub nb_flights: u32,
    #[serde(rename = "CO2Intensity")]
    pub co2_intensity: f64,
}

// Endpoints in tenths of a degree, so rounded coordinates hash exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RouteKey {
    dep_lat: i64,
    dep_lon: i64,
    arr_lat: i64,
    arr_lon: i64,
}

impl RouteKey {
    fn new(dep: (f64, f64), arr: (f64, f64)) -> Self {
        Self {
            dep_lat: (dep.0 * 10.0).round() as i64,
            dep_lon: (dep.1 * 10.0).round() as i64,
            arr_lat: (arr.0 * 10.0).round() as i64,
            arr_lon: (arr.1 * 10.0).round() as i64,
        }
    }
}

pub struct RouteAggregator {
    min_flights: u32,
    grid_resolution: f64,
    counts: HashMap<RouteKey, u32>,
}

impl RouteAggregator {
    pub fn new(min_flights: u32, grid_resolution: f64) -> Self {
        Self {
            min_flights,
            grid_resolution,
            counts: HashMap::new(),
        }
    }

    /// Fold one observation into the aggregate. Returns whether it
    /// contributed: observations without a heading, without a speed, or
    /// at or below the speed floor are ignored.
    pub fn add(&mut self, obs: &AircraftObservation) -> bool {
        let Some(track) = obs.track else {
            return false;
        };
        let Some(speed) = obs.ground_speed else {
            return false;
        };
        if speed <= MIN_ROUTE_SPEED_KT * KT_TO_MPS {
            return false;
        }

        let grid_lat = snap_to_grid(obs.lat, self.grid_resolution);
        let grid_lon = snap_to_grid(obs.lon, self.grid_resolution);
        let (dlat, dlon) = heading_offsets(obs.lat, track, ROUTE_LENGTH_DEG);

        let dep = (
            round_decimals(grid_lat - dlat / 2.0, 1),
            round_decimals(grid_lon - dlon / 2.0, 1),
        );
        let arr = (
            round_decimals(grid_lat + dlat / 2.0, 1),
            round_decimals(grid_lon + dlon / 2.0, 1),
        );

        let key = RouteKey::new(dep, arr);
        *self.counts.entry(key).or_insert(0) += 1;
        debug!(
            "Observation {} at ({:.3}, {:.3}) -> cell ({}, {})",
            obs.icao, obs.lat, obs.lon, grid_lat, grid_lon
        );
        true
    }

    /// Routes meeting the minimum flight count, busiest first.
    pub fn routes(&self) -> Vec<Route> {
        let mut routes: Vec<Route> = self
            .counts
            .iter()
            .filter(|&(_, &count)| count >= self.min_flights)
            .map(|(key, &count)| Route {
                dep_lat: key.dep_lat as f64 / 10.0,
                dep_lon: key.dep_lon as f64 / 10.0,
                arr_lat: key.arr_lat as f64 / 10.0,
                arr_lon: key.arr_lon as f64 / 10.0,
                nb_flights: count,
                co2_intensity: DEFAULT_CO2_INTENSITY,
            })
            .collect();

        routes.sort_by(|a, b| {
            b.nb_flights
                .cmp(&a.nb_flights)
                .then_with(|| a.dep_lat.total_cmp(&b.dep_lat))
                .then_with(|| a.dep_lon.total_cmp(&b.dep_lon))
                .then_with(|| a.arr_lat.total_cmp(&b.arr_lat))
                .then_with(|| a.arr_lon.total_cmp(&b.arr_lon))
        });

        info!(
            "{} distinct routes, {} meet the minimum of {} flights",
            self.counts.len(),
            routes.len(),
            self.min_flights
        );
        routes
    }
}

/// Write routes as semicolon-separated CSV with five-decimal coordinates.
pub fn write_routes<W: io::Write>(writer: W, routes: &[Route]) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new().delimiter(b';').from_writer(writer);
    csv_writer.write_record([
        "DepLat",
        "DepLon",
        "ArrLat",
        "ArrLon",
        "NbFlights",
        "CO2Intensity",
    ])?;
    for route in routes {
        csv_writer.write_record([
            format!("{:.5}", route.dep_lat),
            format!("{:.5}", route.dep_lon),
            format!("{:.5}", route.arr_lat),
            format!("{:.5}", route.arr_lon),
            route.nb_flights.to_string(),
            format!("{:.5}", route.co2_intensity),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_routes_file<P: AsRef<Path>>(path: P, routes: &[Route]) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_routes(BufWriter::new(file), routes)
}

/// Read a route CSV. Malformed rows are an error, not a skip.
pub fn read_routes<R: io::Read>(reader: R) -> Result<Vec<Route>> {
    let mut csv_reader = csv::ReaderBuilder::new().delimiter(b';').from_reader(reader);
    let mut routes = Vec::new();
    for result in csv_reader.deserialize() {
        let route: Route = result?;
        routes.push(route);
    }
    Ok(routes)
}

pub fn read_routes_file<P: AsRef<Path>>(path: P) -> Result<Vec<Route>> {
    let file = File::open(path.as_ref())?;
    read_routes(io::BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn obs(lat: f64, lon: f64, track: Option<f64>, speed_kt: Option<f64>) -> AircraftObservation {
        AircraftObservation {
            icao: "A1B2C3".to_string(),
            callsign: Some("UAL262".to_string()),
            registration: None,
            aircraft_type: None,
            lat,
            lon,
            altitude: Some(10000.0),
            ground_speed: speed_kt.map(|kt| kt * KT_TO_MPS),
            track,
            vert_rate: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_identical_observations_share_a_route() {
        let mut aggregator = RouteAggregator::new(1, DEFAULT_GRID_RESOLUTION);
        assert!(aggregator.add(&obs(40.2, -100.3, Some(0.0), Some(450.0))));
        assert!(aggregator.add(&obs(40.2, -100.3, Some(0.0), Some(450.0))));

        let routes = aggregator.routes();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].nb_flights, 2);
    }

    #[test]
    fn test_northbound_route_endpoints() {
        let mut aggregator = RouteAggregator::new(1, DEFAULT_GRID_RESOLUTION);
        aggregator.add(&obs(40.2, -100.3, Some(0.0), Some(450.0)));

        let routes = aggregator.routes();
        assert_eq!(routes.len(), 1);
        let route = &routes[0];
        // Cell (40, -100) extended 2.5 degrees north and south.
        assert!((route.dep_lat - 37.5).abs() < 1e-9);
        assert!((route.dep_lon + 100.0).abs() < 1e-9);
        assert!((route.arr_lat - 42.5).abs() < 1e-9);
        assert!((route.arr_lon + 100.0).abs() < 1e-9);
        assert_eq!(route.co2_intensity, DEFAULT_CO2_INTENSITY);
    }

    #[test]
    fn test_slow_or_headingless_observations_ignored() {
        let mut aggregator = RouteAggregator::new(1, DEFAULT_GRID_RESOLUTION);
        assert!(!aggregator.add(&obs(40.2, -100.3, None, Some(450.0))));
        assert!(!aggregator.add(&obs(40.2, -100.3, Some(90.0), None)));
        assert!(!aggregator.add(&obs(40.2, -100.3, Some(90.0), Some(40.0))));
        assert!(!aggregator.add(&obs(40.2, -100.3, Some(90.0), Some(50.0))));
        assert!(aggregator.routes().is_empty());
    }

    #[test]
    fn test_min_flights_threshold() {
        let mut aggregator = RouteAggregator::new(2, DEFAULT_GRID_RESOLUTION);
        aggregator.add(&obs(40.2, -100.3, Some(0.0), Some(450.0)));
        assert!(aggregator.routes().is_empty());

        aggregator.add(&obs(40.4, -100.1, Some(0.0), Some(430.0)));
        let routes = aggregator.routes();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].nb_flights, 2);
    }

    #[test]
    fn test_routes_sorted_busiest_first() {
        let mut aggregator = RouteAggregator::new(1, DEFAULT_GRID_RESOLUTION);
        aggregator.add(&obs(10.0, 10.0, Some(0.0), Some(450.0)));
        aggregator.add(&obs(40.0, -100.0, Some(0.0), Some(450.0)));
        aggregator.add(&obs(40.0, -100.0, Some(0.0), Some(450.0)));

        let routes = aggregator.routes();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].nb_flights, 2);
        assert_eq!(routes[1].nb_flights, 1);
    }

    #[test]
    fn test_csv_round_trip() {
        let routes = vec![
            Route {
                dep_lat: 37.5,
                dep_lon: -100.0,
                arr_lat: 42.5,
                arr_lon: -100.0,
                nb_flights: 3,
                co2_intensity: 50.0,
            },
            Route {
                dep_lat: -12.3,
                dep_lon: 45.6,
                arr_lat: -7.8,
                arr_lon: 50.1,
                nb_flights: 1,
                co2_intensity: 50.0,
            },
        ];

        let mut buffer = Vec::new();
        write_routes(&mut buffer, &routes).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("DepLat;DepLon;ArrLat;ArrLon;NbFlights;CO2Intensity"));
        assert!(text.contains("37.50000;-100.00000;42.50000;-100.00000;3;50.00000"));

        let parsed = read_routes(text.as_bytes()).unwrap();
        assert_eq!(parsed.len(), routes.len());
        for (a, b) in parsed.iter().zip(&routes) {
            assert!((a.dep_lat - b.dep_lat).abs() < 1e-5);
            assert!((a.dep_lon - b.dep_lon).abs() < 1e-5);
            assert!((a.arr_lat - b.arr_lat).abs() < 1e-5);
            assert!((a.arr_lon - b.arr_lon).abs() < 1e-5);
            assert_eq!(a.nb_flights, b.nb_flights);
        }
    }

    #[test]
    fn test_malformed_csv_is_an_error() {
        let text = "DepLat;DepLon;ArrLat;ArrLon;NbFlights;CO2Intensity\nnot;a;valid;row;x;y\n";
        assert!(read_routes(text.as_bytes()).is_err());
    }
}
