//! ADS-B Exchange feed client. One GET of the global aircraft snapshot,
//! typed parsing, unit conversion into the crate's metric types.

use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info};

use crate::callsign::{callsign_variants, matches_variants, similar_callsigns};
use crate::error::Result;
use crate::geo::GeoFilter;
use crate::types::{AircraftObservation, FlightPosition, FPM_TO_MPS, FT_TO_M, KT_TO_MPS};

const AIRCRAFT_URL: &str = "https://globe.adsbexchange.com/data/aircraft.json";
const USER_AGENT: &str = concat!("flightmap/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct AircraftJson {
    aircraft: Option<Vec<RawAircraft>>,
}

/// One aircraft entry as the feed sends it: altitudes in feet (or the
/// literal string "ground"), speeds in knots, vertical rates in ft/min.
#[derive(Debug, Deserialize)]
pub struct RawAircraft {
    pub hex: Option<String>,
    pub flight: Option<String>,
    #[serde(rename = "r")]
    pub registration: Option<String>,
    #[serde(rename = "t")]
    pub aircraft_type: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub alt_baro: Option<serde_json::Value>,
    pub alt_geom: Option<serde_json::Value>,
    pub gs: Option<f64>,
    pub track: Option<f64>,
    pub baro_rate: Option<f64>,
    pub geom_rate: Option<f64>,
    #[serde(rename = "from")]
    pub origin: Option<String>,
    #[serde(rename = "to")]
    pub destination: Option<String>,
}

impl RawAircraft {
    /// Barometric altitude preferred, geometric as fallback, converted to
    /// meters. "ground" and other non-numeric values come back as None.
    fn altitude_m(&self) -> Option<f64> {
        let value = self.alt_baro.as_ref().or(self.alt_geom.as_ref())?;
        value.as_f64().map(|ft| ft * FT_TO_M)
    }

    fn vert_rate_mps(&self) -> Option<f64> {
        self.baro_rate.or(self.geom_rate).map(|fpm| fpm * FPM_TO_MPS)
    }
}

pub struct AdsbExchange {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl AdsbExchange {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, api_key })
    }

    /// Fetch the current global snapshot.
    pub async fn fetch_aircraft(&self) -> Result<Vec<RawAircraft>> {
        info!("Fetching aircraft from ADS-B Exchange: {}", AIRCRAFT_URL);
        let mut request = self.client.get(AIRCRAFT_URL);
        if let Some(key) = &self.api_key {
            request = request.header("api-auth", key);
        }
        let resp: AircraftJson = request.send().await?.error_for_status()?.json().await?;
        let aircraft = resp.aircraft.unwrap_or_default();
        info!("Received {} aircraft entries", aircraft.len());
        Ok(aircraft)
    }

    /// Look up a single flight by callsign, trying the usual spelling
    /// variants. Logs similar callsigns when nothing matches.
    pub async fn find_flight(&self, callsign: &str) -> Result<Option<FlightPosition>> {
        let variants = callsign_variants(callsign);
        debug!("Trying callsign variants: {:?}", variants);
        let aircraft = self.fetch_aircraft().await?;

        let timestamp = Utc::now();
        for ac in &aircraft {
            let Some(flight) = ac.flight.as_deref() else {
                continue;
            };
            if !matches_variants(flight, &variants) {
                continue;
            }
            let (Some(lat), Some(lon)) = (ac.lat, ac.lon) else {
                continue;
            };
            return Ok(Some(FlightPosition {
                icao: ac.hex.as_deref().unwrap_or_default().to_uppercase(),
                callsign: flight.trim().to_uppercase(),
                lat,
                lon,
                altitude: ac.altitude_m(),
                ground_speed: ac.gs.map(|kt| kt * KT_TO_MPS),
                track: ac.track,
                vert_rate: ac.vert_rate_mps(),
                registration: ac.registration.clone(),
                aircraft_type: ac.aircraft_type.clone(),
                origin: ac.origin.clone(),
                destination: ac.destination.clone(),
                on_ground: None,
                timestamp,
            }));
        }

        let seen = aircraft.iter().filter_map(|ac| ac.flight.as_deref());
        let similar = similar_callsigns(seen, &variants, 10);
        if !similar.is_empty() {
            info!(
                "No match for {}; similar callsigns in view: {}",
                callsign,
                similar.join(", ")
            );
        }
        Ok(None)
    }
}

/// Convert raw feed entries into observations, skipping entries without a
/// position and applying the geographic filter.
pub fn parse_observations(raw: &[RawAircraft], filter: &GeoFilter) -> Vec<AircraftObservation> {
    let timestamp = Utc::now();
    let mut observations = Vec::new();

    for ac in raw {
        let (Some(lat), Some(lon)) = (ac.lat, ac.lon) else {
            continue;
        };
        if !filter.accepts(lat, lon) {
            continue;
        }
        observations.push(AircraftObservation {
            icao: ac.hex.as_deref().unwrap_or_default().to_uppercase(),
            callsign: trimmed(ac.flight.as_deref()),
            registration: trimmed(ac.registration.as_deref()),
            aircraft_type: trimmed(ac.aircraft_type.as_deref()),
            lat,
            lon,
            altitude: ac.altitude_m(),
            ground_speed: ac.gs.map(|kt| kt * KT_TO_MPS),
            track: ac.track,
            vert_rate: ac.vert_rate_mps(),
            timestamp,
        });
    }

    observations
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoBounds;
    use serde_json::json;

    fn sample(value: serde_json::Value) -> RawAircraft {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_converts_units() {
        let raw = vec![sample(json!({
            "hex": "a1b2c3",
            "flight": "UAL262 ",
            "r": "N37298",
            "t": "B739",
            "lat": 37.6213,
            "lon": -122.379,
            "alt_baro": 35000,
            "gs": 450.0,
            "track": 270.0,
            "baro_rate": -500,
            "from": "KSFO San Francisco",
            "to": "KEWR Newark"
        }))];

        let observations = parse_observations(&raw, &GeoFilter::default());
        assert_eq!(observations.len(), 1);
        let obs = &observations[0];
        assert_eq!(obs.icao, "A1B2C3");
        assert_eq!(obs.callsign.as_deref(), Some("UAL262"));
        assert_eq!(obs.registration.as_deref(), Some("N37298"));
        assert!((obs.altitude.unwrap() - 35000.0 * FT_TO_M).abs() < 1e-6);
        assert!((obs.ground_speed.unwrap() - 450.0 * KT_TO_MPS).abs() < 1e-6);
        assert_eq!(obs.track, Some(270.0));
        assert!((obs.vert_rate.unwrap() + 500.0 * FPM_TO_MPS).abs() < 1e-6);
    }

    #[test]
    fn test_parse_ground_altitude_is_none() {
        let raw = vec![sample(json!({
            "hex": "a1b2c3",
            "lat": 37.6213,
            "lon": -122.379,
            "alt_baro": "ground"
        }))];

        let observations = parse_observations(&raw, &GeoFilter::default());
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].altitude, None);
    }

    #[test]
    fn test_parse_geom_altitude_fallback() {
        let raw = sample(json!({
            "hex": "a1b2c3",
            "lat": 1.0,
            "lon": 2.0,
            "alt_geom": 10000
        }));
        assert!((raw.altitude_m().unwrap() - 10000.0 * FT_TO_M).abs() < 1e-6);
    }

    #[test]
    fn test_parse_skips_entries_without_position() {
        let raw = vec![
            sample(json!({ "hex": "a1b2c3", "flight": "UAL262" })),
            sample(json!({ "hex": "d4e5f6", "lat": 10.0, "lon": 20.0 })),
        ];

        let observations = parse_observations(&raw, &GeoFilter::default());
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].icao, "D4E5F6");
    }

    #[test]
    fn test_parse_applies_filter() {
        let raw = vec![
            sample(json!({ "hex": "a1b2c3", "lat": 40.0, "lon": -100.0 })),
            sample(json!({ "hex": "d4e5f6", "lat": 10.0, "lon": 20.0 })),
        ];
        let filter = GeoFilter {
            bounds: Some(GeoBounds {
                min_lat: 30.0,
                min_lon: -130.0,
                max_lat: 50.0,
                max_lon: -60.0,
            }),
            ..Default::default()
        };

        let observations = parse_observations(&raw, &filter);
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].icao, "A1B2C3");
    }

    #[test]
    fn test_blank_callsign_is_none() {
        let raw = vec![sample(json!({
            "hex": "a1b2c3",
            "flight": "   ",
            "lat": 1.0,
            "lon": 2.0
        }))];

        let observations = parse_observations(&raw, &GeoFilter::default());
        assert_eq!(observations[0].callsign, None);
    }
}
