//! OpenSky Network client. States come back as untyped arrays, addressed
//! by index per the states/all API.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use crate::callsign::{callsign_variants, matches_variants, similar_callsigns};
use crate::error::Result;
use crate::geo::GeoBounds;
use crate::types::FlightPosition;

const STATES_URL: &str = "https://opensky-network.org/api/states/all";
const USER_AGENT: &str = concat!("flightmap/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct StatesResponse {
    pub time: Option<i64>,
    pub states: Option<Vec<Vec<serde_json::Value>>>,
}

pub struct OpenSky {
    client: reqwest::Client,
    username: Option<String>,
    password: Option<String>,
}

impl OpenSky {
    pub fn new(username: Option<String>, password: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            username,
            password,
        })
    }

    /// Fetch current state vectors, optionally restricted to a bounding
    /// box. Anonymous access works but is heavily rate limited.
    pub async fn fetch_states(&self, bounds: Option<&GeoBounds>) -> Result<StatesResponse> {
        info!("Fetching states from OpenSky: {}", STATES_URL);
        let mut request = self.client.get(STATES_URL);
        if let Some(bounds) = bounds {
            request = request.query(&[
                ("lamin", bounds.min_lat),
                ("lomin", bounds.min_lon),
                ("lamax", bounds.max_lat),
                ("lomax", bounds.max_lon),
            ]);
        }
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            request = request.basic_auth(username, Some(password));
        }
        let resp: StatesResponse = request.send().await?.error_for_status()?.json().await?;
        Ok(resp)
    }

    pub async fn find_flight(
        &self,
        callsign: &str,
        bounds: Option<&GeoBounds>,
    ) -> Result<Option<FlightPosition>> {
        let variants = callsign_variants(callsign);
        debug!("Trying callsign variants: {:?}", variants);
        let resp = self.fetch_states(bounds).await?;
        let positions = parse_states(&resp);
        info!("Received {} state vectors", positions.len());

        for position in &positions {
            if matches_variants(&position.callsign, &variants) {
                return Ok(Some(position.clone()));
            }
        }

        let seen = positions.iter().map(|p| p.callsign.as_str());
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

/// Parse state vectors into positions. Indices per the states/all API:
/// 0 icao24, 1 callsign, 5 longitude, 6 latitude, 7 barometric altitude m,
/// 8 on_ground, 9 velocity m/s, 10 true track, 11 vertical rate m/s.
/// Entries without a position are skipped; a null altitude becomes 0.0.
pub fn parse_states(resp: &StatesResponse) -> Vec<FlightPosition> {
    let timestamp = resp
        .time
        .and_then(|t| Utc.timestamp_opt(t, 0).single())
        .unwrap_or_else(Utc::now);

    let Some(states) = &resp.states else {
        return Vec::new();
    };

    let mut positions = Vec::new();
    for state in states {
        if state.len() < 12 {
            continue;
        }
        let longitude = state[5].as_f64();
        let latitude = state[6].as_f64();
        let (Some(lat), Some(lon)) = (latitude, longitude) else {
            continue;
        };
        positions.push(FlightPosition {
            icao: state[0].as_str().unwrap_or_default().to_uppercase(),
            callsign: state[1].as_str().unwrap_or_default().trim().to_string(),
            lat,
            lon,
            altitude: Some(state[7].as_f64().unwrap_or(0.0)),
            ground_speed: state[9].as_f64(),
            track: state[10].as_f64(),
            vert_rate: state[11].as_f64(),
            registration: None,
            aircraft_type: None,
            origin: None,
            destination: None,
            on_ground: state[8].as_bool(),
            timestamp,
        });
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: serde_json::Value) -> StatesResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_states() {
        let resp = response(json!({
            "time": 1755700000,
            "states": [[
                "a1b2c3", "UAL262  ", "United States", 1755699990, 1755700000,
                -122.379, 37.6213, 10668.0, false, 231.5, 270.0, -2.5,
                null, 10700.0, "1200", false, 0
            ]]
        }));

        let positions = parse_states(&resp);
        assert_eq!(positions.len(), 1);
        let p = &positions[0];
        assert_eq!(p.icao, "A1B2C3");
        assert_eq!(p.callsign, "UAL262");
        assert_eq!(p.lat, 37.6213);
        assert_eq!(p.lon, -122.379);
        assert_eq!(p.altitude, Some(10668.0));
        assert_eq!(p.ground_speed, Some(231.5));
        assert_eq!(p.track, Some(270.0));
        assert_eq!(p.vert_rate, Some(-2.5));
        assert_eq!(p.on_ground, Some(false));
        assert_eq!(p.timestamp.timestamp(), 1755700000);
    }

    #[test]
    fn test_parse_states_null_altitude_becomes_zero() {
        let resp = response(json!({
            "time": 1755700000,
            "states": [[
                "a1b2c3", "UAL262", "US", null, 1755700000,
                -122.379, 37.6213, null, true, null, null, null,
                null, null, null, false, 0
            ]]
        }));

        let positions = parse_states(&resp);
        assert_eq!(positions[0].altitude, Some(0.0));
        assert_eq!(positions[0].ground_speed, None);
        assert_eq!(positions[0].on_ground, Some(true));
    }

    #[test]
    fn test_parse_states_skips_missing_position() {
        let resp = response(json!({
            "time": 1755700000,
            "states": [[
                "a1b2c3", "UAL262", "US", null, 1755700000,
                null, null, 10668.0, false, 231.5, 270.0, -2.5,
                null, null, null, false, 0
            ]]
        }));

        assert!(parse_states(&resp).is_empty());
    }

    #[test]
    fn test_parse_states_handles_empty_response() {
        let resp = response(json!({ "time": 1755700000, "states": null }));
        assert!(parse_states(&resp).is_empty());
    }
}
