use chrono::{DateTime, Utc};

pub const FT_TO_M: f64 = 0.3048;
pub const M_TO_FT: f64 = 3.28084;
pub const KT_TO_MPS: f64 = 0.514444444;
pub const MPS_TO_KT: f64 = 1.94384;
pub const FPM_TO_MPS: f64 = 5.08e-3;
pub const MPS_TO_FPM: f64 = 196.85;
pub const KM_TO_NM: f64 = 0.539957;

/// One aircraft entry from a bulk feed snapshot. Distances in meters,
/// speeds in m/s, headings in degrees true.
#[derive(Debug, Clone)]
pub struct AircraftObservation {
    pub icao: String,
    pub callsign: Option<String>,
    pub registration: Option<String>,
    pub aircraft_type: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub altitude: Option<f64>,
    pub ground_speed: Option<f64>,
    pub track: Option<f64>,
    pub vert_rate: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// A position sample for a single tracked flight. Same units as
/// [`AircraftObservation`]; the extra fields only exist on some feeds.
#[derive(Debug, Clone)]
pub struct FlightPosition {
    pub icao: String,
    pub callsign: String,
    pub lat: f64,
    pub lon: f64,
    pub altitude: Option<f64>,
    pub ground_speed: Option<f64>,
    pub track: Option<f64>,
    pub vert_rate: Option<f64>,
    pub registration: Option<String>,
    pub aircraft_type: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub on_ground: Option<bool>,
    pub timestamp: DateTime<Utc>,
}

/// Which feed a track came from. Selects the CSV schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSource {
    AdsbExchange,
    OpenSky,
}
