//! Track persistence and summary statistics. The two feeds write slightly
//! different column sets; the reader accepts either.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;

use crate::error::Result;
use crate::geo::haversine_km;
use crate::types::{FlightPosition, TrackSource, KM_TO_NM, MPS_TO_FPM, MPS_TO_KT, M_TO_FT};

const ADSBX_HEADER: [&str; 16] = [
    "Timestamp",
    "Callsign",
    "ICAO",
    "Latitude",
    "Longitude",
    "Altitude_m",
    "Altitude_ft",
    "Speed_mps",
    "Speed_kts",
    "Track",
    "VertRate_mps",
    "VertRate_fpm",
    "Registration",
    "AircraftType",
    "Origin",
    "Destination",
];

const OPENSKY_HEADER: [&str; 13] = [
    "Timestamp",
    "Callsign",
    "ICAO",
    "Latitude",
    "Longitude",
    "Altitude_m",
    "Altitude_ft",
    "Velocity_mps",
    "Velocity_kts",
    "Track",
    "VertRate_mps",
    "VertRate_fpm",
    "OnGround",
];

/// Write a track CSV in the schema of its source feed. Absent values
/// become empty fields.
pub fn write_track<W: io::Write>(
    writer: W,
    positions: &[FlightPosition],
    source: TrackSource,
) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    match source {
        TrackSource::AdsbExchange => {
            csv_writer.write_record(ADSBX_HEADER)?;
            for p in positions {
                csv_writer.write_record([
                    p.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                    p.callsign.clone(),
                    p.icao.clone(),
                    format!("{:.6}", p.lat),
                    format!("{:.6}", p.lon),
                    fmt_opt(p.altitude, 1),
                    fmt_opt(p.altitude.map(|m| m * M_TO_FT), 0),
                    fmt_opt(p.ground_speed, 2),
                    fmt_opt(p.ground_speed.map(|v| v * MPS_TO_KT), 1),
                    fmt_opt(p.track, 1),
                    fmt_opt(p.vert_rate, 2),
                    fmt_opt(p.vert_rate.map(|v| v * MPS_TO_FPM), 0),
                    p.registration.clone().unwrap_or_default(),
                    p.aircraft_type.clone().unwrap_or_default(),
                    p.origin.clone().unwrap_or_default(),
                    p.destination.clone().unwrap_or_default(),
                ])?;
            }
        }
        TrackSource::OpenSky => {
            csv_writer.write_record(OPENSKY_HEADER)?;
            for p in positions {
                csv_writer.write_record([
                    p.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                    p.callsign.clone(),
                    p.icao.clone(),
                    format!("{:.6}", p.lat),
                    format!("{:.6}", p.lon),
                    fmt_opt(p.altitude, 1),
                    fmt_opt(p.altitude.map(|m| m * M_TO_FT), 0),
                    fmt_opt(p.ground_speed, 2),
                    fmt_opt(p.ground_speed.map(|v| v * MPS_TO_KT), 1),
                    fmt_opt(p.track, 1),
                    fmt_opt(p.vert_rate, 2),
                    fmt_opt(p.vert_rate.map(|v| v * MPS_TO_FPM), 0),
                    p.on_ground.map(|b| b.to_string()).unwrap_or_default(),
                ])?;
            }
        }
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_track_file<P: AsRef<Path>>(
    path: P,
    positions: &[FlightPosition],
    source: TrackSource,
) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_track(BufWriter::new(file), positions, source)
}

fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    value
        .map(|v| format!("{:.*}", decimals, v))
        .unwrap_or_default()
}

/// One row of a saved track. Field aliases cover both feed schemas.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackRecord {
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "Callsign")]
    pub callsign: String,
    #[serde(rename = "ICAO")]
    pub icao: String,
    #[serde(rename = "Latitude")]
    pub lat: f64,
    #[serde(rename = "Longitude")]
    pub lon: f64,
    #[serde(rename = "Altitude_m", default)]
    pub altitude_m: Option<f64>,
    #[serde(rename = "Altitude_ft", default)]
    pub altitude_ft: Option<f64>,
    #[serde(rename = "Speed_mps", alias = "Velocity_mps", default)]
    pub speed_mps: Option<f64>,
    #[serde(rename = "Speed_kts", alias = "Velocity_kts", default)]
    pub speed_kts: Option<f64>,
    #[serde(rename = "Track", default)]
    pub track: Option<f64>,
    #[serde(rename = "VertRate_mps", default)]
    pub vert_rate_mps: Option<f64>,
    #[serde(rename = "VertRate_fpm", default)]
    pub vert_rate_fpm: Option<f64>,
    #[serde(rename = "Registration", default)]
    pub registration: Option<String>,
    #[serde(rename = "AircraftType", default)]
    pub aircraft_type: Option<String>,
    #[serde(rename = "Origin", default)]
    pub origin: Option<String>,
    #[serde(rename = "Destination", default)]
    pub destination: Option<String>,
    #[serde(rename = "OnGround", default)]
    pub on_ground: Option<bool>,
}

impl TrackRecord {
    pub fn altitude_feet(&self) -> Option<f64> {
        self.altitude_ft.or(self.altitude_m.map(|m| m * M_TO_FT))
    }

    pub fn speed_knots(&self) -> Option<f64> {
        self.speed_kts.or(self.speed_mps.map(|v| v * MPS_TO_KT))
    }

    pub fn vertical_rate_fpm(&self) -> Option<f64> {
        self.vert_rate_fpm
            .or(self.vert_rate_mps.map(|v| v * MPS_TO_FPM))
    }
}

/// Read a track CSV in either schema. Malformed rows are an error.
pub fn read_track<R: io::Read>(reader: R) -> Result<Vec<TrackRecord>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    for result in csv_reader.deserialize() {
        let record: TrackRecord = result?;
        records.push(record);
    }
    Ok(records)
}

pub fn read_track_file<P: AsRef<Path>>(path: P) -> Result<Vec<TrackRecord>> {
    let file = File::open(path.as_ref())?;
    read_track(io::BufReader::new(file))
}

/// Human-readable block for one position update, as the tracking tools
/// print it. Absent fields are left out.
pub fn format_position(position: &FlightPosition, update: usize) -> String {
    let mut out = format!("\n=== Update {} ===\n", update);
    out.push_str(&format!(
        "  Time:      {}\n",
        position
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    out.push_str(&format!(
        "  Position:  {:.6}, {:.6}\n",
        position.lat, position.lon
    ));
    if let Some(alt) = position.altitude {
        out.push_str(&format!(
            "  Altitude:  {:.1} m ({:.0} ft)\n",
            alt,
            alt * M_TO_FT
        ));
    }
    if let Some(speed) = position.ground_speed {
        out.push_str(&format!(
            "  Speed:     {:.1} kts ({:.2} m/s)\n",
            speed * MPS_TO_KT,
            speed
        ));
    }
    if let Some(track) = position.track {
        out.push_str(&format!("  Heading:   {:.1} deg\n", track));
    }
    if let Some(rate) = position.vert_rate {
        out.push_str(&format!(
            "  Vert rate: {:+.2} m/s ({:+.0} ft/min)\n",
            rate,
            rate * MPS_TO_FPM
        ));
    }
    match (&position.aircraft_type, &position.registration) {
        (Some(aircraft_type), Some(registration)) => {
            out.push_str(&format!("  Aircraft:  {} ({})\n", aircraft_type, registration));
        }
        (Some(aircraft_type), None) => {
            out.push_str(&format!("  Aircraft:  {}\n", aircraft_type));
        }
        (None, Some(registration)) => {
            out.push_str(&format!("  Aircraft:  {}\n", registration));
        }
        (None, None) => {}
    }
    if let (Some(origin), Some(destination)) = (&position.origin, &position.destination) {
        out.push_str(&format!("  Route:     {} -> {}\n", origin, destination));
    }
    if let Some(on_ground) = position.on_ground {
        out.push_str(&format!(
            "  On ground: {}\n",
            if on_ground { "yes" } else { "no" }
        ));
    }
    out
}

/// Summary of a recorded track: how long, how far, how high.
#[derive(Debug, Clone)]
pub struct TrackStats {
    pub callsign: String,
    pub icao: String,
    pub points: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_min: f64,
    pub alt_start_ft: Option<f64>,
    pub alt_end_ft: Option<f64>,
    pub alt_gain_ft: Option<f64>,
    pub avg_climb_fpm: Option<f64>,
    pub max_speed_kt: Option<f64>,
    pub avg_speed_kt: Option<f64>,
    pub distance_km: f64,
    pub distance_nm: f64,
    pub start_position: (f64, f64),
    pub end_position: (f64, f64),
}

impl TrackStats {
    pub fn from_records(records: &[TrackRecord]) -> Option<Self> {
        let first = records.first()?;
        let last = records.last()?;

        let duration_min = (last.timestamp - first.timestamp).num_seconds() as f64 / 60.0;

        let alt_start_ft = first.altitude_feet();
        let alt_end_ft = last.altitude_feet();
        let alt_gain_ft = match (alt_start_ft, alt_end_ft) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        };
        let avg_climb_fpm = alt_gain_ft.and_then(|gain| {
            if duration_min > 0.0 {
                Some(gain / duration_min)
            } else {
                None
            }
        });

        let speeds: Vec<f64> = records.iter().filter_map(|r| r.speed_knots()).collect();
        let max_speed_kt = speeds.iter().copied().fold(None, |max: Option<f64>, v| {
            Some(max.map_or(v, |m| m.max(v)))
        });
        let avg_speed_kt = if speeds.is_empty() {
            None
        } else {
            Some(speeds.iter().sum::<f64>() / speeds.len() as f64)
        };

        let distance_km = records
            .windows(2)
            .map(|pair| haversine_km(pair[0].lat, pair[0].lon, pair[1].lat, pair[1].lon))
            .sum();

        Some(Self {
            callsign: first.callsign.clone(),
            icao: first.icao.clone(),
            points: records.len(),
            start_time: first.timestamp,
            end_time: last.timestamp,
            duration_min,
            alt_start_ft,
            alt_end_ft,
            alt_gain_ft,
            avg_climb_fpm,
            max_speed_kt,
            avg_speed_kt,
            distance_km,
            distance_nm: distance_km * KM_TO_NM,
            start_position: (first.lat, first.lon),
            end_position: (last.lat, last.lon),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn position(minute: u32, lat: f64, lon: f64) -> FlightPosition {
        FlightPosition {
            icao: "A1B2C3".to_string(),
            callsign: "UAL262".to_string(),
            lat,
            lon,
            altitude: Some(10668.0),
            ground_speed: Some(231.5),
            track: Some(270.0),
            vert_rate: Some(-2.5),
            registration: Some("N37298".to_string()),
            aircraft_type: Some("B739".to_string()),
            origin: Some("KSFO".to_string()),
            destination: Some("KEWR".to_string()),
            on_ground: Some(false),
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 12, minute, 0).unwrap(),
        }
    }

    #[test]
    fn test_write_adsbx_schema() {
        let mut buffer = Vec::new();
        write_track(
            &mut buffer,
            &[position(0, 37.6213, -122.379)],
            TrackSource::AdsbExchange,
        )
        .unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.starts_with(
            "Timestamp,Callsign,ICAO,Latitude,Longitude,Altitude_m,Altitude_ft,\
             Speed_mps,Speed_kts,Track,VertRate_mps,VertRate_fpm,Registration,\
             AircraftType,Origin,Destination"
        ));
        assert!(text.contains("UAL262,A1B2C3,37.621300,-122.379000,10668.0,35000,"));
        assert!(text.contains("231.50,450.0,270.0,-2.50,-492,N37298,B739,KSFO,KEWR"));
    }

    #[test]
    fn test_write_opensky_schema() {
        let mut buffer = Vec::new();
        write_track(
            &mut buffer,
            &[position(0, 37.6213, -122.379)],
            TrackSource::OpenSky,
        )
        .unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.starts_with(
            "Timestamp,Callsign,ICAO,Latitude,Longitude,Altitude_m,Altitude_ft,\
             Velocity_mps,Velocity_kts,Track,VertRate_mps,VertRate_fpm,OnGround"
        ));
        assert!(text.contains(",false"));
        assert!(!text.contains("Registration"));
    }

    #[test]
    fn test_absent_values_write_blank_fields() {
        let mut stripped = position(0, 37.6213, -122.379);
        stripped.altitude = None;
        stripped.ground_speed = None;
        stripped.track = None;
        stripped.vert_rate = None;
        stripped.registration = None;
        stripped.aircraft_type = None;
        stripped.origin = None;
        stripped.destination = None;

        let mut buffer = Vec::new();
        write_track(&mut buffer, &[stripped], TrackSource::AdsbExchange).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert!(row.ends_with(",,,,,,,,,,,"));
    }

    #[test]
    fn test_round_trip_and_blank_optionals() {
        let mut p = position(0, 37.6213, -122.379);
        p.track = None;

        let mut buffer = Vec::new();
        write_track(&mut buffer, &[p], TrackSource::AdsbExchange).unwrap();
        let records = read_track(buffer.as_slice()).unwrap();

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.callsign, "UAL262");
        assert!((r.lat - 37.6213).abs() < 1e-6);
        assert!((r.lon + 122.379).abs() < 1e-6);
        assert_eq!(r.altitude_m, Some(10668.0));
        assert_eq!(r.track, None);
        assert_eq!(r.registration.as_deref(), Some("N37298"));
        assert_eq!(r.on_ground, None);
    }

    #[test]
    fn test_reader_accepts_opensky_schema() {
        let mut buffer = Vec::new();
        write_track(
            &mut buffer,
            &[position(0, 37.6213, -122.379)],
            TrackSource::OpenSky,
        )
        .unwrap();
        let records = read_track(buffer.as_slice()).unwrap();

        let r = &records[0];
        assert!((r.speed_mps.unwrap() - 231.5).abs() < 1e-6);
        assert!((r.speed_knots().unwrap() - 450.0).abs() < 0.1);
        assert_eq!(r.on_ground, Some(false));
        assert_eq!(r.registration, None);
    }

    #[test]
    fn test_altitude_feet_fallback() {
        let record = TrackRecord {
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            callsign: "UAL262".to_string(),
            icao: "A1B2C3".to_string(),
            lat: 0.0,
            lon: 0.0,
            altitude_m: Some(1000.0),
            altitude_ft: None,
            speed_mps: None,
            speed_kts: None,
            track: None,
            vert_rate_mps: None,
            vert_rate_fpm: None,
            registration: None,
            aircraft_type: None,
            origin: None,
            destination: None,
            on_ground: None,
        };
        assert!((record.altitude_feet().unwrap() - 3280.84).abs() < 1e-6);
    }

    #[test]
    fn test_malformed_track_is_an_error() {
        let text = "Timestamp,Callsign,ICAO,Latitude,Longitude,Altitude_m,Altitude_ft,\
                    Speed_mps,Speed_kts,Track,VertRate_mps,VertRate_fpm,Registration,\
                    AircraftType,Origin,Destination\n\
                    not-a-time,UAL262,A1B2C3,1,2,,,,,,,,,,,\n";
        assert!(read_track(text.as_bytes()).is_err());
    }

    #[test]
    fn test_vertical_rate_fpm_fallback() {
        let mut buffer = Vec::new();
        write_track(
            &mut buffer,
            &[position(0, 37.6213, -122.379)],
            TrackSource::AdsbExchange,
        )
        .unwrap();
        let records = read_track(buffer.as_slice()).unwrap();
        let mut r = records[0].clone();
        assert!((r.vertical_rate_fpm().unwrap() + 492.0).abs() < 1.0);

        r.vert_rate_fpm = None;
        r.vert_rate_mps = Some(-2.5);
        assert!((r.vertical_rate_fpm().unwrap() + 2.5 * MPS_TO_FPM).abs() < 1e-6);
    }

    #[test]
    fn test_format_position_full() {
        let text = format_position(&position(0, 37.6213, -122.379), 3);
        assert!(text.contains("=== Update 3 ==="));
        assert!(text.contains("Time:      2025-06-01T12:00:00Z"));
        assert!(text.contains("Position:  37.621300, -122.379000"));
        assert!(text.contains("Altitude:  10668.0 m (35000 ft)"));
        assert!(text.contains("Speed:     450.0 kts (231.50 m/s)"));
        assert!(text.contains("Heading:   270.0 deg"));
        assert!(text.contains("Vert rate: -2.50 m/s (-492 ft/min)"));
        assert!(text.contains("Aircraft:  B739 (N37298)"));
        assert!(text.contains("Route:     KSFO -> KEWR"));
        assert!(text.contains("On ground: no"));
    }

    #[test]
    fn test_format_position_omits_absent_fields() {
        let mut p = position(0, 37.6213, -122.379);
        p.altitude = None;
        p.vert_rate = None;
        p.aircraft_type = None;
        p.registration = None;
        p.origin = None;
        p.on_ground = None;

        let text = format_position(&p, 1);
        assert!(!text.contains("Altitude:"));
        assert!(!text.contains("Vert rate:"));
        assert!(!text.contains("Aircraft:"));
        assert!(!text.contains("Route:"));
        assert!(!text.contains("On ground:"));
        assert!(text.contains("Speed:"));
    }

    #[test]
    fn test_track_stats() {
        let positions = vec![
            position(0, 37.0, -122.0),
            position(10, 37.5, -121.5),
            position(20, 38.0, -121.0),
        ];
        let mut climbing = positions.clone();
        climbing[0].altitude = Some(1000.0);
        climbing[2].altitude = Some(4000.0);

        let mut buffer = Vec::new();
        write_track(&mut buffer, &climbing, TrackSource::AdsbExchange).unwrap();
        let records = read_track(buffer.as_slice()).unwrap();
        let stats = TrackStats::from_records(&records).unwrap();

        assert_eq!(stats.points, 3);
        assert!((stats.duration_min - 20.0).abs() < 1e-9);
        assert!((stats.alt_gain_ft.unwrap() - 3000.0 * M_TO_FT).abs() < 1.0);
        assert!(stats.avg_climb_fpm.unwrap() > 0.0);
        assert!((stats.max_speed_kt.unwrap() - 450.0).abs() < 0.1);
        // Two ~70 km legs.
        assert!(stats.distance_km > 130.0 && stats.distance_km < 160.0);
        assert!((stats.distance_nm - stats.distance_km * KM_TO_NM).abs() < 1e-9);
        assert_eq!(stats.start_position, (37.0, -122.0));
    }

    #[test]
    fn test_track_stats_empty() {
        assert!(TrackStats::from_records(&[]).is_none());
    }
}
