pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Snap a coordinate to the nearest grid cell center.
pub fn snap_to_grid(value: f64, resolution: f64) -> f64 {
    (value / resolution).round() * resolution
}

pub fn round_decimals(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Degree offsets covered by a path of `length_deg` along `track_deg`
/// starting at latitude `lat`. The longitude term stretches with latitude.
pub fn heading_offsets(lat: f64, track_deg: f64, length_deg: f64) -> (f64, f64) {
    let track_rad = track_deg.to_radians();
    let dlat = length_deg * track_rad.cos();
    let dlon = length_deg * track_rad.sin() / lat.to_radians().cos();
    (dlat, dlon)
}

/// Points along the great circle from `from` to `to`, inclusive of both
/// endpoints. Degenerate pairs (identical or antipodal) fall back to
/// straight interpolation.
pub fn great_circle_points(from: (f64, f64), to: (f64, f64), segments: usize) -> Vec<(f64, f64)> {
    let segments = segments.max(1);
    let mut points = Vec::with_capacity(segments + 1);

    let lat1 = from.0.to_radians();
    let lon1 = from.1.to_radians();
    let lat2 = to.0.to_radians();
    let lon2 = to.1.to_radians();

    let a = (
        lat1.cos() * lon1.cos(),
        lat1.cos() * lon1.sin(),
        lat1.sin(),
    );
    let b = (
        lat2.cos() * lon2.cos(),
        lat2.cos() * lon2.sin(),
        lat2.sin(),
    );
    let dot = (a.0 * b.0 + a.1 * b.1 + a.2 * b.2).clamp(-1.0, 1.0);
    let omega = dot.acos();

    if omega.sin().abs() < 1e-9 {
        for i in 0..=segments {
            let t = i as f64 / segments as f64;
            points.push((
                from.0 + (to.0 - from.0) * t,
                from.1 + (to.1 - from.1) * t,
            ));
        }
        return points;
    }

    for i in 0..=segments {
        let t = i as f64 / segments as f64;
        let s1 = ((1.0 - t) * omega).sin() / omega.sin();
        let s2 = (t * omega).sin() / omega.sin();
        let x = s1 * a.0 + s2 * b.0;
        let y = s1 * a.1 + s2 * b.1;
        let z = s1 * a.2 + s2 * b.2;
        let lat = z.atan2((x * x + y * y).sqrt());
        let lon = y.atan2(x);
        points.push((lat.to_degrees(), lon.to_degrees()));
    }
    points
}

/// Inclusive latitude/longitude box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl GeoBounds {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}

/// Geographic acceptance test combining an optional bounding box and an
/// optional center/radius circle. Both apply when both are set.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoFilter {
    pub bounds: Option<GeoBounds>,
    pub center: Option<(f64, f64)>,
    pub radius_km: Option<f64>,
}

impl GeoFilter {
    pub fn accepts(&self, lat: f64, lon: f64) -> bool {
        if let Some(bounds) = &self.bounds {
            if !bounds.contains(lat, lon) {
                return false;
            }
        }
        if let (Some((center_lat, center_lon)), Some(radius)) = (self.center, self.radius_km) {
            if haversine_km(center_lat, center_lon, lat, lon) > radius {
                return false;
            }
        }
        true
    }
}
