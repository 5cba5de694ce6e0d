use crate::model::TrackPoint;

/// Mean Earth radius in meters (WGS84: 6371008.8m).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Calculates the great circle distance between two GPS coordinates using the haversine formula.
///
/// Accurate enough for the short hops between consecutive trackpoints; elevation is ignored.
///
/// References:
/// - R.W. Sinnott, "Virtues of the Haversine", Sky and Telescope, vol. 68, no. 2, 1984, p. 159
/// - https://www.movable-type.co.uk/scripts/latlong.html
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    // a = sin²(Δφ/2) + cos φ1 ⋅ cos φ2 ⋅ sin²(Δλ/2)
    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);

    // c = 2 ⋅ atan2(√a, √(1−a))
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Planar distance between two points in meters. An undefined result counts as zero.
pub fn distance_2d(p1: &TrackPoint, p2: &TrackPoint) -> f64 {
    let distance = haversine_distance(p1.lat, p1.lon, p2.lat, p2.lon);
    if distance.is_finite() { distance } else { 0.0 }
}

/// Seconds from `p1` to `p2`, or `None` unless both carry a timestamp.
pub fn seconds_between(p1: &TrackPoint, p2: &TrackPoint) -> Option<f64> {
    match (p1.time, p2.time) {
        (Some(t1), Some(t2)) => Some((t2 - t1).as_seconds_f64()),
        _ => None,
    }
}
