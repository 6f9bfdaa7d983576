use crate::models::Coordinates;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters.
pub fn haversine_m(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Proximity score in [0, 1], or `None` when the points are too far apart
/// to be the same place.
pub fn proximity_score(distance_m: f64, strong_radius_m: f64, weak_radius_m: f64) -> Option<f64> {
    if distance_m <= strong_radius_m {
        return Some(1.0);
    }
    if distance_m > weak_radius_m {
        return None;
    }
    let span = (weak_radius_m - strong_radius_m).max(f64::EPSILON);
    Some(1.0 - (distance_m - strong_radius_m) / span)
}
