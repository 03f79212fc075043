//! Great-circle distance on a spherical Earth.

use road_guardian_models::GeoPoint;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Haversine distance between two points, in meters.
#[must_use]
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Returns `true` if `b` lies within `radius_m` meters of `a` (inclusive).
///
/// This is the check the notification dispatcher uses to decide which
/// users are close enough to an incident to be alerted.
#[must_use]
pub fn within_radius(a: GeoPoint, b: GeoPoint, radius_m: f64) -> bool {
    haversine_m(a, b) <= radius_m
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    #[test]
    fn zero_distance_for_same_point() {
        let colosseum = p(41.8902, 12.4924);
        assert!(haversine_m(colosseum, colosseum).abs() < 1e-9);
    }

    #[test]
    fn rome_to_milan_is_about_477_km() {
        let rome = p(41.9028, 12.4964);
        let milan = p(45.4642, 9.1900);
        let d = haversine_m(rome, milan);
        assert!((d - 477_000.0).abs() < 5_000.0, "got {d}");
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let d = haversine_m(p(0.0, 0.0), p(1.0, 0.0));
        assert!((d - 111_195.0).abs() < 10.0, "got {d}");
    }

    #[test]
    fn radius_check_is_inclusive() {
        let a = p(0.0, 0.0);
        let b = p(1.0, 0.0);
        let d = haversine_m(a, b);
        assert!(within_radius(a, b, d));
        assert!(!within_radius(a, b, d - 1.0));
    }
}
