//! Daylight evaluation: is a moment between civil dawn and civil dusk?

use road_guardian_geometry::civil_twilight_nearest;
use road_guardian_models::{GeoPoint, Timestamp};

/// Returns whether `at` falls between civil dawn and civil dusk (both
/// inclusive) at `point`.
///
/// Naive timestamps are read as UTC. Missing inputs and solar computations
/// that have no answer (polar day or night) yield `None`.
#[must_use]
pub fn is_daylight(point: Option<GeoPoint>, at: Option<&Timestamp>) -> Option<bool> {
    let (point, at) = (point?, at?);
    let instant = at.to_utc();

    match civil_twilight_nearest(point, instant) {
        Ok(twilight) => Some(twilight.contains(instant)),
        Err(e) => {
            log::warn!("daylight unavailable at {point} for {instant}: {e}");
            None
        }
    }
}

/// Like [`is_daylight`], from raw coordinates and a timestamp string.
///
/// Out-of-range coordinates and unparseable timestamps yield `None`.
#[must_use]
pub fn is_daylight_raw(
    latitude: Option<f64>,
    longitude: Option<f64>,
    at: Option<&str>,
) -> Option<bool> {
    let point = match (latitude, longitude) {
        (Some(lat), Some(lon)) => GeoPoint::new(lat, lon)
            .map_err(|e| log::debug!("daylight: {e}"))
            .ok(),
        _ => None,
    };
    let at = at.and_then(|s| {
        s.parse::<Timestamp>()
            .map_err(|e| log::debug!("daylight: {e}"))
            .ok()
    });
    is_daylight(point, at.as_ref())
}
