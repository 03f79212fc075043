//! Railway proximity: a secondary query that never blocks the primary
//! road-feature result.

use road_guardian_models::GeoPoint;
use road_guardian_road_graph::{FetchFailure, GraphSource};

/// Default search radius around the incident, in meters.
pub const DEFAULT_RAILWAY_RADIUS_M: f64 = 40.0;

/// `railway` values that count as a hazard. A station on its own does not.
const HAZARD_VALUES: [&str; 2] = ["rail", "level_crossing"];

/// Result of the railway query.
///
/// A failed query resolves to `detected = false` with the cause kept in
/// `ignored_error`, so the suppression is explicit rather than a silent
/// catch-all.
#[derive(Debug)]
pub struct RailwayOutcome {
    /// A rail line or level crossing is within the radius.
    pub detected: bool,
    /// The query error that was swallowed, if any.
    pub ignored_error: Option<FetchFailure>,
}

/// `true` if any of the `railway` values is a rail line or level crossing.
#[must_use]
pub fn is_railway_hazard(values: &[String]) -> bool {
    values
        .iter()
        .any(|v| HAZARD_VALUES.contains(&v.to_lowercase().as_str()))
}

/// Queries `source` for railway features within `radius_m` of `point`.
pub async fn detect_railway(
    source: &dyn GraphSource,
    point: GeoPoint,
    radius_m: f64,
) -> RailwayOutcome {
    match source.railway_tags(point, radius_m).await {
        Ok(values) => RailwayOutcome {
            detected: is_railway_hazard(&values),
            ignored_error: None,
        },
        Err(e) => {
            log::debug!("{}: railway query ignored: {e}", source.name());
            RailwayOutcome {
                detected: false,
                ignored_error: Some(e),
            }
        }
    }
}
