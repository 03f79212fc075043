//! Road feature extraction from a fetched graph.

use road_guardian_models::{GeoPoint, RoadFeatures, UNKNOWN_ROAD_TYPE};
use road_guardian_road_graph::{NearestEdgeError, RoadGraph};

/// Road classes that win over list order when an edge carries several,
/// highest priority first.
pub const ROAD_TYPE_PRIORITY: [&str; 4] = ["motorway", "trunk", "primary", "secondary"];

/// A stage of extraction that could not run on this graph. The remaining
/// stages still produce their flags.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartialExtractionFailure {
    /// No nearest edge could be found; the road type came from the
    /// graph-wide fallback scan instead.
    #[error("Nearest-edge lookup failed: {0}")]
    NearestEdge(#[from] NearestEdgeError),

    /// The nearest edge has no `highway` value; the road type came from
    /// the graph-wide fallback scan instead.
    #[error("Nearest edge carries no highway tag")]
    UntaggedNearestEdge,

    /// No edge in the graph carries a `highway` value.
    #[error("No highway tag anywhere in the graph")]
    NoRoadType,
}

/// Extracted features plus any stages that ran degraded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Resolved features. `railway` is always `false` here; it is filled
    /// in by [`crate::railway`].
    pub features: RoadFeatures,
    /// Stages that fell back to a default.
    pub degraded: Vec<PartialExtractionFailure>,
}

/// Picks the road type from an edge's `highway` values: the
/// highest-priority class if any is present, else the first value.
#[must_use]
pub fn resolve_road_type(values: &[String]) -> Option<String> {
    ROAD_TYPE_PRIORITY
        .iter()
        .find(|class| values.iter().any(|v| v == *class))
        .map(|class| (*class).to_string())
        .or_else(|| values.first().cloned())
}

fn any_contains(values: &[String], needles: &[&str]) -> bool {
    values.iter().any(|v| {
        let v = v.to_lowercase();
        needles.iter().any(|needle| v.contains(needle))
    })
}

/// Computes the road features of `graph` around `point`.
///
/// The road type and the first roundabout check come from the single edge
/// nearest to `point`. Point-feature flags scan every node in the graph,
/// the roundabout flag is also raised by any roundabout edge, and
/// `junction` is set when any node has degree above 2.
///
/// If the nearest edge cannot be determined, the road type falls back to
/// the first `highway` value of any edge in the graph. That approximation
/// is coarser than the nearest-edge result and is reported in
/// [`ExtractionReport::degraded`].
#[must_use]
pub fn extract(graph: &RoadGraph, point: GeoPoint) -> ExtractionReport {
    let mut features = RoadFeatures::default();
    let mut degraded = Vec::new();

    let nearest_type = match graph.nearest_edge(point) {
        Ok(nearest) => {
            if any_contains(&nearest.edge.tags.junction, &["roundabout"]) {
                features.roundabout = true;
            }
            let road_type = resolve_road_type(&nearest.edge.tags.highway);
            if road_type.is_none() {
                degraded.push(PartialExtractionFailure::UntaggedNearestEdge);
            }
            road_type
        }
        Err(e) => {
            degraded.push(e.into());
            None
        }
    };

    features.road_type = match nearest_type {
        Some(road_type) => road_type,
        None => {
            let fallback = graph
                .edges()
                .iter()
                .find_map(|edge| edge.tags.highway.first().cloned());
            fallback.unwrap_or_else(|| {
                degraded.push(PartialExtractionFailure::NoRoadType);
                UNKNOWN_ROAD_TYPE.to_string()
            })
        }
    };

    for node in graph.nodes() {
        let tags = &node.highway;
        features.traffic_signal |= any_contains(tags, &["traffic_signals"]);
        features.stop |= any_contains(tags, &["stop"]);
        features.bump |= any_contains(tags, &["speed_bump", "hump"]);
        features.crossing |= any_contains(tags, &["crossing"]);
        features.give_way |= any_contains(tags, &["give_way"]);
        features.turning_loop |= any_contains(tags, &["turning_circle", "turning_loop"]);
    }

    features.roundabout |= graph
        .edges()
        .iter()
        .any(|edge| any_contains(&edge.tags.junction, &["roundabout"]));

    features.junction = graph.degrees().values().any(|&degree| degree > 2);

    ExtractionReport { features, degraded }
}
