//! Two-tier radius policy for road-network queries.

use road_guardian_models::GeoPoint;
use serde::Deserialize;

use crate::{FetchFailure, GraphSource, RoadGraph};

/// Query radii for [`fetch_graph`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RadiusPolicy {
    /// First query radius, in meters.
    #[serde(default = "default_initial_m")]
    pub initial_m: f64,
    /// Radius of the single retry made when the first query finds no
    /// roads, in meters.
    #[serde(default = "default_widened_m")]
    pub widened_m: f64,
}

const fn default_initial_m() -> f64 {
    250.0
}

const fn default_widened_m() -> f64 {
    500.0
}

impl Default for RadiusPolicy {
    fn default() -> Self {
        Self {
            initial_m: default_initial_m(),
            widened_m: default_widened_m(),
        }
    }
}

/// Fetches the road network around `point`, widening the search once if
/// nothing is mapped within the initial radius.
///
/// A failed query is not retried: only an *empty* result triggers the
/// widened attempt.
///
/// # Errors
///
/// Returns the source's [`FetchFailure`] if a query fails, or
/// [`FetchFailure::EmptyNetwork`] if both radii come back empty.
pub async fn fetch_graph(
    source: &dyn GraphSource,
    point: GeoPoint,
    policy: &RadiusPolicy,
) -> Result<RoadGraph, FetchFailure> {
    let graph = source.road_network(point, policy.initial_m).await?;
    if !graph.is_empty() {
        return Ok(graph);
    }

    log::info!(
        "{}: no roads within {} m of {point}, widening to {} m",
        source.name(),
        policy.initial_m,
        policy.widened_m
    );

    let graph = source.road_network(point, policy.widened_m).await?;
    if graph.is_empty() {
        return Err(FetchFailure::EmptyNetwork {
            radius_m: policy.widened_m,
        });
    }
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::graph::RoadNode;

    use super::*;

    /// Returns a one-node graph only for radii at least `min_radius`,
    /// recording every radius it was asked for.
    struct Scripted {
        min_radius: f64,
        fail: bool,
        calls: Mutex<Vec<f64>>,
    }

    impl Scripted {
        fn new(min_radius: f64) -> Self {
            Self {
                min_radius,
                fail: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<f64> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GraphSource for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn road_network(
            &self,
            _point: GeoPoint,
            radius_m: f64,
        ) -> Result<RoadGraph, FetchFailure> {
            self.calls.lock().unwrap().push(radius_m);
            if self.fail {
                return Err(FetchFailure::Unavailable {
                    message: "offline".to_string(),
                });
            }
            let mut graph = RoadGraph::new();
            if radius_m >= self.min_radius {
                graph.add_node(RoadNode::new(1, 41.0, 12.0));
            }
            Ok(graph)
        }

        async fn railway_tags(
            &self,
            _point: GeoPoint,
            _radius_m: f64,
        ) -> Result<Vec<String>, FetchFailure> {
            Ok(Vec::new())
        }
    }

    fn point() -> GeoPoint {
        GeoPoint::new(41.0, 12.0).unwrap()
    }

    #[tokio::test]
    async fn first_radius_suffices() {
        let source = Scripted::new(100.0);
        let graph = fetch_graph(&source, point(), &RadiusPolicy::default())
            .await
            .unwrap();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(source.calls(), vec![250.0]);
    }

    #[tokio::test]
    async fn widens_once_when_empty() {
        let source = Scripted::new(400.0);
        let graph = fetch_graph(&source, point(), &RadiusPolicy::default())
            .await
            .unwrap();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(source.calls(), vec![250.0, 500.0]);
    }

    #[tokio::test]
    async fn empty_after_widening_is_a_failure() {
        let source = Scripted::new(f64::INFINITY);
        let result = fetch_graph(&source, point(), &RadiusPolicy::default()).await;
        assert!(matches!(
            result,
            Err(FetchFailure::EmptyNetwork { radius_m }) if (radius_m - 500.0).abs() < f64::EPSILON
        ));
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test]
    async fn errors_are_not_retried() {
        let mut source = Scripted::new(0.0);
        source.fail = true;
        let result = fetch_graph(&source, point(), &RadiusPolicy::default()).await;
        assert!(matches!(result, Err(FetchFailure::Unavailable { .. })));
        assert_eq!(source.calls(), vec![250.0]);
    }
}
