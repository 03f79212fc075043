//! Nearest-edge lookup.
//!
//! Edge segments are projected onto a local equirectangular plane (meters)
//! centred on the query point and bulk-loaded into an R-tree, so the
//! nearest neighbour of the origin is the geometrically closest edge.
//! Within the few hundred meters a road graph covers, the projection
//! error is negligible.

use road_guardian_models::GeoPoint;
use rstar::primitives::{GeomWithData, Line};
use rstar::{PointDistance as _, RTree};

use crate::graph::{RoadEdge, RoadGraph};

/// Mean Earth radius used for the local projection, in meters.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

type SegmentItem = GeomWithData<Line<[f64; 2]>, usize>;

/// Why no nearest edge could be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NearestEdgeError {
    /// The graph has no edges.
    #[error("Road graph has no edges")]
    NoEdges,

    /// No edge has at least two finite coordinates.
    #[error("Road graph edges have no usable geometry")]
    NoGeometry,
}

/// The edge closest to a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestEdge<'a> {
    /// The edge itself.
    pub edge: &'a RoadEdge,
    /// Approximate distance from the query point, in meters.
    pub distance_m: f64,
}

impl RoadGraph {
    /// Finds the edge geometrically closest to `point`.
    ///
    /// # Errors
    ///
    /// Returns [`NearestEdgeError`] if the graph has no edges or no edge
    /// geometry to measure against.
    pub fn nearest_edge(&self, point: GeoPoint) -> Result<NearestEdge<'_>, NearestEdgeError> {
        if self.edges().is_empty() {
            return Err(NearestEdgeError::NoEdges);
        }

        let origin_lat = point.latitude.to_radians();
        let scale_x = EARTH_RADIUS_M * origin_lat.cos();
        let project = |lon: f64, lat: f64| -> [f64; 2] {
            [
                (lon - point.longitude).to_radians() * scale_x,
                (lat - point.latitude).to_radians() * EARTH_RADIUS_M,
            ]
        };

        let items: Vec<SegmentItem> = self
            .edges()
            .iter()
            .enumerate()
            .flat_map(|(index, edge)| {
                edge.geometry.lines().map(move |line| (index, line))
            })
            .filter_map(|(index, line)| {
                let a = project(line.start.x, line.start.y);
                let b = project(line.end.x, line.end.y);
                a.iter()
                    .chain(b.iter())
                    .all(|v| v.is_finite())
                    .then(|| GeomWithData::new(Line::new(a, b), index))
            })
            .collect();

        let tree = RTree::bulk_load(items);
        let nearest = tree
            .nearest_neighbor(&[0.0, 0.0])
            .ok_or(NearestEdgeError::NoGeometry)?;

        Ok(NearestEdge {
            edge: &self.edges()[nearest.data],
            distance_m: nearest.geom().distance_2(&[0.0, 0.0]).sqrt(),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{EdgeTags, RoadNode};

    use super::*;

    /// Two parallel east-west streets 100 m apart, the query point 20 m
    /// north of the southern one.
    fn two_streets() -> RoadGraph {
        let mut graph = RoadGraph::new();
        let north = 41.0 + 100.0 / 111_195.0;
        graph.add_node(RoadNode::new(1, 41.0, 12.0));
        graph.add_node(RoadNode::new(2, 41.0, 12.002));
        graph.add_node(RoadNode::new(3, north, 12.0));
        graph.add_node(RoadNode::new(4, north, 12.002));
        graph.connect(1, 2, EdgeTags::highway("residential")).unwrap();
        graph.connect(3, 4, EdgeTags::highway("primary")).unwrap();
        graph
    }

    #[test]
    fn picks_geometrically_closest_edge() {
        let graph = two_streets();
        let query = GeoPoint::new(41.0 + 20.0 / 111_195.0, 12.001).unwrap();
        let nearest = graph.nearest_edge(query).unwrap();
        assert_eq!(nearest.edge.tags.highway, vec!["residential"]);
        assert!((nearest.distance_m - 20.0).abs() < 0.5, "{}", nearest.distance_m);
    }

    #[test]
    fn measures_to_segment_not_to_endpoints() {
        let graph = two_streets();
        // Closer to the northern street's midpoint than to any node.
        let query = GeoPoint::new(41.0 + 90.0 / 111_195.0, 12.001).unwrap();
        assert_eq!(
            graph.nearest_edge(query).unwrap().edge.tags.highway,
            vec!["primary"]
        );
    }

    #[test]
    fn empty_graph_has_no_nearest_edge() {
        let mut graph = RoadGraph::new();
        graph.add_node(RoadNode::new(1, 41.0, 12.0));
        assert_eq!(
            graph.nearest_edge(GeoPoint::new(41.0, 12.0).unwrap()),
            Err(NearestEdgeError::NoEdges)
        );
    }
}
