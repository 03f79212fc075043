//! In-memory street-network graph.
//!
//! Nodes are intersections, dead ends, and tagged points; edges are the
//! road segments between them. An edge runs `from` → `to` in drawing (or
//! one-way traffic) order, and parallel edges between the same pair are
//! allowed. Degree counts every segment touching a node once, regardless
//! of direction, so a node's degree is the number of road segments that
//! meet there.

use std::collections::{BTreeMap, BTreeSet};

use geo::{Coord, LineString};
use road_guardian_geometry::within_radius;
use road_guardian_models::GeoPoint;

use crate::osm::{OsmExtract, split_values, tag_values};

/// Errors from assembling a graph by hand.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// An edge references a node that is not in the graph.
    #[error("Edge references unknown node {0}")]
    UnknownNode(i64),
}

/// An intersection, dead end, or tagged point.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadNode {
    /// OSM node ID.
    pub id: i64,
    /// Latitude (WGS84).
    pub lat: f64,
    /// Longitude (WGS84).
    pub lon: f64,
    /// Normalized `highway` point tags (e.g. `traffic_signals`, `stop`).
    pub highway: Vec<String>,
}

impl RoadNode {
    /// An untagged node.
    #[must_use]
    pub const fn new(id: i64, lat: f64, lon: f64) -> Self {
        Self {
            id,
            lat,
            lon,
            highway: Vec::new(),
        }
    }

    /// Sets the `highway` point tag from a raw OSM value.
    #[must_use]
    pub fn with_highway(mut self, raw: &str) -> Self {
        self.highway = split_values(raw);
        self
    }

    fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.lon,
            y: self.lat,
        }
    }
}

/// Normalized tags carried by a road segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeTags {
    /// Road classes, most specific first (e.g. `["residential"]`, or
    /// several when a simplified edge spans differently classed ways).
    pub highway: Vec<String>,
    /// `junction` values (e.g. `roundabout`).
    pub junction: Vec<String>,
    /// Traffic flows only `from` → `to`.
    pub oneway: bool,
}

impl EdgeTags {
    /// Tags for a two-way road of the given raw `highway` value.
    #[must_use]
    pub fn highway(raw: &str) -> Self {
        Self {
            highway: split_values(raw),
            ..Self::default()
        }
    }

    /// Adds a raw `junction` value.
    #[must_use]
    pub fn with_junction(mut self, raw: &str) -> Self {
        merge_values(&mut self.junction, &split_values(raw));
        self
    }

    /// Marks the segment one-way.
    #[must_use]
    pub const fn one_way(mut self) -> Self {
        self.oneway = true;
        self
    }
}

/// A road segment between two graph nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadEdge {
    /// Start node ID.
    pub from: i64,
    /// End node ID.
    pub to: i64,
    /// Segment tags.
    pub tags: EdgeTags,
    /// Shape of the segment, `(lon, lat)` coordinates from `from` to `to`.
    pub geometry: LineString<f64>,
}

impl RoadEdge {
    /// The endpoint opposite `node`.
    #[must_use]
    pub const fn other_end(&self, node: i64) -> i64 {
        if self.from == node { self.to } else { self.from }
    }

    /// `true` if both ends are the same node.
    #[must_use]
    pub const fn is_loop(&self) -> bool {
        self.from == self.to
    }
}

/// A street network within a bounded radius of a query point.
///
/// Built fresh for each query and discarded after feature extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoadGraph {
    nodes: BTreeMap<i64, RoadNode>,
    edges: Vec<RoadEdge>,
}

impl RoadGraph {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts (or replaces) a node.
    pub fn add_node(&mut self, node: RoadNode) {
        self.nodes.insert(node.id, node);
    }

    /// Adds a straight segment between two existing nodes.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownNode`] if either endpoint is missing.
    pub fn connect(&mut self, from: i64, to: i64, tags: EdgeTags) -> Result<(), GraphError> {
        let start = self.nodes.get(&from).ok_or(GraphError::UnknownNode(from))?;
        let end = self.nodes.get(&to).ok_or(GraphError::UnknownNode(to))?;
        let geometry = LineString::new(vec![start.coord(), end.coord()]);
        self.edges.push(RoadEdge {
            from,
            to,
            tags,
            geometry,
        });
        Ok(())
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// `true` if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in ID order.
    pub fn nodes(&self) -> impl Iterator<Item = &RoadNode> {
        self.nodes.values()
    }

    /// Node by ID.
    #[must_use]
    pub fn node(&self, id: i64) -> Option<&RoadNode> {
        self.nodes.get(&id)
    }

    /// Edges in insertion order.
    #[must_use]
    pub fn edges(&self) -> &[RoadEdge] {
        &self.edges
    }

    /// Segment count per node. A self-loop counts twice.
    #[must_use]
    pub fn degrees(&self) -> BTreeMap<i64, usize> {
        let mut degrees: BTreeMap<i64, usize> = self.nodes.keys().map(|&id| (id, 0)).collect();
        for edge in &self.edges {
            *degrees.entry(edge.from).or_default() += 1;
            *degrees.entry(edge.to).or_default() += 1;
        }
        degrees
    }

    /// Degree of one node (0 for unknown nodes).
    #[must_use]
    pub fn degree(&self, id: i64) -> usize {
        self.edges
            .iter()
            .map(|e| usize::from(e.from == id) + usize::from(e.to == id))
            .sum()
    }

    /// Builds the raw (unsimplified) network graph from an OSM extract.
    ///
    /// Only ways passing [`crate::osm::OsmWay::is_network_way`] contribute;
    /// each consecutive node pair becomes one edge, oriented in traffic
    /// direction for one-way streets. Way endpoints are remembered so
    /// [`Self::simplify`] never merges across them.
    #[must_use]
    pub fn from_osm(extract: &OsmExtract) -> RawRoadGraph {
        let mut graph = Self::new();
        let mut way_ends = BTreeSet::new();

        for way in extract.ways.iter().filter(|w| w.is_network_way()) {
            let refs: Vec<&crate::osm::OsmNode> = way
                .nodes
                .iter()
                .filter_map(|id| extract.nodes.get(id))
                .collect();
            if refs.len() < 2 {
                continue;
            }

            let oneway = way.oneway();
            let mut tags = EdgeTags {
                highway: tag_values(&way.tags, "highway"),
                junction: tag_values(&way.tags, "junction"),
                oneway: oneway.is_some(),
            };
            // Roundabouts are implicitly one-way.
            if tags.junction.iter().any(|j| j == "roundabout") {
                tags.oneway = true;
            }

            for node in &refs {
                graph.nodes.entry(node.id).or_insert_with(|| RoadNode {
                    id: node.id,
                    lat: node.lat,
                    lon: node.lon,
                    highway: tag_values(&node.tags, "highway"),
                });
            }
            way_ends.insert(refs[0].id);
            way_ends.insert(refs[refs.len() - 1].id);

            for pair in refs.windows(2) {
                let (a, b) = if oneway == Some(true) {
                    (pair[1], pair[0])
                } else {
                    (pair[0], pair[1])
                };
                graph.edges.push(RoadEdge {
                    from: a.id,
                    to: b.id,
                    tags: tags.clone(),
                    geometry: LineString::new(vec![
                        Coord { x: a.lon, y: a.lat },
                        Coord { x: b.lon, y: b.lat },
                    ]),
                });
            }
        }

        RawRoadGraph { graph, way_ends }
    }

    /// Collapses pass-through nodes into longer edges.
    ///
    /// A node is kept when it is an intersection or dead end (degree other
    /// than 2 or fewer than two distinct neighbours), touches a self-loop,
    /// is in `keep`, or carries a `highway` point tag. Every other node is
    /// interstitial: the segments on either side of it are merged into one
    /// edge whose geometry follows the original shape and whose tags are
    /// the union of the merged segments' tags.
    #[must_use]
    pub fn simplify(self, keep: &BTreeSet<i64>) -> Self {
        let mut incident: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (i, edge) in self.edges.iter().enumerate() {
            incident.entry(edge.from).or_default().push(i);
            if !edge.is_loop() {
                incident.entry(edge.to).or_default().push(i);
            }
        }

        let is_endpoint = |id: i64| -> bool {
            if keep.contains(&id) {
                return true;
            }
            if self.nodes.get(&id).is_some_and(|n| !n.highway.is_empty()) {
                return true;
            }
            let Some(edges) = incident.get(&id) else {
                return true;
            };
            if edges.len() != 2 || edges.iter().any(|&e| self.edges[e].is_loop()) {
                return true;
            }
            let neighbours: BTreeSet<i64> =
                edges.iter().map(|&e| self.edges[e].other_end(id)).collect();
            neighbours.len() != 2
        };

        let endpoints: BTreeSet<i64> = self
            .nodes
            .keys()
            .copied()
            .filter(|&id| is_endpoint(id))
            .collect();

        let mut used = vec![false; self.edges.len()];
        let mut merged = Vec::new();

        for &start in &endpoints {
            let Some(start_edges) = incident.get(&start) else {
                continue;
            };
            for &first in start_edges {
                if used[first] {
                    continue;
                }
                used[first] = true;
                let mut path = vec![(first, start)];
                let mut current = self.edges[first].other_end(start);

                while !endpoints.contains(&current) {
                    let next = incident
                        .get(&current)
                        .and_then(|edges| edges.iter().copied().find(|&e| !used[e]));
                    let Some(next) = next else {
                        break;
                    };
                    used[next] = true;
                    path.push((next, current));
                    current = self.edges[next].other_end(current);
                }

                merged.push(self.merge_path(&path, start, current));
            }
        }

        // Closed rings made only of pass-through nodes have no endpoint to
        // start from; keep their segments as they are.
        for (i, edge) in self.edges.iter().enumerate() {
            if !used[i] {
                merged.push(edge.clone());
            }
        }

        let mut kept_ids: BTreeSet<i64> = endpoints;
        for edge in &merged {
            kept_ids.insert(edge.from);
            kept_ids.insert(edge.to);
        }

        let Self { nodes, .. } = self;
        Self {
            nodes: nodes
                .into_iter()
                .filter(|(id, _)| kept_ids.contains(id))
                .collect(),
            edges: merged,
        }
    }

    /// Merges a walked path of `(edge index, node walked from)` pairs into
    /// one edge from `start` to `end`.
    fn merge_path(&self, path: &[(usize, i64)], start: i64, end: i64) -> RoadEdge {
        let mut coords: Vec<Coord<f64>> = Vec::new();
        let mut tags = EdgeTags {
            oneway: true,
            ..EdgeTags::default()
        };
        let mut forward_only = true;

        for &(index, walked_from) in path {
            let edge = &self.edges[index];
            let forward = edge.from == walked_from;
            forward_only &= forward;

            let mut segment: Vec<Coord<f64>> = edge.geometry.0.clone();
            if !forward {
                segment.reverse();
            }
            let skip = usize::from(!coords.is_empty());
            coords.extend(segment.into_iter().skip(skip));

            merge_values(&mut tags.highway, &edge.tags.highway);
            merge_values(&mut tags.junction, &edge.tags.junction);
            tags.oneway &= edge.tags.oneway;
        }

        // A one-way chain walked against traffic is stored in traffic order.
        if tags.oneway && !forward_only {
            let all_backward = path.iter().all(|&(i, from)| self.edges[i].from != from);
            if all_backward {
                coords.reverse();
                return RoadEdge {
                    from: end,
                    to: start,
                    tags,
                    geometry: LineString::new(coords),
                };
            }
            tags.oneway = false;
        }

        RoadEdge {
            from: start,
            to: end,
            tags,
            geometry: LineString::new(coords),
        }
    }
}

/// A freshly ingested graph plus the way endpoints needed to simplify it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRoadGraph {
    /// The unsimplified graph.
    pub graph: RoadGraph,
    /// IDs of nodes that start or end an OSM way.
    pub way_ends: BTreeSet<i64>,
}

impl RawRoadGraph {
    /// Drops every node farther than `radius_m` meters from `point`
    /// (great-circle distance, boundary inclusive), together with the
    /// segments that touch them.
    ///
    /// Overpass returns every node of each matched way, so a long street
    /// that merely passes near `point` brings nodes from kilometres away.
    /// Truncating before [`Self::simplify`] keeps the graph to the queried
    /// area; a cut chain simply ends at its last node inside the radius.
    #[must_use]
    pub fn truncate(self, point: GeoPoint, radius_m: f64) -> Self {
        let Self { graph, way_ends } = self;
        let before = graph.node_count();

        let nodes: BTreeMap<i64, RoadNode> = graph
            .nodes
            .into_iter()
            .filter(|(_, node)| {
                GeoPoint::new(node.lat, node.lon).is_ok_and(|p| within_radius(point, p, radius_m))
            })
            .collect();
        let edges: Vec<RoadEdge> = graph
            .edges
            .into_iter()
            .filter(|edge| nodes.contains_key(&edge.from) && nodes.contains_key(&edge.to))
            .collect();
        let way_ends = way_ends
            .into_iter()
            .filter(|id| nodes.contains_key(id))
            .collect();

        if nodes.len() < before {
            log::debug!(
                "dropped {} of {before} nodes beyond {radius_m} m",
                before - nodes.len()
            );
        }

        Self {
            graph: RoadGraph { nodes, edges },
            way_ends,
        }
    }

    /// Simplifies the graph, keeping way endpoints.
    #[must_use]
    pub fn simplify(self) -> RoadGraph {
        self.graph.simplify(&self.way_ends)
    }
}

fn merge_values(into: &mut Vec<String>, values: &[String]) {
    for value in values {
        if !into.contains(value) {
            into.push(value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::osm::{OsmNode, OsmWay};

    use super::*;

    fn osm_node(id: i64, lat: f64, lon: f64, highway: Option<&str>) -> OsmNode {
        let mut tags = BTreeMap::new();
        if let Some(h) = highway {
            tags.insert("highway".to_string(), h.to_string());
        }
        OsmNode { id, lat, lon, tags }
    }

    fn osm_way(id: i64, nodes: &[i64], pairs: &[(&str, &str)]) -> OsmWay {
        OsmWay {
            id,
            nodes: nodes.to_vec(),
            tags: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    /// A T-junction at node 3: a residential street 1-2-3-4 and a side
    /// street 3-5-6. Node 2 and 5 are pass-through points.
    fn t_junction() -> OsmExtract {
        let mut extract = OsmExtract::default();
        for node in [
            osm_node(1, 41.0000, 12.0000, None),
            osm_node(2, 41.0005, 12.0000, None),
            osm_node(3, 41.0010, 12.0000, None),
            osm_node(4, 41.0015, 12.0000, None),
            osm_node(5, 41.0010, 12.0005, None),
            osm_node(6, 41.0010, 12.0010, None),
        ] {
            extract.nodes.insert(node.id, node);
        }
        extract.ways.push(osm_way(10, &[1, 2, 3, 4], &[("highway", "residential")]));
        extract.ways.push(osm_way(11, &[3, 5, 6], &[("highway", "service")]));
        extract
    }

    #[test]
    fn ingests_one_edge_per_segment() {
        let raw = RoadGraph::from_osm(&t_junction());
        assert_eq!(raw.graph.node_count(), 6);
        assert_eq!(raw.graph.edge_count(), 5);
        assert_eq!(raw.graph.degree(3), 3);
        assert_eq!(raw.way_ends, BTreeSet::from([1, 3, 4, 6]));
    }

    #[test]
    fn simplification_removes_pass_through_nodes() {
        let graph = RoadGraph::from_osm(&t_junction()).simplify();
        let ids: Vec<i64> = graph.nodes().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 3, 4, 6]);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.degree(3), 3);

        let side = graph
            .edges()
            .iter()
            .find(|e| e.tags.highway == ["service"])
            .unwrap();
        assert_eq!(side.geometry.0.len(), 3);
    }

    #[test]
    fn simplification_keeps_tagged_points() {
        let mut extract = t_junction();
        extract.nodes.insert(2, osm_node(2, 41.0005, 12.0000, Some("crossing")));
        let graph = RoadGraph::from_osm(&extract).simplify();
        assert!(graph.node(2).is_some());
        assert_eq!(graph.node(2).unwrap().highway, vec!["crossing"]);
        assert_eq!(graph.degree(2), 2);
    }

    #[test]
    fn merges_across_way_boundaries_when_not_kept() {
        let mut graph = RoadGraph::new();
        graph.add_node(RoadNode::new(1, 0.0, 0.0));
        graph.add_node(RoadNode::new(2, 0.0, 0.001));
        graph.add_node(RoadNode::new(3, 0.0, 0.002));
        graph.connect(1, 2, EdgeTags::highway("residential")).unwrap();
        graph.connect(2, 3, EdgeTags::highway("primary")).unwrap();

        let simplified = graph.simplify(&BTreeSet::new());
        assert_eq!(simplified.edge_count(), 1);
        assert_eq!(simplified.edges()[0].tags.highway, vec!["residential", "primary"]);
        assert!(simplified.node(2).is_none());
    }

    #[test]
    fn reverse_oneway_segments_follow_traffic() {
        let mut extract = OsmExtract::default();
        extract.nodes.insert(1, osm_node(1, 0.0, 0.0, None));
        extract.nodes.insert(2, osm_node(2, 0.0, 0.001, None));
        extract
            .ways
            .push(osm_way(1, &[1, 2], &[("highway", "primary"), ("oneway", "-1")]));
        let raw = RoadGraph::from_osm(&extract);
        let edge = &raw.graph.edges()[0];
        assert_eq!((edge.from, edge.to), (2, 1));
        assert!(edge.tags.oneway);
    }

    #[test]
    fn excluded_ways_do_not_contribute() {
        let mut extract = t_junction();
        extract
            .ways
            .push(osm_way(12, &[4, 6], &[("highway", "construction")]));
        assert_eq!(RoadGraph::from_osm(&extract).graph.edge_count(), 5);
    }

    #[test]
    fn closed_ring_without_endpoints_is_preserved() {
        let mut graph = RoadGraph::new();
        for (id, lon) in [(1, 0.0), (2, 0.001), (3, 0.002)] {
            graph.add_node(RoadNode::new(id, 0.0, lon));
        }
        graph.connect(1, 2, EdgeTags::highway("residential")).unwrap();
        graph.connect(2, 3, EdgeTags::highway("residential")).unwrap();
        graph.connect(3, 1, EdgeTags::highway("residential")).unwrap();

        let simplified = graph.simplify(&BTreeSet::new());
        assert_eq!(simplified.edge_count(), 3);
        assert_eq!(simplified.node_count(), 3);
    }

    #[test]
    fn truncation_drops_far_nodes_and_their_segments() {
        // A street through (41.9, 12.0): nodes 2-4 lie within ~85 m of it,
        // node 5 (signals) is ~4 km east and node 6 (stop) ~5 km east.
        let mut extract = OsmExtract::default();
        for node in [
            osm_node(1, 41.9, 11.999, None),
            osm_node(2, 41.9, 12.0, Some("crossing")),
            osm_node(3, 41.9, 12.001, None),
            osm_node(5, 41.9, 12.05, Some("traffic_signals")),
            osm_node(6, 41.9, 12.06, Some("stop")),
        ] {
            extract.nodes.insert(node.id, node);
        }
        extract
            .ways
            .push(osm_way(10, &[1, 2, 3, 5, 6], &[("highway", "primary")]));

        let point = GeoPoint::new(41.9, 12.0).unwrap();
        let raw = RoadGraph::from_osm(&extract).truncate(point, 250.0);
        let ids: Vec<i64> = raw.graph.nodes().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(raw.graph.edge_count(), 2);
        assert_eq!(raw.way_ends, BTreeSet::from([1]));

        let graph = raw.simplify();
        assert!(graph.nodes().all(|n| n.highway.iter().all(|h| h == "crossing")));
        assert_eq!(graph.degree(3), 1);
    }

    #[test]
    fn truncation_keeps_everything_inside_the_radius() {
        let point = GeoPoint::new(41.001, 12.0005).unwrap();
        let raw = RoadGraph::from_osm(&t_junction());
        let truncated = raw.clone().truncate(point, 500.0);
        assert_eq!(truncated, raw);
    }

    #[test]
    fn connect_rejects_unknown_nodes() {
        let mut graph = RoadGraph::new();
        graph.add_node(RoadNode::new(1, 0.0, 0.0));
        assert_eq!(
            graph.connect(1, 9, EdgeTags::default()),
            Err(GraphError::UnknownNode(9))
        );
    }

    #[test]
    fn roundabout_edges_are_one_way() {
        let mut extract = OsmExtract::default();
        extract.nodes.insert(1, osm_node(1, 0.0, 0.0, None));
        extract.nodes.insert(2, osm_node(2, 0.0, 0.001, None));
        extract.ways.push(osm_way(
            1,
            &[1, 2],
            &[("highway", "primary"), ("junction", "roundabout")],
        ));
        let raw = RoadGraph::from_osm(&extract);
        assert!(raw.graph.edges()[0].tags.oneway);
        assert_eq!(raw.graph.edges()[0].tags.junction, vec!["roundabout"]);
    }
}
