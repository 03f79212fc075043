//! `OpenStreetMap` elements as returned by the Overpass API.
//!
//! Tag values are normalized at this boundary: every multi-valued tag
//! becomes a list of lowercase strings, whether the source wrote it as a
//! single value, a `;`-separated value, or a JSON array.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::FetchFailure;

/// `highway` values that never belong to a routable network.
const EXCLUDED_HIGHWAYS: [&str; 8] = [
    "abandoned",
    "construction",
    "no",
    "planned",
    "platform",
    "proposed",
    "raceway",
    "razed",
];

/// Overpass filter selecting the "all" network type (drivable, walkable,
/// and cyclable ways, private included).
pub const NETWORK_WAY_FILTER: &str =
    r#"["highway"]["area"!~"yes"]["highway"!~"abandoned|construction|no|planned|platform|proposed|raceway|razed"]"#;

/// A tagged point.
#[derive(Debug, Clone, PartialEq)]
pub struct OsmNode {
    /// OSM node ID.
    pub id: i64,
    /// Latitude (WGS84).
    pub lat: f64,
    /// Longitude (WGS84).
    pub lon: f64,
    /// Raw tags.
    pub tags: BTreeMap<String, String>,
}

/// An ordered list of node references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsmWay {
    /// OSM way ID.
    pub id: i64,
    /// Node IDs in drawing order.
    pub nodes: Vec<i64>,
    /// Raw tags.
    pub tags: BTreeMap<String, String>,
}

impl OsmWay {
    /// `true` if this way belongs to the "all" road network.
    #[must_use]
    pub fn is_network_way(&self) -> bool {
        let highway = tag_values(&self.tags, "highway");
        if highway.is_empty() {
            return false;
        }
        if tag_values(&self.tags, "area").iter().any(|v| v == "yes") {
            return false;
        }
        !highway.iter().any(|v| EXCLUDED_HIGHWAYS.contains(&v.as_str()))
    }

    /// Traffic direction: `Some(false)` for forward one-way, `Some(true)`
    /// for reverse one-way (`oneway=-1`), `None` for two-way.
    #[must_use]
    pub fn oneway(&self) -> Option<bool> {
        match self.tags.get("oneway").map(|v| v.trim().to_lowercase()).as_deref() {
            Some("yes" | "true" | "1") => Some(false),
            Some("-1" | "reverse") => Some(true),
            _ => None,
        }
    }
}

/// Nodes and ways extracted from one Overpass response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OsmExtract {
    /// Nodes by ID.
    pub nodes: BTreeMap<i64, OsmNode>,
    /// Ways in response order.
    pub ways: Vec<OsmWay>,
}

#[derive(Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<Element>,
    #[serde(default)]
    remark: Option<String>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Element {
    Node {
        id: i64,
        lat: Option<f64>,
        lon: Option<f64>,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    Way {
        id: i64,
        #[serde(default)]
        nodes: Vec<i64>,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    Relation {
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    Area {},
}

impl OsmExtract {
    /// Parses an Overpass `[out:json]` response body.
    ///
    /// Nodes without coordinates (e.g. from `out tags`) are dropped from
    /// [`Self::nodes`]; use [`tagged_values`] for tag-only queries.
    ///
    /// # Errors
    ///
    /// Returns [`FetchFailure::Malformed`] if the body is not an Overpass
    /// response, or if Overpass reported a runtime error instead of data.
    pub fn from_overpass(body: &serde_json::Value) -> Result<Self, FetchFailure> {
        let response = parse_response(body)?;

        let mut extract = Self::default();
        for element in response.elements {
            match element {
                Element::Node { id, lat, lon, tags } => {
                    if let (Some(lat), Some(lon)) = (lat, lon) {
                        extract.nodes.insert(id, OsmNode { id, lat, lon, tags });
                    }
                }
                Element::Way { id, nodes, tags } => {
                    extract.ways.push(OsmWay { id, nodes, tags });
                }
                Element::Relation { .. } | Element::Area {} => {}
            }
        }

        Ok(extract)
    }
}

/// Collects the normalized values of `key` across every element of an
/// Overpass response (nodes, ways, and relations alike).
///
/// # Errors
///
/// Returns [`FetchFailure::Malformed`] if the body is not an Overpass
/// response.
pub fn tagged_values(body: &serde_json::Value, key: &str) -> Result<Vec<String>, FetchFailure> {
    let response = parse_response(body)?;

    Ok(response
        .elements
        .iter()
        .flat_map(|element| match element {
            Element::Node { tags, .. } | Element::Way { tags, .. } | Element::Relation { tags } => {
                tag_values(tags, key)
            }
            Element::Area {} => Vec::new(),
        })
        .collect())
}

fn parse_response(body: &serde_json::Value) -> Result<OverpassResponse, FetchFailure> {
    let response = OverpassResponse::deserialize(body)?;

    // Overpass answers HTTP 200 with a `remark` when a query times out or
    // runs out of memory server-side.
    if let Some(remark) = response.remark.as_deref() {
        if remark.contains("runtime error") {
            return Err(FetchFailure::Malformed {
                message: format!("Overpass runtime error: {remark}"),
            });
        }
    }

    Ok(response)
}

/// Normalized values of one tag: split on `;`, trimmed, lowercased,
/// de-duplicated, in original order. Missing tags yield an empty list.
#[must_use]
pub fn tag_values(tags: &BTreeMap<String, String>, key: &str) -> Vec<String> {
    tags.get(key).map_or_else(Vec::new, |raw| split_values(raw))
}

/// Splits a raw OSM tag value into normalized values.
#[must_use]
pub fn split_values(raw: &str) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for part in raw.split(';') {
        let value = part.trim().to_lowercase();
        if !value.is_empty() && !values.contains(&value) {
            values.push(value);
        }
    }
    values
}
