#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Local street-network graphs around a coordinate.
//!
//! A [`GraphSource`] answers two questions about the area around a point:
//! what does the road network look like, and which `railway` features are
//! mapped there. [`OverpassClient`] answers them live from the `OpenStreetMap`
//! Overpass API; other sources (such as the prebuilt POI cache) can plug in
//! through the same trait.
//!
//! [`fetch_graph`] wraps a source with the two-tier radius policy: a tight
//! first query, and one widened retry when nothing was mapped nearby.

pub mod graph;
pub mod nearest;
pub mod osm;
pub mod overpass;
pub mod provider;

use async_trait::async_trait;
use road_guardian_models::GeoPoint;
use road_guardian_retry::HttpError;

pub use graph::{EdgeTags, GraphError, RawRoadGraph, RoadEdge, RoadGraph, RoadNode};
pub use nearest::{NearestEdge, NearestEdgeError};
pub use overpass::{OverpassClient, OverpassConfig};
pub use provider::{RadiusPolicy, fetch_graph};

/// Why a road graph or POI query produced nothing usable.
///
/// Sources never panic or propagate raw transport errors; everything is
/// converted into one of these so the caller can log the cause and fall
/// back to an "enrichment unavailable" result.
#[derive(Debug, thiserror::Error)]
pub enum FetchFailure {
    /// The HTTP exchange with the data provider failed.
    #[error("Geographic data request failed: {0}")]
    Http(#[from] HttpError),

    /// The provider answered but the payload could not be understood.
    #[error("Malformed geographic data: {message}")]
    Malformed {
        /// What was wrong with the payload.
        message: String,
    },

    /// No road network was found even at the widest radius.
    #[error("No road network found within {radius_m} m")]
    EmptyNetwork {
        /// Widest radius that was queried.
        radius_m: f64,
    },

    /// The source cannot serve this kind of query.
    #[error("Geographic data source unavailable: {message}")]
    Unavailable {
        /// Why the source is unavailable.
        message: String,
    },
}

impl From<serde_json::Error> for FetchFailure {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed {
            message: e.to_string(),
        }
    }
}

/// A provider of street-network and railway data around a point.
#[async_trait]
pub trait GraphSource: Send + Sync {
    /// Short identifier used in log lines (e.g. `"overpass"`).
    fn name(&self) -> &str;

    /// Builds the simplified road network within `radius_m` meters of
    /// `point`.
    ///
    /// An area with no mapped roads yields an empty graph, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`FetchFailure`] if the data could not be obtained.
    async fn road_network(&self, point: GeoPoint, radius_m: f64)
    -> Result<RoadGraph, FetchFailure>;

    /// Returns the `railway` tag values of features within `radius_m`
    /// meters of `point` whose value is `station`, `level_crossing`, or
    /// `rail`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchFailure`] if the data could not be obtained.
    async fn railway_tags(&self, point: GeoPoint, radius_m: f64)
    -> Result<Vec<String>, FetchFailure>;
}
