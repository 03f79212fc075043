#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Prebuilt cache of tagged highway points.
//!
//! [`build_cache`] is an offline batch job: it scans a bulk OSM extract
//! (`.osm.pbf`, or a `GeoJSON` feature collection) for points whose
//! `highway` tag is one of a set of interesting values and writes them as
//! a three-column Parquet file (`lon`, `lat`, `highway`).
//!
//! [`PoiCache`] is the read side: it loads the Parquet file into an R-tree
//! for radius queries and can stand in for a live [`GraphSource`] when
//! network calls must be avoided.
//!
//! [`GraphSource`]: road_guardian_road_graph::GraphSource

pub mod build;
pub mod lookup;
pub mod paths;

pub use build::{DEFAULT_TAGS, build_cache, read_extract, write_parquet};
pub use lookup::PoiCache;

/// One tagged point in the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct PoiRecord {
    /// Longitude (WGS84).
    pub lon: f64,
    /// Latitude (WGS84).
    pub lat: f64,
    /// The matching `highway` value (e.g. `traffic_signals`).
    pub highway: String,
}

/// Errors from building or reading the cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The source extract does not exist.
    #[error("Source extract not found: {0}")]
    SourceNotFound(String),

    /// The source extract has an unrecognized file type.
    #[error("Unsupported extract format (expected .osm.pbf or .geojson): {0}")]
    UnsupportedFormat(String),

    /// The source extract could not be parsed.
    #[error("Failed to parse {path}: {message}")]
    Parse {
        /// File being parsed.
        path: String,
        /// Parser error.
        message: String,
    },

    /// No point in the extract carries a wanted tag.
    #[error("No points tagged {tags:?} in {path}")]
    NoRecords {
        /// File that was scanned.
        path: String,
        /// Tags that were searched for.
        tags: Vec<String>,
    },

    /// A `DuckDB` operation failed.
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    /// File-system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
