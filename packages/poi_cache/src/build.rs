//! Cache builder: bulk extract in, Parquet out.

use std::collections::BTreeSet;
use std::path::Path;

use duckdb::Connection;
use geojson::GeoJson;
use road_guardian_road_graph::osm::split_values;

use crate::{CacheError, PoiRecord, paths};

/// `highway` values cached by default. `speed_bump` and `hump` are the
/// values the bump flag looks for; bare `bump` is kept for extracts that
/// use it.
pub const DEFAULT_TAGS: [&str; 6] = [
    "traffic_signals",
    "stop",
    "crossing",
    "bump",
    "speed_bump",
    "hump",
];

/// Scans `source` for tagged points and writes them to `output`.
///
/// Returns the number of records written.
///
/// # Errors
///
/// Returns [`CacheError::SourceNotFound`] if `source` does not exist,
/// [`CacheError::NoRecords`] if no point carries a wanted tag, or any
/// parse, database, or I/O error along the way. Nothing is written on
/// error.
pub fn build_cache(
    source: &Path,
    output: &Path,
    tags: &BTreeSet<String>,
) -> Result<usize, CacheError> {
    let records = read_extract(source, tags)?;

    if records.is_empty() {
        return Err(CacheError::NoRecords {
            path: source.display().to_string(),
            tags: tags.iter().cloned().collect(),
        });
    }

    write_parquet(&records, output)?;
    log::info!(
        "Wrote {} tagged points to {}",
        records.len(),
        output.display()
    );
    Ok(records.len())
}

/// Reads every point whose `highway` tag is in `tags` from an
/// `.osm.pbf` or `GeoJSON` extract.
///
/// # Errors
///
/// Returns [`CacheError`] if the file is missing, of an unknown type, or
/// cannot be parsed.
pub fn read_extract(source: &Path, tags: &BTreeSet<String>) -> Result<Vec<PoiRecord>, CacheError> {
    if !source.exists() {
        return Err(CacheError::SourceNotFound(source.display().to_string()));
    }

    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if name.ends_with(".pbf") {
        read_pbf(source, tags)
    } else if name.ends_with(".geojson") || name.ends_with(".json") {
        read_geojson(source, tags)
    } else {
        Err(CacheError::UnsupportedFormat(source.display().to_string()))
    }
}

/// Builds a record if the coordinates are valid and one of the `highway`
/// values is wanted.
fn poi_from_highway(
    highway: &str,
    lon: f64,
    lat: f64,
    tags: &BTreeSet<String>,
) -> Option<PoiRecord> {
    if !lat.is_finite() || !lon.is_finite() {
        return None;
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return None;
    }

    let highway = split_values(highway).into_iter().find(|v| tags.contains(v))?;
    Some(PoiRecord { lon, lat, highway })
}

fn poi_from_tags<'a>(
    mut osm_tags: impl Iterator<Item = (&'a str, &'a str)>,
    lon: f64,
    lat: f64,
    tags: &BTreeSet<String>,
) -> Option<PoiRecord> {
    let (_, highway) = osm_tags.find(|(key, _)| *key == "highway")?;
    poi_from_highway(highway, lon, lat, tags)
}

/// Parses an OSM PBF file with `osmpbf`'s parallel reader. Only nodes
/// carry point tags; ways and relations are skipped.
fn read_pbf(path: &Path, tags: &BTreeSet<String>) -> Result<Vec<PoiRecord>, CacheError> {
    use osmpbf::{Element, ElementReader};

    log::info!("Parsing OSM PBF: {}", path.display());

    let parse_error = |e: osmpbf::Error| CacheError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let reader = ElementReader::from_path(path).map_err(parse_error)?;

    let records = reader
        .par_map_reduce(
            |element| -> Vec<PoiRecord> {
                let record = match element {
                    Element::Node(node) => poi_from_tags(node.tags(), node.lon(), node.lat(), tags),
                    Element::DenseNode(node) => {
                        poi_from_tags(node.tags(), node.lon(), node.lat(), tags)
                    }
                    Element::Way(_) | Element::Relation(_) => None,
                };
                record.into_iter().collect()
            },
            Vec::new,
            |mut a, mut b| {
                a.append(&mut b);
                a
            },
        )
        .map_err(parse_error)?;

    log::info!("Extracted {} tagged points from OSM PBF", records.len());
    Ok(records)
}

/// Reads a `GeoJSON` feature collection. Coordinates come from explicit
/// `lon`/`lat` properties when present, else from a `Point` geometry.
fn read_geojson(path: &Path, tags: &BTreeSet<String>) -> Result<Vec<PoiRecord>, CacheError> {
    let text = std::fs::read_to_string(path)?;
    let geojson: GeoJson = text.parse().map_err(|e: geojson::Error| CacheError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(CacheError::Parse {
            path: path.display().to_string(),
            message: "expected a FeatureCollection".to_string(),
        });
    };

    let total = collection.features.len();
    let records: Vec<PoiRecord> = collection
        .features
        .iter()
        .filter_map(|feature| {
            let highway = feature.property("highway")?.as_str()?;

            let explicit = feature
                .property("lon")
                .and_then(serde_json::Value::as_f64)
                .zip(feature.property("lat").and_then(serde_json::Value::as_f64));
            let (lon, lat) = explicit.or_else(|| match &feature.geometry.as_ref()?.value {
                geojson::Value::Point(position) => match position.as_slice() {
                    [lon, lat, ..] => Some((*lon, *lat)),
                    _ => None,
                },
                _ => None,
            })?;

            poi_from_highway(highway, lon, lat, tags)
        })
        .collect();

    log::info!(
        "Extracted {} of {total} features from {}",
        records.len(),
        path.display()
    );
    Ok(records)
}

/// Writes records to a Parquet file with columns `lon`, `lat`, `highway`.
///
/// # Errors
///
/// Returns [`CacheError`] if the output directory cannot be created or
/// `DuckDB` fails to write the file.
pub fn write_parquet(records: &[PoiRecord], output: &Path) -> Result<(), CacheError> {
    if let Some(parent) = output.parent() {
        paths::ensure_dir(parent)?;
    }

    let conn = Connection::open_in_memory()?;
    conn.execute_batch(
        "CREATE TABLE pois (
            lon DOUBLE NOT NULL,
            lat DOUBLE NOT NULL,
            highway VARCHAR NOT NULL
        );",
    )?;

    {
        let mut appender = conn.appender("pois")?;
        for record in records {
            appender.append_row(duckdb::params![record.lon, record.lat, record.highway])?;
        }
        appender.flush()?;
    }

    conn.execute_batch(&format!(
        "COPY pois TO '{}' (FORMAT PARQUET);",
        paths::sql_literal(output)
    ))?;
    Ok(())
}
