//! Read side of the cache: Parquet file to R-tree, radius queries.

use std::path::Path;

use async_trait::async_trait;
use duckdb::Connection;
use road_guardian_geometry::{EARTH_RADIUS_M, within_radius};
use road_guardian_models::GeoPoint;
use road_guardian_road_graph::{FetchFailure, GraphSource, RoadGraph, RoadNode};
use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};

use crate::{CacheError, PoiRecord, paths};

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Tagged highway points loaded from a cache file.
///
/// Read-only once opened; share it behind an `Arc` to serve concurrent
/// lookups.
pub struct PoiCache {
    records: Vec<PoiRecord>,
    index: RTree<IndexedPoint>,
}

impl std::fmt::Debug for PoiCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoiCache")
            .field("records", &self.records.len())
            .finish_non_exhaustive()
    }
}

impl PoiCache {
    /// Loads a cache file written by [`crate::build_cache`].
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::SourceNotFound`] if the file does not exist,
    /// or [`CacheError::Database`] if it cannot be read as Parquet.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if !path.exists() {
            return Err(CacheError::SourceNotFound(path.display().to_string()));
        }

        let conn = Connection::open_in_memory()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT lon, lat, highway FROM read_parquet('{}') \
             WHERE lon IS NOT NULL AND lat IS NOT NULL AND highway IS NOT NULL",
            paths::sql_literal(path)
        ))?;
        let mut rows = stmt.query([])?;

        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(PoiRecord {
                lon: row.get(0)?,
                lat: row.get(1)?,
                highway: row.get(2)?,
            });
        }

        log::info!("Loaded {} cached POIs from {}", records.len(), path.display());
        Ok(Self::from_records(records))
    }

    /// Indexes records already in memory.
    #[must_use]
    pub fn from_records(records: Vec<PoiRecord>) -> Self {
        let index = RTree::bulk_load(
            records
                .iter()
                .enumerate()
                .map(|(i, r)| GeomWithData::new([r.lon, r.lat], i))
                .collect(),
        );
        Self { records, index }
    }

    /// Number of cached points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` if the cache holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records within `radius_m` meters of `point` (great-circle distance,
    /// boundary inclusive), paired with their position in the cache.
    fn within_indexed(&self, point: GeoPoint, radius_m: f64) -> Vec<(usize, &PoiRecord)> {
        let envelope = search_envelope(point, radius_m);
        let mut hits: Vec<(usize, &PoiRecord)> = self
            .index
            .locate_in_envelope(&envelope)
            .map(|item| (item.data, &self.records[item.data]))
            .filter(|(_, r)| {
                GeoPoint::new(r.lat, r.lon).is_ok_and(|p| within_radius(point, p, radius_m))
            })
            .collect();
        hits.sort_unstable_by_key(|(i, _)| *i);
        hits
    }

    /// Records within `radius_m` meters of `point`, in cache order.
    #[must_use]
    pub fn within(&self, point: GeoPoint, radius_m: f64) -> Vec<&PoiRecord> {
        self.within_indexed(point, radius_m)
            .into_iter()
            .map(|(_, r)| r)
            .collect()
    }
}

/// Lat/lon bounding box that contains every point within `radius_m` of
/// `point`.
fn search_envelope(point: GeoPoint, radius_m: f64) -> AABB<[f64; 2]> {
    let dlat = (radius_m / EARTH_RADIUS_M).to_degrees();
    let cos_lat = point.latitude.to_radians().cos().max(1e-6);
    let dlon = (dlat / cos_lat).min(180.0);
    AABB::from_corners(
        [point.longitude - dlon, point.latitude - dlat],
        [point.longitude + dlon, point.latitude + dlat],
    )
}

#[async_trait]
impl GraphSource for PoiCache {
    fn name(&self) -> &str {
        "poi_cache"
    }

    /// A node-only graph of the cached points near `point`. There are no
    /// edges, so the road type resolves to unknown and no junction is
    /// detected.
    async fn road_network(
        &self,
        point: GeoPoint,
        radius_m: f64,
    ) -> Result<RoadGraph, FetchFailure> {
        let mut graph = RoadGraph::new();
        for (i, record) in self.within_indexed(point, radius_m) {
            let id = i64::try_from(i).map_err(|e| FetchFailure::Malformed {
                message: e.to_string(),
            })?;
            graph.add_node(RoadNode::new(id, record.lat, record.lon).with_highway(&record.highway));
        }
        Ok(graph)
    }

    /// The cache holds highway points only, so no railway is ever found.
    async fn railway_tags(
        &self,
        _point: GeoPoint,
        _radius_m: f64,
    ) -> Result<Vec<String>, FetchFailure> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(lon: f64, lat: f64, highway: &str) -> PoiRecord {
        PoiRecord {
            lon,
            lat,
            highway: highway.to_string(),
        }
    }

    /// Points at 0 m, ~55 m, and ~1.1 km north of the Colosseum.
    fn cache() -> PoiCache {
        PoiCache::from_records(vec![
            record(12.4924, 41.8902, "traffic_signals"),
            record(12.4924, 41.8907, "crossing"),
            record(12.4924, 41.9002, "stop"),
        ])
    }

    fn colosseum() -> GeoPoint {
        GeoPoint::new(41.8902, 12.4924).unwrap()
    }

    #[test]
    fn radius_filter_uses_great_circle_distance() {
        let cache = cache();
        let near: Vec<&str> = cache
            .within(colosseum(), 100.0)
            .iter()
            .map(|r| r.highway.as_str())
            .collect();
        assert_eq!(near, vec!["traffic_signals", "crossing"]);
        assert_eq!(cache.within(colosseum(), 2_000.0).len(), 3);
        assert_eq!(cache.within(colosseum(), 10.0).len(), 1);
    }

    #[tokio::test]
    async fn serves_node_only_graphs() {
        let graph = cache().road_network(colosseum(), 100.0).await.unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.nodes().any(|n| n.highway == ["crossing"]));
        assert!(cache().railway_tags(colosseum(), 40.0).await.unwrap().is_empty());
    }

    #[test]
    fn reads_back_a_built_cache() {
        let dir =
            std::env::temp_dir().join(format!("road_guardian_lookup_{}", uuid::Uuid::new_v4()));
        let output = dir.join("pois.parquet");
        crate::write_parquet(&cache().records, &output).unwrap();

        let reopened = PoiCache::open(&output).unwrap();
        assert_eq!(reopened.len(), 3);
        assert_eq!(reopened.within(colosseum(), 100.0).len(), 2);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_cache_file_is_an_error() {
        let path = std::env::temp_dir().join(format!(
            "road_guardian_absent_{}.parquet",
            uuid::Uuid::new_v4()
        ));
        assert!(matches!(PoiCache::open(&path), Err(CacheError::SourceNotFound(_))));
    }
}
