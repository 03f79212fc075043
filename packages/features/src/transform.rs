//! Incident feature transformer: one incident in, the full feature record
//! out.

use std::sync::Arc;

use futures::future;
use road_guardian_models::{
    GeoPoint, IncidentContext, IncidentFeatures, IncidentReport, InvalidInputError,
    RoadFeatureSet,
};
use road_guardian_road_graph::{GraphSource, RadiusPolicy, fetch_graph};
use serde::Deserialize;

use crate::daylight::is_daylight;
use crate::extract::extract;
use crate::railway::{DEFAULT_RAILWAY_RADIUS_M, detect_railway};

/// Tunables for one enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct EnrichmentConfig {
    /// Road-network radii.
    #[serde(flatten)]
    pub radius: RadiusPolicy,
    /// Radius of the railway query, in meters.
    #[serde(default = "default_railway_radius_m")]
    pub railway_radius_m: f64,
}

const fn default_railway_radius_m() -> f64 {
    DEFAULT_RAILWAY_RADIUS_M
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            radius: RadiusPolicy::default(),
            railway_radius_m: DEFAULT_RAILWAY_RADIUS_M,
        }
    }
}

/// Turns incident reports into [`IncidentFeatures`].
///
/// Holds no per-call state; one instance can serve concurrent calls.
#[derive(Clone)]
pub struct Transformer {
    source: Arc<dyn GraphSource>,
    config: EnrichmentConfig,
}

impl std::fmt::Debug for Transformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transformer")
            .field("source", &self.source.name())
            .field("config", &self.config)
            .finish()
    }
}

impl Transformer {
    /// Creates a transformer over the given geographic data source.
    #[must_use]
    pub fn new(source: Arc<dyn GraphSource>, config: EnrichmentConfig) -> Self {
        Self { source, config }
    }

    /// Validates and enriches a raw report.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidInputError`] if the report lacks coordinates, date,
    /// time, severity, or category, or if its coordinates are out of range.
    /// No other failure is surfaced: road features degrade to `null`, and
    /// daylight degrades to `null` on its own.
    pub async fn transform(
        &self,
        report: &IncidentReport,
    ) -> Result<IncidentFeatures, InvalidInputError> {
        let context = IncidentContext::try_from(report)?;
        Ok(self.transform_context(&context).await)
    }

    /// Enriches an already validated incident.
    pub async fn transform_context(&self, context: &IncidentContext) -> IncidentFeatures {
        let (road, daylight) = future::join(self.road_features(context.point), async {
            is_daylight(Some(context.point), Some(&context.occurred_at))
        })
        .await;

        IncidentFeatures {
            road,
            daylight,
            seriousness: context.severity.clone(),
            category: context.category.clone(),
        }
    }

    /// Road features around `point`: fully resolved if a graph could be
    /// fetched, all `null` otherwise.
    pub async fn road_features(&self, point: GeoPoint) -> RoadFeatureSet {
        let source = self.source.as_ref();
        let (graph, railway) = future::join(
            fetch_graph(source, point, &self.config.radius),
            detect_railway(source, point, self.config.railway_radius_m),
        )
        .await;

        let graph = match graph {
            Ok(graph) => graph,
            Err(e) => {
                log::warn!("{}: road enrichment unavailable at {point}: {e}", source.name());
                return RoadFeatureSet::unavailable();
            }
        };

        let report = extract(&graph, point);
        for failure in &report.degraded {
            log::warn!("{}: partial extraction at {point}: {failure}", source.name());
        }

        let mut features = report.features;
        features.railway = railway.detected;
        log::debug!(
            "{}: {} nodes, {} edges at {point} -> {}",
            source.name(),
            graph.node_count(),
            graph.edge_count(),
            features.road_type
        );

        features.into()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveTime};
    use road_guardian_models::ROAD_FEATURE_KEYS;
    use road_guardian_road_graph::{EdgeTags, FetchFailure, RoadGraph, RoadNode};

    use super::*;

    /// Serves a fixed graph (or fails) and fixed railway values.
    struct Fixture {
        graph: Option<RoadGraph>,
        railway: Vec<&'static str>,
    }

    #[async_trait]
    impl GraphSource for Fixture {
        fn name(&self) -> &str {
            "fixture"
        }

        async fn road_network(
            &self,
            _point: GeoPoint,
            _radius_m: f64,
        ) -> Result<RoadGraph, FetchFailure> {
            self.graph.clone().ok_or_else(|| FetchFailure::Unavailable {
                message: "provider down".to_string(),
            })
        }

        async fn railway_tags(
            &self,
            _point: GeoPoint,
            _radius_m: f64,
        ) -> Result<Vec<String>, FetchFailure> {
            Ok(self.railway.iter().map(ToString::to_string).collect())
        }
    }

    /// A T-junction near the Colosseum: a primary road east-west through
    /// the incident point, a residential street branching north ~40 m
    /// east of it, a crossing on the corner.
    fn colosseum() -> RoadGraph {
        let mut graph = RoadGraph::new();
        graph.add_node(RoadNode::new(1, 41.8902, 12.4914));
        graph.add_node(RoadNode::new(2, 41.8902, 12.4929).with_highway("crossing"));
        graph.add_node(RoadNode::new(3, 41.8902, 12.4939));
        graph.add_node(RoadNode::new(4, 41.8912, 12.4929));
        graph.connect(1, 2, EdgeTags::highway("primary")).unwrap();
        graph.connect(2, 3, EdgeTags::highway("primary")).unwrap();
        graph.connect(2, 4, EdgeTags::highway("residential")).unwrap();
        graph
    }

    fn report() -> IncidentReport {
        IncidentReport {
            incident_date: NaiveDate::from_ymd_opt(2023, 10, 25),
            incident_time: NaiveTime::from_hms_opt(14, 30, 0),
            incident_longitude: Some(12.4924),
            incident_latitude: Some(41.8902),
            seriousness: Some("high".to_string()),
            category: Some("tamponamento".to_string()),
            description: None,
        }
    }

    fn transformer(graph: Option<RoadGraph>, railway: Vec<&'static str>) -> Transformer {
        Transformer::new(
            Arc::new(Fixture { graph, railway }),
            EnrichmentConfig::default(),
        )
    }

    #[tokio::test]
    async fn end_to_end_in_rome() {
        let features = transformer(Some(colosseum()), vec!["level_crossing"])
            .transform(&report())
            .await
            .unwrap();

        assert_eq!(features.daylight, Some(true));
        assert!(features.road.is_resolved());
        let road = features.road.resolved().unwrap();
        assert_eq!(road.road_type, "primary");
        assert!(road.crossing);
        assert!(road.junction);
        assert!(road.railway);
        assert!(!road.stop);
        assert_eq!(features.seriousness, "high");
        assert_eq!(features.category, "tamponamento");
    }

    #[tokio::test]
    async fn fetch_failure_nulls_every_road_key_but_keeps_daylight() {
        let features = transformer(None, vec!["rail"])
            .transform(&report())
            .await
            .unwrap();

        assert!(features.road.is_unavailable());
        assert_eq!(features.daylight, Some(true));

        let json = serde_json::to_value(&features).unwrap();
        for key in ROAD_FEATURE_KEYS {
            assert!(json[key].is_null(), "{key} should be null");
        }
        assert_eq!(json["Daylight"], true);
        assert_eq!(json["Seriousness"], "high");
        assert_eq!(json["Category"], "tamponamento");
    }

    #[tokio::test]
    async fn empty_network_is_a_total_failure() {
        let features = transformer(Some(RoadGraph::new()), vec![])
            .transform(&report())
            .await
            .unwrap();
        assert!(features.road.is_unavailable());
    }

    #[tokio::test]
    async fn successful_fetch_never_yields_null_flags() {
        let mut graph = RoadGraph::new();
        graph.add_node(RoadNode::new(1, 41.8902, 12.4924));
        let features = transformer(Some(graph), vec![])
            .transform(&report())
            .await
            .unwrap();

        assert!(features.road.is_resolved());
        assert_eq!(features.road.road_type.as_deref(), Some("Unknown"));
        assert_eq!(features.road.railway, Some(false));
    }

    #[tokio::test]
    async fn invalid_input_is_a_hard_error() {
        let mut incomplete = report();
        incomplete.incident_latitude = None;
        let result = transformer(Some(colosseum()), vec![])
            .transform(&incomplete)
            .await;
        assert_eq!(
            result,
            Err(InvalidInputError::MissingField("incident_latitude"))
        );

        let mut blank = report();
        blank.category = Some("  ".to_string());
        let result = transformer(Some(colosseum()), vec![]).transform(&blank).await;
        assert_eq!(result, Err(InvalidInputError::EmptyField("category")));
    }

    #[test]
    fn config_reads_flattened_radii() {
        let config: EnrichmentConfig =
            serde_json::from_str(r#"{"initial_m": 100.0, "railway_radius_m": 25.0}"#).unwrap();
        assert!((config.radius.initial_m - 100.0).abs() < f64::EPSILON);
        assert!((config.radius.widened_m - 500.0).abs() < f64::EPSILON);
        assert!((config.railway_radius_m - 25.0).abs() < f64::EPSILON);
    }
}
