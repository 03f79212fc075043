//! Live road-network and railway queries against the Overpass API.

use std::time::Duration;

use async_trait::async_trait;
use road_guardian_models::GeoPoint;
use road_guardian_retry::{HttpError, RetryPolicy, send_json};
use serde::Deserialize;

use crate::osm::{NETWORK_WAY_FILTER, OsmExtract, tagged_values};
use crate::{FetchFailure, GraphSource, RoadGraph};

/// Public Overpass instance.
pub const DEFAULT_ENDPOINT: &str = "https://overpass-api.de/api/interpreter";

/// `railway` values that count as a railway presence.
const RAILWAY_VALUES: &str = "station|level_crossing|rail";

/// Connection settings for an Overpass endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OverpassConfig {
    /// Interpreter URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Per-request timeout (also sent to the server as `[timeout:...]`).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// `User-Agent` header; Overpass operators ask clients to identify
    /// themselves.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

const fn default_timeout_secs() -> u64 {
    25
}

fn default_user_agent() -> String {
    format!("road-guardian/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for OverpassConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// [`GraphSource`] backed by the Overpass API.
///
/// Each query is a single attempt: the caller's radius policy is the only
/// retry layer, so a transient provider failure surfaces immediately as a
/// [`FetchFailure`].
#[derive(Debug, Clone)]
pub struct OverpassClient {
    client: reqwest::Client,
    config: OverpassConfig,
    retry: RetryPolicy,
}

impl OverpassClient {
    /// Builds a client for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`FetchFailure::Http`] if the HTTP client cannot be built.
    pub fn new(config: OverpassConfig) -> Result<Self, FetchFailure> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(HttpError::from)?;

        Ok(Self {
            client,
            config,
            retry: RetryPolicy::none(),
        })
    }

    /// Overrides the per-query retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The endpoint this client talks to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    async fn interpret(&self, query: String) -> Result<serde_json::Value, FetchFailure> {
        log::debug!("overpass: {query}");
        let endpoint = self.config.endpoint.as_str();
        let body = send_json(&self.retry, || {
            self.client.post(endpoint).form(&[("data", query.as_str())])
        })
        .await?;
        Ok(body)
    }
}

/// Overpass QL for every network way within `radius_m` of `point`,
/// together with all of their nodes.
#[must_use]
pub fn network_query(point: GeoPoint, radius_m: f64, timeout_secs: u64) -> String {
    format!(
        "[out:json][timeout:{timeout_secs}];\
         (way{NETWORK_WAY_FILTER}(around:{radius_m},{lat},{lon});>;);\
         out body;",
        lat = point.latitude,
        lon = point.longitude,
    )
}

/// Overpass QL for railway stations, level crossings, and rail lines
/// within `radius_m` of `point`.
#[must_use]
pub fn railway_query(point: GeoPoint, radius_m: f64, timeout_secs: u64) -> String {
    format!(
        "[out:json][timeout:{timeout_secs}];\
         nwr[\"railway\"~\"^({RAILWAY_VALUES})$\"](around:{radius_m},{lat},{lon});\
         out tags;",
        lat = point.latitude,
        lon = point.longitude,
    )
}

#[async_trait]
impl GraphSource for OverpassClient {
    fn name(&self) -> &str {
        "overpass"
    }

    async fn road_network(
        &self,
        point: GeoPoint,
        radius_m: f64,
    ) -> Result<RoadGraph, FetchFailure> {
        let body = self
            .interpret(network_query(point, radius_m, self.config.timeout_secs))
            .await?;
        let extract = OsmExtract::from_overpass(&body)?;
        log::debug!(
            "overpass: {} nodes, {} ways around {point}",
            extract.nodes.len(),
            extract.ways.len()
        );
        Ok(RoadGraph::from_osm(&extract)
            .truncate(point, radius_m)
            .simplify())
    }

    async fn railway_tags(
        &self,
        point: GeoPoint,
        radius_m: f64,
    ) -> Result<Vec<String>, FetchFailure> {
        let body = self
            .interpret(railway_query(point, radius_m, self.config.timeout_secs))
            .await?;
        tagged_values(&body, "railway")
    }
}
