//! Application configuration: embedded TOML defaults, an optional file
//! override, then environment variables.

use std::path::{Path, PathBuf};

use road_guardian_features::EnrichmentConfig;
use road_guardian_guidelines::GuidelinesConfig;
use road_guardian_poi_cache::{DEFAULT_TAGS, paths};
use road_guardian_road_graph::OverpassConfig;
use serde::Deserialize;

/// Configuration baked into the binary.
const DEFAULT_CONFIG: &str = include_str!("../config/road_guardian.toml");

/// Overrides the Overpass interpreter URL.
pub const OVERPASS_URL_ENV: &str = "OVERPASS_URL";

/// Overrides the guideline service base URL.
pub const GUIDELINES_URL_ENV: &str = "GUIDELINES_AI_API_URL";

/// Enriches from a prebuilt POI cache instead of Overpass.
pub const POI_CACHE_ENV: &str = "ROAD_GUARDIAN_POI_CACHE";

/// Errors loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// File that was read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`AppConfig`].
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings for the offline cache builder and the cache reader.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheConfig {
    /// `highway` values to keep.
    #[serde(default = "default_tags")]
    pub tags_of_interest: Vec<String>,
    /// Bulk OSM extract to scan.
    #[serde(default = "paths::default_extract_path")]
    pub input: PathBuf,
    /// Parquet file to write.
    #[serde(default = "paths::default_cache_path")]
    pub output: PathBuf,
    /// Prebuilt cache to enrich from instead of Overpass.
    #[serde(default)]
    pub serve_from: Option<PathBuf>,
}

fn default_tags() -> Vec<String> {
    DEFAULT_TAGS.iter().map(ToString::to_string).collect()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            tags_of_interest: default_tags(),
            input: paths::default_extract_path(),
            output: paths::default_cache_path(),
            serve_from: None,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AppConfig {
    /// Overpass endpoint.
    #[serde(default)]
    pub overpass: OverpassConfig,
    /// Enrichment radii.
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    /// Guideline service.
    #[serde(default)]
    pub guidelines: GuidelinesConfig,
    /// POI cache.
    #[serde(default)]
    pub cache: CacheConfig,
}

impl AppConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document is invalid.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::de::from_str(text)?)
    }

    /// Loads `path` if given, else the embedded defaults, then applies
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                log::debug!("Loaded config from {}", path.display());
                Self::from_toml(&text)?
            }
            None => Self::from_toml(DEFAULT_CONFIG)?,
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies environment overrides read through `var`. Empty values are
    /// ignored.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = var(OVERPASS_URL_ENV) {
            log::debug!("{OVERPASS_URL_ENV} overrides the Overpass endpoint");
            self.overpass.endpoint = url;
        }
        if let Some(url) = var(GUIDELINES_URL_ENV) {
            log::debug!("{GUIDELINES_URL_ENV} overrides the guideline service URL");
            self.guidelines.base_url = url;
        }
        if let Some(path) = var(POI_CACHE_ENV) {
            self.cache.serve_from = Some(PathBuf::from(path));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn embedded_defaults_parse() {
        let config = AppConfig::from_toml(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.overpass.timeout_secs, 25);
        assert!((config.enrichment.radius.initial_m - 250.0).abs() < f64::EPSILON);
        assert!((config.enrichment.radius.widened_m - 500.0).abs() < f64::EPSILON);
        assert!((config.enrichment.railway_radius_m - 40.0).abs() < f64::EPSILON);
        assert_eq!(config.guidelines.base_url, "http://localhost:8001");
        assert_eq!(config.guidelines.max_attempts, 3);
        assert_eq!(
            config.cache.tags_of_interest,
            ["traffic_signals", "stop", "crossing", "bump", "speed_bump", "hump"]
        );
        assert_eq!(config.cache.output, paths::default_cache_path());
        assert_eq!(config.cache.serve_from, None);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.cache, CacheConfig::default());
        assert_eq!(config.guidelines, GuidelinesConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AppConfig::from_toml(
            "[enrichment]\ninitial_m = 100.0\n\n[guidelines]\ntimeout_secs = 3\n",
        )
        .unwrap();
        assert!((config.enrichment.radius.initial_m - 100.0).abs() < f64::EPSILON);
        assert!((config.enrichment.radius.widened_m - 500.0).abs() < f64::EPSILON);
        assert_eq!(config.guidelines.timeout_secs, 3);
        assert!(config.guidelines.cache_enabled);
    }

    #[test]
    fn environment_overrides() {
        let env = BTreeMap::from([
            (OVERPASS_URL_ENV, "http://overpass.local/api/interpreter"),
            (GUIDELINES_URL_ENV, "http://ml.local:9000"),
            (POI_CACHE_ENV, "/srv/pois.parquet"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|key| env.get(key).map(ToString::to_string));

        assert_eq!(config.overpass.endpoint, "http://overpass.local/api/interpreter");
        assert_eq!(config.guidelines.base_url, "http://ml.local:9000");
        assert_eq!(config.cache.serve_from, Some(PathBuf::from("/srv/pois.parquet")));
    }

    #[test]
    fn blank_environment_values_are_ignored() {
        let mut config = AppConfig::default();
        config.apply_env(|_| Some("  ".to_string()));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(matches!(
            AppConfig::from_toml("[guidelines]\ntimeout_secs = \"soon\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_an_error() {
        let path =
            std::env::temp_dir().join(format!("road_guardian_{}.toml", uuid::Uuid::new_v4()));
        assert!(matches!(
            AppConfig::load(Some(&path)),
            Err(ConfigError::Read { .. })
        ));
    }
}
