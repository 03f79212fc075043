#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the road-incident enrichment pipeline.
//!
//! Subcommands enrich incidents (live Overpass or a prebuilt POI cache),
//! build and inspect the POI cache, and query the guideline service.
//!
//! Uses `indicatif-log-bridge` (via [`logging::init_logger`]) so log lines
//! and spinners share the terminal cleanly.

mod config;
mod logging;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand};
use config::AppConfig;
use road_guardian_features::Transformer;
use road_guardian_guidelines::{GuidelinesClient, GuidelinesInput};
use road_guardian_models::{IncidentFeatures, IncidentReport};
use road_guardian_poi_cache::PoiCache;
use road_guardian_road_graph::{GraphSource, OverpassClient};

/// Enrich road-incident reports with road context and daylight.
#[derive(Parser)]
#[command(name = "road_guardian")]
#[command(about = "Enrich road-incident reports with road context and daylight")]
struct Cli {
    /// Configuration file replacing the embedded defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (`-v` debug, `-vv` trace). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Enrich one incident (from flags) or a batch (from a JSON file).
    Enrich {
        /// JSON file holding one incident report or an array of them.
        #[arg(long, conflicts_with_all = ["lat", "lon", "date", "time", "seriousness", "category"])]
        file: Option<PathBuf>,

        #[command(flatten)]
        incident: IncidentArgs,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Scan a bulk OSM extract and write the POI cache.
    BuildCache {
        /// `.osm.pbf` or `.geojson` extract (default from config).
        #[arg(long)]
        input: Option<PathBuf>,

        /// Parquet file to write (default from config).
        #[arg(long)]
        output: Option<PathBuf>,

        /// Comma-separated `highway` values to keep (default from config).
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },

    /// List cached POIs near a point.
    LookupCache {
        /// Latitude of the query point.
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        /// Longitude of the query point.
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,

        /// Search radius in meters.
        #[arg(long, default_value_t = 100.0)]
        radius: f64,

        /// Cache file (default: the configured output path).
        #[arg(long)]
        cache: Option<PathBuf>,
    },

    /// Enrich one incident and ask the guideline service what to do.
    Guidelines {
        #[command(flatten)]
        incident: IncidentArgs,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Print the guideline service's protocol catalogue.
    Protocols,
}

/// One incident given on the command line.
///
/// Every field is optional here so that a missing one is reported by the
/// same validation that guards batch input.
#[derive(Args)]
struct IncidentArgs {
    /// Latitude of the incident.
    #[arg(long, allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Longitude of the incident.
    #[arg(long, allow_negative_numbers = true)]
    lon: Option<f64>,

    /// Date of the incident (YYYY-MM-DD).
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Time of the incident (HH:MM:SS).
    #[arg(long)]
    time: Option<NaiveTime>,

    /// Severity (`low`, `medium`, `high`).
    #[arg(long)]
    seriousness: Option<String>,

    /// Category (e.g. `tamponamento`).
    #[arg(long)]
    category: Option<String>,

    /// Free-text description.
    #[arg(long)]
    description: Option<String>,
}

impl From<IncidentArgs> for IncidentReport {
    fn from(args: IncidentArgs) -> Self {
        Self {
            incident_date: args.date,
            incident_time: args.time,
            incident_longitude: args.lon,
            incident_latitude: args.lat,
            seriousness: args.seriousness,
            category: args.category,
            description: args.description,
        }
    }
}

/// Where road context comes from.
#[derive(Args)]
struct SourceArgs {
    /// Enrich from this prebuilt POI cache instead of Overpass.
    #[arg(long)]
    cache: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let multi = logging::init_logger(cli.verbose);
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Enrich {
            file,
            incident,
            source,
        } => {
            let transformer = transformer(&config, source.cache.as_deref())?;
            match file {
                Some(path) => enrich_batch(&transformer, &path).await?,
                None => {
                    let features = transformer.transform(&incident.into()).await?;
                    println!("{}", serde_json::to_string_pretty(&features)?);
                }
            }
        }
        Commands::BuildCache {
            input,
            output,
            tags,
        } => {
            let input = input.unwrap_or_else(|| config.cache.input.clone());
            let output = output.unwrap_or_else(|| config.cache.output.clone());
            let tags: BTreeSet<String> = if tags.is_empty() {
                config.cache.tags_of_interest.iter().cloned().collect()
            } else {
                tags.iter().map(|t| t.trim().to_lowercase()).collect()
            };

            let bar = logging::spinner(&multi, &format!("Scanning {}", input.display()));
            let result = tokio::task::spawn_blocking(move || {
                road_guardian_poi_cache::build_cache(&input, &output, &tags)
                    .map(|count| (count, output))
            })
            .await?;
            bar.finish_and_clear();

            let (count, output) = result?;
            println!("Wrote {count} tagged points to {}", output.display());
        }
        Commands::LookupCache {
            lat,
            lon,
            radius,
            cache,
        } => {
            let path = cache.unwrap_or_else(|| config.cache.output.clone());
            let point = road_guardian_models::GeoPoint::new(lat, lon)?;
            let pois = PoiCache::open(&path)?;

            let hits: Vec<serde_json::Value> = pois
                .within(point, radius)
                .into_iter()
                .map(|r| serde_json::json!({ "lon": r.lon, "lat": r.lat, "highway": r.highway }))
                .collect();
            log::info!("{} of {} cached POIs within {radius} m", hits.len(), pois.len());
            println!("{}", serde_json::to_string_pretty(&hits)?);
        }
        Commands::Guidelines { incident, source } => {
            let transformer = transformer(&config, source.cache.as_deref())?;
            let report: IncidentReport = incident.into();
            let features = transformer.transform(&report).await?;

            let input = GuidelinesInput::from_features(&features, report.incident_time);
            let client = GuidelinesClient::new(config.guidelines.clone())?;
            let guidelines = client.get_guidelines(&input).await?;

            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "features": features,
                    "input": input,
                    "guidelines": guidelines,
                }))?
            );
        }
        Commands::Protocols => {
            let client = GuidelinesClient::new(config.guidelines.clone())?;
            let protocols = client.get_protocols().await?;
            println!("{}", serde_json::to_string_pretty(&protocols)?);
        }
    }

    Ok(())
}

/// Builds a transformer over the POI cache at `cache` (or the configured
/// one), else over Overpass.
fn transformer(
    config: &AppConfig,
    cache: Option<&Path>,
) -> Result<Transformer, Box<dyn std::error::Error>> {
    let source: Arc<dyn GraphSource> = match cache.or(config.cache.serve_from.as_deref()) {
        Some(path) => Arc::new(PoiCache::open(path)?),
        None => Arc::new(OverpassClient::new(config.overpass.clone())?),
    };
    log::info!("Enriching from {}", source.name());
    Ok(Transformer::new(source, config.enrichment))
}

/// Parses a JSON file holding one report or an array of them.
fn read_reports(path: &Path) -> Result<Vec<IncidentReport>, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    Ok(match value {
        serde_json::Value::Array(_) => serde_json::from_value(value)?,
        other => vec![serde_json::from_value(other)?],
    })
}

/// Enriches every report in `path` concurrently and prints the results as
/// a JSON array, in input order. Invalid reports are logged and skipped;
/// the batch fails if any were.
async fn enrich_batch(
    transformer: &Transformer,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let reports = read_reports(path)?;
    log::info!("Enriching {} incidents from {}", reports.len(), path.display());

    let results = futures::future::join_all(reports.iter().map(|r| transformer.transform(r))).await;

    let mut enriched: Vec<IncidentFeatures> = Vec::with_capacity(results.len());
    let mut rejected = 0usize;
    for (i, result) in results.into_iter().enumerate() {
        match result {
            Ok(features) => enriched.push(features),
            Err(e) => {
                log::error!("Incident #{i} rejected: {e}");
                rejected += 1;
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&enriched)?);

    if rejected > 0 {
        let total = enriched.len() + rejected;
        return Err(format!("{rejected} of {total} incidents rejected").into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn incident_flags_map_onto_a_report() {
        let cli = Cli::parse_from([
            "road_guardian",
            "enrich",
            "--lat",
            "41.8902",
            "--lon",
            "12.4924",
            "--date",
            "2023-10-25",
            "--time",
            "14:30:00",
            "--seriousness",
            "high",
            "--category",
            "tamponamento",
        ]);
        let Commands::Enrich { file, incident, .. } = cli.command else {
            panic!("expected enrich");
        };
        assert!(file.is_none());

        let report: IncidentReport = incident.into();
        assert_eq!(report.incident_latitude, Some(41.8902));
        assert_eq!(report.incident_date, NaiveDate::from_ymd_opt(2023, 10, 25));
        assert_eq!(report.incident_time, NaiveTime::from_hms_opt(14, 30, 0));
        assert_eq!(report.category.as_deref(), Some("tamponamento"));
    }

    #[test]
    fn negative_coordinates_parse() {
        let cli = Cli::parse_from([
            "road_guardian",
            "lookup-cache",
            "--lat",
            "-33.9",
            "--lon",
            "-70.6",
        ]);
        let Commands::LookupCache { lat, lon, radius, .. } = cli.command else {
            panic!("expected lookup-cache");
        };
        assert!((lat + 33.9).abs() < f64::EPSILON);
        assert!((lon + 70.6).abs() < f64::EPSILON);
        assert!((radius - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn verbosity_is_counted_on_any_subcommand() {
        let cli = Cli::parse_from(["road_guardian", "protocols", "-vv"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(Cli::parse_from(["road_guardian", "protocols"]).verbose, 0);
    }

    #[test]
    fn tags_split_on_commas() {
        let cli = Cli::parse_from(["road_guardian", "build-cache", "--tags", "stop,give_way"]);
        let Commands::BuildCache { tags, .. } = cli.command else {
            panic!("expected build-cache");
        };
        assert_eq!(tags, ["stop", "give_way"]);
    }

    #[test]
    fn reads_single_and_batched_reports() {
        let dir = std::env::temp_dir().join(format!("road_guardian_cli_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        let one = r#"{"incident_date": "2023-10-25", "incident_time": "14:30:00",
            "incident_longitude": 12.4924, "incident_latitude": 41.8902,
            "seriousness": "high", "category": "tamponamento"}"#;
        let single = dir.join("one.json");
        std::fs::write(&single, one).unwrap();
        let batch = dir.join("many.json");
        std::fs::write(&batch, format!("[{one}, {one}]")).unwrap();

        assert_eq!(read_reports(&single).unwrap().len(), 1);
        let reports = read_reports(&batch).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].incident_latitude, Some(41.8902));

        std::fs::remove_dir_all(&dir).ok();
    }
}
