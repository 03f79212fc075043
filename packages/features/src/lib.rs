#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident enrichment.
//!
//! The [`Transformer`] validates an incident report, then runs two
//! independent sub-pipelines:
//!
//! - **Road features**: fetch the local road graph ([`fetch_graph`] with the
//!   widened-radius retry), [`extract`] road type and point-feature flags,
//!   and [`detect_railway`] with a narrower secondary query.
//! - **Daylight**: [`is_daylight`] checks the incident time against civil
//!   dawn and dusk.
//!
//! Neither can suppress the other. Only structurally invalid input is an
//! error; everything else degrades to `null` fields.
//!
//! [`fetch_graph`]: road_guardian_road_graph::fetch_graph

pub mod daylight;
pub mod extract;
pub mod railway;
pub mod transform;

pub use daylight::{is_daylight, is_daylight_raw};
pub use extract::{
    ExtractionReport, PartialExtractionFailure, ROAD_TYPE_PRIORITY, extract, resolve_road_type,
};
pub use railway::{DEFAULT_RAILWAY_RADIUS_M, RailwayOutcome, detect_railway, is_railway_hazard};
pub use transform::{EnrichmentConfig, Transformer};
