#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Client for the behavioural-guideline classification service.
//!
//! Enriched incident features are mapped onto the service's input schema
//! ([`GuidelinesInput::from_features`]) and posted to `/predict`. The
//! service answers with an ordered list of guidelines for the driver.

pub mod client;
pub mod models;

pub use client::{GuidelinesClient, GuidelinesConfig};
pub use models::{
    GuidelinesInput, GuidelinesResponse, IncidentType, RoadType, SeverityLevel, clock_daylight,
};

/// Errors from the guideline service.
#[derive(Debug, thiserror::Error)]
pub enum GuidelinesError {
    /// Transport failure, error status, or an unparseable body.
    #[error(transparent)]
    Http(#[from] road_guardian_retry::HttpError),

    /// The body parsed as JSON but not into the expected shape.
    #[error("Unexpected response shape: {0}")]
    Json(#[from] serde_json::Error),
}
