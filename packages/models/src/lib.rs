#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for the road-incident enrichment pipeline.
//!
//! An [`IncidentReport`] is what a client submits. It is validated into an
//! [`IncidentContext`], enriched with [`RoadFeatures`] and a daylight flag,
//! and handed back to the caller as a flat [`IncidentFeatures`] record whose
//! JSON keys match what the guideline service and the incident store expect.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Road type reported when no classification is possible.
pub const UNKNOWN_ROAD_TYPE: &str = "Unknown";

/// Keys of the road-feature portion of [`IncidentFeatures`], in output order.
pub const ROAD_FEATURE_KEYS: [&str; 10] = [
    "Bump",
    "Crossing",
    "Give_Way",
    "Junction",
    "Railway",
    "Roundabout",
    "Stop",
    "Traffic_Signal",
    "Turning_Loop",
    "Road_Type",
];

/// Errors raised when an incident report is structurally unusable.
///
/// These are the only errors that cross the transformer boundary; every
/// other failure degrades to a `null` field.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidInputError {
    /// A required field is absent.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A required text field is present but blank.
    #[error("Field must not be empty: {0}")]
    EmptyField(&'static str),

    /// Latitude outside `[-90, 90]` or not finite.
    #[error("Latitude out of range: {0}")]
    LatitudeOutOfRange(f64),

    /// Longitude outside `[-180, 180]` or not finite.
    #[error("Longitude out of range: {0}")]
    LongitudeOutOfRange(f64),

    /// A timestamp string could not be parsed.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees, `[-90, 90]`.
    pub latitude: f64,
    /// Longitude in degrees, `[-180, 180]`.
    pub longitude: f64,
}

impl GeoPoint {
    /// Creates a point after checking coordinate bounds.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidInputError`] if either coordinate is non-finite or
    /// out of range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, InvalidInputError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(InvalidInputError::LatitudeOutOfRange(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(InvalidInputError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// A point in time as reported by a client.
///
/// Naive timestamps carry no offset and are treated as UTC when an absolute
/// instant is needed. Callers that need local-time accuracy must supply an
/// offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    /// Date and time without an offset.
    Naive(NaiveDateTime),
    /// Date and time with an explicit UTC offset.
    Zoned(DateTime<FixedOffset>),
}

impl Timestamp {
    /// Returns the instant this timestamp denotes, assuming UTC for naive
    /// values.
    #[must_use]
    pub fn to_utc(&self) -> DateTime<Utc> {
        match self {
            Self::Naive(naive) => naive.and_utc(),
            Self::Zoned(zoned) => zoned.with_timezone(&Utc),
        }
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(value: NaiveDateTime) -> Self {
        Self::Naive(value)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Zoned(value.fixed_offset())
    }
}

impl From<DateTime<FixedOffset>> for Timestamp {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Self::Zoned(value)
    }
}

impl FromStr for Timestamp {
    type Err = InvalidInputError;

    /// Accepts RFC 3339 (`2023-10-25T14:30:00Z`, `...+02:00`) or a naive
    /// `YYYY-MM-DDTHH:MM:SS` / `YYYY-MM-DD HH:MM:SS` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(zoned) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self::Zoned(zoned));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(Self::Naive(naive));
            }
        }
        Err(InvalidInputError::InvalidTimestamp(s.to_string()))
    }
}

/// An incident report as submitted by a client.
///
/// Every field is optional at this level so that structurally incomplete
/// payloads can be rejected with a precise [`InvalidInputError`] instead of
/// a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncidentReport {
    /// Date the incident occurred.
    pub incident_date: Option<NaiveDate>,
    /// Time of day the incident occurred.
    pub incident_time: Option<NaiveTime>,
    /// Longitude of the incident.
    pub incident_longitude: Option<f64>,
    /// Latitude of the incident.
    pub incident_latitude: Option<f64>,
    /// Reporter-assessed severity (`low`, `medium`, `high`).
    pub seriousness: Option<String>,
    /// Incident category (e.g. `tamponamento`).
    pub category: Option<String>,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
}

/// A validated incident, ready for enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentContext {
    /// Where the incident happened.
    pub point: GeoPoint,
    /// When it happened (date and time combined).
    pub occurred_at: Timestamp,
    /// Severity, passed through unchanged.
    pub severity: String,
    /// Category, passed through unchanged.
    pub category: String,
}

impl TryFrom<&IncidentReport> for IncidentContext {
    type Error = InvalidInputError;

    fn try_from(report: &IncidentReport) -> Result<Self, Self::Error> {
        let latitude = report
            .incident_latitude
            .ok_or(InvalidInputError::MissingField("incident_latitude"))?;
        let longitude = report
            .incident_longitude
            .ok_or(InvalidInputError::MissingField("incident_longitude"))?;
        let date = report
            .incident_date
            .ok_or(InvalidInputError::MissingField("incident_date"))?;
        let time = report
            .incident_time
            .ok_or(InvalidInputError::MissingField("incident_time"))?;
        let severity = required_text(report.seriousness.as_deref(), "seriousness")?;
        let category = required_text(report.category.as_deref(), "category")?;

        Ok(Self {
            point: GeoPoint::new(latitude, longitude)?,
            occurred_at: Timestamp::Naive(date.and_time(time)),
            severity,
            category,
        })
    }
}

fn required_text(value: Option<&str>, field: &'static str) -> Result<String, InvalidInputError> {
    let value = value.ok_or(InvalidInputError::MissingField(field))?;
    if value.trim().is_empty() {
        return Err(InvalidInputError::EmptyField(field));
    }
    Ok(value.to_string())
}

/// Fully resolved road context around an incident.
///
/// Produced only when a road graph was obtained; absent tags are `false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoadFeatures {
    /// A speed bump or hump is nearby.
    pub bump: bool,
    /// A pedestrian crossing is nearby.
    pub crossing: bool,
    /// A give-way sign is nearby.
    pub give_way: bool,
    /// A true intersection (node degree > 2) is nearby.
    pub junction: bool,
    /// A railway line or level crossing is nearby.
    pub railway: bool,
    /// A roundabout is nearby.
    pub roundabout: bool,
    /// A stop sign is nearby.
    pub stop: bool,
    /// A traffic signal is nearby.
    pub traffic_signal: bool,
    /// A turning circle or loop is nearby.
    pub turning_loop: bool,
    /// OSM `highway` class of the nearest road segment.
    pub road_type: String,
}

impl Default for RoadFeatures {
    fn default() -> Self {
        Self {
            bump: false,
            crossing: false,
            give_way: false,
            junction: false,
            railway: false,
            roundabout: false,
            stop: false,
            traffic_signal: false,
            turning_loop: false,
            road_type: UNKNOWN_ROAD_TYPE.to_string(),
        }
    }
}

/// Road context as delivered to callers.
///
/// Either every field is `Some` (a graph was obtained) or every field is
/// `None` (the graph fetch failed outright). The two states are never mixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadFeatureSet {
    /// See [`RoadFeatures::bump`].
    #[serde(rename = "Bump")]
    pub bump: Option<bool>,
    /// See [`RoadFeatures::crossing`].
    #[serde(rename = "Crossing")]
    pub crossing: Option<bool>,
    /// See [`RoadFeatures::give_way`].
    #[serde(rename = "Give_Way")]
    pub give_way: Option<bool>,
    /// See [`RoadFeatures::junction`].
    #[serde(rename = "Junction")]
    pub junction: Option<bool>,
    /// See [`RoadFeatures::railway`].
    #[serde(rename = "Railway")]
    pub railway: Option<bool>,
    /// See [`RoadFeatures::roundabout`].
    #[serde(rename = "Roundabout")]
    pub roundabout: Option<bool>,
    /// See [`RoadFeatures::stop`].
    #[serde(rename = "Stop")]
    pub stop: Option<bool>,
    /// See [`RoadFeatures::traffic_signal`].
    #[serde(rename = "Traffic_Signal")]
    pub traffic_signal: Option<bool>,
    /// See [`RoadFeatures::turning_loop`].
    #[serde(rename = "Turning_Loop")]
    pub turning_loop: Option<bool>,
    /// See [`RoadFeatures::road_type`].
    #[serde(rename = "Road_Type")]
    pub road_type: Option<String>,
}

impl RoadFeatureSet {
    /// The all-`null` set used when no road graph could be fetched.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self {
            bump: None,
            crossing: None,
            give_way: None,
            junction: None,
            railway: None,
            roundabout: None,
            stop: None,
            traffic_signal: None,
            turning_loop: None,
            road_type: None,
        }
    }

    fn flags(&self) -> [Option<bool>; 9] {
        [
            self.bump,
            self.crossing,
            self.give_way,
            self.junction,
            self.railway,
            self.roundabout,
            self.stop,
            self.traffic_signal,
            self.turning_loop,
        ]
    }

    /// `true` when every field is `null`.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        self.road_type.is_none() && self.flags().iter().all(Option::is_none)
    }

    /// `true` when every field is resolved.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.road_type.is_some() && self.flags().iter().all(Option::is_some)
    }

    /// Converts back into resolved features, if this set is resolved.
    #[must_use]
    pub fn resolved(&self) -> Option<RoadFeatures> {
        Some(RoadFeatures {
            bump: self.bump?,
            crossing: self.crossing?,
            give_way: self.give_way?,
            junction: self.junction?,
            railway: self.railway?,
            roundabout: self.roundabout?,
            stop: self.stop?,
            traffic_signal: self.traffic_signal?,
            turning_loop: self.turning_loop?,
            road_type: self.road_type.clone()?,
        })
    }
}

impl From<RoadFeatures> for RoadFeatureSet {
    fn from(features: RoadFeatures) -> Self {
        Self {
            bump: Some(features.bump),
            crossing: Some(features.crossing),
            give_way: Some(features.give_way),
            junction: Some(features.junction),
            railway: Some(features.railway),
            roundabout: Some(features.roundabout),
            stop: Some(features.stop),
            traffic_signal: Some(features.traffic_signal),
            turning_loop: Some(features.turning_loop),
            road_type: Some(features.road_type),
        }
    }
}

/// The complete enrichment output for one incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentFeatures {
    /// Road context (all `null` when the graph fetch failed).
    #[serde(flatten)]
    pub road: RoadFeatureSet,
    /// Whether the incident happened between civil dawn and dusk.
    #[serde(rename = "Daylight")]
    pub daylight: Option<bool>,
    /// Severity, unchanged from the input.
    #[serde(rename = "Seriousness")]
    pub seriousness: String,
    /// Category, unchanged from the input.
    #[serde(rename = "Category")]
    pub category: String,
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert_eq!(
            GeoPoint::new(91.0, 0.0),
            Err(InvalidInputError::LatitudeOutOfRange(91.0))
        );
        assert_eq!(
            GeoPoint::new(0.0, -180.5),
            Err(InvalidInputError::LongitudeOutOfRange(-180.5))
        );
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn combines_date_and_time_into_context() {
        let ctx = IncidentContext::try_from(&report()).unwrap();
        assert_eq!(ctx.severity, "high");
        assert_eq!(
            ctx.occurred_at.to_utc().to_rfc3339(),
            "2023-10-25T14:30:00+00:00"
        );
    }

    #[test]
    fn missing_fields_are_hard_errors() {
        let mut r = report();
        r.incident_time = None;
        assert_eq!(
            IncidentContext::try_from(&r),
            Err(InvalidInputError::MissingField("incident_time"))
        );

        let mut r = report();
        r.category = Some("   ".to_string());
        assert_eq!(
            IncidentContext::try_from(&r),
            Err(InvalidInputError::EmptyField("category"))
        );
    }

    #[test]
    fn parses_naive_and_zoned_timestamps() {
        let zoned: Timestamp = "2023-10-25T16:30:00+02:00".parse().unwrap();
        let naive: Timestamp = "2023-10-25 14:30:00".parse().unwrap();
        assert!(matches!(naive, Timestamp::Naive(_)));
        assert_eq!(zoned.to_utc(), naive.to_utc());
        assert!("25/10/2023".parse::<Timestamp>().is_err());
    }

    #[test]
    fn unavailable_set_serializes_every_key_as_null() {
        let features = IncidentFeatures {
            road: RoadFeatureSet::unavailable(),
            daylight: Some(true),
            seriousness: "low".to_string(),
            category: "incendio".to_string(),
        };
        let json = serde_json::to_value(&features).unwrap();
        for key in ROAD_FEATURE_KEYS {
            assert!(json[key].is_null(), "{key} should be null");
        }
        assert_eq!(json["Daylight"], serde_json::json!(true));
        assert_eq!(json["Seriousness"], serde_json::json!("low"));
    }

    #[test]
    fn resolved_set_round_trips_to_features() {
        let set = RoadFeatureSet::from(RoadFeatures::default());
        assert!(set.is_resolved());
        assert!(!set.is_unavailable());
        assert_eq!(set.resolved().unwrap().road_type, UNKNOWN_ROAD_TYPE);
        assert!(RoadFeatureSet::unavailable().is_unavailable());
    }
}
