//! Request and response types of the guideline service, and the mapping
//! from enriched incident features onto them.

use chrono::{NaiveTime, Timelike as _};
use road_guardian_models::IncidentFeatures;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Severity classes the model was trained on.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum SeverityLevel {
    /// Serious incident.
    High,
    /// Moderate incident.
    Medium,
    /// Minor incident.
    Low,
    /// Severity not reported or not recognized.
    #[default]
    Unknown,
}

impl SeverityLevel {
    /// Maps a reported seriousness (`low`, `medium`, `high`, any case).
    #[must_use]
    pub fn from_seriousness(seriousness: &str) -> Self {
        match seriousness.trim().to_lowercase().as_str() {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            _ => Self::Unknown,
        }
    }
}

/// Incident types the model was trained on.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum IncidentType {
    /// Vehicle fire.
    #[serde(rename = "Incendio Veicolo")]
    #[strum(serialize = "Incendio Veicolo")]
    IncendioVeicolo,
    /// Pedestrian struck.
    #[serde(rename = "Investimento")]
    #[strum(serialize = "Investimento")]
    Investimento,
    /// Vehicle left the road.
    #[serde(rename = "Veicolo Fuori Strada")]
    #[strum(serialize = "Veicolo Fuori Strada")]
    VeicoloFuoriStrada,
    /// Rear-end collision.
    #[serde(rename = "Tamponamento")]
    #[strum(serialize = "Tamponamento")]
    Tamponamento,
    /// Collision with an obstacle or another vehicle's side.
    #[serde(rename = "Collisione con ostacolo")]
    #[strum(serialize = "Collisione con ostacolo")]
    CollisioneConOstacolo,
}

impl IncidentType {
    /// Maps a reported category. Unrecognized categories have no type.
    #[must_use]
    pub fn from_category(category: &str) -> Option<Self> {
        match category.trim().to_lowercase().as_str() {
            "tamponamento" => Some(Self::Tamponamento),
            "collisione con ostacolo" | "collisione laterale" => Some(Self::CollisioneConOstacolo),
            "veicolo fuori strada" => Some(Self::VeicoloFuoriStrada),
            "investimento" => Some(Self::Investimento),
            "incendio veicolo" | "incendio" => Some(Self::IncendioVeicolo),
            _ => None,
        }
    }
}

/// Coarse road classes the model was trained on.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RoadType {
    /// Motorways and trunk roads, including their links.
    MotorwayTrunk,
    /// Primary and secondary roads, including their links.
    PrimarySecondary,
    /// Residential streets.
    Residential,
    /// Service roads.
    Service,
    /// Tertiary roads, including their links.
    Tertiary,
    /// Living streets.
    LivingStreet,
    /// Anything else.
    #[default]
    Unclassified,
}

impl RoadType {
    /// Maps an OSM `highway` class. Unknown classes are unclassified.
    #[must_use]
    pub fn from_osm(highway: &str) -> Self {
        match highway.trim().to_lowercase().as_str() {
            "motorway" | "motorway_link" | "trunk" | "trunk_link" => Self::MotorwayTrunk,
            "primary" | "primary_link" | "secondary" | "secondary_link" => Self::PrimarySecondary,
            "tertiary" | "tertiary_link" => Self::Tertiary,
            "residential" => Self::Residential,
            "living_street" => Self::LivingStreet,
            "service" => Self::Service,
            _ => Self::Unclassified,
        }
    }
}

/// Start of the fixed-clock daylight window, seconds after midnight.
const CLOCK_DAWN_SECS: u32 = 6 * 3600;

/// End of the fixed-clock daylight window, seconds after midnight.
const CLOCK_DUSK_SECS: u32 = 20 * 3600;

/// Daylight by wall clock alone: 06:00 to 20:00 inclusive.
///
/// A coarse stand-in used only when the solar computation produced no
/// answer; it ignores season and latitude.
#[must_use]
pub fn clock_daylight(time: Option<NaiveTime>) -> bool {
    time.is_none_or(|t| {
        (CLOCK_DAWN_SECS..=CLOCK_DUSK_SECS).contains(&t.num_seconds_from_midnight())
    })
}

/// Classification request sent to `/predict`.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GuidelinesInput {
    /// Incident severity.
    #[serde(rename = "Severity")]
    pub severity: SeverityLevel,
    /// Incident type, if recognized.
    #[serde(rename = "Incident_Type")]
    pub incident_type: Option<IncidentType>,
    /// Coarse road class.
    #[serde(rename = "Road_Type")]
    pub road_type: RoadType,
    /// Daylight at the time of the incident.
    #[serde(rename = "Daylight")]
    pub daylight: bool,
    /// Speed bump nearby.
    #[serde(rename = "Bump")]
    pub bump: bool,
    /// Pedestrian crossing nearby.
    #[serde(rename = "Crossing")]
    pub crossing: bool,
    /// Give-way sign nearby.
    #[serde(rename = "Give_Way")]
    pub give_way: bool,
    /// Intersection nearby.
    #[serde(rename = "Junction")]
    pub junction: bool,
    /// Railway or level crossing nearby.
    #[serde(rename = "Railway")]
    pub railway: bool,
    /// Roundabout nearby.
    #[serde(rename = "Roundabout")]
    pub roundabout: bool,
    /// Stop sign nearby.
    #[serde(rename = "Stop")]
    pub stop: bool,
    /// Traffic signal nearby.
    #[serde(rename = "Traffic_Signal")]
    pub traffic_signal: bool,
    /// Turning loop nearby.
    #[serde(rename = "Turning_Loop")]
    pub turning_loop: bool,
}

impl Default for GuidelinesInput {
    fn default() -> Self {
        Self {
            severity: SeverityLevel::Unknown,
            incident_type: None,
            road_type: RoadType::Unclassified,
            daylight: true,
            bump: false,
            crossing: false,
            give_way: false,
            junction: false,
            railway: false,
            roundabout: false,
            stop: false,
            traffic_signal: false,
            turning_loop: false,
        }
    }
}

impl GuidelinesInput {
    /// Builds a request from enriched incident features.
    ///
    /// `null` road flags become `false` and a `null` road type becomes
    /// unclassified. A `null` daylight value falls back to
    /// [`clock_daylight`] on `local_time`.
    #[must_use]
    pub fn from_features(features: &IncidentFeatures, local_time: Option<NaiveTime>) -> Self {
        let road = &features.road;
        let daylight = features.daylight.unwrap_or_else(|| {
            log::warn!("solar daylight unavailable, falling back to the 06:00-20:00 clock window");
            clock_daylight(local_time)
        });

        Self {
            severity: SeverityLevel::from_seriousness(&features.seriousness),
            incident_type: IncidentType::from_category(&features.category),
            road_type: road
                .road_type
                .as_deref()
                .map_or(RoadType::Unclassified, RoadType::from_osm),
            daylight,
            bump: road.bump.unwrap_or(false),
            crossing: road.crossing.unwrap_or(false),
            give_way: road.give_way.unwrap_or(false),
            junction: road.junction.unwrap_or(false),
            railway: road.railway.unwrap_or(false),
            roundabout: road.roundabout.unwrap_or(false),
            stop: road.stop.unwrap_or(false),
            traffic_signal: road.traffic_signal.unwrap_or(false),
            turning_loop: road.turning_loop.unwrap_or(false),
        }
    }
}

/// Response of `/predict`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuidelinesResponse {
    /// Behavioural guidelines, most important first.
    #[serde(default)]
    pub guidelines: Vec<String>,
}
