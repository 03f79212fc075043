//! Civil dawn and dusk from the sunrise equation.
//!
//! Uses the low-precision solar position model (mean anomaly, equation of
//! center, ecliptic longitude) which is accurate to about a minute at
//! mid-latitudes. Civil twilight is when the sun's center is 6° below the
//! horizon.

use chrono::{DateTime, Datelike as _, NaiveDate, Utc};
use road_guardian_models::GeoPoint;

/// Solar depression angle for civil twilight, in degrees.
const CIVIL_DEPRESSION_DEG: f64 = 6.0;

/// Obliquity of the ecliptic, in degrees.
const OBLIQUITY_DEG: f64 = 23.4397;

/// Julian date of the J2000 epoch (2000-01-01 12:00).
const J2000: f64 = 2_451_545.0;

/// Julian date of the Unix epoch.
const UNIX_EPOCH_JD: f64 = 2_440_587.5;

/// `NaiveDate::num_days_from_ce()` of 2000-01-01.
const J2000_DAYS_FROM_CE: i32 = 730_120;

/// Why twilight times could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SolarError {
    /// The sun stays above the civil twilight angle all day.
    #[error("Sun never drops to civil twilight on this day (polar day)")]
    PolarDay,

    /// The sun never rises to the civil twilight angle.
    #[error("Sun never reaches civil twilight on this day (polar night)")]
    PolarNight,

    /// The computation produced a non-finite value (e.g. exactly at a pole).
    #[error("Degenerate solar geometry")]
    Degenerate,

    /// A computed instant fell outside the representable range.
    #[error("Computed time out of range")]
    OutOfRange,
}

/// Civil twilight boundaries for one solar day at one location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Twilight {
    /// Civil dawn.
    pub dawn: DateTime<Utc>,
    /// Solar transit.
    pub solar_noon: DateTime<Utc>,
    /// Civil dusk.
    pub dusk: DateTime<Utc>,
}

impl Twilight {
    /// `true` if `at` lies between dawn and dusk, both inclusive.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.dawn <= at && at <= self.dusk
    }
}

struct SolarDay {
    transit_jd: f64,
    declination_rad: f64,
}

fn solar_day(point: GeoPoint, date: NaiveDate) -> SolarDay {
    let n = f64::from(date.num_days_from_ce() - J2000_DAYS_FROM_CE) + 0.0008;
    let mean_solar_noon = n - point.longitude / 360.0;

    let mean_anomaly = (357.5291 + 0.985_600_28 * mean_solar_noon).rem_euclid(360.0);
    let m = mean_anomaly.to_radians();
    let center = 1.9148 * m.sin() + 0.0200 * (2.0 * m).sin() + 0.0003 * (3.0 * m).sin();
    let ecliptic_longitude = (mean_anomaly + center + 180.0 + 102.9372).rem_euclid(360.0);
    let lambda = ecliptic_longitude.to_radians();

    let transit_jd = J2000 + mean_solar_noon + 0.0053 * m.sin() - 0.0069 * (2.0 * lambda).sin();
    let declination_rad = (lambda.sin() * OBLIQUITY_DEG.to_radians().sin()).asin();

    SolarDay {
        transit_jd,
        declination_rad,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn jd_to_utc(jd: f64) -> Result<DateTime<Utc>, SolarError> {
    let millis = ((jd - UNIX_EPOCH_JD) * 86_400_000.0).round();
    if !millis.is_finite() {
        return Err(SolarError::Degenerate);
    }
    DateTime::from_timestamp_millis(millis as i64).ok_or(SolarError::OutOfRange)
}

fn twilight_for(point: GeoPoint, day: &SolarDay) -> Result<Twilight, SolarError> {
    let phi = point.latitude.to_radians();
    let delta = day.declination_rad;

    let cos_hour_angle = ((-CIVIL_DEPRESSION_DEG).to_radians().sin() - phi.sin() * delta.sin())
        / (phi.cos() * delta.cos());

    if !cos_hour_angle.is_finite() {
        return Err(SolarError::Degenerate);
    }
    if cos_hour_angle < -1.0 {
        return Err(SolarError::PolarDay);
    }
    if cos_hour_angle > 1.0 {
        return Err(SolarError::PolarNight);
    }

    let half_day = cos_hour_angle.acos().to_degrees() / 360.0;

    Ok(Twilight {
        dawn: jd_to_utc(day.transit_jd - half_day)?,
        solar_noon: jd_to_utc(day.transit_jd)?,
        dusk: jd_to_utc(day.transit_jd + half_day)?,
    })
}

/// Civil twilight for the solar day whose transit falls on `date` (UTC).
///
/// # Errors
///
/// Returns [`SolarError`] for polar day/night or degenerate geometry.
pub fn civil_twilight(point: GeoPoint, date: NaiveDate) -> Result<Twilight, SolarError> {
    twilight_for(point, &solar_day(point, date))
}

/// Civil twilight for the solar day whose transit is closest to `at`.
///
/// A UTC calendar date does not line up with the local solar day far from
/// the prime meridian (an evening in California is already "tomorrow" in
/// UTC), so the transits of the neighbouring UTC dates are compared and
/// the nearest one is used.
///
/// # Errors
///
/// Returns [`SolarError`] for polar day/night or degenerate geometry.
#[allow(clippy::cast_precision_loss)]
pub fn civil_twilight_nearest(point: GeoPoint, at: DateTime<Utc>) -> Result<Twilight, SolarError> {
    let date = at.date_naive();
    let at_jd = at.timestamp_millis() as f64 / 86_400_000.0 + UNIX_EPOCH_JD;

    let day = [date.pred_opt(), Some(date), date.succ_opt()]
        .into_iter()
        .flatten()
        .map(|d| solar_day(point, d))
        .min_by(|a, b| {
            (a.transit_jd - at_jd)
                .abs()
                .total_cmp(&(b.transit_jd - at_jd).abs())
        })
        .ok_or(SolarError::OutOfRange)?;

    twilight_for(point, &day)
}
