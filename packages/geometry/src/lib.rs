#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Pure geometry and time helpers: great-circle distance and the sun's
//! civil twilight boundaries. No I/O.

pub mod distance;
pub mod solar;

pub use distance::{EARTH_RADIUS_M, haversine_m, within_radius};
pub use solar::{SolarError, Twilight, civil_twilight, civil_twilight_nearest};
