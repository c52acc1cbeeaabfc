//! # ldar-methods: survey methods
//!
//! Sensors, crew schedulers and per-method companies for the LDAR
//! simulator. A method configuration resolves to a [`Company`] through a
//! registry on `(deployment type, measurement scale)`:
//!
//! - mobile + component: handheld OGI crews tagging individual leaks
//! - mobile + equipment: aircraft or truck screening by equipment group
//! - orbit + site: satellite passes with a wind-dependent detection limit
//! - stationary + equipment/site: fixed continuous monitors
//!
//! Companies borrow the simulation's daily [`DayContext`] and return a
//! [`CompanyReport`] of tag/flag events; the simulation applies them.

pub mod company;
pub mod context;
pub mod crew;
pub mod kmeans;
pub mod routing;
pub mod schedule;
pub mod sensor;

pub use company::{Company, MethodTimeseries, WatchEntry};
pub use context::{CompanyReport, DayContext, FlagEvent, TagEvent};
pub use crew::{CrewDayReport, CrewState, RolloverPlan};
pub use sensor::{build_sensor, EmissionSnapshot, Sensor, SiteSurvey};
