//! # ldar-weather: weather lookup and deployment days
//!
//! Serves per-cell, per-day temperature, wind and precipitation from a
//! prepared 3-D grid; computes per-method deployment-day grids from weather
//! envelopes, DD fraction and maximum-condition-blackout maps, and daylight
//! hours for workday capping.

pub mod daylight;
pub mod deployment;
pub mod grid;

pub use daylight::{daylight_hours, DaylightTable};
pub use deployment::DeploymentGrid;
pub use grid::WeatherGrid;
