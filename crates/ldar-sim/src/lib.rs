//! # ldar-sim: the daily simulation engine
//!
//! One simulation owns a generated world (sites, initial leaks, per-day
//! leak timeseries) and walks it forward a day at a time: aging, spawning,
//! company dispatch in declared order, operator rounds, repairs and daily
//! reporting. The [`world`] module generates and regenerates worlds; the
//! [`output`] module writes the per-simulation CSV files.

pub mod engine;
pub mod operator;
pub mod output;
pub mod world;

pub use engine::{DailyTimeseries, MethodOutput, SimOutput, Simulation};
pub use operator::{OperatorAgent, OPERATOR_COMPANY};
pub use output::write_sim_outputs;
pub use world::{build_sites, gen_empirical_vents, generate_world, regenerate_sites, LeakSampler};
