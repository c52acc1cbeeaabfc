//! # ldar-core: LDAR simulation core model
//!
//! Entities and shared machinery for simulating Leak Detection And Repair
//! programs on oil and gas infrastructure:
//!
//! - [`Site`] / [`Leak`]: the facility and leak records a simulation owns
//! - [`MethodSiteStats`]: per-method survey bookkeeping a company keeps
//! - [`params`]: the resolved global / program / method parameter model
//! - [`distributions`]: leak-rate distribution fitting and sampling
//! - [`units`]: gas quantity conversions through g/s
//! - [`error`]: the unified error taxonomy
//!
//! ## Ownership model
//!
//! A simulation exclusively owns its sites, leaks and tag pool. Survey
//! methods receive read-only views of that state and hand back events
//! (tags, flags, misses) which the simulation applies, so state mutation
//! happens in exactly one place and a day's ordering guarantees hold.

pub mod distributions;
pub mod error;
pub mod leak;
pub mod params;
pub mod site;
pub mod units;
pub mod world;

pub use distributions::{empirical_quantile, leak_rvs, DistKind, LeakDistribution};
pub use error::{LdarError, LdarResult};
pub use leak::{Leak, LeakStatus};
pub use params::{
    CostParams, DeploymentType, FollowUpParams, InteractionPriority, LeakFileUse,
    MeasurementScale, MethodParams, Paths, ProgramParams, RedundancyFilter, SchedulingParams,
    SimSettings, ThresholdType, WeatherEnvelope,
};
pub use site::{MethodSiteStats, Site, SiteMethodParams};
pub use world::GeneratedWorld;
