//! # ldar-batch: orchestration and cross-simulation reporting
//!
//! Builds N x P simulation jobs from validated settings, runs them on a
//! rayon worker pool with per-job failure records, writes a JSON batch
//! manifest, and aggregates surviving results into the program comparison
//! tables and the cost-mitigation economics.

pub mod economics;
pub mod job;
pub mod report;
pub mod runner;

pub use economics::{cost_mitigation, write_economics, EconomicsRow};
pub use job::{job_seed, SimJob, SimRecord};
pub use report::write_batch_reports;
pub use runner::{run_batch, BatchManifest, BatchSummary};
