//! Batch job descriptors.

use serde::{Deserialize, Serialize};

use ldar_core::{GeneratedWorld, SimSettings};

/// One (simulation index, program) pair to run.
#[derive(Debug, Clone)]
pub struct SimJob {
    pub job_id: String,
    pub sim_idx: usize,
    pub program_idx: usize,
    pub program_name: String,
    /// Engine RNG seed for this job
    pub seed: u64,
    pub world: GeneratedWorld,
}

/// Deterministic per-job seed: distinct per (simulation, program) but
/// stable across runs of the same settings.
pub fn job_seed(settings: &SimSettings, sim_idx: usize, program_idx: usize) -> u64 {
    settings
        .random_seed
        .wrapping_add(sim_idx as u64 * 7_919)
        .wrapping_add(program_idx as u64 * 104_729)
        .wrapping_add(1)
}

/// Outcome record for one job, persisted in the batch manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimRecord {
    pub job_id: String,
    pub program_name: String,
    pub sim_idx: usize,
    pub status: String,
    pub error: Option<String>,
    pub output: String,
}
