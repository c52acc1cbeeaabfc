//! The orchestrator: build N x P simulation jobs, run them on a rayon
//! worker pool, and collect results and failures.
//!
//! With `pregenerate_leaks` the first program seeds a shared world per
//! simulation index (persisted through the fingerprinted cache); later
//! programs re-evaluate only per-method site parameters, so every program
//! faces identical leak realisations. A failed job becomes a failure
//! record attributed to its program and the batch carries on.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use ldar_core::{LdarError, Paths, SimSettings};
use ldar_io::{
    cache, load_program_inputs, write_resolved_parameters, ProgramInputs,
};
use ldar_sim::{generate_world, regenerate_sites, write_sim_outputs, SimOutput, Simulation};

use crate::job::{job_seed, SimJob, SimRecord};

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchManifest {
    pub created_at: DateTime<Utc>,
    pub num_jobs: usize,
    pub success: usize,
    pub failure: usize,
    pub jobs: Vec<SimRecord>,
}

/// Summary returned after the run so clients can log success/failure
/// counts and hand results to the reporter.
#[derive(Debug)]
pub struct BatchSummary {
    pub success: usize,
    pub failure: usize,
    pub manifest_path: PathBuf,
    pub records: Vec<SimRecord>,
    pub results: Vec<SimOutput>,
}

/// Run the whole batch described by validated settings.
pub fn run_batch(settings: &SimSettings, paths: &Paths) -> Result<BatchSummary> {
    fs::create_dir_all(&paths.output_dir).with_context(|| {
        format!("creating output root '{}'", paths.output_dir.display())
    })?;
    write_resolved_parameters(&paths.output_dir.join("parameters.yaml"), settings)
        .context("echoing resolved parameters")?;

    // Load every program's inputs once; workers share them read-only
    let mut inputs: Vec<Arc<ProgramInputs>> = Vec::new();
    for program in &settings.programs {
        let loaded = load_program_inputs(paths, program)
            .with_context(|| format!("loading inputs for program '{}'", program.program_name))?;
        inputs.push(Arc::new(loaded));
    }

    let jobs = build_jobs(settings, paths, &inputs)?;

    let threads = if settings.n_processes == 0 {
        num_cpus::get()
    } else {
        settings.n_processes
    };
    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("building rayon worker pool")?;

    info!(jobs = jobs.len(), threads, "dispatching simulations");

    let outcomes: Vec<(SimRecord, Option<SimOutput>)> = pool.install(|| {
        jobs.into_par_iter()
            .map(|job| run_job(job, settings, paths, &inputs))
            .collect()
    });

    let mut records = Vec::with_capacity(outcomes.len());
    let mut results = Vec::new();
    for (record, output) in outcomes {
        if let Some(output) = output {
            results.push(output);
        }
        records.push(record);
    }
    let success = records.iter().filter(|r| r.status == "ok").count();
    let failure = records.len() - success;

    let manifest = BatchManifest {
        created_at: Utc::now(),
        num_jobs: records.len(),
        success,
        failure,
        jobs: records.clone(),
    };
    let manifest_path = paths.output_dir.join("batch_manifest.json");
    let json = serde_json::to_string_pretty(&manifest).context("serializing batch manifest")?;
    fs::write(&manifest_path, json)
        .with_context(|| format!("writing batch manifest '{}'", manifest_path.display()))?;

    Ok(BatchSummary {
        success,
        failure,
        manifest_path,
        records,
        results,
    })
}

/// Build the N x P job list, generating (or re-using) worlds.
fn build_jobs(
    settings: &SimSettings,
    paths: &Paths,
    inputs: &[Arc<ProgramInputs>],
) -> Result<Vec<SimJob>> {
    let mut jobs = Vec::new();
    if settings.programs.is_empty() {
        return Ok(jobs);
    }
    let pregen = settings.pregenerate_leaks;
    let fingerprint = if pregen {
        let fp = cache::compute_fingerprint(settings, paths)?;
        cache::prepare_generator_dir(paths, &fp)?;
        Some(fp)
    } else {
        None
    };

    for sim_idx in 0..settings.n_simulations {
        // Shared world for this simulation index, seeded by the first
        // program when pre-generation is on
        let mut shared = None;
        if pregen {
            let fp = fingerprint.as_deref().unwrap_or_default();
            shared = match cache::load_world(paths, fp, sim_idx, 0) {
                Ok(world) => world,
                Err(LdarError::WorldCacheStale(reason)) => {
                    // Fail closed: regenerate below
                    error!(%reason, "discarding stale cached world");
                    None
                }
                Err(e) => return Err(e.into()),
            };
            if shared.is_none() {
                let mut rng =
                    StdRng::seed_from_u64(settings.random_seed.wrapping_add(sim_idx as u64));
                let world =
                    generate_world(settings, &settings.programs[0], &inputs[0], &mut rng)?;
                cache::store_world(paths, sim_idx, 0, &world)?;
                shared = Some(world);
            }
        }

        for (program_idx, program) in settings.programs.iter().enumerate() {
            let world = if let Some(base) = &shared {
                if program_idx == 0 {
                    base.clone()
                } else {
                    let regen = regenerate_sites(base, program, &inputs[program_idx])?;
                    cache::store_world(paths, sim_idx, program_idx, &regen)?;
                    regen
                }
            } else {
                let mut rng = StdRng::seed_from_u64(job_seed(settings, sim_idx, program_idx));
                generate_world(settings, program, &inputs[program_idx], &mut rng)?
            };
            jobs.push(SimJob {
                job_id: format!("{}:{}", program.program_name, sim_idx),
                sim_idx,
                program_idx,
                program_name: program.program_name.clone(),
                seed: job_seed(settings, sim_idx, program_idx),
                world,
            });
        }
    }
    Ok(jobs)
}

/// Execute a single job; any failure is captured into the record rather
/// than unwinding the batch.
fn run_job(
    job: SimJob,
    settings: &SimSettings,
    paths: &Paths,
    inputs: &[Arc<ProgramInputs>],
) -> (SimRecord, Option<SimOutput>) {
    let program = settings.programs[job.program_idx].clone();
    let program_inputs = &inputs[job.program_idx];
    let weather = Arc::new(program_inputs.weather.clone());

    let runner = || -> Result<(SimOutput, String)> {
        let sim = Simulation::new(
            settings.clone(),
            program,
            job.world.clone(),
            program_inputs,
            weather,
            job.sim_idx,
            job.seed,
        )?;
        let output = sim.run()?;
        let out_dir = if settings.write_data {
            write_sim_outputs(&paths.output_dir, settings, &output)?
                .display()
                .to_string()
        } else {
            String::new()
        };
        Ok((output, out_dir))
    };

    match runner() {
        Ok((output, out_dir)) => (
            SimRecord {
                job_id: job.job_id,
                program_name: job.program_name,
                sim_idx: job.sim_idx,
                status: "ok".to_string(),
                error: None,
                output: out_dir,
            },
            Some(output),
        ),
        Err(err) => {
            let failure = LdarError::Subsimulation {
                program: job.program_name.clone(),
                detail: err.to_string(),
            };
            error!(job = %job.job_id, %failure, "simulation failed");
            (
                SimRecord {
                    job_id: job.job_id,
                    program_name: job.program_name,
                    sim_idx: job.sim_idx,
                    status: "error".to_string(),
                    error: Some(failure.to_string()),
                    output: String::new(),
                },
                None,
            )
        }
    }
}
