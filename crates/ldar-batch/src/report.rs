//! Cross-simulation batch reporting.
//!
//! Aggregates per-program timeseries across simulations into the
//! comparison tables: per-program descriptive statistics, pooled daily
//! mean emissions and active leaks (normalized per site), a temporal cost
//! estimate, and a total-cost comparison.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

use ldar_sim::SimOutput;

/// Results of one program across its simulations.
struct ProgramGroup<'a> {
    name: String,
    sims: Vec<&'a SimOutput>,
}

fn group_by_program(results: &[SimOutput]) -> Vec<ProgramGroup<'_>> {
    let mut groups: BTreeMap<String, Vec<&SimOutput>> = BTreeMap::new();
    for output in results {
        groups
            .entry(output.program_name.clone())
            .or_default()
            .push(output);
    }
    groups
        .into_iter()
        .map(|(name, sims)| ProgramGroup { name, sims })
        .collect()
}

fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = if values.len() > 1 {
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
    } else {
        0.0
    };
    (mean, var.sqrt())
}

/// Write every batch comparison table into `output_dir`.
pub fn write_batch_reports(output_dir: &Path, results: &[SimOutput]) -> Result<()> {
    let groups = group_by_program(results);
    if groups.is_empty() {
        return Ok(());
    }
    for group in &groups {
        write_descriptives(output_dir, group)?;
    }
    write_daily_means(output_dir, &groups, "mean_emissions.csv", |sim, t| {
        sim.timeseries.daily_emissions_kg[t] / sim.sites.len().max(1) as f64
    })?;
    write_daily_means(output_dir, &groups, "mean_active_leaks.csv", |sim, t| {
        sim.timeseries.active_leaks[t] as f64 / sim.sites.len().max(1) as f64
    })?;
    write_cost_estimate(output_dir, &groups)?;
    write_cost_comparison(output_dir, &groups)?;
    Ok(())
}

/// Per-program `{prog}_descriptives.csv`: one row per simulation plus
/// mean/std rows over totals.
fn write_descriptives(output_dir: &Path, group: &ProgramGroup) -> Result<()> {
    let path = output_dir.join(format!("{}_descriptives.csv", group.name));
    let mut writer =
        csv::Writer::from_path(&path).with_context(|| format!("writing '{}'", path.display()))?;
    writer.write_record([
        "simulation",
        "total_emissions_kg",
        "total_cost",
        "repaired_leaks",
        "mean_active_leaks",
    ])?;

    let mut emissions = Vec::new();
    let mut costs = Vec::new();
    let mut repaired = Vec::new();
    let mut actives = Vec::new();
    for sim in &group.sims {
        let ts = &sim.timeseries;
        let total_emissions: f64 = ts.daily_emissions_kg.iter().sum();
        let total_cost: f64 = ts.total_daily_cost.iter().sum();
        let total_repaired = ts.cum_repaired_leaks.last().copied().unwrap_or(0) as f64;
        let mean_active = if ts.active_leaks.is_empty() {
            0.0
        } else {
            ts.active_leaks.iter().map(|v| *v as f64).sum::<f64>() / ts.active_leaks.len() as f64
        };
        writer.write_record([
            sim.sim_idx.to_string(),
            total_emissions.to_string(),
            total_cost.to_string(),
            total_repaired.to_string(),
            mean_active.to_string(),
        ])?;
        emissions.push(total_emissions);
        costs.push(total_cost);
        repaired.push(total_repaired);
        actives.push(mean_active);
    }

    let stats = [&emissions, &costs, &repaired, &actives].map(|v| mean_and_std(v));
    let mean_row: Vec<String> = std::iter::once("mean".to_string())
        .chain(stats.iter().map(|s| s.0.to_string()))
        .collect();
    let std_row: Vec<String> = std::iter::once("std".to_string())
        .chain(stats.iter().map(|s| s.1.to_string()))
        .collect();
    writer.write_record(&mean_row)?;
    writer.write_record(&std_row)?;
    writer.flush()?;
    Ok(())
}

/// Daily per-site means across simulations, one column per program.
fn write_daily_means(
    output_dir: &Path,
    groups: &[ProgramGroup],
    filename: &str,
    metric: impl Fn(&SimOutput, usize) -> f64,
) -> Result<()> {
    let path = output_dir.join(filename);
    let mut writer =
        csv::Writer::from_path(&path).with_context(|| format!("writing '{}'", path.display()))?;

    let n_days = groups
        .iter()
        .flat_map(|g| g.sims.iter())
        .map(|s| s.timeseries.datetime.len())
        .min()
        .unwrap_or(0);

    let mut header = vec!["datetime".to_string()];
    header.extend(groups.iter().map(|g| g.name.clone()));
    writer.write_record(&header)?;

    let dates = groups
        .first()
        .and_then(|g| g.sims.first())
        .map(|s| s.timeseries.datetime.clone())
        .unwrap_or_default();

    for t in 0..n_days {
        let mut row = vec![dates[t].to_string()];
        for group in groups {
            let values: Vec<f64> = group.sims.iter().map(|s| metric(s, t)).collect();
            row.push(mean_and_std(&values).0.to_string());
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Mean cumulative cost per program per day.
fn write_cost_estimate(output_dir: &Path, groups: &[ProgramGroup]) -> Result<()> {
    let path = output_dir.join("cost_estimate_temporal.csv");
    let mut writer =
        csv::Writer::from_path(&path).with_context(|| format!("writing '{}'", path.display()))?;

    let n_days = groups
        .iter()
        .flat_map(|g| g.sims.iter())
        .map(|s| s.timeseries.datetime.len())
        .min()
        .unwrap_or(0);

    let mut header = vec!["day".to_string()];
    header.extend(groups.iter().map(|g| g.name.clone()));
    writer.write_record(&header)?;

    for t in 0..n_days {
        let mut row = vec![t.to_string()];
        for group in groups {
            let values: Vec<f64> = group
                .sims
                .iter()
                .map(|s| s.timeseries.total_daily_cost[..=t].iter().sum())
                .collect();
            row.push(mean_and_std(&values).0.to_string());
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Mean and spread of total program cost.
fn write_cost_comparison(output_dir: &Path, groups: &[ProgramGroup]) -> Result<()> {
    let path = output_dir.join("cost_comparison.csv");
    let mut writer =
        csv::Writer::from_path(&path).with_context(|| format!("writing '{}'", path.display()))?;
    writer.write_record(["program", "mean_total_cost", "std_total_cost"])?;
    for group in groups {
        let totals: Vec<f64> = group
            .sims
            .iter()
            .map(|s| s.timeseries.total_daily_cost.iter().sum())
            .collect();
        let (mean, std) = mean_and_std(&totals);
        writer.write_record([group.name.clone(), mean.to_string(), std.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}
