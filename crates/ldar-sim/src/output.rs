//! Per-simulation output files.
//!
//! Each finished simulation writes a leaks table, a timeseries table with
//! per-method columns, a site table with per-method statistics, a metadata
//! text file, and (optionally) per-method deployment-day and blackout map
//! grids. Everything is CSV; map rasterization is out of scope.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;

use ldar_core::{LeakStatus, SimSettings};

use crate::engine::SimOutput;

/// Write all outputs for one simulation under
/// `<output_dir>/<program_name>/`. Returns the program directory.
pub fn write_sim_outputs(
    output_dir: &Path,
    settings: &SimSettings,
    output: &SimOutput,
) -> Result<PathBuf> {
    let dir = output_dir.join(&output.program_name);
    fs::create_dir_all(&dir)
        .with_context(|| format!("creating output directory '{}'", dir.display()))?;

    write_leaks(&dir, output)?;
    write_timeseries(&dir, output)?;
    write_sites(&dir, output)?;
    write_metadata(&dir, output)?;
    if settings.make_maps {
        for method in &output.methods {
            write_map(
                &dir.join(format!("DD_{}_map.csv", method.label)),
                &method.dd_map,
            )?;
            let mcb_f64: Vec<Vec<f64>> = method
                .mcb_map
                .iter()
                .map(|col| col.iter().map(|v| *v as f64).collect())
                .collect();
            write_map(&dir.join(format!("MCB_{}_map.csv", method.label)), &mcb_f64)?;
        }
    }
    Ok(dir)
}

fn write_leaks(dir: &Path, output: &SimOutput) -> Result<()> {
    let path = dir.join(format!("leaks_output_{}.csv", output.sim_idx));
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("writing '{}'", path.display()))?;
    writer.write_record([
        "leak_ID",
        "facility_ID",
        "equipment_group",
        "rate",
        "lat",
        "lon",
        "status",
        "days_active",
        "tagged",
        "date_began",
        "date_tagged",
        "tagged_by_company",
        "tagged_by_crew",
        "init_detect_by",
        "init_detect_date",
        "date_repaired",
        "repair_delay",
        "requires_shutdown",
    ])?;
    for leak in &output.leaks {
        writer.write_record([
            leak.leak_id.clone(),
            leak.facility_id.clone(),
            leak.equipment_group.to_string(),
            leak.rate_g_s.to_string(),
            leak.lat.to_string(),
            leak.lon.to_string(),
            match leak.status {
                LeakStatus::Active => "active".to_string(),
                LeakStatus::Repaired => "repaired".to_string(),
            },
            leak.days_active.to_string(),
            leak.tagged.to_string(),
            leak.date_began.to_string(),
            opt_str(&leak.date_tagged),
            leak.tagged_by_company.clone().unwrap_or_default(),
            opt_str(&leak.tagged_by_crew),
            leak.init_detect_by.clone().unwrap_or_default(),
            opt_str(&leak.init_detect_date),
            opt_str(&leak.date_repaired),
            opt_str(&leak.repair_delay_days),
            leak.requires_shutdown.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_timeseries(dir: &Path, output: &SimOutput) -> Result<()> {
    let path = dir.join(format!("timeseries_output_{}.csv", output.sim_idx));
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("writing '{}'", path.display()))?;

    let mut header = vec![
        "datetime".to_string(),
        "active_leaks".to_string(),
        "new_leaks".to_string(),
        "cum_repaired_leaks".to_string(),
        "daily_emissions_kg".to_string(),
        "n_tags".to_string(),
        "total_daily_cost".to_string(),
    ];
    for m in &output.methods {
        for col in [
            "cost",
            "sites_visited",
            "travel_time",
            "survey_time",
            "prop_sites_avail",
            "eff_flags",
            "flags_redund1",
            "flags_redund2",
            "flag_wo_vent",
            "redund_tags",
        ] {
            header.push(format!("{}_{}", m.label, col));
        }
    }
    writer.write_record(&header)?;

    let ts = &output.timeseries;
    for t in 0..ts.datetime.len() {
        let mut row = vec![
            ts.datetime[t].to_string(),
            ts.active_leaks[t].to_string(),
            ts.new_leaks[t].to_string(),
            ts.cum_repaired_leaks[t].to_string(),
            ts.daily_emissions_kg[t].to_string(),
            ts.n_tags[t].to_string(),
            ts.total_daily_cost[t].to_string(),
        ];
        for m in &output.methods {
            let mts = &m.timeseries;
            row.push(mts.cost[t].to_string());
            row.push(mts.sites_visited[t].to_string());
            row.push(mts.travel_time[t].to_string());
            row.push(mts.survey_time[t].to_string());
            row.push(mts.prop_sites_avail[t].to_string());
            row.push(mts.eff_flags[t].to_string());
            row.push(mts.flags_redund1[t].to_string());
            row.push(mts.flags_redund2[t].to_string());
            row.push(mts.flag_wo_vent[t].to_string());
            row.push(mts.redund_tags[t].to_string());
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_sites(dir: &Path, output: &SimOutput) -> Result<()> {
    let path = dir.join(format!("sites_output_{}.csv", output.sim_idx));
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("writing '{}'", path.display()))?;

    let mut header = vec![
        "facility_ID".to_string(),
        "lat".to_string(),
        "lon".to_string(),
        "subtype_code".to_string(),
        "equipment_groups".to_string(),
        "initial_leaks".to_string(),
        "total_emissions_kg".to_string(),
        "active_leaks".to_string(),
        "repaired_leaks".to_string(),
        "currently_flagged".to_string(),
    ];
    for m in &output.methods {
        for col in [
            "surveys_conducted",
            "surveys_done_this_year",
            "missed_leaks",
            "prop_DDs",
            "MCB",
        ] {
            header.push(format!("{}_{}", m.label, col));
        }
    }
    writer.write_record(&header)?;

    for (site_idx, site) in output.sites.iter().enumerate() {
        let mut row = vec![
            site.facility_id.clone(),
            site.lat.to_string(),
            site.lon.to_string(),
            site.subtype_code.to_string(),
            site.equipment_groups.to_string(),
            site.initial_leak_count.to_string(),
            site.total_emissions_kg.to_string(),
            site.active_leaks.to_string(),
            site.repaired_leaks.to_string(),
            site.currently_flagged.to_string(),
        ];
        for m in &output.methods {
            let stats = &m.site_stats[site_idx];
            row.push(stats.surveys_conducted.to_string());
            row.push(stats.surveys_done_this_year.to_string());
            row.push(stats.missed_leaks.to_string());
            row.push(stats.prop_deploy_days.to_string());
            row.push(stats.max_blackout.to_string());
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_metadata(dir: &Path, output: &SimOutput) -> Result<()> {
    let path = dir.join(format!("metadata_{}.txt", output.sim_idx));
    let body = format!(
        "program: {}\nsimulation: {}\nsites: {}\nleaks: {}\nfinished: {}\n",
        output.program_name,
        output.sim_idx,
        output.sites.len(),
        output.leaks.len(),
        Utc::now().to_rfc3339(),
    );
    fs::write(&path, body).with_context(|| format!("writing '{}'", path.display()))?;
    Ok(())
}

/// A `[lon][lat]` map grid as CSV, one row per longitude index.
fn write_map(path: &Path, map: &[Vec<f64>]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("writing '{}'", path.display()))?;
    for col in map {
        writer.write_record(col.iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

fn opt_str<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(|v| v.to_string()).unwrap_or_default()
}
