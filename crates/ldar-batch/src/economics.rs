//! Cost-mitigation economics across programs.
//!
//! For each program, averages total emissions and total cost over its
//! simulations, converts emissions to mcf and tonnes CO2e, differences
//! against the baseline program, and reports the cost-mitigation ratio
//! (program cost per tonne CO2e abated; 0 when the baseline difference
//! is zero).

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use ldar_core::units::{kg_to_mcf, kg_to_tonnes_co2e};
use ldar_sim::SimOutput;

/// Market value of sold gas, $/mcf.
const GAS_PRICE_PER_MCF: f64 = 3.0;

#[derive(Debug, Clone, Serialize)]
pub struct EconomicsRow {
    pub program_name: String,
    pub total_emissions_kg: f64,
    pub total_emissions_mcf: f64,
    pub simulation_avg_emissions_tonnes_co2e: f64,
    pub total_program_cost: f64,
    pub difference_baseline_mcf: f64,
    pub value_gas_sold: f64,
    pub difference_baseline_tonnes_co2e: f64,
    pub cost_mitigation_ratio: f64,
}

/// Compute the per-program economics table.
pub fn cost_mitigation(results: &[SimOutput], baseline_program: &str) -> Vec<EconomicsRow> {
    let mut emissions: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut costs: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for sim in results {
        emissions
            .entry(sim.program_name.clone())
            .or_default()
            .push(sim.timeseries.daily_emissions_kg.iter().sum());
        costs
            .entry(sim.program_name.clone())
            .or_default()
            .push(sim.timeseries.total_daily_cost.iter().sum());
    }

    let mean = |v: &[f64]| {
        if v.is_empty() {
            0.0
        } else {
            v.iter().sum::<f64>() / v.len() as f64
        }
    };

    let baseline_mcf = emissions
        .get(baseline_program)
        .map(|v| kg_to_mcf(mean(v)))
        .unwrap_or(0.0);

    emissions
        .iter()
        .map(|(name, kg_totals)| {
            let avg_kg = mean(kg_totals);
            let avg_mcf = kg_to_mcf(avg_kg);
            let avg_cost = mean(costs.get(name).map(Vec::as_slice).unwrap_or(&[]));
            let diff_mcf = avg_mcf - baseline_mcf;
            let diff_tonnes = kg_to_tonnes_co2e(diff_mcf.abs() / 35.3147 * 1000.0 * 0.678);
            let ratio = if diff_tonnes == 0.0 {
                0.0
            } else {
                avg_cost / diff_tonnes
            };
            EconomicsRow {
                program_name: name.clone(),
                total_emissions_kg: avg_kg,
                total_emissions_mcf: avg_mcf,
                simulation_avg_emissions_tonnes_co2e: kg_to_tonnes_co2e(avg_kg),
                total_program_cost: avg_cost,
                difference_baseline_mcf: diff_mcf,
                value_gas_sold: diff_mcf.abs() * GAS_PRICE_PER_MCF,
                difference_baseline_tonnes_co2e: diff_tonnes,
                cost_mitigation_ratio: ratio,
            }
        })
        .collect()
}

/// Write `economics_outputs.csv`.
pub fn write_economics(output_dir: &Path, rows: &[EconomicsRow]) -> Result<()> {
    let path = output_dir.join("economics_outputs.csv");
    let mut writer =
        csv::Writer::from_path(&path).with_context(|| format!("writing '{}'", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ldar_sim::DailyTimeseries;

    fn sim(program: &str, emissions_kg: f64, cost: f64) -> SimOutput {
        SimOutput {
            program_name: program.to_string(),
            sim_idx: 0,
            timeseries: DailyTimeseries {
                datetime: vec![NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()],
                active_leaks: vec![0],
                new_leaks: vec![0],
                cum_repaired_leaks: vec![0],
                daily_emissions_kg: vec![emissions_kg],
                n_tags: vec![0],
                total_daily_cost: vec![cost],
            },
            leaks: Vec::new(),
            sites: Vec::new(),
            methods: Vec::new(),
        }
    }

    #[test]
    fn baseline_difference_drives_ratio() {
        let results = vec![sim("P_base", 10000.0, 0.0), sim("P_ogi", 4000.0, 5000.0)];
        let rows = cost_mitigation(&results, "P_base");
        let ogi = rows.iter().find(|r| r.program_name == "P_ogi").unwrap();
        assert!(ogi.difference_baseline_mcf < 0.0);
        assert!(ogi.cost_mitigation_ratio > 0.0);
    }

    #[test]
    fn zero_baseline_difference_yields_zero_ratio() {
        let results = vec![sim("P_base", 10000.0, 0.0), sim("P_same", 10000.0, 5000.0)];
        let rows = cost_mitigation(&results, "P_base");
        let same = rows.iter().find(|r| r.program_name == "P_same").unwrap();
        assert_eq!(same.cost_mitigation_ratio, 0.0);
    }

    #[test]
    fn averages_across_simulations() {
        let results = vec![sim("P_x", 100.0, 10.0), sim("P_x", 300.0, 30.0)];
        let rows = cost_mitigation(&results, "P_x");
        assert!((rows[0].total_emissions_kg - 200.0).abs() < 1e-9);
        assert!((rows[0].total_program_cost - 20.0).abs() < 1e-9);
    }
}
