//! Input table readers.
//!
//! Everything the simulator reads arrives as CSV (facility tables,
//! single-column empirical samples, subtype tables, home bases) or as a
//! prepared binary weather grid. Readers return plain vectors and maps;
//! the world generator attaches them to sites.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use ldar_core::{Paths, ProgramParams, SiteMethodParams};
use ldar_weather::WeatherGrid;

/// One row of the facility table, with per-method survey parameters pulled
/// out of the `{method}_time` / `{method}_RS` / `{method}_min_int` columns.
#[derive(Debug, Clone)]
pub struct FacilityRow {
    pub facility_id: String,
    pub lat: f64,
    pub lon: f64,
    pub subtype_code: u32,
    pub equipment_groups: u32,
    pub method_params: HashMap<String, SiteMethodParams>,
}

/// One row of the subtype-distributions table.
#[derive(Debug, Clone, Deserialize)]
pub struct SubtypeDistRow {
    pub subtype_code: u32,
    pub dist_type: String,
    pub dist_mu: f64,
    pub dist_sigma: f64,
    /// Mass unit of the distribution's draws
    pub dist_metric: String,
    /// Time unit of the distribution's draws
    pub dist_increment: String,
}

/// Everything a program needs loaded from disk.
#[derive(Debug, Clone)]
pub struct ProgramInputs {
    pub facilities: Vec<FacilityRow>,
    /// Empirical leak rates, g/s
    pub empirical_leaks: Vec<f64>,
    /// Initial leak counts per site
    pub empirical_counts: Vec<u32>,
    /// Whole-site emission rates (for venting), g/s
    pub empirical_sites: Vec<f64>,
    /// Travel minutes between sites
    pub offsite_times: Vec<f64>,
    pub subtype_dists: HashMap<u32, SubtypeDistRow>,
    /// Per-subtype column overrides (e.g. survey times)
    pub subtype_times: HashMap<u32, HashMap<String, f64>>,
    /// Home bases per method label, (lon, lat)
    pub home_bases: HashMap<String, Vec<(f64, f64)>>,
    pub weather: WeatherGrid,
}

/// Load every input table a program references.
pub fn load_program_inputs(paths: &Paths, program: &ProgramParams) -> Result<ProgramInputs> {
    let dir = &paths.input_dir;
    let labels: Vec<String> = program.methods.iter().map(|m| m.label.clone()).collect();

    let facilities = read_facilities(&dir.join(&program.infrastructure_file), &labels)?;

    let empirical_leaks = match &program.leak_file {
        Some(f) => read_single_column(&dir.join(f))?,
        None => Vec::new(),
    };
    let empirical_counts = match &program.count_file {
        Some(f) => read_single_column(&dir.join(f))?
            .into_iter()
            .map(|v: f64| v.max(0.0) as u32)
            .collect(),
        None => Vec::new(),
    };
    let empirical_sites = match &program.vent_file {
        Some(f) => read_single_column(&dir.join(f))?,
        None => Vec::new(),
    };
    let offsite_times = match &program.t_offsite_file {
        Some(f) => read_single_column(&dir.join(f))?,
        None => Vec::new(),
    };

    let subtype_dists = match &program.subtype_distributions_file {
        Some(f) => read_subtype_distributions(&dir.join(f))?,
        None => HashMap::new(),
    };
    let subtype_times = match &program.subtype_times_file {
        Some(f) => read_subtype_times(&dir.join(f))?,
        None => HashMap::new(),
    };

    let mut home_bases = HashMap::new();
    for method in &program.methods {
        if let Some(f) = &method.scheduling.home_bases_file {
            home_bases.insert(method.label.clone(), read_home_bases(&dir.join(f))?);
        }
    }

    let weather = load_weather(&dir.join(&program.weather_file))?;

    Ok(ProgramInputs {
        facilities,
        empirical_leaks,
        empirical_counts,
        empirical_sites,
        offsite_times,
        subtype_dists,
        subtype_times,
        home_bases,
        weather,
    })
}

/// Read the facility table, extracting the per-method parameter columns
/// for each configured method label.
pub fn read_facilities(path: &Path, method_labels: &[String]) -> Result<Vec<FacilityRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("reading facility table '{}'", path.display()))?;
    let headers = reader.headers()?.clone();
    let col = |name: &str| headers.iter().position(|h| h == name);

    let required = ["facility_ID", "lat", "lon", "subtype_code", "equipment_groups"];
    let mut required_idx = Vec::new();
    for name in required {
        required_idx.push(col(name).ok_or_else(|| {
            anyhow!(
                "facility table '{}' is missing required column '{}'",
                path.display(),
                name
            )
        })?);
    }

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record
            .with_context(|| format!("parsing facility table '{}'", path.display()))?;
        let field = |idx: usize| record.get(idx).unwrap_or("").to_string();
        let parse_f64 = |idx: usize, name: &str| -> Result<f64> {
            field(idx)
                .parse()
                .with_context(|| format!("row {}: bad {name} value", line + 2))
        };

        let mut method_params = HashMap::new();
        for label in method_labels {
            let time = col(&format!("{label}_time"));
            let rs = col(&format!("{label}_RS"));
            let min_int = col(&format!("{label}_min_int"));
            if let (Some(t), Some(r), Some(m)) = (time, rs, min_int) {
                method_params.insert(
                    label.clone(),
                    SiteMethodParams {
                        survey_time_min: parse_f64(t, "survey time")?,
                        required_surveys: parse_f64(r, "required surveys")? as u32,
                        min_interval_days: parse_f64(m, "min interval")? as u32,
                    },
                );
            }
        }

        rows.push(FacilityRow {
            facility_id: field(required_idx[0]),
            lat: parse_f64(required_idx[1], "lat")?,
            lon: parse_f64(required_idx[2], "lon")?,
            subtype_code: parse_f64(required_idx[3], "subtype_code")? as u32,
            equipment_groups: parse_f64(required_idx[4], "equipment_groups")? as u32,
            method_params,
        });
    }
    Ok(rows)
}

/// Read a single-column CSV of numbers (empirical samples).
pub fn read_single_column(path: &Path) -> Result<Vec<f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("reading sample file '{}'", path.display()))?;
    let mut values = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let raw = record
            .get(0)
            .ok_or_else(|| anyhow!("'{}' row {} is empty", path.display(), line + 2))?;
        values.push(
            raw.parse::<f64>()
                .with_context(|| format!("'{}' row {}: '{raw}'", path.display(), line + 2))?,
        );
    }
    Ok(values)
}

pub fn read_subtype_distributions(path: &Path) -> Result<HashMap<u32, SubtypeDistRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("reading subtype distributions '{}'", path.display()))?;
    let mut map = HashMap::new();
    for row in reader.deserialize() {
        let row: SubtypeDistRow =
            row.with_context(|| format!("parsing subtype distributions '{}'", path.display()))?;
        map.insert(row.subtype_code, row);
    }
    Ok(map)
}

/// Subtype-times table: first column is the subtype code, every other
/// column is carried as a named override.
pub fn read_subtype_times(path: &Path) -> Result<HashMap<u32, HashMap<String, f64>>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("reading subtype times '{}'", path.display()))?;
    let headers = reader.headers()?.clone();
    let mut map = HashMap::new();
    for record in reader.records() {
        let record = record?;
        let code: u32 = record
            .get(0)
            .unwrap_or("")
            .parse()
            .with_context(|| format!("bad subtype code in '{}'", path.display()))?;
        let mut cols = HashMap::new();
        for (i, header) in headers.iter().enumerate().skip(1) {
            if let Some(value) = record.get(i) {
                cols.insert(
                    header.to_string(),
                    value
                        .parse()
                        .with_context(|| format!("bad value for '{header}' in '{}'", path.display()))?,
                );
            }
        }
        map.insert(code, cols);
    }
    Ok(map)
}

#[derive(Debug, Deserialize)]
struct HomeBaseRow {
    lat: f64,
    lon: f64,
}

/// Home bases as (lon, lat) pairs.
pub fn read_home_bases(path: &Path) -> Result<Vec<(f64, f64)>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("reading home bases '{}'", path.display()))?;
    let mut bases = Vec::new();
    for row in reader.deserialize() {
        let row: HomeBaseRow =
            row.with_context(|| format!("parsing home bases '{}'", path.display()))?;
        bases.push((row.lon, row.lat));
    }
    Ok(bases)
}

/// Load a prepared weather grid (bincode-serialized [`WeatherGrid`]).
pub fn load_weather(path: &Path) -> Result<WeatherGrid> {
    let file = File::open(path)
        .with_context(|| format!("opening weather grid '{}'", path.display()))?;
    bincode::deserialize_from(std::io::BufReader::new(file))
        .with_context(|| format!("decoding weather grid '{}'", path.display()))
}

/// Persist a weather grid in the prepared binary form.
pub fn save_weather(path: &Path, grid: &WeatherGrid) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating '{}'", parent.display()))?;
    }
    let file = File::create(path)
        .with_context(|| format!("writing weather grid '{}'", path.display()))?;
    bincode::serialize_into(std::io::BufWriter::new(file), grid)
        .with_context(|| format!("encoding weather grid '{}'", path.display()))
}
