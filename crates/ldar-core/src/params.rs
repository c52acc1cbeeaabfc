//! Resolved parameter model: global simulation settings, per-program
//! parameters, and per-method configurations.
//!
//! Parameter files are merged over defaults by the input layer; the structs
//! here are the typed result of that merge. Serde defaults mirror the
//! built-in default parameter sets so a partially specified file still
//! resolves to a complete configuration.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::distributions::DistKind;

/// Explicit directory context threaded through the run instead of working
/// directory changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub generator_dir: PathBuf,
}

impl Paths {
    pub fn new(input_dir: PathBuf, output_dir: PathBuf) -> Self {
        let generator_dir = input_dir.join("generator");
        Paths {
            input_dir,
            output_dir,
            generator_dir,
        }
    }
}

/// Top-level (global) simulation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimSettings {
    #[serde(default = "default_n_simulations")]
    pub n_simulations: usize,
    /// Worker threads for the orchestrator pool; 0 means auto-detect
    #[serde(default)]
    pub n_processes: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_input_directory")]
    pub input_directory: PathBuf,
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,
    #[serde(default)]
    pub reference_program: String,
    #[serde(default)]
    pub baseline_program: String,
    #[serde(default)]
    pub pregenerate_leaks: bool,
    #[serde(default)]
    pub preseed_random: bool,
    #[serde(default = "default_true")]
    pub write_data: bool,
    #[serde(default)]
    pub make_maps: bool,
    /// Base RNG seed; per-simulation seeds derive from it
    #[serde(default = "default_seed")]
    pub random_seed: u64,
    #[serde(default)]
    pub programs: Vec<ProgramParams>,
}

impl SimSettings {
    /// Number of simulated days.
    pub fn timesteps(&self) -> usize {
        (self.end_date - self.start_date).num_days().max(0) as usize
    }
}

/// How empirical leak-rate files are used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeakFileUse {
    /// Draw leak rates directly from the sample column
    Sample,
    /// Fit the configured distribution family to the sample column
    Fit,
}

/// Per-program parameters: one surveyed world under one LDAR program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramParams {
    pub program_name: String,
    #[serde(default)]
    pub weather_file: String,
    #[serde(default)]
    pub infrastructure_file: String,
    #[serde(default)]
    pub leak_file: Option<String>,
    #[serde(default = "default_leak_file_use")]
    pub leak_file_use: LeakFileUse,
    #[serde(default)]
    pub count_file: Option<String>,
    #[serde(default)]
    pub vent_file: Option<String>,
    #[serde(default)]
    pub t_offsite_file: Option<String>,
    #[serde(default)]
    pub subtype_distributions_file: Option<String>,
    #[serde(default)]
    pub subtype_times_file: Option<String>,
    /// Survey only a random sample of this many facilities
    #[serde(default)]
    pub site_samples: Option<usize>,
    #[serde(default = "default_dist_kind")]
    pub leak_dist_type: DistKind,
    #[serde(default = "default_leak_dist_mu")]
    pub leak_dist_mu: f64,
    #[serde(default = "default_leak_dist_sigma")]
    pub leak_dist_sigma: f64,
    /// Declared units of leak-rate inputs, (mass, time)
    #[serde(default = "default_leak_rate_units")]
    pub leak_rate_units: (String, String),
    #[serde(default)]
    pub max_leak_rate: Option<f64>,
    /// Leak production rate: per-site daily probability of a new leak
    #[serde(default = "default_lpr")]
    pub lpr: f64,
    /// Natural repair days, the baseline leak lifetime without LDAR
    #[serde(default = "default_nrd")]
    pub nrd: u32,
    #[serde(default = "default_repair_delay")]
    pub repair_delay: u32,
    #[serde(default = "default_repair_cost")]
    pub repair_cost: f64,
    #[serde(default)]
    pub consider_daylight: bool,
    #[serde(default)]
    pub consider_venting: bool,
    #[serde(default)]
    pub consider_operator: bool,
    #[serde(default = "default_operator_strength")]
    pub operator_strength: f64,
    /// Methods in declared order; companies deploy in this order every day
    #[serde(default)]
    pub methods: Vec<MethodParams>,
    /// Labels of orphan method files to attach to this program
    #[serde(default)]
    pub method_labels: Vec<String>,
}

impl ProgramParams {
    pub fn method(&self, label: &str) -> Option<&MethodParams> {
        self.methods.iter().find(|m| m.label == label)
    }

    /// Reporting delay of the named method; the operator has none.
    pub fn reporting_delay_of(&self, label: &str) -> u32 {
        self.method(label).map(|m| m.reporting_delay).unwrap_or(0)
    }
}

/// How a method's crews move between sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentType {
    Mobile,
    Stationary,
    Orbit,
}

/// Granularity at which a sensor resolves emissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementScale {
    Component,
    Equipment,
    Site,
}

/// Follow-up threshold interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdType {
    /// Literal rate in kg/day
    Absolute,
    /// Quantile of the empirical leak-rate distribution
    Proportion,
}

/// Which screening measurement stands for a watched site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedundancyFilter {
    Recent,
    Max,
    Mean,
}

/// Whether the threshold gates watchlist entry or only ranks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionPriority {
    Threshold,
    Proportion,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CostParams {
    #[serde(default)]
    pub upfront: f64,
    #[serde(default)]
    pub per_day: f64,
    #[serde(default)]
    pub per_hour: f64,
    #[serde(default)]
    pub per_site: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpParams {
    /// Screening rate a candidate must exceed to enter the watchlist, kg/day
    #[serde(default)]
    pub threshold: f64,
    #[serde(default = "default_threshold_type")]
    pub threshold_type: ThresholdType,
    /// Quantile used when `threshold_type` is proportion
    #[serde(default = "default_one")]
    pub proportion: f64,
    /// Fraction of the watchlist flagged each day
    #[serde(default = "default_one")]
    pub ratio: f64,
    #[serde(default = "default_interaction_priority")]
    pub interaction_priority: InteractionPriority,
    #[serde(default = "default_redundancy_filter")]
    pub redundancy_filter: RedundancyFilter,
    /// Days a measurement may sit on the watchlist before flag resolution
    #[serde(default)]
    pub delay: u32,
    /// Measured rate that flags a site immediately, bypassing the watchlist
    #[serde(default)]
    pub instant_threshold: Option<f64>,
    #[serde(default = "default_threshold_type")]
    pub instant_threshold_type: ThresholdType,
}

impl Default for FollowUpParams {
    fn default() -> Self {
        FollowUpParams {
            threshold: 0.0,
            threshold_type: default_threshold_type(),
            proportion: default_one(),
            ratio: default_one(),
            interaction_priority: default_interaction_priority(),
            redundancy_filter: default_redundancy_filter(),
            delay: 0,
            instant_threshold: None,
            instant_threshold_type: default_threshold_type(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingParams {
    #[serde(default)]
    pub route_planning: bool,
    #[serde(default)]
    pub home_bases_file: Option<String>,
    /// Travel speeds (km/h) sampled under route planning
    #[serde(default)]
    pub speed_list: Vec<f64>,
    /// Initial crew position as (lon, lat)
    #[serde(default)]
    pub crew_init_location: Option<[f64; 2]>,
    /// Years crews deploy; empty means every simulation year
    #[serde(default)]
    pub deployment_years: Vec<i32>,
    /// Months crews deploy; empty means all twelve
    #[serde(default)]
    pub deployment_months: Vec<u32>,
}

impl Default for SchedulingParams {
    fn default() -> Self {
        SchedulingParams {
            route_planning: false,
            home_bases_file: None,
            speed_list: Vec::new(),
            crew_init_location: None,
            deployment_years: Vec::new(),
            deployment_months: Vec::new(),
        }
    }
}

/// Weather envelope within which a method can deploy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WeatherEnvelope {
    /// [min, max] temperature, degrees C
    #[serde(default = "default_temp_limits")]
    pub temp: [f64; 2],
    /// [min, max] wind, m/s
    #[serde(default = "default_wind_limits")]
    pub wind: [f64; 2],
    /// [min, max] precipitation, mm/day
    #[serde(default = "default_precip_limits")]
    pub precip: [f64; 2],
}

impl Default for WeatherEnvelope {
    fn default() -> Self {
        WeatherEnvelope {
            temp: default_temp_limits(),
            wind: default_wind_limits(),
            precip: default_precip_limits(),
        }
    }
}

/// Per-method configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodParams {
    pub label: String,
    /// Archetype key into the default method library
    #[serde(default)]
    pub method_type: String,
    #[serde(default = "default_deployment_type")]
    pub deployment_type: DeploymentType,
    #[serde(default = "default_measurement_scale")]
    pub measurement_scale: MeasurementScale,
    #[serde(default = "default_sensor")]
    pub sensor: String,
    #[serde(default)]
    pub is_follow_up: bool,
    #[serde(default = "default_n_crews")]
    pub n_crews: usize,
    /// Hours; work window is centered on local noon
    #[serde(default = "default_max_workday")]
    pub max_workday: f64,
    #[serde(default = "default_reporting_delay")]
    pub reporting_delay: u32,
    /// Minimum detection limit: `[threshold]` in g/s, or `[mean, std]`
    /// for the component-scale logistic sensor
    #[serde(default)]
    pub mdl: Vec<f64>,
    /// Quantification error standard deviation
    #[serde(default)]
    pub qe: f64,
    #[serde(default)]
    pub consider_daylight: bool,
    /// Per-method travel-time sample (minutes); empty falls back to the
    /// program's offsite-time table
    #[serde(default)]
    pub t_bw_sites: Vec<f64>,
    #[serde(default)]
    pub cost: CostParams,
    #[serde(default)]
    pub follow_up: FollowUpParams,
    #[serde(default)]
    pub scheduling: SchedulingParams,
    #[serde(default)]
    pub weather_limits: WeatherEnvelope,
}

fn default_true() -> bool {
    true
}

fn default_one() -> f64 {
    1.0
}

fn default_n_simulations() -> usize {
    1
}

fn default_seed() -> u64 {
    0
}

fn default_input_directory() -> PathBuf {
    PathBuf::from("inputs")
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("outputs")
}

fn default_leak_file_use() -> LeakFileUse {
    LeakFileUse::Sample
}

fn default_dist_kind() -> DistKind {
    DistKind::Lognorm
}

fn default_leak_dist_mu() -> f64 {
    -2.776
}

fn default_leak_dist_sigma() -> f64 {
    1.462
}

fn default_leak_rate_units() -> (String, String) {
    ("gram".to_string(), "second".to_string())
}

fn default_lpr() -> f64 {
    0.0065
}

fn default_nrd() -> u32 {
    365
}

fn default_repair_delay() -> u32 {
    14
}

fn default_repair_cost() -> f64 {
    350.0
}

fn default_operator_strength() -> f64 {
    1.0
}

fn default_deployment_type() -> DeploymentType {
    DeploymentType::Mobile
}

fn default_measurement_scale() -> MeasurementScale {
    MeasurementScale::Component
}

fn default_sensor() -> String {
    "default".to_string()
}

fn default_n_crews() -> usize {
    1
}

fn default_max_workday() -> f64 {
    8.0
}

fn default_reporting_delay() -> u32 {
    2
}

fn default_threshold_type() -> ThresholdType {
    ThresholdType::Absolute
}

fn default_interaction_priority() -> InteractionPriority {
    InteractionPriority::Threshold
}

fn default_redundancy_filter() -> RedundancyFilter {
    RedundancyFilter::Recent
}

fn default_temp_limits() -> [f64; 2] {
    [-40.0, 60.0]
}

fn default_wind_limits() -> [f64; 2] {
    [0.0, 20.0]
}

fn default_precip_limits() -> [f64; 2] {
    [0.0, 5.0]
}
