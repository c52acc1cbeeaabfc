//! Sensor models.
//!
//! Every sensor consumes the same snapshot of a site's emissions and
//! returns the same survey shape, so companies can hand any survey result
//! to the flagging pipeline without caring which instrument produced it.
//! The measurement scale decides which model runs:
//!
//! - component: per-leak logistic detection (handheld OGI)
//! - equipment: per-equipment-group threshold with quantification error
//! - site: whole-site threshold, optionally wind-dependent (satellite)

mod component;
mod equipment;
mod site_scale;

pub use component::ComponentSensor;
pub use equipment::EquipmentSensor;
pub use site_scale::SiteSensor;

use rand::rngs::StdRng;

use ldar_core::{DeploymentType, LdarError, LdarResult, MeasurementScale, MethodParams};

/// Everything a sensor can observe at one site on one day.
///
/// Rates are g/s. `site_rate` includes the venting draw; equipment rates
/// are leak sums per equipment group.
#[derive(Debug, Clone)]
pub struct EmissionSnapshot {
    pub site_idx: usize,
    /// Active leak indices at the site, aligned with `leak_rates`/`tagged`
    pub leaks_present: Vec<usize>,
    pub leak_rates: Vec<f64>,
    pub tagged: Vec<bool>,
    pub equipment_rates: Vec<f64>,
    pub leak_total: f64,
    pub vent_rate: f64,
    pub site_rate: f64,
    /// Wind at the site's cell, for wind-dependent detection limits
    pub wind_m_s: f64,
}

/// Outcome of surveying one site, identical in shape across sensors.
#[derive(Debug, Clone)]
pub struct SiteSurvey {
    pub site_idx: usize,
    pub found_leak: bool,
    /// True whole-site rate including venting, g/s
    pub site_true_rate: f64,
    /// Measured (quantification-error-perturbed) site rate, g/s
    pub site_measured_rate: f64,
    pub equip_measured_rates: Vec<f64>,
    pub vent_rate: f64,
    /// Active leaks present during the survey
    pub leaks_present: Vec<usize>,
    /// Leaks newly detected (untagged at survey time)
    pub new_tags: Vec<usize>,
    /// Detections of leaks already tagged
    pub redundant_tags: u32,
    pub missed_leaks: u32,
}

impl SiteSurvey {
    fn empty(snap: &EmissionSnapshot) -> Self {
        SiteSurvey {
            site_idx: snap.site_idx,
            found_leak: false,
            site_true_rate: snap.site_rate,
            site_measured_rate: 0.0,
            equip_measured_rates: Vec::new(),
            vent_rate: snap.vent_rate,
            leaks_present: snap.leaks_present.clone(),
            new_tags: Vec::new(),
            redundant_tags: 0,
            missed_leaks: 0,
        }
    }
}

/// Detection model interface; one implementation per measurement scale.
pub trait Sensor: Send + Sync {
    fn detect(&self, snap: &EmissionSnapshot, rng: &mut StdRng) -> SiteSurvey;
}

/// Apply quantification error to a true rate: a relative error draw
/// `e ~ N(0, qe)` inflates the rate when positive and deflates it when
/// negative.
pub(crate) fn apply_quantification_error(rate: f64, qe: f64, rng: &mut StdRng) -> f64 {
    if qe <= 0.0 {
        return rate;
    }
    use rand_distr::{Distribution, Normal};
    // qe > 0 makes this constructor infallible
    let e = Normal::new(0.0, qe).map(|d| d.sample(rng)).unwrap_or(0.0);
    if e >= 0.0 {
        rate * (1.0 + e)
    } else {
        rate / (1.0 + e.abs())
    }
}

/// Build the sensor implementation for a method configuration, validating
/// the MDL shape for the chosen scale.
pub fn build_sensor(cfg: &MethodParams) -> LdarResult<Box<dyn Sensor>> {
    match cfg.measurement_scale {
        MeasurementScale::Component => {
            if cfg.mdl.len() != 2 {
                return Err(LdarError::SensorConfig {
                    method: cfg.label.clone(),
                    detail: format!(
                        "component-scale sensor needs MDL [mean, std], got {} value(s)",
                        cfg.mdl.len()
                    ),
                });
            }
            Ok(Box::new(ComponentSensor::new(cfg.mdl[0], cfg.mdl[1], cfg.qe)))
        }
        MeasurementScale::Equipment => {
            let mdl = scalar_mdl(cfg)?;
            Ok(Box::new(EquipmentSensor::new(mdl, cfg.qe)))
        }
        MeasurementScale::Site => {
            let wind_dependent = cfg.deployment_type == DeploymentType::Orbit;
            let mdl = if wind_dependent && cfg.mdl.is_empty() {
                0.0 // orbit MDL comes from wind; a floor is optional
            } else {
                scalar_mdl(cfg)?
            };
            Ok(Box::new(SiteSensor::new(mdl, cfg.qe, wind_dependent)))
        }
    }
}

fn scalar_mdl(cfg: &MethodParams) -> LdarResult<f64> {
    match cfg.mdl.first() {
        Some(v) => Ok(*v),
        None => Err(LdarError::SensorConfig {
            method: cfg.label.clone(),
            detail: "MDL is missing".into(),
        }),
    }
}
