//! Equipment-scale screening (aircraft, truck).
//!
//! Each equipment group's aggregate rate is measured with quantification
//! error and compared against a scalar MDL. Groups below the limit read as
//! zero and count toward missed leaks; the site measured rate is the sum
//! over groups.

use rand::rngs::StdRng;

use super::{apply_quantification_error, EmissionSnapshot, Sensor, SiteSurvey};

pub struct EquipmentSensor {
    mdl_g_s: f64,
    qe: f64,
}

impl EquipmentSensor {
    pub fn new(mdl_g_s: f64, qe: f64) -> Self {
        EquipmentSensor { mdl_g_s, qe }
    }
}

impl Sensor for EquipmentSensor {
    fn detect(&self, snap: &EmissionSnapshot, rng: &mut StdRng) -> SiteSurvey {
        let mut survey = SiteSurvey::empty(snap);
        for rate in &snap.equipment_rates {
            let mut measured = apply_quantification_error(*rate, self.qe, rng);
            if measured > self.mdl_g_s {
                survey.found_leak = true;
            } else {
                survey.missed_leaks += 1;
                measured = 0.0;
            }
            survey.equip_measured_rates.push(measured);
            survey.site_measured_rate += measured;
        }
        survey
    }
}
