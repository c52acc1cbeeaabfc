//! Component-scale (handheld OGI) detection.
//!
//! Detection probability per leak follows the Ravikumar et al. (2018)
//! logistic curve on log10 g/h: the slope `k` and midpoint `x0` are drawn
//! per leak, so camera-to-camera and operator variability show up as
//! detection noise rather than a hard threshold.

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use super::{apply_quantification_error, EmissionSnapshot, Sensor, SiteSurvey};

pub struct ComponentSensor {
    mdl_mean: f64,
    mdl_std: f64,
    qe: f64,
}

impl ComponentSensor {
    pub fn new(mdl_mean: f64, mdl_std: f64, qe: f64) -> Self {
        ComponentSensor {
            mdl_mean,
            mdl_std,
            qe,
        }
    }

    /// Detection probability for a leak rate in g/s.
    pub fn detection_probability(&self, rate_g_s: f64, k: f64, x0_g_s: f64) -> f64 {
        if rate_g_s <= 0.0 {
            return 0.0;
        }
        let x = (rate_g_s * 3600.0).log10();
        let x0 = (x0_g_s * 3600.0).log10();
        1.0 / (1.0 + (-k * (x - x0)).exp())
    }
}

impl Sensor for ComponentSensor {
    fn detect(&self, snap: &EmissionSnapshot, rng: &mut StdRng) -> SiteSurvey {
        let mut survey = SiteSurvey::empty(snap);
        for (i, leak_idx) in snap.leaks_present.iter().enumerate() {
            let z: f64 = StandardNormal.sample(rng);
            let k = 4.9 + 0.3 * z;
            let z0: f64 = StandardNormal.sample(rng);
            let x0 = (self.mdl_mean + self.mdl_std * z0).max(1e-12);
            let p = self.detection_probability(snap.leak_rates[i], k, x0);
            if rng.gen_bool(p.clamp(0.0, 1.0)) {
                survey.found_leak = true;
                if snap.tagged[i] {
                    survey.redundant_tags += 1;
                } else {
                    survey.new_tags.push(*leak_idx);
                    survey.site_measured_rate +=
                        apply_quantification_error(snap.leak_rates[i], self.qe, rng);
                }
            } else {
                survey.missed_leaks += 1;
            }
        }
        survey
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn snapshot(rates: Vec<f64>, tagged: Vec<bool>) -> EmissionSnapshot {
        let leak_total = rates.iter().sum();
        EmissionSnapshot {
            site_idx: 0,
            leaks_present: (0..rates.len()).collect(),
            leak_rates: rates,
            tagged,
            equipment_rates: Vec::new(),
            leak_total,
            vent_rate: 0.0,
            site_rate: leak_total,
            wind_m_s: 0.0,
        }
    }

    #[test]
    fn big_leak_has_high_detection_probability() {
        // 1 g/s against the standard OGI curve (MDL mean 0.01 g/s)
        let sensor = ComponentSensor::new(0.01, 2.78e-6, 0.0);
        let p = sensor.detection_probability(1.0, 4.9, 0.01);
        assert!(p > 0.9, "p = {p}");
    }

    #[test]
    fn zero_rate_never_detects() {
        let sensor = ComponentSensor::new(0.01, 2.78e-6, 0.0);
        assert_eq!(sensor.detection_probability(0.0, 4.9, 0.01), 0.0);
    }

    #[test]
    fn detected_tagged_leak_counts_as_redundant() {
        let sensor = ComponentSensor::new(1e-9, 1e-12, 0.0); // detects everything
        let mut rng = StdRng::seed_from_u64(11);
        let survey = sensor.detect(&snapshot(vec![5.0, 5.0], vec![true, false]), &mut rng);
        assert_eq!(survey.redundant_tags, 1);
        assert_eq!(survey.new_tags, vec![1]);
        assert!(survey.found_leak);
    }

    #[test]
    fn tiny_leaks_are_missed() {
        let sensor = ComponentSensor::new(10.0, 1e-6, 0.0); // MDL far above rates
        let mut rng = StdRng::seed_from_u64(2);
        let survey = sensor.detect(&snapshot(vec![1e-9], vec![false]), &mut rng);
        assert_eq!(survey.missed_leaks, 1);
        assert!(!survey.found_leak);
    }
}
