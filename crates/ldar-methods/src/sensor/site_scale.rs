//! Site-scale screening (satellite, fixed continuous monitors).
//!
//! The whole-site rate (leaks plus venting) is compared against the
//! detection limit. For orbital sensors the limit is wind-dependent:
//! `Q_min = 5.79 * (1.39 / U)` with U the cell wind speed that day, so calm
//! days see much smaller plumes than windy ones.

use rand::rngs::StdRng;

use super::{apply_quantification_error, EmissionSnapshot, Sensor, SiteSurvey};

pub struct SiteSensor {
    mdl_g_s: f64,
    qe: f64,
    wind_dependent: bool,
}

impl SiteSensor {
    pub fn new(mdl_g_s: f64, qe: f64, wind_dependent: bool) -> Self {
        SiteSensor {
            mdl_g_s,
            qe,
            wind_dependent,
        }
    }

    /// Effective detection limit for the day's wind.
    pub fn effective_mdl(&self, wind_m_s: f64) -> f64 {
        if self.wind_dependent && wind_m_s > 0.0 {
            self.mdl_g_s.max(5.79 * (1.39 / wind_m_s))
        } else {
            self.mdl_g_s
        }
    }
}

impl Sensor for SiteSensor {
    fn detect(&self, snap: &EmissionSnapshot, rng: &mut StdRng) -> SiteSurvey {
        let mut survey = SiteSurvey::empty(snap);
        let mdl = self.effective_mdl(snap.wind_m_s);
        if snap.site_rate > mdl {
            survey.found_leak = true;
            survey.site_measured_rate = apply_quantification_error(snap.site_rate, self.qe, rng);
        } else {
            survey.missed_leaks += snap.leaks_present.len() as u32;
        }
        survey
    }
}
