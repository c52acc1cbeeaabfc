//! Facility (site) records and per-method survey statistics.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Per-method survey parameters a facility carries, taken from the
/// `{method}_time`, `{method}_RS` and `{method}_min_int` facility columns
/// (or the subtype-times table).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SiteMethodParams {
    /// Minutes for a full survey of this site
    pub survey_time_min: f64,
    /// Required surveys per calendar year
    pub required_surveys: u32,
    /// Minimum days between surveys
    pub min_interval_days: u32,
}

/// A facility under simulation.
///
/// The simulation owns the authoritative site table; companies receive
/// read-only views and keep their own per-method statistics keyed by
/// position in this table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub facility_id: String,
    pub lat: f64,
    pub lon: f64,
    /// Nearest weather-grid cell, resolved at initialization
    pub lat_idx: usize,
    pub lon_idx: usize,
    pub subtype_code: u32,
    pub equipment_groups: u32,
    /// Survey parameters keyed by method label
    pub method_params: HashMap<String, SiteMethodParams>,
    pub currently_flagged: bool,
    pub date_flagged: Option<NaiveDate>,
    pub flagged_by: Option<String>,
    /// Leaks present on day zero
    pub initial_leak_count: u32,
    /// Running per-site leak sequence, used to mint leak IDs
    pub cum_leaks: u32,
    pub total_emissions_kg: f64,
    pub active_leaks: u32,
    pub repaired_leaks: u32,
}

impl Site {
    /// Survey parameters for a method; a facility file that omits a
    /// method's columns yields `None` and the method skips the site.
    pub fn params_for(&self, method: &str) -> Option<&SiteMethodParams> {
        self.method_params.get(method)
    }

    /// Mint the next leak ID for this site (`facility_ID` + zero-padded
    /// per-site sequence).
    pub fn next_leak_id(&mut self) -> String {
        self.cum_leaks += 1;
        format!("{}_{:05}", self.facility_id, self.cum_leaks)
    }
}

/// Per-site statistics a company maintains for its own method.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MethodSiteStats {
    /// Cluster label from agent assignment (0 when unclustered)
    pub cluster: usize,
    /// Days since this method last surveyed the site (t_since_last_LDAR)
    pub days_since_survey: u32,
    pub surveys_conducted: u32,
    pub surveys_done_this_year: u32,
    pub attempted_today: bool,
    pub missed_leaks: u32,
    /// Fraction of simulation days the site's cell was deployable
    pub prop_deploy_days: f64,
    /// Longest run of consecutive non-deployable days at the site's cell
    pub max_blackout: u32,
}

impl MethodSiteStats {
    /// Day-boundary bookkeeping: neglect advances, the attempt latch
    /// clears, and the annual survey counter resets on January 1st.
    pub fn roll_day(&mut self, date: NaiveDate) {
        use chrono::Datelike;
        self.days_since_survey += 1;
        self.attempted_today = false;
        if date.month() == 1 && date.day() == 1 {
            self.surveys_done_this_year = 0;
        }
    }

    pub fn record_survey(&mut self) {
        self.surveys_conducted += 1;
        self.surveys_done_this_year += 1;
        self.days_since_survey = 0;
    }
}
