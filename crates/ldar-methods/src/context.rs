//! Read-only daily view of simulation state, and the events companies
//! return.
//!
//! The simulation owns sites, leaks and the tag pool; companies see this
//! borrowed context and respond with tag/flag events the simulation applies
//! after each company runs. That keeps all mutation in one place while
//! still letting a later company observe tags an earlier company produced
//! the same day.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::Rng;

use ldar_core::{Leak, ProgramParams, Site};
use ldar_weather::{DaylightTable, WeatherGrid};

use crate::sensor::EmissionSnapshot;

/// Borrowed view of one simulation day.
pub struct DayContext<'a> {
    pub date: NaiveDate,
    pub timestep: usize,
    pub sites: &'a [Site],
    pub leaks: &'a [Leak],
    /// Active leak indices per site, maintained by the simulation
    pub active_by_site: &'a [Vec<usize>],
    pub weather: &'a WeatherGrid,
    pub daylight: Option<&'a DaylightTable>,
    /// Empirical travel times between sites, minutes
    pub offsite_times: &'a [f64],
    /// Empirical vented-emission rates, g/s; empty when venting is off
    pub empirical_vents: &'a [f64],
    pub consider_venting: bool,
    pub program: &'a ProgramParams,
}

impl<'a> DayContext<'a> {
    /// Assemble the emission snapshot a sensor sees at one site.
    pub fn snapshot(&self, site_idx: usize, rng: &mut StdRng) -> EmissionSnapshot {
        let site = &self.sites[site_idx];
        let leaks_present = self.active_by_site[site_idx].clone();
        let leak_rates: Vec<f64> = leaks_present
            .iter()
            .map(|i| self.leaks[*i].rate_g_s)
            .collect();
        let tagged: Vec<bool> = leaks_present.iter().map(|i| self.leaks[*i].tagged).collect();
        let leak_total: f64 = leak_rates.iter().sum();

        let groups = site.equipment_groups.max(1) as usize;
        let mut equipment_rates = vec![0.0; groups];
        for (i, leak_idx) in leaks_present.iter().enumerate() {
            let g = (self.leaks[*leak_idx].equipment_group.max(1) as usize - 1) % groups;
            equipment_rates[g] += leak_rates[i];
        }

        let vent_rate = if self.consider_venting && !self.empirical_vents.is_empty() {
            self.empirical_vents[rng.gen_range(0..self.empirical_vents.len())]
        } else {
            0.0
        };

        EmissionSnapshot {
            site_idx,
            leaks_present,
            leak_rates,
            tagged,
            equipment_rates,
            leak_total,
            vent_rate,
            site_rate: leak_total + vent_rate,
            wind_m_s: self.weather.wind(self.timestep, site.lat_idx, site.lon_idx),
        }
    }
}

/// A leak newly detected by a component-scale survey.
#[derive(Debug, Clone)]
pub struct TagEvent {
    pub leak_idx: usize,
    pub site_idx: usize,
    pub company: String,
    pub crew_id: u32,
}

/// A site chosen for follow-up by a screening method.
#[derive(Debug, Clone)]
pub struct FlagEvent {
    pub site_idx: usize,
    pub company: String,
}

/// Everything a company hands back after its crews finish a day.
#[derive(Debug, Default)]
pub struct CompanyReport {
    pub tags: Vec<TagEvent>,
    pub flags: Vec<FlagEvent>,
    /// Sites whose flag a follow-up survey resolved
    pub unflags: Vec<usize>,
    pub cost_today: f64,
}
