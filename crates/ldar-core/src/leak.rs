//! Leak records and lifecycle.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Leak lifecycle state. `Repaired` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeakStatus {
    Active,
    Repaired,
}

/// A single leak at a facility.
///
/// Created by the initializer (day zero) or by the engine's daily spawn;
/// mutated only through tagging (by the detecting company, applied by the
/// simulation) and repair (by the simulation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leak {
    /// `facility_ID` + "_" + zero-padded per-site sequence
    pub leak_id: String,
    pub facility_id: String,
    /// Position of the owning site in the simulation's site table
    pub site_idx: usize,
    /// Equipment group at the site, 1-based
    pub equipment_group: u32,
    /// Emission rate in g/s
    pub rate_g_s: f64,
    pub lat: f64,
    pub lon: f64,
    pub status: LeakStatus,
    pub days_active: u32,
    pub tagged: bool,
    pub date_began: NaiveDate,
    pub date_tagged: Option<NaiveDate>,
    pub tagged_by_company: Option<String>,
    pub tagged_by_crew: Option<u32>,
    /// Credit for first detection: the flagging company when the site was
    /// flagged, otherwise the tagging company
    pub init_detect_by: Option<String>,
    pub init_detect_date: Option<NaiveDate>,
    pub date_repaired: Option<NaiveDate>,
    pub repair_delay_days: Option<u32>,
    pub requires_shutdown: bool,
}

impl Leak {
    pub fn new(
        leak_id: String,
        facility_id: String,
        site_idx: usize,
        equipment_group: u32,
        rate_g_s: f64,
        lat: f64,
        lon: f64,
        date_began: NaiveDate,
        days_active: u32,
    ) -> Self {
        Leak {
            leak_id,
            facility_id,
            site_idx,
            equipment_group,
            rate_g_s,
            lat,
            lon,
            status: LeakStatus::Active,
            days_active,
            tagged: false,
            date_began,
            date_tagged: None,
            tagged_by_company: None,
            tagged_by_crew: None,
            init_detect_by: None,
            init_detect_date: None,
            date_repaired: None,
            repair_delay_days: None,
            requires_shutdown: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == LeakStatus::Active
    }

    /// Total emission over the leak's active life, in kg.
    pub fn lifetime_emissions_kg(&self) -> f64 {
        self.days_active as f64 * self.rate_g_s * crate::units::GS_TO_KG_PER_DAY
    }
}
