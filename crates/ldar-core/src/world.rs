//! Pre-generated world payload.
//!
//! When leak pre-generation is on, the first program of a batch produces
//! the sites, initial leaks and per-day leak timeseries once per
//! simulation index; every other program replays the same realisations so
//! program comparisons are not confounded by sampling noise. This is the
//! payload the world cache persists.

use serde::{Deserialize, Serialize};

use crate::leak::Leak;
use crate::site::Site;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedWorld {
    pub sites: Vec<Site>,
    /// Leaks present on day zero, per site
    pub initial_leaks: Vec<Vec<Leak>>,
    /// One optional new leak per site per day
    pub leak_timeseries: Vec<Vec<Option<Leak>>>,
    /// Per-day RNG seeds when preseeding is on
    pub seed_timeseries: Option<Vec<u64>>,
}

impl GeneratedWorld {
    /// Sanity check that the per-site tables line up with the site list.
    pub fn is_consistent(&self) -> bool {
        self.initial_leaks.len() == self.sites.len()
            && self.leak_timeseries.len() == self.sites.len()
    }
}
