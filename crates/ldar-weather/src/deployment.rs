//! Deployment-day computation.
//!
//! A deployment day (DD) is a (cell, day) where the weather sits inside a
//! method's envelope and crews can work. The boolean grid is computed once
//! per company at initialization and queried every scheduling decision, so
//! it is stored densely.

use serde::{Deserialize, Serialize};

use ldar_core::{Site, WeatherEnvelope};

use crate::grid::WeatherGrid;

/// Per-method 3-D boolean grid over `(lon_idx, lat_idx, day)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentGrid {
    lon_len: usize,
    lat_len: usize,
    days: usize,
    cells: Vec<bool>,
}

impl DeploymentGrid {
    /// Evaluate the weather envelope over every cell and simulation day.
    pub fn compute(weather: &WeatherGrid, envelope: &WeatherEnvelope, days: usize) -> Self {
        let lat_len = weather.latitudes().len();
        let lon_len = weather.longitudes().len();
        let mut cells = vec![false; lon_len * lat_len * days];
        for day in 0..days {
            for lat in 0..lat_len {
                for lon in 0..lon_len {
                    let t = weather.temp(day, lat, lon);
                    let w = weather.wind(day, lat, lon);
                    let p = weather.precip(day, lat, lon);
                    let ok = envelope.temp[0] <= t
                        && t <= envelope.temp[1]
                        && envelope.wind[0] <= w
                        && w <= envelope.wind[1]
                        && envelope.precip[0] <= p
                        && p <= envelope.precip[1];
                    cells[(lon * lat_len + lat) * days + day] = ok;
                }
            }
        }
        DeploymentGrid {
            lon_len,
            lat_len,
            days,
            cells,
        }
    }

    pub fn is_deployable(&self, lon_idx: usize, lat_idx: usize, day: usize) -> bool {
        self.cells[(lon_idx * self.lat_len + lat_idx) * self.days + day]
    }

    pub fn days(&self) -> usize {
        self.days
    }

    /// Fraction of sites whose cell is deployable on `day`.
    pub fn prop_sites_available(&self, sites: &[Site], day: usize) -> f64 {
        if sites.is_empty() {
            return 0.0;
        }
        let available = sites
            .iter()
            .filter(|s| self.is_deployable(s.lon_idx, s.lat_idx, day))
            .count();
        available as f64 / sites.len() as f64
    }

    /// Per-cell fraction of deployable days, `[lon][lat]`.
    pub fn dd_fraction_map(&self) -> Vec<Vec<f64>> {
        let mut map = vec![vec![0.0; self.lat_len]; self.lon_len];
        for lon in 0..self.lon_len {
            for lat in 0..self.lat_len {
                let deployable = (0..self.days)
                    .filter(|d| self.is_deployable(lon, lat, *d))
                    .count();
                map[lon][lat] = deployable as f64 / self.days.max(1) as f64;
            }
        }
        map
    }

    /// Per-cell maximum condition blackout: the longest run of consecutive
    /// non-deployable days, `[lon][lat]`.
    pub fn mcb_map(&self) -> Vec<Vec<u32>> {
        let mut map = vec![vec![0u32; self.lat_len]; self.lon_len];
        for lon in 0..self.lon_len {
            for lat in 0..self.lat_len {
                map[lon][lat] = longest_gap(
                    (0..self.days).map(|d| self.is_deployable(lon, lat, d)),
                );
            }
        }
        map
    }
}

/// Longest consecutive run of `false` in a deployment series.
fn longest_gap(series: impl Iterator<Item = bool>) -> u32 {
    let mut longest = 0u32;
    let mut run = 0u32;
    for deployable in series {
        if deployable {
            run = 0;
        } else {
            run += 1;
            longest = longest.max(run);
        }
    }
    longest
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldar_core::WeatherEnvelope;

    fn weather() -> WeatherGrid {
        // 1 lat x 1 lon x 6 days; temperature alternates around the envelope
        WeatherGrid::from_daily(
            vec![55.0],
            vec![248.0],
            vec![10.0, -50.0, 10.0, -50.0, -50.0, -50.0],
            vec![1.0; 6],
            vec![0.0; 6],
        )
        .unwrap()
    }

    #[test]
    fn envelope_gates_each_day() {
        let dd = DeploymentGrid::compute(&weather(), &WeatherEnvelope::default(), 6);
        assert!(dd.is_deployable(0, 0, 0));
        assert!(!dd.is_deployable(0, 0, 1));
    }

    #[test]
    fn all_false_when_envelope_forbids_everything() {
        let env = WeatherEnvelope {
            temp: [100.0, 120.0],
            ..WeatherEnvelope::default()
        };
        let dd = DeploymentGrid::compute(&weather(), &env, 6);
        assert!((0..6).all(|d| !dd.is_deployable(0, 0, d)));
        assert_eq!(dd.dd_fraction_map()[0][0], 0.0);
        assert_eq!(dd.mcb_map()[0][0], 6);
    }

    #[test]
    fn mcb_is_longest_false_run() {
        let dd = DeploymentGrid::compute(&weather(), &WeatherEnvelope::default(), 6);
        // Pattern T F T F F F -> longest blackout is 3
        assert_eq!(dd.mcb_map()[0][0], 3);
        assert!((dd.dd_fraction_map()[0][0] - 2.0 / 6.0).abs() < 1e-12);
    }
}
