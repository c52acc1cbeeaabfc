//! Gridded weather lookup.
//!
//! The simulator consumes a prepared 3-D grid: per-day, per-cell
//! temperature (degrees C), wind magnitude (m/s) and precipitation
//! (mm/day), with 1-D latitude and longitude axes. Construction from raw
//! hourly ERA5-style series (Kelvin, u/v components, metres) is supported
//! so the ingestion layer only has to hand over arrays.

use serde::{Deserialize, Serialize};

use ldar_core::{LdarError, LdarResult};

/// Per-day, per-cell weather fields plus the grid axes.
///
/// Storage is flat, indexed `[day][lat][lon]`; the grid is read-only once
/// built and is shared across companies of a simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherGrid {
    latitudes: Vec<f64>,
    longitudes: Vec<f64>,
    days: usize,
    /// Hours east of UTC the hourly data was rolled by
    utc_offset_hours: i32,
    temp_c: Vec<f64>,
    wind_m_s: Vec<f64>,
    precip_mm: Vec<f64>,
}

impl WeatherGrid {
    /// Build from daily fields already in simulator units.
    pub fn from_daily(
        latitudes: Vec<f64>,
        longitudes: Vec<f64>,
        temp_c: Vec<f64>,
        wind_m_s: Vec<f64>,
        precip_mm: Vec<f64>,
    ) -> LdarResult<Self> {
        let cells = latitudes.len() * longitudes.len();
        if cells == 0 {
            return Err(LdarError::Parameter("weather grid has empty axes".into()));
        }
        if temp_c.len() % cells != 0
            || temp_c.len() != wind_m_s.len()
            || temp_c.len() != precip_mm.len()
        {
            return Err(LdarError::Parameter(format!(
                "weather field lengths {}/{}/{} do not tile a {} x {} grid",
                temp_c.len(),
                wind_m_s.len(),
                precip_mm.len(),
                latitudes.len(),
                longitudes.len()
            )));
        }
        let days = temp_c.len() / cells;
        Ok(WeatherGrid {
            latitudes,
            longitudes,
            days,
            utc_offset_hours: 0,
            temp_c,
            wind_m_s,
            precip_mm,
        })
    }

    /// Build from hourly series: temperature in Kelvin, wind u/v components
    /// in m/s, precipitation in metres. Hours are rolled by the UTC offset
    /// so each 24-hour block is a local day, then averaged (precipitation is
    /// summed) into daily fields.
    pub fn from_hourly(
        latitudes: Vec<f64>,
        longitudes: Vec<f64>,
        temp_k: Vec<f64>,
        u10: Vec<f64>,
        v10: Vec<f64>,
        tp_m: Vec<f64>,
        utc_offset_hours: i32,
    ) -> LdarResult<Self> {
        let cells = latitudes.len() * longitudes.len();
        if cells == 0 || temp_k.len() % (cells * 24) != 0 {
            return Err(LdarError::Parameter(
                "hourly weather series does not tile the grid in 24-hour days".into(),
            ));
        }
        if u10.len() != temp_k.len() || v10.len() != temp_k.len() || tp_m.len() != temp_k.len() {
            return Err(LdarError::Parameter(
                "hourly weather fields have mismatched lengths".into(),
            ));
        }
        let hours = temp_k.len() / cells;
        let days = hours / 24;
        let shift = utc_offset_hours.rem_euclid(24) as usize;

        let mut temp_c = vec![0.0; days * cells];
        let mut wind_m_s = vec![0.0; days * cells];
        let mut precip_mm = vec![0.0; days * cells];

        for cell in 0..cells {
            for day in 0..days {
                let mut t_sum = 0.0;
                let mut w_sum = 0.0;
                let mut p_sum = 0.0;
                for hour in 0..24 {
                    // Roll the series so local midnight starts each block
                    let src_hour = (day * 24 + hour + shift) % hours;
                    let idx = src_hour * cells + cell;
                    t_sum += temp_k[idx] - 273.15;
                    w_sum += (u10[idx] * u10[idx] + v10[idx] * v10[idx]).sqrt();
                    p_sum += tp_m[idx] * 1000.0;
                }
                let out = day * cells + cell;
                temp_c[out] = t_sum / 24.0;
                wind_m_s[out] = w_sum / 24.0;
                precip_mm[out] = p_sum;
            }
        }

        Ok(WeatherGrid {
            latitudes,
            longitudes,
            days,
            utc_offset_hours,
            temp_c,
            wind_m_s,
            precip_mm,
        })
    }

    pub fn latitudes(&self) -> &[f64] {
        &self.latitudes
    }

    pub fn longitudes(&self) -> &[f64] {
        &self.longitudes
    }

    pub fn days(&self) -> usize {
        self.days
    }

    pub fn utc_offset_hours(&self) -> i32 {
        self.utc_offset_hours
    }

    fn idx(&self, day: usize, lat_idx: usize, lon_idx: usize) -> usize {
        (day * self.latitudes.len() + lat_idx) * self.longitudes.len() + lon_idx
    }

    /// Temperature in degrees C; days beyond the grid wrap around so short
    /// weather records can drive long simulations.
    pub fn temp(&self, day: usize, lat_idx: usize, lon_idx: usize) -> f64 {
        self.temp_c[self.idx(day % self.days, lat_idx, lon_idx)]
    }

    pub fn wind(&self, day: usize, lat_idx: usize, lon_idx: usize) -> f64 {
        self.wind_m_s[self.idx(day % self.days, lat_idx, lon_idx)]
    }

    pub fn precip(&self, day: usize, lat_idx: usize, lon_idx: usize) -> f64 {
        self.precip_mm[self.idx(day % self.days, lat_idx, lon_idx)]
    }

    /// Nearest grid cell for a site coordinate as `(lat_idx, lon_idx)`.
    ///
    /// Longitudes are normalized into the axis convention (0..360 when the
    /// axis uses it). A coordinate outside the axis bounds is a fatal
    /// [`LdarError::GridOutOfRange`] naming the offending direction.
    pub fn cell_for(&self, facility_id: &str, lat: f64, lon: f64) -> LdarResult<(usize, usize)> {
        let lon = self.normalize_lon(lon);
        let (lat_min, lat_max) = axis_bounds(&self.latitudes);
        let (lon_min, lon_max) = axis_bounds(&self.longitudes);

        let direction = if lat > lat_max {
            Some(("north", lat, lat_max))
        } else if lat < lat_min {
            Some(("south", lat, lat_min))
        } else if lon > lon_max {
            Some(("east", lon, lon_max))
        } else if lon < lon_min {
            Some(("west", lon, lon_min))
        } else {
            None
        };
        if let Some((dir, value, bound)) = direction {
            return Err(LdarError::GridOutOfRange {
                site: facility_id.to_string(),
                detail: format!("too far {dir} ({value} vs grid bound {bound})"),
            });
        }

        Ok((nearest(&self.latitudes, lat), nearest(&self.longitudes, lon)))
    }

    fn normalize_lon(&self, lon: f64) -> f64 {
        let (_, lon_max) = axis_bounds(&self.longitudes);
        if lon_max > 180.0 {
            lon.rem_euclid(360.0)
        } else {
            lon
        }
    }
}

fn axis_bounds(axis: &[f64]) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in axis {
        min = min.min(*v);
        max = max.max(*v);
    }
    (min, max)
}

fn nearest(axis: &[f64], value: f64) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, v) in axis.iter().enumerate() {
        let d = (v - value).abs();
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}
