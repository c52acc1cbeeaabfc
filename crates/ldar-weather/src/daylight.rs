//! Daylight hours per simulation day.
//!
//! Crews that consider daylight cap their workday at the day length for a
//! representative latitude (the mean over sites). Day length comes from the
//! standard sunrise-equation: solar declination by day of year, then the
//! sunset hour angle `cos w0 = -tan(lat) tan(decl)`, clamped for polar day
//! and polar night.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Precomputed daylight hours indexed by timestep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaylightTable {
    hours: Vec<f64>,
}

impl DaylightTable {
    pub fn new(mean_lat: f64, start_date: NaiveDate, n_days: usize) -> Self {
        let hours = (0..n_days)
            .map(|t| {
                let date = start_date + Duration::days(t as i64);
                daylight_hours(mean_lat, date)
            })
            .collect();
        DaylightTable { hours }
    }

    pub fn get(&self, timestep: usize) -> f64 {
        self.hours[timestep % self.hours.len()]
    }
}

/// Hours of daylight at `lat` on `date`, in [0, 24].
pub fn daylight_hours(lat: f64, date: NaiveDate) -> f64 {
    let n = date.ordinal() as f64;
    let decl = 23.45_f64.to_radians() * ((360.0 / 365.0) * (284.0 + n)).to_radians().sin();
    let cos_omega = -lat.to_radians().tan() * decl.tan();
    if cos_omega <= -1.0 {
        24.0 // polar day
    } else if cos_omega >= 1.0 {
        0.0 // polar night
    } else {
        2.0 * cos_omega.acos().to_degrees() / 15.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn equator_is_near_twelve_hours_year_round() {
        for month in 1..=12 {
            let h = daylight_hours(0.0, date(2020, month, 15));
            assert!((h - 12.0).abs() < 0.6, "month {month}: {h}");
        }
    }

    #[test]
    fn northern_summer_is_longer_than_winter() {
        let summer = daylight_hours(55.0, date(2020, 6, 21));
        let winter = daylight_hours(55.0, date(2020, 12, 21));
        assert!(summer > 16.0, "summer: {summer}");
        assert!(winter < 8.0, "winter: {winter}");
    }

    #[test]
    fn polar_cases_clamp() {
        assert_eq!(daylight_hours(80.0, date(2020, 6, 21)), 24.0);
        assert_eq!(daylight_hours(80.0, date(2020, 12, 21)), 0.0);
    }

    #[test]
    fn table_indexes_by_timestep() {
        let table = DaylightTable::new(55.0, date(2020, 1, 1), 365);
        assert!(table.get(172) > table.get(0));
    }
}
