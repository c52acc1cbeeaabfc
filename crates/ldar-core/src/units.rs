//! Gas quantity unit conversions.
//!
//! Leak rates are carried internally as grams of methane per second; every
//! external rate (parameter files, empirical sample files, follow-up
//! thresholds in kg/day) is converted through g/s on the way in. The table
//! enumerates {kilogram, gram, pound, mcf, cubic meter} x {second, minute,
//! hour, day}; conversions compose via g/s so any pair-to-pair conversion
//! is two table lookups.
//!
//! Volume units assume methane at standard conditions (0.678 kg/m3, the
//! density the economics reporting also uses).

use serde::{Deserialize, Serialize};

use crate::error::{LdarError, LdarResult};

/// kg/day emitted by a steady 1 g/s leak (86400 s/day / 1000 g/kg).
pub const GS_TO_KG_PER_DAY: f64 = 86.4;

/// Methane density at standard conditions, kg/m3.
pub const METHANE_KG_PER_M3: f64 = 0.678;

/// Cubic metres per thousand cubic feet.
pub const M3_PER_MCF: f64 = 28.316846592;

/// Mass (or volume-as-mass) component of a rate unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MassUnit {
    Kilogram,
    Gram,
    Pound,
    Mcf,
    #[serde(rename = "cubic meter")]
    CubicMeter,
}

/// Time component of a rate unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
}

impl MassUnit {
    /// Grams of methane per one unit.
    pub fn grams(&self) -> f64 {
        match self {
            MassUnit::Kilogram => 1000.0,
            MassUnit::Gram => 1.0,
            MassUnit::Pound => 453.59237,
            MassUnit::Mcf => METHANE_KG_PER_M3 * 1000.0 * M3_PER_MCF,
            MassUnit::CubicMeter => METHANE_KG_PER_M3 * 1000.0,
        }
    }

    pub fn parse(name: &str) -> LdarResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "kilogram" | "kg" => Ok(MassUnit::Kilogram),
            "gram" | "g" => Ok(MassUnit::Gram),
            "pound" | "lb" => Ok(MassUnit::Pound),
            "mcf" => Ok(MassUnit::Mcf),
            "cubic meter" | "m3" => Ok(MassUnit::CubicMeter),
            other => Err(LdarError::Parameter(format!(
                "unknown mass unit '{other}'"
            ))),
        }
    }
}

impl TimeUnit {
    /// Seconds per one unit.
    pub fn seconds(&self) -> f64 {
        match self {
            TimeUnit::Second => 1.0,
            TimeUnit::Minute => 60.0,
            TimeUnit::Hour => 3600.0,
            TimeUnit::Day => 86400.0,
        }
    }

    pub fn parse(name: &str) -> LdarResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "second" | "s" => Ok(TimeUnit::Second),
            "minute" | "min" => Ok(TimeUnit::Minute),
            "hour" | "h" => Ok(TimeUnit::Hour),
            "day" | "d" => Ok(TimeUnit::Day),
            other => Err(LdarError::Parameter(format!(
                "unknown time unit '{other}'"
            ))),
        }
    }
}

/// Convert a rate expressed in (mass, time) units to g/s.
pub fn to_grams_per_second(value: f64, mass: MassUnit, time: TimeUnit) -> f64 {
    value * mass.grams() / time.seconds()
}

/// Convert a rate in g/s to the requested (mass, time) units.
pub fn from_grams_per_second(value_g_s: f64, mass: MassUnit, time: TimeUnit) -> f64 {
    value_g_s * time.seconds() / mass.grams()
}

/// kg of methane to thousand cubic feet.
pub fn kg_to_mcf(kg: f64) -> f64 {
    (kg / METHANE_KG_PER_M3) / M3_PER_MCF
}

/// kg of methane to tonnes CO2-equivalent (GWP 28).
pub fn kg_to_tonnes_co2e(kg: f64) -> f64 {
    kg / 1000.0 * 28.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gram_per_second_is_identity() {
        assert_eq!(to_grams_per_second(3.5, MassUnit::Gram, TimeUnit::Second), 3.5);
    }

    #[test]
    fn kg_per_day_round_trip() {
        let g_s = to_grams_per_second(86.4, MassUnit::Kilogram, TimeUnit::Day);
        assert!((g_s - 1.0).abs() < 1e-12);
        let back = from_grams_per_second(g_s, MassUnit::Kilogram, TimeUnit::Day);
        assert!((back - 86.4).abs() < 1e-12);
    }

    #[test]
    fn conversions_compose_through_g_s() {
        // 1 mcf/hour -> g/s -> pounds/day should equal the direct ratio
        let g_s = to_grams_per_second(1.0, MassUnit::Mcf, TimeUnit::Hour);
        let lb_day = from_grams_per_second(g_s, MassUnit::Pound, TimeUnit::Day);
        let direct = MassUnit::Mcf.grams() / MassUnit::Pound.grams() * 24.0;
        assert!((lb_day - direct).abs() < 1e-9);
    }

    #[test]
    fn parses_unit_names() {
        assert_eq!(MassUnit::parse("Gram").unwrap(), MassUnit::Gram);
        assert_eq!(MassUnit::parse("cubic meter").unwrap(), MassUnit::CubicMeter);
        assert_eq!(TimeUnit::parse("day").unwrap(), TimeUnit::Day);
        assert!(MassUnit::parse("stone").is_err());
    }

    #[test]
    fn economics_conversions() {
        // 678 kg is one thousand cubic metres, about 35.31 mcf
        let mcf = kg_to_mcf(678.0);
        assert!((mcf - 1000.0 / M3_PER_MCF).abs() < 1e-9);
        assert!((kg_to_tonnes_co2e(1000.0) - 28.0).abs() < 1e-12);
    }
}
