//! Site operator agent.
//!
//! Background natural detection independent of any survey method: once a
//! week the operator walks the sites and notices the conspicuous leaks.
//! Detection probability scales with the leak's share of the largest
//! empirical rate, multiplied by the configured operator strength, so big
//! leaks are found quickly and small ones mostly escape. Operator tags
//! skip the reporting delay on repair.

use rand::rngs::StdRng;
use rand::Rng;

use ldar_core::Leak;

pub const OPERATOR_COMPANY: &str = "operator";

pub struct OperatorAgent {
    strength: f64,
    /// Largest empirical leak rate, the scale against which a leak is
    /// judged conspicuous
    max_rate_g_s: f64,
}

impl OperatorAgent {
    pub fn new(strength: f64, empirical_leaks: &[f64]) -> Self {
        let max_rate_g_s = empirical_leaks
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max)
            .max(1.0);
        OperatorAgent {
            strength,
            max_rate_g_s,
        }
    }

    /// Walk the active leaks; return the indices the operator notices.
    pub fn work_a_day(&self, leaks: &[Leak], rng: &mut StdRng) -> Vec<usize> {
        let mut found = Vec::new();
        for (idx, leak) in leaks.iter().enumerate() {
            if !leak.is_active() || leak.tagged {
                continue;
            }
            let p = (self.strength * leak.rate_g_s / self.max_rate_g_s).clamp(0.0, 1.0);
            if p > 0.0 && rng.gen_bool(p) {
                found.push(idx);
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::SeedableRng;

    fn leak(rate: f64, tagged: bool) -> Leak {
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let mut l = Leak::new("F1_00001".into(), "F1".into(), 0, 1, rate, 55.0, -110.0, date, 0);
        l.tagged = tagged;
        l
    }

    #[test]
    fn huge_leaks_are_noticed() {
        let op = OperatorAgent::new(1.0, &[0.1, 1.0]);
        let leaks = vec![leak(1.0, false)];
        let mut rng = StdRng::seed_from_u64(1);
        // p = 1.0 / max(1.0) = 1.0, always found
        assert_eq!(op.work_a_day(&leaks, &mut rng), vec![0]);
    }

    #[test]
    fn tagged_leaks_are_skipped() {
        let op = OperatorAgent::new(1.0, &[1.0]);
        let leaks = vec![leak(1.0, true)];
        let mut rng = StdRng::seed_from_u64(1);
        assert!(op.work_a_day(&leaks, &mut rng).is_empty());
    }

    #[test]
    fn zero_strength_finds_nothing() {
        let op = OperatorAgent::new(0.0, &[1.0]);
        let leaks = vec![leak(1.0, false)];
        let mut rng = StdRng::seed_from_u64(1);
        assert!(op.work_a_day(&leaks, &mut rng).is_empty());
    }
}
