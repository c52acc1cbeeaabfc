//! Leak-rate distributions.
//!
//! Leak sizes are drawn either from an empirical sample file or from a
//! fitted/parameterized distribution per facility subtype. Four families are
//! supported: lognormal (the common case for leak rates), normal, gamma and
//! Weibull. For the lognormal family the scale parameter is supplied as mu
//! with `scale = exp(mu)`, matching how subtype distribution files record it.

use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, ContinuousCDF, Gamma, LogNormal, Normal, Weibull};

use crate::error::{LdarError, LdarResult};
use crate::units::{to_grams_per_second, MassUnit, TimeUnit};

/// Distribution family selector, as named in subtype distribution files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistKind {
    Lognorm,
    Norm,
    Gamma,
    Weibull,
}

impl DistKind {
    pub fn parse(name: &str) -> LdarResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "lognorm" | "lognormal" => Ok(DistKind::Lognorm),
            "norm" | "normal" => Ok(DistKind::Norm),
            "gamma" => Ok(DistKind::Gamma),
            "weibull" => Ok(DistKind::Weibull),
            other => Err(LdarError::Parameter(format!(
                "unknown distribution type '{other}'"
            ))),
        }
    }
}

/// A fitted or parameterized leak-rate distribution supporting sampling,
/// density and cumulative queries.
#[derive(Debug, Clone)]
pub struct LeakDistribution {
    kind: DistKind,
    inner: Inner,
}

#[derive(Debug, Clone)]
enum Inner {
    LogNormal(LogNormal),
    Normal(Normal),
    Gamma(Gamma),
    Weibull(Weibull),
}

impl LeakDistribution {
    /// Build from explicit parameters: `shape` is sigma for lognormal and
    /// normal, the shape parameter for gamma and Weibull; `mu_or_scale` is
    /// mu for lognormal (scale = exp(mu)), the mean for normal, and the
    /// scale parameter otherwise.
    pub fn from_params(kind: DistKind, shape: f64, mu_or_scale: f64) -> LdarResult<Self> {
        let inner = match kind {
            DistKind::Lognorm => Inner::LogNormal(
                LogNormal::new(mu_or_scale, shape)
                    .map_err(|e| LdarError::Parameter(format!("lognormal parameters: {e}")))?,
            ),
            DistKind::Norm => Inner::Normal(
                Normal::new(mu_or_scale, shape)
                    .map_err(|e| LdarError::Parameter(format!("normal parameters: {e}")))?,
            ),
            DistKind::Gamma => Inner::Gamma(
                Gamma::new(shape, 1.0 / mu_or_scale)
                    .map_err(|e| LdarError::Parameter(format!("gamma parameters: {e}")))?,
            ),
            DistKind::Weibull => Inner::Weibull(
                Weibull::new(shape, mu_or_scale)
                    .map_err(|e| LdarError::Parameter(format!("weibull parameters: {e}")))?,
            ),
        };
        Ok(LeakDistribution { kind, inner })
    }

    /// Fit from samples. Zero and negative samples are dropped for the
    /// log-domain families, matching how empirical leak files are cleaned.
    pub fn fit(kind: DistKind, samples: &[f64]) -> LdarResult<Self> {
        let positive: Vec<f64> = samples.iter().copied().filter(|s| *s > 0.0).collect();
        if positive.len() < 2 {
            return Err(LdarError::Parameter(
                "need at least two positive samples to fit a distribution".into(),
            ));
        }
        let (mean, var) = moments(&positive);
        match kind {
            DistKind::Lognorm => {
                let logs: Vec<f64> = positive.iter().map(|s| s.ln()).collect();
                let (mu, log_var) = moments(&logs);
                Self::from_params(DistKind::Lognorm, log_var.sqrt().max(1e-9), mu)
            }
            DistKind::Norm => Self::from_params(DistKind::Norm, var.sqrt().max(1e-9), mean),
            DistKind::Gamma => {
                // Method of moments: shape = m^2/v, scale = v/m
                if var <= 0.0 {
                    return Err(LdarError::Parameter(
                        "gamma fit requires sample variance > 0".into(),
                    ));
                }
                Self::from_params(DistKind::Gamma, mean * mean / var, var / mean)
            }
            DistKind::Weibull => Err(LdarError::Parameter(
                "fitting a weibull from samples is not supported; supply shape and scale".into(),
            )),
        }
    }

    pub fn kind(&self) -> DistKind {
        self.kind
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match &self.inner {
            Inner::LogNormal(d) => rng.sample(d),
            Inner::Normal(d) => rng.sample(d),
            Inner::Gamma(d) => rng.sample(d),
            Inner::Weibull(d) => rng.sample(d),
        }
    }

    pub fn pdf(&self, x: f64) -> f64 {
        match &self.inner {
            Inner::LogNormal(d) => d.pdf(x),
            Inner::Normal(d) => d.pdf(x),
            Inner::Gamma(d) => d.pdf(x),
            Inner::Weibull(d) => d.pdf(x),
        }
    }

    pub fn cdf(&self, x: f64) -> f64 {
        match &self.inner {
            Inner::LogNormal(d) => d.cdf(x),
            Inner::Normal(d) => d.cdf(x),
            Inner::Gamma(d) => d.cdf(x),
            Inner::Weibull(d) => d.cdf(x),
        }
    }
}

fn moments(samples: &[f64]) -> (f64, f64) {
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var)
}

/// Draw a leak rate, rejecting draws at or above `max_size` (in the draw's
/// native units), then convert to g/s from the declared unit pair.
///
/// The rejection loop is bounded; a distribution whose mass sits almost
/// entirely above `max_size` yields `max_size` converted, rather than
/// spinning forever.
pub fn leak_rvs<R: Rng + ?Sized>(
    dist: &LeakDistribution,
    max_size: Option<f64>,
    units: (MassUnit, TimeUnit),
    rng: &mut R,
) -> f64 {
    const MAX_ATTEMPTS: usize = 10_000;
    let mut draw = dist.sample(rng);
    if let Some(cap) = max_size {
        let mut attempts = 1;
        while draw >= cap && attempts < MAX_ATTEMPTS {
            draw = dist.sample(rng);
            attempts += 1;
        }
        if draw >= cap {
            draw = cap;
        }
    }
    to_grams_per_second(draw, units.0, units.1)
}

/// Linear-interpolated quantile of an empirical sample, used to resolve
/// proportion-type follow-up thresholds into a literal rate.
pub fn empirical_quantile(samples: &[f64], q: f64) -> f64 {
    assert!(!samples.is_empty(), "quantile of empty sample");
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = pos - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}
