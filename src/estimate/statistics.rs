// Binomial interval and loss statistics for base-rate estimation
//
// Trials are vault-years (N·T), which need not be an integer, so every
// routine takes successes and trials as f64.
//
// - Wilson score interval: Wilson, E. B. (1927). Probable inference, the law
//   of succession, and statistical inference. JASA 22(158).
// - Clopper-Pearson: exact interval from Beta quantiles via statrs.

use crate::error::{Result, VaultRiskError};
use crate::estimate::config::IntervalMethod;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Beta, ContinuousCDF, Normal};
use statrs::statistics::{Data, Median, Statistics};

/// Two-sided confidence interval for a proportion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    pub level: f64,
    pub method: IntervalMethod,
}

impl ConfidenceInterval {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.lower..=self.upper).contains(&value)
    }
}

/// Standard normal quantile for a two-sided confidence level
///
/// 0.95 → 1.959964
pub fn z_score(confidence_level: f64) -> Result<f64> {
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(VaultRiskError::InvalidConfig(format!(
            "confidence level must be in (0, 1), got {}",
            confidence_level
        )));
    }
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| VaultRiskError::InvalidConfig(format!("standard normal: {}", e)))?;
    Ok(normal.inverse_cdf(1.0 - (1.0 - confidence_level) / 2.0))
}

/// Confidence interval for `successes / trials` using `method`
///
/// `successes = 0` always yields a lower bound of exactly 0.
pub fn binomial_interval(
    successes: f64,
    trials: f64,
    confidence_level: f64,
    method: IntervalMethod,
) -> Result<ConfidenceInterval> {
    if !trials.is_finite() || trials <= 0.0 {
        return Err(VaultRiskError::InvalidConfig(format!(
            "interval trials must be positive and finite, got {}",
            trials
        )));
    }
    if !(0.0..=trials).contains(&successes) {
        return Err(VaultRiskError::InvalidConfig(format!(
            "interval successes must be in [0, {}], got {}",
            trials, successes
        )));
    }

    let (lower, upper) = match method {
        IntervalMethod::Wilson => wilson(successes, trials, z_score(confidence_level)?),
        IntervalMethod::Normal => wald(successes, trials, z_score(confidence_level)?),
        IntervalMethod::ClopperPearson => clopper_pearson(successes, trials, confidence_level)?,
    };

    Ok(ConfidenceInterval {
        lower,
        upper,
        level: confidence_level,
        method,
    })
}

fn wilson(successes: f64, trials: f64, z: f64) -> (f64, f64) {
    let p = successes / trials;
    let z2 = z * z;
    let denom = 1.0 + z2 / trials;
    let center = (p + z2 / (2.0 * trials)) / denom;
    let half = z * (p * (1.0 - p) / trials + z2 / (4.0 * trials * trials)).sqrt() / denom;

    let lower = if successes == 0.0 {
        0.0
    } else {
        (center - half).max(0.0)
    };
    let upper = if successes == trials {
        1.0
    } else {
        (center + half).min(1.0)
    };
    (lower, upper)
}

fn wald(successes: f64, trials: f64, z: f64) -> (f64, f64) {
    let p = successes / trials;
    let half = z * (p * (1.0 - p) / trials).sqrt();
    ((p - half).max(0.0), (p + half).min(1.0))
}

fn clopper_pearson(successes: f64, trials: f64, confidence_level: f64) -> Result<(f64, f64)> {
    let tail = (1.0 - confidence_level) / 2.0;
    let beta = |a: f64, b: f64| {
        Beta::new(a, b).map_err(|e| {
            VaultRiskError::InvalidConfig(format!("Beta({}, {}) for interval: {}", a, b, e))
        })
    };

    let lower = if successes == 0.0 {
        0.0
    } else {
        beta(successes, trials - successes + 1.0)?.inverse_cdf(tail)
    };
    let upper = if successes == trials {
        1.0
    } else {
        beta(successes + 1.0, trials - successes)?.inverse_cdf(1.0 - tail)
    };

    Ok((lower.clamp(0.0, 1.0), upper.clamp(0.0, 1.0)))
}

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| Statistics::mean(values.iter()))
}

/// Median (average of the two middle values for even lengths)
pub fn median(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| Data::new(values.to_vec()).median())
}

/// Largest value, `None` for an empty slice
pub fn max(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| Statistics::max(values.iter()))
}
