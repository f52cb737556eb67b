// Configuration for base-rate estimation
//
// Exposure (N vaults observed for T years) is part of the configuration, but
// its validity is checked by the estimator: a zero or negative exposure is an
// InsufficientExposure error, not a configuration error.

use crate::error::{Result, VaultRiskError};
use serde::{Deserialize, Serialize};

/// Binomial confidence interval construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum IntervalMethod {
    /// Wilson score interval (default, well-behaved for small n)
    Wilson,
    /// Normal approximation (Wald), clamped to [0, 1]
    Normal,
    /// Exact interval from Beta quantiles
    ClopperPearson,
}

impl IntervalMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalMethod::Wilson => "wilson",
            IntervalMethod::Normal => "normal",
            IntervalMethod::ClopperPearson => "clopper-pearson",
        }
    }
}

/// Exposure base: N distinct vaults observed over T years
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Exposure {
    pub vaults: u64,
    pub years: f64,
}

impl Exposure {
    pub fn new(vaults: u64, years: f64) -> Self {
        Self { vaults, years }
    }

    /// Total vault-years N·T
    ///
    /// # Errors
    /// `InsufficientExposure` when N·T is zero, negative or not finite.
    pub fn vault_years(&self) -> Result<f64> {
        let vault_years = self.vaults as f64 * self.years;
        if !vault_years.is_finite() || vault_years <= 0.0 {
            return Err(VaultRiskError::InsufficientExposure {
                vaults: self.vaults,
                years: self.years,
                reason: format!("N*T must be positive and finite, got {}", vault_years),
            });
        }
        Ok(vault_years)
    }
}

/// Configuration for base-rate estimation
///
/// # Example
/// ```
/// use vaultrisk::estimate::EstimatorConfig;
///
/// let config = EstimatorConfig::default();
/// assert_eq!(config.vaults, 500);
/// assert_eq!(config.confidence_level, 0.95);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Estimated protocol universe size N
    pub vaults: u64,

    /// Observation period T in years
    pub years: f64,

    /// Two-sided confidence level for base-rate intervals
    ///
    /// - 0.95 (default)
    /// - 0.99: wider intervals
    /// - 0.90: narrower intervals
    pub confidence_level: f64,

    /// Interval construction method
    pub interval_method: IntervalMethod,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            vaults: 500,
            years: 9.56,
            confidence_level: 0.95,
            interval_method: IntervalMethod::Wilson,
        }
    }
}

impl EstimatorConfig {
    /// Wider, exact intervals for reporting worst-case bounds
    pub fn conservative() -> Self {
        Self {
            confidence_level: 0.99,
            interval_method: IntervalMethod::ClopperPearson,
            ..Self::default()
        }
    }

    /// Same settings with a different protocol universe size
    pub fn with_vaults(&self, vaults: u64) -> Self {
        Self {
            vaults,
            ..self.clone()
        }
    }

    pub fn exposure(&self) -> Exposure {
        Exposure::new(self.vaults, self.years)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(format!(
                "confidence_level must be in (0, 1), got {}",
                self.confidence_level
            ));
        }

        if self.years.is_nan() {
            return Err("years must be a number".to_string());
        }

        Ok(())
    }
}
