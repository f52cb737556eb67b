//! Run configuration loaded from TOML
//!
//! Every field has a default, so a config file only needs the values it
//! changes. CLI flags are applied on top by the binary.
//!
//! ```toml
//! [estimator]
//! vaults = 800
//! confidence_level = 0.99
//! interval_method = "clopper-pearson"
//!
//! [dataset]
//! min_amount_usd = 250000
//! ```

use crate::error::{Result, VaultRiskError};
use crate::estimate::EstimatorConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Loader thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Rows below this amount (USD) are skipped as de minimis
    pub min_amount_usd: f64,

    /// Allowed difference between `amount_m` and `amount / 1e6`
    pub amount_m_tolerance: f64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            min_amount_usd: 100_000.0,
            amount_m_tolerance: 0.01,
        }
    }
}

impl DatasetConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.min_amount_usd.is_finite() || self.min_amount_usd < 0.0 {
            return Err(format!(
                "min_amount_usd must be non-negative, got {}",
                self.min_amount_usd
            ));
        }
        if !self.amount_m_tolerance.is_finite() || self.amount_m_tolerance < 0.0 {
            return Err(format!(
                "amount_m_tolerance must be non-negative, got {}",
                self.amount_m_tolerance
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultRiskConfig {
    pub estimator: EstimatorConfig,
    pub dataset: DatasetConfig,
}

impl VaultRiskConfig {
    /// 99% Clopper-Pearson intervals, default loader thresholds
    pub fn conservative() -> Self {
        Self {
            estimator: EstimatorConfig::conservative(),
            dataset: DatasetConfig::default(),
        }
    }

    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: VaultRiskConfig = toml::from_str(content)?;
        config.validate().map_err(VaultRiskError::InvalidConfig)?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        self.estimator.validate()?;
        self.dataset.validate()
    }
}
