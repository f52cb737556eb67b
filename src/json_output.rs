//! JSON output format for base-rate reports
//!
//! `--format json`: one document holding dataset provenance, the per-primitive
//! summaries and any optional analyses that were requested.

use crate::dataset::LoadReport;
use crate::error::Result;
use crate::estimate::{BaseRateReport, ProfileAssessment, SensitivityTable};
use serde::{Deserialize, Serialize};

/// Where the estimated corpus came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonDataset {
    pub source: String,
    pub corpus_sha256: String,
    /// Records that reached the estimator
    pub records: usize,
    /// Rows rejected as malformed
    pub rejected: usize,
    /// Rows skipped by the de minimis filter
    pub below_minimum: usize,
}

impl JsonDataset {
    pub fn from_load_report(source: impl Into<String>, load: &LoadReport) -> Self {
        Self {
            source: source.into(),
            corpus_sha256: load.fingerprint.clone(),
            records: load.records.len(),
            rejected: load.rejected.len(),
            below_minimum: load.below_minimum,
        }
    }
}

/// Root JSON output structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonOutput {
    /// Format version identifier
    pub version: String,
    /// Format name
    pub format: String,
    pub dataset: JsonDataset,
    pub base_rates: BaseRateReport,
    /// Base rates across protocol universe sizes (if --sensitivity)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<SensitivityTable>,
    /// Ranked vault profiles (profile command)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profiles: Option<Vec<ProfileAssessment>>,
}

impl JsonOutput {
    pub fn new(dataset: JsonDataset, base_rates: BaseRateReport) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "vaultrisk-json-v1".to_string(),
            dataset,
            base_rates,
            sensitivity: None,
            profiles: None,
        }
    }

    pub fn set_sensitivity(&mut self, table: SensitivityTable) {
        self.sensitivity = Some(table);
    }

    pub fn set_profiles(&mut self, profiles: Vec<ProfileAssessment>) {
        self.profiles = Some(profiles);
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
