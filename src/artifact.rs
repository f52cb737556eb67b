//! Cached base-rate results
//!
//! The artifact is derived state: it is never read in place of a computation.
//! [`ResultsArtifact::verify`] recomputes and compares every stored value
//! exactly, so a stale or edited cache is caught rather than trusted.

use crate::error::{Result, VaultRiskError};
use crate::estimate::BaseRateReport;
use crate::record::Primitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Provenance of a cached result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Protocol universe size N
    pub vaults: u64,
    /// Observation period T (years)
    pub years: f64,
    pub n_exploits: usize,
    /// Where the exploit corpus came from
    pub source: String,
    /// SHA-256 of the CSV the rates were computed from
    pub corpus_sha256: String,
    /// vaultrisk version that wrote the file
    pub generated_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub n_exploits: usize,
    pub base_rate: f64,
    pub base_rate_bps: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsArtifact {
    pub metadata: ArtifactMetadata,
    pub base_rates: BTreeMap<Primitive, ArtifactEntry>,
}

impl ResultsArtifact {
    pub fn from_report(
        report: &BaseRateReport,
        source: impl Into<String>,
        corpus_sha256: impl Into<String>,
    ) -> Self {
        let base_rates = report
            .summaries
            .iter()
            .map(|s| {
                (
                    s.primitive,
                    ArtifactEntry {
                        n_exploits: s.n,
                        base_rate: s.base_rate,
                        base_rate_bps: s.base_rate_bps,
                    },
                )
            })
            .collect();

        Self {
            metadata: ArtifactMetadata {
                vaults: report.exposure.vaults,
                years: report.exposure.years,
                n_exploits: report.total_exploits,
                source: source.into(),
                corpus_sha256: corpus_sha256.into(),
                generated_by: format!("vaultrisk {}", env!("CARGO_PKG_VERSION")),
            },
            base_rates,
        }
    }

    /// Write as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        tracing::info!(path = %path.as_ref().display(), "Saved results artifact");
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Compare against a fresh computation over the corpus with `corpus_sha256`
    ///
    /// # Errors
    /// `ArtifactMismatch` listing every differing field.
    pub fn verify(&self, report: &BaseRateReport, corpus_sha256: &str) -> Result<()> {
        let fresh = Self::from_report(report, self.metadata.source.clone(), corpus_sha256);
        let mut mismatches = Vec::new();

        if self.metadata.corpus_sha256 != fresh.metadata.corpus_sha256 {
            mismatches.push(format!(
                "corpus fingerprint {} != {}",
                self.metadata.corpus_sha256, fresh.metadata.corpus_sha256
            ));
        }
        if self.metadata.vaults != fresh.metadata.vaults
            || self.metadata.years.to_bits() != fresh.metadata.years.to_bits()
        {
            mismatches.push(format!(
                "exposure N={} T={} != N={} T={}",
                self.metadata.vaults,
                self.metadata.years,
                fresh.metadata.vaults,
                fresh.metadata.years
            ));
        }
        if self.metadata.n_exploits != fresh.metadata.n_exploits {
            mismatches.push(format!(
                "n_exploits {} != {}",
                self.metadata.n_exploits, fresh.metadata.n_exploits
            ));
        }

        for primitive in Primitive::ALL {
            match (
                self.base_rates.get(&primitive),
                fresh.base_rates.get(&primitive),
            ) {
                (Some(cached), Some(computed)) => {
                    if cached.n_exploits != computed.n_exploits
                        || cached.base_rate.to_bits() != computed.base_rate.to_bits()
                        || cached.base_rate_bps.to_bits() != computed.base_rate_bps.to_bits()
                    {
                        mismatches.push(format!(
                            "{}: cached n={} rate={} != computed n={} rate={}",
                            primitive,
                            cached.n_exploits,
                            cached.base_rate,
                            computed.n_exploits,
                            computed.base_rate
                        ));
                    }
                }
                (None, Some(_)) => mismatches.push(format!("{}: missing from cache", primitive)),
                _ => {}
            }
        }

        if mismatches.is_empty() {
            tracing::info!("Results artifact matches recomputation");
            Ok(())
        } else {
            Err(VaultRiskError::ArtifactMismatch(mismatches.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::{estimate, EstimatorConfig};
    use crate::record::{CategorizedExploit, ExploitRecord};
    use chrono::NaiveDate;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn report(vaults: u64) -> BaseRateReport {
        let exploits: Vec<_> = [Primitive::Contract, Primitive::Contract, Primitive::Oracle]
            .into_iter()
            .enumerate()
            .map(|(i, p)| {
                let record = ExploitRecord::new(
                    NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
                    format!("exploit-{}", i),
                    "",
                    1e6,
                    BTreeSet::new(),
                )
                .unwrap();
                CategorizedExploit::with_label(record, p)
            })
            .collect();
        let config = EstimatorConfig {
            vaults,
            ..EstimatorConfig::default()
        };
        estimate(&exploits, &config).unwrap()
    }

    #[test]
    fn test_round_trip_and_verify() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("base_rates.json");

        let report = report(500);
        let artifact = ResultsArtifact::from_report(&report, "DeFiLlama Hacks API", "abc123");
        artifact.save(&path).unwrap();

        let loaded = ResultsArtifact::load(&path).unwrap();
        assert_eq!(loaded, artifact);
        assert!(loaded.verify(&report, "abc123").is_ok());
    }

    #[test]
    fn test_tampered_rate_fails() {
        let report = report(500);
        let mut artifact = ResultsArtifact::from_report(&report, "test", "abc123");
        if let Some(entry) = artifact.base_rates.get_mut(&Primitive::Contract) {
            entry.base_rate += 1e-12;
        }

        let err = artifact.verify(&report, "abc123").unwrap_err();
        assert!(matches!(err, VaultRiskError::ArtifactMismatch(_)));
        assert!(err.to_string().contains("CONTRACT"));
    }

    #[test]
    fn test_different_exposure_fails() {
        let artifact = ResultsArtifact::from_report(&report(500), "test", "abc123");
        let err = artifact.verify(&report(800), "abc123").unwrap_err();
        assert!(err.to_string().contains("exposure"));
    }

    #[test]
    fn test_changed_corpus_fails() {
        let report = report(500);
        let artifact = ResultsArtifact::from_report(&report, "test", "abc123");
        let err = artifact.verify(&report, "def456").unwrap_err();
        assert!(err.to_string().contains("fingerprint"));
    }

    #[test]
    fn test_missing_primitive_fails() {
        let report = report(500);
        let mut artifact = ResultsArtifact::from_report(&report, "test", "abc123");
        artifact.base_rates.remove(&Primitive::Governance);
        assert!(artifact.verify(&report, "abc123").is_err());
    }

    #[test]
    fn test_json_layout() {
        let artifact = ResultsArtifact::from_report(&report(500), "test", "abc123");
        let value = serde_json::to_value(&artifact).unwrap();
        assert_eq!(value["metadata"]["vaults"], 500);
        assert_eq!(value["base_rates"]["CONTRACT"]["n_exploits"], 2);
        assert!(value["base_rates"]["GOVERNANCE"]["base_rate"].is_number());
    }
}
