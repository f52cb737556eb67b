// Composite failure probability under independence
//
//     p_combined = 1 - Π(1 - p_i)
//
// Computed only for a caller-supplied set of probabilities (one vault's risk
// profile), never unconditionally for the whole corpus.

use crate::error::{Result, VaultRiskError};
use crate::estimate::estimator::BaseRateReport;
use crate::record::Primitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Probability that at least one independent primitive causes failure
///
/// The empty set yields 0.
///
/// # Example
/// ```
/// use vaultrisk::estimate::combined_failure_probability;
///
/// let p = combined_failure_probability(&[0.0611, 0.0193, 0.0128, 0.0006]).unwrap();
/// assert!((p - 0.0916).abs() < 1e-3);
/// ```
pub fn combined_failure_probability(probabilities: &[f64]) -> Result<f64> {
    for (index, &p) in probabilities.iter().enumerate() {
        check_probability(&format!("p[{}]", index), p)?;
    }
    Ok(complement_product(probabilities.iter().copied()))
}

fn check_probability(label: &str, p: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&p) {
        return Err(VaultRiskError::InvalidProbability {
            label: label.to_string(),
            value: p,
        });
    }
    Ok(())
}

fn complement_product(probabilities: impl Iterator<Item = f64>) -> f64 {
    let survival: f64 = probabilities.map(|p| 1.0 - p).product();
    (1.0 - survival).clamp(0.0, 1.0)
}

/// Combined risk for one set of per-primitive probabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeRisk {
    /// Probability per primitive fed into the combination
    pub probabilities: BTreeMap<Primitive, f64>,
    /// 1 - Π(1 - p_i)
    pub combined_risk: f64,
    /// Probability that primitive i alone fails, as a fraction of combined_risk
    pub contributions: BTreeMap<Primitive, f64>,
}

impl CompositeRisk {
    /// "1 in N" odds of failure per year
    pub fn odds(&self) -> String {
        if self.combined_risk > 0.0 {
            format!("1 in {}", (1.0 / self.combined_risk).floor() as u64)
        } else {
            "negligible".to_string()
        }
    }
}

/// Combine per-primitive probabilities and attribute the result
pub fn combine_risks(probabilities: &BTreeMap<Primitive, f64>) -> Result<CompositeRisk> {
    for (primitive, &p) in probabilities {
        check_probability(primitive.as_str(), p)?;
    }

    let combined_risk = complement_product(probabilities.values().copied());

    let contributions = probabilities
        .iter()
        .map(|(&primitive, &p)| {
            let others: f64 = probabilities
                .iter()
                .filter(|(other, _)| **other != primitive)
                .map(|(_, &q)| 1.0 - q)
                .product();
            let share = if combined_risk > 0.0 {
                p * others / combined_risk
            } else {
                0.0
            };
            (primitive, share)
        })
        .collect();

    Ok(CompositeRisk {
        probabilities: probabilities.clone(),
        combined_risk,
        contributions,
    })
}

/// A vault strategy expressed as multipliers on the corpus base rates
///
/// # Example TOML
/// ```toml
/// [[profile]]
/// name = "Curve 3-Pool LP"
/// multipliers = { CONTRACT = 1.0, OPERATIONAL = 1.0, GOVERNANCE = 0.5 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultProfile {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Missing primitives have no exposure (multiplier 0)
    pub multipliers: BTreeMap<Primitive, f64>,
}

impl VaultProfile {
    /// Per-primitive probabilities: base rate × multiplier
    pub fn probabilities(&self, report: &BaseRateReport) -> Result<BTreeMap<Primitive, f64>> {
        let base_rates = report.base_rates();
        let mut probabilities = BTreeMap::new();

        for primitive in Primitive::ALL {
            let multiplier = self.multipliers.get(&primitive).copied().unwrap_or(0.0);
            if !multiplier.is_finite() || multiplier < 0.0 {
                return Err(VaultRiskError::InvalidConfig(format!(
                    "profile '{}': multiplier for {} must be non-negative, got {}",
                    self.name, primitive, multiplier
                )));
            }
            let rate = base_rates.get(&primitive).copied().unwrap_or(0.0);
            probabilities.insert(primitive, rate * multiplier);
        }

        Ok(probabilities)
    }

    /// Combined risk of this vault under the report's base rates
    pub fn assess(&self, report: &BaseRateReport) -> Result<ProfileAssessment> {
        let probabilities = self.probabilities(report)?;
        let risk = combine_risks(&probabilities).map_err(|e| match e {
            VaultRiskError::InvalidProbability { label, value } => {
                VaultRiskError::InvalidProbability {
                    label: format!("{} ({})", label, self.name),
                    value,
                }
            }
            other => other,
        })?;

        Ok(ProfileAssessment {
            name: self.name.clone(),
            description: self.description.clone(),
            risk,
        })
    }
}

/// Result of applying one vault profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileAssessment {
    pub name: String,
    pub description: String,
    #[serde(flatten)]
    pub risk: CompositeRisk,
}

/// Collection of vault profiles loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSet {
    #[serde(rename = "profile")]
    pub profiles: Vec<VaultProfile>,
}

impl ProfileSet {
    /// Load profiles from a TOML file
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let set: ProfileSet = toml::from_str(content)?;
        if set.profiles.is_empty() {
            return Err(VaultRiskError::InvalidConfig(
                "profile file defines no [[profile]] entries".to_string(),
            ));
        }
        Ok(set)
    }

    /// Example strategies compiled into the binary
    pub fn default_profiles() -> Result<Self> {
        const DEFAULT_TOML: &str = include_str!("../../profiles-default.toml");
        Self::from_toml_str(DEFAULT_TOML)
    }

    /// Assess every profile, lowest combined risk first
    pub fn rank(&self, report: &BaseRateReport) -> Result<Vec<ProfileAssessment>> {
        let mut assessments = self
            .profiles
            .iter()
            .map(|p| p.assess(report))
            .collect::<Result<Vec<_>>>()?;
        assessments.sort_by(|a, b| a.risk.combined_risk.total_cmp(&b.risk.combined_risk));
        Ok(assessments)
    }
}

/// Human-readable ranking table
pub fn ranking_report(assessments: &[ProfileAssessment]) -> String {
    let mut report = String::new();
    report.push_str(&format!(
        "{:<28} {:>14}   {:<16}\n",
        "Strategy", "Annual Failure", "Odds"
    ));
    report.push_str(&format!("{}\n", "-".repeat(62)));
    for assessment in assessments {
        report.push_str(&format!(
            "{:<28} {:>13.2}%   {:<16}\n",
            assessment.name,
            assessment.risk.combined_risk * 100.0,
            assessment.risk.odds()
        ));
    }

    for assessment in assessments {
        report.push_str(&format!("\n{}:\n", assessment.name));
        for (primitive, p) in &assessment.risk.probabilities {
            let share = assessment
                .risk
                .contributions
                .get(primitive)
                .copied()
                .unwrap_or(0.0);
            report.push_str(&format!(
                "  {:<13} p={:>6.2}%  contribution={:>5.1}%\n",
                primitive.as_str(),
                p * 100.0,
                share * 100.0
            ));
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_probability_published_rates() {
        let p = combined_failure_probability(&[0.0611, 0.0193, 0.0128, 0.0006]).unwrap();
        let expected = 1.0 - (1.0 - 0.0611) * (1.0 - 0.0193) * (1.0 - 0.0128) * (1.0 - 0.0006);
        assert!((p - expected).abs() < 1e-12);
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn test_combined_probability_edge_cases() {
        assert_eq!(combined_failure_probability(&[]).unwrap(), 0.0);
        assert_eq!(combined_failure_probability(&[0.0, 0.0]).unwrap(), 0.0);
        assert_eq!(combined_failure_probability(&[1.0, 0.2]).unwrap(), 1.0);
        assert!((combined_failure_probability(&[0.25]).unwrap() - 0.25).abs() < 1e-15);
    }

    #[test]
    fn test_combined_probability_rejects_invalid() {
        assert!(matches!(
            combined_failure_probability(&[0.1, 1.5]),
            Err(VaultRiskError::InvalidProbability { .. })
        ));
        assert!(combined_failure_probability(&[-0.1]).is_err());
        assert!(combined_failure_probability(&[f64::NAN]).is_err());
    }

    #[test]
    fn test_combine_risks_contributions() {
        let mut probabilities = BTreeMap::new();
        probabilities.insert(Primitive::Contract, 0.1);
        probabilities.insert(Primitive::Oracle, 0.0);

        let risk = combine_risks(&probabilities).unwrap();
        assert!((risk.combined_risk - 0.1).abs() < 1e-15);
        assert!((risk.contributions[&Primitive::Contract] - 1.0).abs() < 1e-12);
        assert_eq!(risk.contributions[&Primitive::Oracle], 0.0);
        assert_eq!(risk.odds(), "1 in 10");
    }

    #[test]
    fn test_combine_risks_negligible() {
        let mut probabilities = BTreeMap::new();
        probabilities.insert(Primitive::Governance, 0.0);
        let risk = combine_risks(&probabilities).unwrap();
        assert_eq!(risk.combined_risk, 0.0);
        assert_eq!(risk.odds(), "negligible");
        assert_eq!(risk.contributions[&Primitive::Governance], 0.0);
    }

    #[test]
    fn test_default_profiles_load() {
        let set = ProfileSet::default_profiles().unwrap();
        let names: Vec<_> = set.profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Curve 3-Pool LP", "Aave USDC Lending", "New Protocol Yield Farm"]
        );
        let curve = &set.profiles[0];
        assert_eq!(curve.multipliers.get(&Primitive::Oracle), None);
        assert_eq!(curve.multipliers[&Primitive::Governance], 0.5);
    }

    #[test]
    fn test_empty_profile_file_rejected() {
        assert!(ProfileSet::from_toml_str("profile = []").is_err());
    }
}
