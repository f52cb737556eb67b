// Per-primitive base rates, intervals and severity
//
// base_rate = n / (N·T) is an exposure-normalized annual probability.
// share_of_exploits = n / total_n is a separate statistic and is never used in
// place of the base rate.

use crate::error::{Result, VaultRiskError};
use crate::estimate::config::{EstimatorConfig, Exposure, IntervalMethod};
use crate::estimate::statistics::{binomial_interval, max, mean, median, ConfidenceInterval};
use crate::record::{CategorizedExploit, Primitive};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Loss statistics for one primitive, independent of frequency
///
/// All per-record statistics are `None` for a primitive with no records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Severity {
    pub mean_loss: Option<f64>,
    pub median_loss: Option<f64>,
    pub max_loss: Option<f64>,
    /// Sum of losses (USD), 0 for an empty primitive
    pub total_loss: f64,
    /// Fraction of all losses across primitives
    pub loss_share: Option<f64>,
    /// Mean loss relative to the largest mean loss across primitives (0-1)
    pub severity_index: Option<f64>,
}

/// Base-rate statistics for one primitive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseRateSummary {
    pub primitive: Primitive,
    /// Number of exploits with this label
    pub n: usize,
    /// n / total exploits, `None` when the corpus is empty
    pub share_of_exploits: Option<f64>,
    /// n / (N·T): annualized per-vault failure probability
    pub base_rate: f64,
    /// base_rate in basis points
    pub base_rate_bps: f64,
    pub interval: ConfidenceInterval,
    pub severity: Severity,
}

impl BaseRateSummary {
    /// No exploits carry this label
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }
}

/// Estimator output over the whole categorized corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseRateReport {
    pub exposure: Exposure,
    pub vault_years: f64,
    pub total_exploits: usize,
    pub total_loss: f64,
    pub confidence_level: f64,
    pub interval_method: IntervalMethod,
    /// One entry per primitive, canonical order
    pub summaries: Vec<BaseRateSummary>,
}

impl BaseRateReport {
    pub fn summary(&self, primitive: Primitive) -> Option<&BaseRateSummary> {
        self.summaries.iter().find(|s| s.primitive == primitive)
    }

    /// Base rate per primitive
    pub fn base_rates(&self) -> BTreeMap<Primitive, f64> {
        self.summaries
            .iter()
            .map(|s| (s.primitive, s.base_rate))
            .collect()
    }

    /// Share of exploits per primitive
    pub fn shares(&self) -> BTreeMap<Primitive, Option<f64>> {
        self.summaries
            .iter()
            .map(|s| (s.primitive, s.share_of_exploits))
            .collect()
    }

    /// Generate human-readable report
    pub fn to_report_string(&self) -> String {
        let mut report = String::new();
        let ci_header = format!(
            "{}% CI ({})",
            (self.confidence_level * 1000.0).round() / 10.0,
            self.interval_method.as_str()
        );

        report.push_str(&format!(
            "Base rates (N={}, T={} years, {:.1} vault-years)\n\n",
            self.exposure.vaults, self.exposure.years, self.vault_years
        ));
        report.push_str(&format!(
            "{:<15} {:>5} {:>7} {:>8} {:>7}   {}\n",
            "Primitive",
            "n",
            "Share",
            "Rate",
            "bps",
            ci_header
        ));
        report.push_str(&format!("{}\n", "-".repeat(72)));

        for s in &self.summaries {
            report.push_str(&format!(
                "{:<15} {:>5} {:>7} {:>7.2}% {:>7.1}   [{:.2}%, {:.2}%]\n",
                s.primitive.as_str(),
                s.n,
                format_pct(s.share_of_exploits, 1),
                s.base_rate * 100.0,
                s.base_rate_bps,
                s.interval.lower * 100.0,
                s.interval.upper * 100.0
            ));
        }

        report.push_str(&format!("{}\n", "-".repeat(72)));
        report.push_str(&format!(
            "{:<15} {:>5} {:>7}\n",
            "TOTAL",
            self.total_exploits,
            if self.total_exploits > 0 { "100.0%" } else { "n/a" }
        ));

        report.push_str("\nSeverity (USD millions)\n\n");
        report.push_str(&format!(
            "{:<15} {:>9} {:>9} {:>9} {:>10} {:>7} {:>6}\n",
            "Primitive", "Mean", "Median", "Max", "Total", "Loss %", "Index"
        ));
        report.push_str(&format!("{}\n", "-".repeat(72)));
        for s in &self.summaries {
            let sev = &s.severity;
            report.push_str(&format!(
                "{:<15} {:>9} {:>9} {:>9} {:>10.1} {:>7} {:>6}\n",
                s.primitive.as_str(),
                format_millions(sev.mean_loss),
                format_millions(sev.median_loss),
                format_millions(sev.max_loss),
                sev.total_loss / 1e6,
                format_pct(sev.loss_share, 1),
                sev.severity_index
                    .map(|i| format!("{:.2}", i))
                    .unwrap_or_else(|| "n/a".to_string())
            ));
        }
        report.push_str(&format!("{}\n", "-".repeat(72)));
        report.push_str(&format!(
            "{:<15} {:>9} {:>9} {:>9} {:>10.1}\n",
            "TOTAL",
            "",
            "",
            "",
            self.total_loss / 1e6
        ));

        report
    }
}

fn format_pct(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{:.*}%", decimals, v * 100.0),
        None => "n/a".to_string(),
    }
}

fn format_millions(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}", v / 1e6),
        None => "n/a".to_string(),
    }
}

/// Compute base rates, intervals and severity for every primitive
///
/// # Errors
/// - `InvalidConfig` if the confidence level is outside (0, 1)
/// - `InsufficientExposure` if N·T ≤ 0, or a count exceeds N·T
/// - `MalformedRecord` if a record carries a negative or non-finite amount
///
/// # Example
/// ```
/// use vaultrisk::estimate::{estimate, EstimatorConfig};
///
/// let report = estimate(&[], &EstimatorConfig::default()).unwrap();
/// assert_eq!(report.total_exploits, 0);
/// assert!(report.summaries.iter().all(|s| s.base_rate == 0.0));
/// ```
pub fn estimate(
    exploits: &[CategorizedExploit],
    config: &EstimatorConfig,
) -> Result<BaseRateReport> {
    config.validate().map_err(VaultRiskError::InvalidConfig)?;
    let exposure = config.exposure();
    let vault_years = exposure.vault_years()?;

    let mut losses: BTreeMap<Primitive, Vec<f64>> =
        Primitive::ALL.iter().map(|&p| (p, Vec::new())).collect();

    for (index, exploit) in exploits.iter().enumerate() {
        let amount = exploit.record().amount();
        if !amount.is_finite() || amount < 0.0 {
            let line = exploit.record().source_line().unwrap_or(index + 1);
            return Err(VaultRiskError::malformed(
                line,
                format!(
                    "amount {} for '{}' reached the estimator",
                    amount,
                    exploit.record().name()
                ),
            ));
        }
        losses.entry(exploit.primitive()).or_default().push(amount);
    }

    let total_exploits = exploits.len();
    let total_loss: f64 = losses.values().flatten().sum();

    let means: BTreeMap<Primitive, Option<f64>> =
        losses.iter().map(|(&p, v)| (p, mean(v))).collect();
    let max_mean = means.values().flatten().copied().reduce(f64::max);

    let mut summaries = Vec::with_capacity(Primitive::ALL.len());
    for (&primitive, amounts) in &losses {
        let n = amounts.len();
        if n as f64 > vault_years {
            return Err(VaultRiskError::InsufficientExposure {
                vaults: exposure.vaults,
                years: exposure.years,
                reason: format!(
                    "{} {} exploits exceed {} vault-years (rate would exceed 1)",
                    n, primitive, vault_years
                ),
            });
        }
        if n == 0 {
            tracing::debug!(%primitive, "Empty category: rate 0, severity undefined");
        }

        let base_rate = n as f64 / vault_years;
        let interval = binomial_interval(
            n as f64,
            vault_years,
            config.confidence_level,
            config.interval_method,
        )?;

        let mean_loss = means.get(&primitive).copied().flatten();
        let primitive_loss: f64 = amounts.iter().sum();
        let severity = Severity {
            mean_loss,
            median_loss: median(amounts),
            max_loss: max(amounts),
            total_loss: primitive_loss,
            loss_share: (total_loss > 0.0).then(|| primitive_loss / total_loss),
            severity_index: match (mean_loss, max_mean) {
                (Some(m), Some(top)) if top > 0.0 => Some(m / top),
                (Some(_), Some(_)) => Some(0.0),
                _ => None,
            },
        };

        summaries.push(BaseRateSummary {
            primitive,
            n,
            share_of_exploits: (total_exploits > 0).then(|| n as f64 / total_exploits as f64),
            base_rate,
            base_rate_bps: base_rate * 10_000.0,
            interval,
            severity,
        });
    }

    tracing::info!(
        total_exploits,
        vault_years,
        method = config.interval_method.as_str(),
        "Estimated base rates"
    );

    Ok(BaseRateReport {
        exposure,
        vault_years,
        total_exploits,
        total_loss,
        confidence_level: config.confidence_level,
        interval_method: config.interval_method,
        summaries,
    })
}
