// Sensitivity of base rates to the protocol universe size N
//
// N is the least certain input of the exposure base. Every base rate scales
// as 1/N, so cross-primitive ratios do not depend on it.

use crate::error::Result;
use crate::estimate::config::EstimatorConfig;
use crate::estimate::estimator::estimate;
use crate::record::{CategorizedExploit, Primitive};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Universe sizes swept when none are given
pub const DEFAULT_UNIVERSE_SIZES: [u64; 4] = [300, 500, 800, 1000];

/// Base rates for one value of N
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityRow {
    pub vaults: u64,
    pub rates: BTreeMap<Primitive, f64>,
    /// CONTRACT rate / OPERATIONAL rate, `None` when OPERATIONAL is empty
    pub contract_operational_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityTable {
    pub years: f64,
    pub rows: Vec<SensitivityRow>,
}

/// Recompute base rates for each N in `universe_sizes`, holding T fixed
pub fn sensitivity_analysis(
    exploits: &[CategorizedExploit],
    config: &EstimatorConfig,
    universe_sizes: &[u64],
) -> Result<SensitivityTable> {
    let rows = universe_sizes
        .iter()
        .map(|&vaults| {
            let report = estimate(exploits, &config.with_vaults(vaults))?;
            let rates = report.base_rates();
            let contract = rates.get(&Primitive::Contract).copied().unwrap_or(0.0);
            let operational = rates.get(&Primitive::Operational).copied().unwrap_or(0.0);
            Ok(SensitivityRow {
                vaults,
                rates,
                contract_operational_ratio: (operational > 0.0).then(|| contract / operational),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(sizes = universe_sizes.len(), "Computed sensitivity table");

    Ok(SensitivityTable {
        years: config.years,
        rows,
    })
}

impl SensitivityTable {
    pub fn to_report_string(&self) -> String {
        let mut report = String::new();
        report.push_str(&format!(
            "Sensitivity to protocol universe size (T={} years)\n",
            self.years
        ));
        report.push_str(&format!("{:>6}", "N"));
        for primitive in Primitive::ALL {
            report.push_str(&format!(" {:>12}", primitive.as_str()));
        }
        report.push_str(&format!(" {:>12}\n", "C/O ratio"));
        report.push_str(&format!("{}\n", "-".repeat(6 + 13 * 5)));

        for row in &self.rows {
            report.push_str(&format!("{:>6}", row.vaults));
            for primitive in Primitive::ALL {
                let rate = row.rates.get(&primitive).copied().unwrap_or(0.0);
                report.push_str(&format!(" {:>11.2}%", rate * 100.0));
            }
            match row.contract_operational_ratio {
                Some(ratio) => report.push_str(&format!(" {:>11.2}x\n", ratio)),
                None => report.push_str(&format!(" {:>12}\n", "n/a")),
            }
        }

        report
    }
}
