// Base-rate estimation over a categorized exploit corpus
//
// Exposure is N vaults observed for T years. For each primitive:
//
//     base_rate = n / (N·T)
//
// with a binomial confidence interval (trials = N·T) and loss severity
// statistics. Composite risk combines per-primitive probabilities for a single
// vault under an independence assumption.

mod composite;
mod config;
mod estimator;
mod sensitivity;
mod statistics;

pub use composite::{
    combine_risks, combined_failure_probability, ranking_report, CompositeRisk,
    ProfileAssessment, ProfileSet, VaultProfile,
};
pub use config::{EstimatorConfig, Exposure, IntervalMethod};
pub use estimator::{estimate, BaseRateReport, BaseRateSummary, Severity};
pub use sensitivity::{
    sensitivity_analysis, SensitivityRow, SensitivityTable, DEFAULT_UNIVERSE_SIZES,
};
pub use statistics::{binomial_interval, max, mean, median, z_score, ConfidenceInterval};

#[cfg(test)]
mod tests;
