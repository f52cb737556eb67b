use super::*;
use crate::error::VaultRiskError;
use crate::record::{CategorizedExploit, ExploitRecord, Primitive};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

fn corpus(counts: &[(Primitive, usize)]) -> Vec<CategorizedExploit> {
    let date = NaiveDate::from_ymd_opt(2022, 3, 29).unwrap();
    let mut exploits = Vec::new();
    for &(primitive, count) in counts {
        for i in 0..count {
            let record = ExploitRecord::new(
                date,
                format!("{}-{}", primitive, i),
                "unspecified",
                (i as f64 + 1.0) * 1e6,
                BTreeSet::new(),
            )
            .unwrap();
            exploits.push(CategorizedExploit::with_label(record, primitive));
        }
    }
    exploits
}

// Calibration corpus: 292 CONTRACT, 92 OPERATIONAL, 61 ORACLE, 3 GOVERNANCE
fn calibration_corpus() -> Vec<CategorizedExploit> {
    corpus(&[
        (Primitive::Contract, 292),
        (Primitive::Operational, 92),
        (Primitive::Oracle, 61),
        (Primitive::Governance, 3),
    ])
}

#[test]
fn test_contract_base_rate_calibration() {
    let report = estimate(&calibration_corpus(), &EstimatorConfig::default()).unwrap();
    let contract = report.summary(Primitive::Contract).unwrap();

    assert_eq!(contract.n, 292);
    assert!((contract.base_rate - 0.0611).abs() < 5e-5, "rate = {}", contract.base_rate);
    assert!((contract.base_rate_bps - 610.9).abs() < 0.5);
    assert!(contract.interval.contains(contract.base_rate));
}

#[test]
fn test_share_and_rate_are_distinct() {
    let report = estimate(&calibration_corpus(), &EstimatorConfig::default()).unwrap();
    let contract = report.summary(Primitive::Contract).unwrap();

    let share = contract.share_of_exploits.unwrap();
    assert!((share - 292.0 / 448.0).abs() < 1e-12);
    assert!(share > contract.base_rate * 10.0);
}

#[test]
fn test_counts_sum_to_total() {
    let exploits = calibration_corpus();
    let report = estimate(&exploits, &EstimatorConfig::default()).unwrap();
    let total: usize = report.summaries.iter().map(|s| s.n).sum();
    assert_eq!(total, exploits.len());
    assert_eq!(report.total_exploits, exploits.len());
}

#[test]
fn test_summaries_in_canonical_order() {
    let report = estimate(&calibration_corpus(), &EstimatorConfig::default()).unwrap();
    let order: Vec<_> = report.summaries.iter().map(|s| s.primitive).collect();
    assert_eq!(order, Primitive::ALL.to_vec());
}

#[test]
fn test_rates_and_intervals_in_unit_range() {
    for method in [
        IntervalMethod::Wilson,
        IntervalMethod::Normal,
        IntervalMethod::ClopperPearson,
    ] {
        let config = EstimatorConfig {
            interval_method: method,
            ..EstimatorConfig::default()
        };
        let report = estimate(&calibration_corpus(), &config).unwrap();
        for summary in &report.summaries {
            assert!((0.0..=1.0).contains(&summary.base_rate));
            assert!(0.0 <= summary.interval.lower);
            assert!(summary.interval.lower <= summary.interval.upper);
            assert!(summary.interval.upper <= 1.0);
        }
    }
}

#[test]
fn test_sparse_governance_interval_is_wide() {
    let report = estimate(&calibration_corpus(), &EstimatorConfig::default()).unwrap();
    let governance = report.summary(Primitive::Governance).unwrap();

    assert_eq!(governance.n, 3);
    let relative_width = governance.interval.width() / governance.base_rate;
    assert!(relative_width > 1.0, "relative width = {}", relative_width);
}

#[test]
fn test_higher_confidence_widens_interval() {
    let exploits = calibration_corpus();
    let narrow = estimate(&exploits, &EstimatorConfig::default()).unwrap();
    let wide = estimate(&exploits, &EstimatorConfig::conservative()).unwrap();

    for primitive in Primitive::ALL {
        let a = narrow.summary(primitive).unwrap().interval;
        let b = wide.summary(primitive).unwrap().interval;
        assert!(b.width() >= a.width(), "{}", primitive);
    }
}

#[test]
fn test_zero_count_category() {
    let exploits = corpus(&[(Primitive::Contract, 10)]);
    let report = estimate(&exploits, &EstimatorConfig::default()).unwrap();
    let oracle = report.summary(Primitive::Oracle).unwrap();

    assert_eq!(oracle.base_rate, 0.0);
    assert_eq!(oracle.interval.lower, 0.0);
    assert!(oracle.interval.upper.is_finite());
    assert!(oracle.severity.mean_loss.is_none());
}

#[test]
fn test_zero_exposure() {
    let config = EstimatorConfig {
        years: 0.0,
        ..EstimatorConfig::default()
    };
    assert!(matches!(
        estimate(&calibration_corpus(), &config),
        Err(VaultRiskError::InsufficientExposure { .. })
    ));
}

#[test]
fn test_estimate_is_deterministic() {
    let exploits = calibration_corpus();
    let a = estimate(&exploits, &EstimatorConfig::default()).unwrap();
    let b = estimate(&exploits, &EstimatorConfig::default()).unwrap();
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn test_estimate_ignores_record_order() {
    let exploits = calibration_corpus();
    let mut reversed = exploits.clone();
    reversed.reverse();

    let a = estimate(&exploits, &EstimatorConfig::default()).unwrap();
    let b = estimate(&reversed, &EstimatorConfig::default()).unwrap();
    assert_eq!(a.base_rates(), b.base_rates());
}

#[test]
fn test_composite_of_published_rates() {
    let rates = [0.0611, 0.0193, 0.0128, 0.0006];
    let p = combined_failure_probability(&rates).unwrap();
    let expected: f64 = 1.0 - rates.iter().map(|r| 1.0 - r).product::<f64>();

    assert!((p - expected).abs() < 1e-15);
    assert!((p - 0.0938).abs() < 3e-3, "p = {}", p);
}

#[test]
fn test_profile_applies_multipliers() {
    let report = estimate(&calibration_corpus(), &EstimatorConfig::default()).unwrap();
    let mut multipliers = BTreeMap::new();
    multipliers.insert(Primitive::Contract, 2.0);
    let profile = VaultProfile {
        name: "double contract".to_string(),
        description: String::new(),
        multipliers,
    };

    let assessment = profile.assess(&report).unwrap();
    let contract_rate = report.summary(Primitive::Contract).unwrap().base_rate;
    assert!((assessment.risk.combined_risk - 2.0 * contract_rate).abs() < 1e-12);
    assert_eq!(assessment.risk.probabilities[&Primitive::Oracle], 0.0);
    assert!((assessment.risk.contributions[&Primitive::Contract] - 1.0).abs() < 1e-12);
}

#[test]
fn test_negative_multiplier_rejected() {
    let report = estimate(&calibration_corpus(), &EstimatorConfig::default()).unwrap();
    let mut multipliers = BTreeMap::new();
    multipliers.insert(Primitive::Oracle, -1.0);
    let profile = VaultProfile {
        name: "broken".to_string(),
        description: String::new(),
        multipliers,
    };
    assert!(matches!(
        profile.assess(&report),
        Err(VaultRiskError::InvalidConfig(_))
    ));
}

#[test]
fn test_oversized_multiplier_is_invalid_probability() {
    let report = estimate(&calibration_corpus(), &EstimatorConfig::default()).unwrap();
    let mut multipliers = BTreeMap::new();
    multipliers.insert(Primitive::Contract, 100.0);
    let profile = VaultProfile {
        name: "leveraged".to_string(),
        description: String::new(),
        multipliers,
    };
    let err = profile.assess(&report).unwrap_err();
    assert!(matches!(err, VaultRiskError::InvalidProbability { .. }));
    assert!(err.to_string().contains("leveraged"));
}

#[test]
fn test_default_profiles_rank_farm_last() {
    let report = estimate(&calibration_corpus(), &EstimatorConfig::default()).unwrap();
    let ranked = ProfileSet::default_profiles()
        .unwrap()
        .rank(&report)
        .unwrap();

    assert_eq!(ranked.len(), 3);
    assert_eq!(ranked[2].name, "New Protocol Yield Farm");
    assert!(ranked
        .windows(2)
        .all(|w| w[0].risk.combined_risk <= w[1].risk.combined_risk));

    let text = ranking_report(&ranked);
    assert!(text.contains("1 in "));
    assert!(text.contains("Curve 3-Pool LP"));
}

#[test]
fn test_contributions_sum_below_one() {
    let report = estimate(&calibration_corpus(), &EstimatorConfig::default()).unwrap();
    for assessment in ProfileSet::default_profiles()
        .unwrap()
        .rank(&report)
        .unwrap()
    {
        let total: f64 = assessment.risk.contributions.values().sum();
        assert!(total <= 1.0 + 1e-12, "{} sums to {}", assessment.name, total);
        assert!(total > 0.9);
    }
}
