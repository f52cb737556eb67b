// End-to-end tests for the vaultrisk binary against the sample exploit corpus

use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/exploits_sample.csv")
}

fn vaultrisk() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("vaultrisk");
    cmd.arg("--csv").arg(fixture());
    cmd
}

// ============================================================================
// base-rates
// ============================================================================

#[test]
fn test_base_rates_text_report() {
    vaultrisk()
        .arg("base-rates")
        .assert()
        .success()
        .stdout(predicate::str::contains("Loaded 9 exploits"))
        .stdout(predicate::str::contains("1 below"))
        .stdout(predicate::str::contains("Base rates (N=500, T=9.56 years"))
        .stdout(predicate::str::contains("95% CI (wilson)"))
        .stdout(predicate::str::contains("GOVERNANCE"))
        .stdout(predicate::str::contains("TOTAL"));
}

#[test]
fn test_base_rates_json_counts() {
    let output = vaultrisk()
        .args(["base-rates", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["format"], "vaultrisk-json-v1");
    assert_eq!(value["dataset"]["records"], 9);
    assert_eq!(value["dataset"]["below_minimum"], 1);

    let summaries = value["base_rates"]["summaries"].as_array().unwrap();
    let counts: Vec<_> = summaries.iter().map(|s| s["n"].as_u64().unwrap()).collect();
    assert_eq!(counts, vec![4, 2, 2, 1]);
    assert_eq!(counts.iter().sum::<u64>(), 9);

    let contract_rate = summaries[0]["base_rate"].as_f64().unwrap();
    assert!((contract_rate - 4.0 / 4780.0).abs() < 1e-12);
}

#[test]
fn test_base_rates_csv_output() {
    vaultrisk()
        .args(["base-rates", "--format", "csv", "--vaults", "1000"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "primitive,n,share_of_exploits,base_rate,base_rate_bps",
        ))
        .stdout(predicate::str::contains("GOVERNANCE,1,"));
}

#[test]
fn test_base_rates_sensitivity() {
    vaultrisk()
        .args(["base-rates", "--sensitivity"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sensitivity to protocol universe size"))
        .stdout(predicate::str::contains("C/O ratio"))
        .stdout(predicate::str::contains("2.00x"));
}

#[test]
fn test_base_rates_clopper_pearson_at_99() {
    vaultrisk()
        .args([
            "base-rates",
            "--interval",
            "clopper-pearson",
            "--confidence",
            "0.99",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("99% CI (clopper-pearson)"));
}

#[test]
fn test_zero_exposure_fails() {
    vaultrisk()
        .args(["base-rates", "--vaults", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Insufficient exposure"));
}

#[test]
fn test_invalid_confidence_fails() {
    vaultrisk()
        .args(["base-rates", "--confidence", "1.5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("confidence_level"));
}

#[test]
fn test_trust_labels_matches_recategorization() {
    let recomputed = vaultrisk()
        .args(["base-rates", "--format", "csv"])
        .output()
        .unwrap();
    let trusted = vaultrisk()
        .args(["base-rates", "--format", "csv", "--trust-labels"])
        .output()
        .unwrap();
    assert!(recomputed.status.success());
    assert_eq!(recomputed.stdout, trusted.stdout);
}

// ============================================================================
// Results artifact
// ============================================================================

#[test]
fn test_save_then_verify_cache() {
    let dir = TempDir::new().unwrap();
    let artifact = dir.path().join("base_rates.json");

    vaultrisk()
        .args(["base-rates", "--format", "csv", "--save"])
        .arg(&artifact)
        .assert()
        .success();
    assert!(artifact.exists());

    vaultrisk()
        .args(["base-rates", "--format", "csv", "--verify-cache"])
        .arg(&artifact)
        .assert()
        .success()
        .stderr(predicate::str::contains("verified"));
}

#[test]
fn test_verify_cache_detects_exposure_change() {
    let dir = TempDir::new().unwrap();
    let artifact = dir.path().join("base_rates.json");

    vaultrisk()
        .args(["base-rates", "--format", "csv", "--save"])
        .arg(&artifact)
        .assert()
        .success();

    vaultrisk()
        .args(["base-rates", "--vaults", "800", "--verify-cache"])
        .arg(&artifact)
        .assert()
        .failure()
        .stderr(predicate::str::contains("stale"));
}

#[test]
fn test_verify_cache_detects_tampering() {
    let dir = TempDir::new().unwrap();
    let artifact = dir.path().join("base_rates.json");

    vaultrisk()
        .args(["base-rates", "--format", "csv", "--save"])
        .arg(&artifact)
        .assert()
        .success();

    let mut value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&artifact).unwrap()).unwrap();
    value["base_rates"]["ORACLE"]["n_exploits"] = serde_json::json!(3);
    fs::write(&artifact, serde_json::to_string(&value).unwrap()).unwrap();

    vaultrisk()
        .args(["base-rates", "--verify-cache"])
        .arg(&artifact)
        .assert()
        .failure()
        .stderr(predicate::str::contains("ORACLE"));
}

// ============================================================================
// categorize
// ============================================================================

#[test]
fn test_categorize_lists_records() {
    vaultrisk()
        .arg("categorize")
        .assert()
        .success()
        .stdout(predicate::str::contains("Beanstalk"))
        .stdout(predicate::str::contains("governance attack"))
        .stdout(predicate::str::contains("(fallback)"))
        .stdout(predicate::str::contains("Tiny Farm").not());
}

#[test]
fn test_categorize_summary() {
    vaultrisk()
        .args(["categorize", "--summary"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Keyword coverage: 88.9%"))
        .stdout(predicate::str::contains("Fallback"));
}

#[test]
fn test_verify_labels_on_consistent_corpus() {
    vaultrisk()
        .args(["categorize", "--summary", "--verify-labels"])
        .assert()
        .success()
        .stderr(predicate::str::contains("All 9 stored labels reproduced"));
}

#[test]
fn test_verify_labels_reports_drift() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("drift.csv");
    fs::write(
        &csv,
        "date,name,technique,amount,primitive\n\
         2022-04-17,Beanstalk,Governance attack,182000000,CONTRACT\n",
    )
    .unwrap();

    assert_cmd::cargo::cargo_bin_cmd!("vaultrisk")
        .arg("--csv")
        .arg(&csv)
        .args(["categorize", "--verify-labels"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("stored CONTRACT but categorizes as GOVERNANCE"));
}

#[test]
fn test_custom_rules_file() {
    let dir = TempDir::new().unwrap();
    let rules = dir.path().join("rules.toml");
    fs::write(
        &rules,
        r#"
fallback = "OPERATIONAL"

[[rule]]
primitive = "GOVERNANCE"
keywords = ["governance"]

[[rule]]
primitive = "ORACLE"
keywords = ["oracle"]

[[rule]]
primitive = "OPERATIONAL"
keywords = ["private key"]

[[rule]]
primitive = "CONTRACT"
keywords = ["reentrancy"]
"#,
    )
    .unwrap();

    let output = vaultrisk()
        .arg("--rules")
        .arg(&rules)
        .args(["base-rates", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    // Unmatched techniques now land in OPERATIONAL
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let summaries = value["base_rates"]["summaries"].as_array().unwrap();
    let counts: Vec<_> = summaries.iter().map(|s| s["n"].as_u64().unwrap()).collect();
    assert_eq!(counts, vec![1, 5, 2, 1]);
}

#[test]
fn test_invalid_rules_file_fails() {
    let dir = TempDir::new().unwrap();
    let rules = dir.path().join("rules.toml");
    fs::write(
        &rules,
        "[[rule]]\nprimitive = \"ORACLE\"\nkeywords = [\"oracle\"]\n",
    )
    .unwrap();

    vaultrisk()
        .arg("--rules")
        .arg(&rules)
        .arg("categorize")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load keyword rules"));
}

// ============================================================================
// profile
// ============================================================================

#[test]
fn test_profile_ranking() {
    vaultrisk()
        .arg("profile")
        .assert()
        .success()
        .stdout(predicate::str::contains("Strategy"))
        .stdout(predicate::str::contains("Curve 3-Pool LP"))
        .stdout(predicate::str::contains("New Protocol Yield Farm"))
        .stdout(predicate::str::contains("1 in "));
}

#[test]
fn test_profile_csv() {
    vaultrisk()
        .args(["profile", "--format", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("profile,combined_risk,odds"));
}

// ============================================================================
// Loader errors and configuration
// ============================================================================

#[test]
fn test_missing_dataset_fails() {
    assert_cmd::cargo::cargo_bin_cmd!("vaultrisk")
        .args(["--csv", "/nonexistent/exploits.csv", "base-rates"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read exploit dataset"));
}

#[test]
fn test_malformed_rows_reported_then_strict_fails() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("bad.csv");
    fs::write(
        &csv,
        "date,name,technique,amount\n\
         2021-01-01,Good,Reentrancy,1000000\n\
         yesterday,Bad,Reentrancy,1000000\n",
    )
    .unwrap();

    assert_cmd::cargo::cargo_bin_cmd!("vaultrisk")
        .arg("--csv")
        .arg(&csv)
        .arg("base-rates")
        .assert()
        .success()
        .stderr(predicate::str::contains("line 3"))
        .stdout(predicate::str::contains("Loaded 1 exploits"));

    assert_cmd::cargo::cargo_bin_cmd!("vaultrisk")
        .arg("--csv")
        .arg(&csv)
        .args(["--strict", "base-rates"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Malformed record at line 3"));
}

#[test]
fn test_config_file_overrides_defaults() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("vaultrisk.toml");
    fs::write(
        &config,
        "[estimator]\nvaults = 800\n\n[dataset]\nmin_amount_usd = 0\n",
    )
    .unwrap();

    vaultrisk()
        .arg("--config")
        .arg(&config)
        .arg("base-rates")
        .assert()
        .success()
        .stdout(predicate::str::contains("Loaded 10 exploits"))
        .stdout(predicate::str::contains("N=800"));
}

#[test]
fn test_cli_flag_beats_config_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("vaultrisk.toml");
    fs::write(&config, "[estimator]\nvaults = 800\n").unwrap();

    vaultrisk()
        .arg("--config")
        .arg(&config)
        .args(["base-rates", "--vaults", "300"])
        .assert()
        .success()
        .stdout(predicate::str::contains("N=300"));
}
