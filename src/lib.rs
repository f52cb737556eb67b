//! vaultrisk - root-cause categorization and base rates for DeFi exploits
//!
//! This library maps historical exploit records to one of four risk
//! primitives (CONTRACT, OPERATIONAL, ORACLE, GOVERNANCE) with ordered keyword
//! rules, then estimates annualized per-vault failure probabilities with
//! confidence intervals and severity statistics.
//!
//! # Example
//! ```
//! use chrono::NaiveDate;
//! use std::collections::BTreeSet;
//! use vaultrisk::categorize::Categorizer;
//! use vaultrisk::estimate::{estimate, EstimatorConfig};
//! use vaultrisk::record::{ExploitRecord, Primitive};
//!
//! let categorizer = Categorizer::default_rules().unwrap();
//! let record = ExploitRecord::new(
//!     NaiveDate::from_ymd_opt(2020, 2, 15).unwrap(),
//!     "bZx",
//!     "Oracle manipulation via flash loan",
//!     350_000.0,
//!     BTreeSet::new(),
//! )
//! .unwrap();
//!
//! let exploits = categorizer.categorize_all([record]);
//! assert_eq!(exploits[0].primitive(), Primitive::Oracle);
//!
//! let report = estimate(&exploits, &EstimatorConfig::default()).unwrap();
//! assert_eq!(report.summary(Primitive::Oracle).unwrap().n, 1);
//! ```

pub mod artifact;
pub mod categorize;
pub mod cli;
pub mod config;
pub mod csv_output;
pub mod dataset;
pub mod error;
pub mod estimate;
pub mod json_output;
pub mod record;
