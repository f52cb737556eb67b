//! Error taxonomy for the categorize/estimate pipeline
//!
//! Unclassifiable text and empty categories are deliberately absent: both are
//! recoverable outcomes (fallback label, `None` severity) rather than errors.

use thiserror::Error;

/// Errors raised by loading, categorization, estimation and caching
#[derive(Error, Debug)]
pub enum VaultRiskError {
    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("Insufficient exposure data (vaults={vaults}, years={years}): {reason}")]
    InsufficientExposure {
        vaults: u64,
        years: f64,
        reason: String,
    },

    #[error("Invalid probability for {label}: {value} (must be in [0, 1])")]
    InvalidProbability { label: String, value: f64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid keyword rules: {0}")]
    InvalidRules(String),

    #[error("Cached results do not match recomputation: {0}")]
    ArtifactMismatch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for vaultrisk operations
pub type Result<T> = std::result::Result<T, VaultRiskError>;

impl VaultRiskError {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            line,
            reason: reason.into(),
        }
    }
}
