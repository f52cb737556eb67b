//! Exploit records and the four root-cause primitives

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Root-cause category of an exploit
///
/// Variant order is the canonical reporting order and is relied on by every
/// `BTreeMap<Primitive, _>` in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Primitive {
    /// Code-level failure: reentrancy, logic errors, flash-loan driven bugs
    Contract,
    /// Key compromise, bridge and infrastructure failures
    Operational,
    /// Price feed and oracle manipulation
    Oracle,
    /// Rug pulls, malicious upgrades, governance takeover
    Governance,
}

impl Primitive {
    /// All primitives in canonical reporting order
    pub const ALL: [Primitive; 4] = [
        Primitive::Contract,
        Primitive::Operational,
        Primitive::Oracle,
        Primitive::Governance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Primitive::Contract => "CONTRACT",
            Primitive::Operational => "OPERATIONAL",
            Primitive::Oracle => "ORACLE",
            Primitive::Governance => "GOVERNANCE",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Primitive {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CONTRACT" => Ok(Primitive::Contract),
            "OPERATIONAL" => Ok(Primitive::Operational),
            "ORACLE" => Ok(Primitive::Oracle),
            "GOVERNANCE" => Ok(Primitive::Governance),
            other => Err(format!(
                "unknown primitive '{}' (expected CONTRACT, OPERATIONAL, ORACLE or GOVERNANCE)",
                other
            )),
        }
    }
}

/// A single historical exploit, validated at construction and never mutated
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExploitRecord {
    date: NaiveDate,
    name: String,
    technique: String,
    /// Loss in USD
    amount: f64,
    chains: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stored_primitive: Option<Primitive>,
    #[serde(skip)]
    source_line: Option<usize>,
}

impl ExploitRecord {
    /// Create a record, rejecting negative or non-finite amounts
    ///
    /// An empty technique is accepted: categorization resolves it through the
    /// fallback primitive.
    pub fn new(
        date: NaiveDate,
        name: impl Into<String>,
        technique: impl Into<String>,
        amount: f64,
        chains: BTreeSet<String>,
    ) -> Result<Self, String> {
        if !amount.is_finite() {
            return Err(format!("amount must be finite, got {}", amount));
        }
        if amount < 0.0 {
            return Err(format!("amount must be non-negative, got {}", amount));
        }

        Ok(Self {
            date,
            name: name.into(),
            technique: technique.into(),
            amount,
            chains,
            target_type: None,
            stored_primitive: None,
            source_line: None,
        })
    }

    /// Attach the auxiliary target type consulted by the categorizer
    pub fn with_target_type(mut self, target_type: impl Into<String>) -> Self {
        let target_type = target_type.into();
        self.target_type = (!target_type.trim().is_empty()).then_some(target_type);
        self
    }

    /// Attach the label shipped with the dataset
    pub fn with_stored_primitive(mut self, primitive: Primitive) -> Self {
        self.stored_primitive = Some(primitive);
        self
    }

    /// Remember the CSV line this record came from (for error reports)
    pub fn with_source_line(mut self, line: usize) -> Self {
        self.source_line = Some(line);
        self
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn technique(&self) -> &str {
        &self.technique
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// Loss in millions of USD
    pub fn amount_m(&self) -> f64 {
        self.amount / 1e6
    }

    pub fn chains(&self) -> &BTreeSet<String> {
        &self.chains
    }

    pub fn target_type(&self) -> Option<&str> {
        self.target_type.as_deref()
    }

    pub fn stored_primitive(&self) -> Option<Primitive> {
        self.stored_primitive
    }

    pub fn source_line(&self) -> Option<usize> {
        self.source_line
    }
}

/// How a categorized exploit obtained its label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "keyword", rename_all = "snake_case")]
pub enum LabelSource {
    /// A keyword rule matched
    Keyword(String),
    /// No rule matched; the fallback primitive was assigned
    Fallback,
    /// The label was taken from the dataset as-is
    Stored,
}

/// An exploit record with exactly one assigned primitive
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorizedExploit {
    #[serde(flatten)]
    record: ExploitRecord,
    primitive: Primitive,
    source: LabelSource,
}

impl CategorizedExploit {
    pub(crate) fn new(record: ExploitRecord, primitive: Primitive, source: LabelSource) -> Self {
        Self {
            record,
            primitive,
            source,
        }
    }

    /// Trust an externally supplied label instead of running the categorizer
    pub fn with_label(record: ExploitRecord, primitive: Primitive) -> Self {
        Self::new(record, primitive, LabelSource::Stored)
    }

    pub fn record(&self) -> &ExploitRecord {
        &self.record
    }

    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    pub fn source(&self) -> &LabelSource {
        &self.source
    }

    /// True when no keyword rule matched and the fallback label was used
    pub fn is_fallback(&self) -> bool {
        self.source == LabelSource::Fallback
    }
}
