use crate::record::Primitive;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Runs of anything that is not a lower-case letter or digit
static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid separator regex"));

/// Lower-case, collapse punctuation and whitespace runs to one space, trim
///
/// Applied to both keywords and technique text, so "Front-End" and
/// "front end" compare equal.
pub fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    SEPARATOR_RE.replace_all(&lowered, " ").trim().to_string()
}

/// Keyword set for one primitive
///
/// # Example TOML
/// ```toml
/// [[rule]]
/// primitive = "ORACLE"
/// description = "Price feed and oracle manipulation"
/// keywords = ["oracle", "price feed", "twap"]
/// ```
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct KeywordRule {
    /// Primitive assigned when any keyword matches
    pub primitive: Primitive,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Case-insensitive phrases matched as substrings of the normalized text
    pub keywords: Vec<String>,
}

impl KeywordRule {
    /// Keywords after normalization, in declaration order
    pub fn normalized_keywords(&self) -> Vec<String> {
        self.keywords.iter().map(|k| normalize_text(k)).collect()
    }
}

fn default_fallback() -> Primitive {
    Primitive::Contract
}

/// On-disk rule table: rules in priority order plus the fallback primitive
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RuleFile {
    #[serde(default = "default_fallback")]
    pub fallback: Primitive,

    #[serde(rename = "rule")]
    pub rules: Vec<KeywordRule>,
}
