use crate::categorize::definition::{normalize_text, KeywordRule, RuleFile};
use crate::error::{Result, VaultRiskError};
use crate::record::{CategorizedExploit, ExploitRecord, LabelSource, Primitive};
use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

/// A keyword rule with its automaton built over the normalized keywords
#[derive(Debug)]
struct CompiledRule {
    rule: KeywordRule,
    automaton: AhoCorasick,
}

impl CompiledRule {
    /// Index of the earliest-declared keyword occurring in `text`
    fn first_keyword(&self, text: &str) -> Option<usize> {
        self.automaton
            .find_overlapping_iter(text)
            .map(|m| m.pattern().as_usize())
            .min()
    }
}

/// Outcome of classifying one technique description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification<'a> {
    pub primitive: Primitive,
    /// Declared keyword that decided the label, `None` for the fallback path
    pub keyword: Option<&'a str>,
}

impl Classification<'_> {
    pub fn is_fallback(&self) -> bool {
        self.keyword.is_none()
    }
}

/// Ordered keyword rules mapping technique text to a primitive
///
/// # Example Usage
/// ```
/// use vaultrisk::categorize::Categorizer;
/// use vaultrisk::record::Primitive;
///
/// let categorizer = Categorizer::default_rules()?;
/// let result = categorizer.classify("Governance-enabled oracle manipulation", None);
/// assert_eq!(result.primitive, Primitive::Governance);
/// # Ok::<(), vaultrisk::error::VaultRiskError>(())
/// ```
#[derive(Debug)]
pub struct Categorizer {
    /// Rules in priority order
    rules: Vec<CompiledRule>,
    fallback: Primitive,
}

impl Categorizer {
    /// Load a rule table from a TOML file
    ///
    /// # Errors
    /// Returns error if the file is unreadable, is not valid TOML, or the rule
    /// table is inconsistent (see [`Categorizer::from_rule_file`]).
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Parse a rule table from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: RuleFile = toml::from_str(content)?;
        Self::from_rule_file(file)
    }

    /// Load the rule table compiled into the binary
    pub fn default_rules() -> Result<Self> {
        const DEFAULT_TOML: &str = include_str!("../../rules-default.toml");
        Self::from_toml_str(DEFAULT_TOML)
    }

    /// Validate a rule table and build one automaton per primitive
    ///
    /// Every primitive must have exactly one rule, no keyword may normalize to
    /// the empty string, and no keyword may appear under two primitives.
    pub fn from_rule_file(file: RuleFile) -> Result<Self> {
        let mut seen_primitives = BTreeSet::new();
        for rule in &file.rules {
            if !seen_primitives.insert(rule.primitive) {
                return Err(VaultRiskError::InvalidRules(format!(
                    "Duplicate rule for primitive '{}'",
                    rule.primitive
                )));
            }
        }
        if let Some(missing) = Primitive::ALL
            .iter()
            .find(|p| !seen_primitives.contains(p))
        {
            return Err(VaultRiskError::InvalidRules(format!(
                "Missing rule for primitive '{}'",
                missing
            )));
        }

        let mut keyword_owner: HashMap<String, Primitive> = HashMap::new();
        let mut rules = Vec::with_capacity(file.rules.len());

        for rule in file.rules {
            let keywords = rule.normalized_keywords();

            for (declared, normalized) in rule.keywords.iter().zip(&keywords) {
                if normalized.is_empty() {
                    return Err(VaultRiskError::InvalidRules(format!(
                        "Keyword '{}' in rule '{}' is empty after normalization",
                        declared, rule.primitive
                    )));
                }
                if let Some(existing) = keyword_owner.insert(normalized.clone(), rule.primitive) {
                    if existing != rule.primitive {
                        return Err(VaultRiskError::InvalidRules(format!(
                            "Duplicate keyword '{}' in rules '{}' and '{}'",
                            declared, existing, rule.primitive
                        )));
                    }
                }
            }

            let automaton = AhoCorasickBuilder::new()
                .match_kind(MatchKind::Standard)
                .build(&keywords)
                .map_err(|e| {
                    VaultRiskError::InvalidRules(format!(
                        "Failed to build matcher for '{}': {}",
                        rule.primitive, e
                    ))
                })?;

            rules.push(CompiledRule { rule, automaton });
        }

        tracing::debug!(
            rules = rules.len(),
            fallback = %file.fallback,
            "Keyword rules loaded"
        );

        Ok(Self {
            rules,
            fallback: file.fallback,
        })
    }

    /// Classify a technique description (plus optional target type)
    ///
    /// Pure and total: the first rule in priority order with a matching
    /// keyword decides; otherwise the fallback primitive is returned.
    pub fn classify(&self, technique: &str, target_type: Option<&str>) -> Classification<'_> {
        let text = match target_type {
            Some(target) => normalize_text(&format!("{} {}", technique, target)),
            None => normalize_text(technique),
        };

        for compiled in &self.rules {
            if let Some(index) = compiled.first_keyword(&text) {
                return Classification {
                    primitive: compiled.rule.primitive,
                    keyword: Some(compiled.rule.keywords[index].as_str()),
                };
            }
        }

        Classification {
            primitive: self.fallback,
            keyword: None,
        }
    }

    /// Assign a primitive to one record
    pub fn categorize(&self, record: ExploitRecord) -> CategorizedExploit {
        let classification = self.classify(record.technique(), record.target_type());
        let primitive = classification.primitive;
        let source = match classification.keyword {
            Some(keyword) => LabelSource::Keyword(keyword.to_string()),
            None => {
                tracing::debug!(
                    name = record.name(),
                    technique = record.technique(),
                    fallback = %primitive,
                    "No keyword rule matched, using fallback primitive"
                );
                LabelSource::Fallback
            }
        };
        CategorizedExploit::new(record, primitive, source)
    }

    /// Assign a primitive to every record, preserving input order
    pub fn categorize_all<I>(&self, records: I) -> Vec<CategorizedExploit>
    where
        I: IntoIterator<Item = ExploitRecord>,
    {
        let categorized: Vec<_> = records.into_iter().map(|r| self.categorize(r)).collect();
        let fallbacks = categorized.iter().filter(|c| c.is_fallback()).count();
        tracing::info!(
            records = categorized.len(),
            fallbacks,
            "Categorized exploit records"
        );
        categorized
    }

    /// Primitives in evaluation order
    pub fn priority(&self) -> Vec<Primitive> {
        self.rules.iter().map(|c| c.rule.primitive).collect()
    }

    pub fn fallback(&self) -> Primitive {
        self.fallback
    }

    /// Get the rule for a primitive
    pub fn rule(&self, primitive: Primitive) -> Option<&KeywordRule> {
        self.rules
            .iter()
            .map(|c| &c.rule)
            .find(|r| r.primitive == primitive)
    }

    /// All rules in priority order
    pub fn rules(&self) -> impl Iterator<Item = &KeywordRule> {
        self.rules.iter().map(|c| &c.rule)
    }
}
