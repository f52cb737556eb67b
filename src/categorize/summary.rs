use crate::record::{CategorizedExploit, LabelSource, Primitive};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keyword-rule coverage over a categorized batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategorizationSummary {
    /// Total records
    pub total: usize,
    /// Records per primitive (all four keys always present)
    pub counts: BTreeMap<Primitive, usize>,
    /// Records per primitive that were labelled by the fallback path
    pub fallbacks: BTreeMap<Primitive, usize>,
    /// Records whose label was taken from the dataset
    pub stored_labels: usize,
    /// Hits per deciding keyword, keyed by primitive then keyword
    pub keyword_hits: BTreeMap<Primitive, BTreeMap<String, usize>>,
    /// Loss per primitive (USD)
    pub losses: BTreeMap<Primitive, f64>,
}

impl CategorizationSummary {
    /// Tally a categorized batch
    pub fn from_exploits(exploits: &[CategorizedExploit]) -> Self {
        let mut summary = Self {
            total: exploits.len(),
            ..Self::default()
        };
        for primitive in Primitive::ALL {
            summary.counts.insert(primitive, 0);
            summary.fallbacks.insert(primitive, 0);
            summary.losses.insert(primitive, 0.0);
        }

        for exploit in exploits {
            let primitive = exploit.primitive();
            *summary.counts.entry(primitive).or_default() += 1;
            *summary.losses.entry(primitive).or_default() += exploit.record().amount();

            match exploit.source() {
                LabelSource::Keyword(keyword) => {
                    *summary
                        .keyword_hits
                        .entry(primitive)
                        .or_default()
                        .entry(keyword.clone())
                        .or_default() += 1;
                }
                LabelSource::Fallback => {
                    *summary.fallbacks.entry(primitive).or_default() += 1;
                }
                LabelSource::Stored => summary.stored_labels += 1,
            }
        }

        summary
    }

    /// Number of records no keyword rule matched
    pub fn fallback_count(&self) -> usize {
        self.fallbacks.values().sum()
    }

    /// Fraction of records decided by a keyword (0 for an empty batch)
    pub fn keyword_coverage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let keyword_labelled = self.total - self.fallback_count() - self.stored_labels;
        keyword_labelled as f64 / self.total as f64
    }

    pub fn total_loss(&self) -> f64 {
        self.losses.values().sum()
    }

    /// Human-readable coverage table
    pub fn to_report_string(&self) -> String {
        let mut report = String::new();
        let total_loss = self.total_loss();

        report.push_str(&format!(
            "{:<15} {:>6} {:>7} {:>12} {:>7} {:>9}\n",
            "Primitive", "Count", "Share", "Loss ($M)", "Loss %", "Fallback"
        ));
        report.push_str(&format!("{}\n", "-".repeat(61)));

        for primitive in Primitive::ALL {
            let n = self.counts.get(&primitive).copied().unwrap_or(0);
            let loss = self.losses.get(&primitive).copied().unwrap_or(0.0);
            let fallback = self.fallbacks.get(&primitive).copied().unwrap_or(0);
            report.push_str(&format!(
                "{:<15} {:>6} {:>6.1}% {:>12.1} {:>6.1}% {:>9}\n",
                primitive.as_str(),
                n,
                ratio(n as f64, self.total as f64) * 100.0,
                loss / 1e6,
                ratio(loss, total_loss) * 100.0,
                fallback
            ));
        }

        report.push_str(&format!("{}\n", "-".repeat(61)));
        report.push_str(&format!(
            "{:<15} {:>6} {:>7} {:>12.1} {:>7} {:>9}\n",
            "TOTAL",
            self.total,
            "",
            total_loss / 1e6,
            "",
            self.fallback_count()
        ));

        report.push_str(&format!(
            "\nKeyword coverage: {:.1}% ({} fallback, {} stored)\n",
            self.keyword_coverage() * 100.0,
            self.fallback_count(),
            self.stored_labels
        ));

        for primitive in Primitive::ALL {
            let Some(hits) = self.keyword_hits.get(&primitive) else {
                continue;
            };
            let mut ranked: Vec<_> = hits.iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

            report.push_str(&format!("\n{}:\n", primitive));
            for (keyword, count) in ranked {
                report.push_str(&format!("  {:<24} {:>5}\n", keyword, count));
            }
        }

        report
    }
}

fn ratio(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole
    } else {
        0.0
    }
}

/// A record whose recomputed label differs from the label shipped with it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelDrift {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub stored: Primitive,
    pub recomputed: Primitive,
}

/// Compare recomputed labels against stored ones
///
/// Records without a stored label are ignored.
pub fn label_drift(exploits: &[CategorizedExploit]) -> Vec<LabelDrift> {
    exploits
        .iter()
        .filter_map(|exploit| {
            let stored = exploit.record().stored_primitive()?;
            (stored != exploit.primitive()).then(|| LabelDrift {
                name: exploit.record().name().to_string(),
                line: exploit.record().source_line(),
                stored,
                recomputed: exploit.primitive(),
            })
        })
        .collect()
}
