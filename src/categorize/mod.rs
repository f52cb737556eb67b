// Rule-based exploit categorization
//
// Each exploit's free-text technique description is mapped to exactly one
// root-cause primitive. Keyword rules are configuration (TOML), evaluated in a
// fixed priority order:
//
//     GOVERNANCE > ORACLE > OPERATIONAL > CONTRACT
//
// The first rule with any keyword contained in the normalized text wins.
// Unmatched text falls back to CONTRACT, the most general logic-failure
// bucket. Fallbacks are counted in `CategorizationSummary` so rule coverage
// can be audited.

mod definition;
mod registry;
mod summary;

pub use definition::{normalize_text, KeywordRule, RuleFile};
pub use registry::{Categorizer, Classification};
pub use summary::{label_drift, CategorizationSummary, LabelDrift};
