//! CSV output format for base-rate reports
//!
//! `--format csv`: one row per primitive, for spreadsheet analysis.

use crate::estimate::{BaseRateReport, ProfileAssessment};
use crate::record::Primitive;

/// Escape CSV field (handle commas, quotes, newlines)
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Base-rate table, one row per primitive in canonical order
pub fn base_rates_csv(report: &BaseRateReport) -> String {
    let mut output = String::new();
    output.push_str(
        "primitive,n,share_of_exploits,base_rate,base_rate_bps,ci_lower,ci_upper,\
         mean_loss,median_loss,max_loss,total_loss,loss_share,severity_index\n",
    );

    for s in &report.summaries {
        let fields = [
            s.primitive.as_str().to_string(),
            s.n.to_string(),
            optional(s.share_of_exploits),
            s.base_rate.to_string(),
            s.base_rate_bps.to_string(),
            s.interval.lower.to_string(),
            s.interval.upper.to_string(),
            optional(s.severity.mean_loss),
            optional(s.severity.median_loss),
            optional(s.severity.max_loss),
            s.severity.total_loss.to_string(),
            optional(s.severity.loss_share),
            optional(s.severity.severity_index),
        ];
        output.push_str(&fields.join(","));
        output.push('\n');
    }

    output
}

/// Ranked vault profiles with per-primitive probabilities
pub fn profiles_csv(assessments: &[ProfileAssessment]) -> String {
    let mut output = String::from("profile,combined_risk,odds");
    for primitive in Primitive::ALL {
        output.push_str(&format!(",p_{}", primitive.as_str().to_lowercase()));
    }
    output.push('\n');

    for assessment in assessments {
        output.push_str(&escape_field(&assessment.name));
        output.push(',');
        output.push_str(&assessment.risk.combined_risk.to_string());
        output.push(',');
        output.push_str(&escape_field(&assessment.risk.odds()));
        for primitive in Primitive::ALL {
            let p = assessment
                .risk
                .probabilities
                .get(&primitive)
                .copied()
                .unwrap_or(0.0);
            output.push(',');
            output.push_str(&p.to_string());
        }
        output.push('\n');
    }

    output
}
