//! Exploit dataset loader
//!
//! Reads a DeFiLlama-style CSV export into validated [`ExploitRecord`]s.
//!
//! - RFC 4180 quoting (quoted commas, doubled quotes, multi-line fields)
//! - Header names matched case-insensitively, column order free
//! - Malformed rows are collected in the [`LoadReport`], not fatal
//! - Rows below the de minimis threshold are skipped and counted

use crate::config::DatasetConfig;
use crate::error::{Result, VaultRiskError};
use crate::record::{ExploitRecord, Primitive};
use chrono::{DateTime, NaiveDate};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

/// A row that failed validation
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    /// 1-based line of the row in the file (header is line 1)
    pub line: usize,
    pub reason: String,
}

/// Loaded records plus everything that was dropped on the way
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub records: Vec<ExploitRecord>,
    pub rejected: Vec<RejectedRow>,
    /// Rows skipped by the de minimis filter
    pub below_minimum: usize,
    /// SHA-256 of the raw file contents (hex)
    pub fingerprint: String,
}

impl LoadReport {
    /// Fail on the first rejected row
    pub fn into_strict(self) -> Result<Self> {
        match self.rejected.first() {
            Some(row) => Err(VaultRiskError::malformed(row.line, row.reason.clone())),
            None => Ok(self),
        }
    }

    /// Years between the earliest and latest exploit dates
    pub fn observation_span_years(&self) -> Option<f64> {
        let first = self.records.iter().map(|r| r.date()).min()?;
        let last = self.records.iter().map(|r| r.date()).max()?;
        Some((last - first).num_days() as f64 / 365.25)
    }
}

/// Load and validate a CSV file
///
/// # Errors
/// Only an unreadable file is an error; bad rows land in `rejected`.
pub fn load_csv<P: AsRef<Path>>(path: P, config: &DatasetConfig) -> Result<LoadReport> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    tracing::debug!(path = %path.display(), bytes = content.len(), "Read exploit dataset");
    parse_csv(&content, config)
}

/// Parse CSV text already in memory
pub fn parse_csv(content: &str, config: &DatasetConfig) -> Result<LoadReport> {
    let fingerprint = hex::encode(Sha256::digest(content.as_bytes()));
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut rows = split_rows(content).into_iter();
    let (_, header) = rows
        .next()
        .ok_or_else(|| VaultRiskError::malformed(1, "dataset is empty (no header row)"))?;
    let header = header.map_err(|reason| VaultRiskError::malformed(1, reason))?;
    let columns = Columns::from_header(&header)?;

    let mut records = Vec::new();
    let mut rejected = Vec::new();
    let mut below_minimum = 0;

    for (line, fields) in rows {
        let parsed = match fields {
            Ok(fields) if fields.iter().all(|f| f.trim().is_empty()) => continue,
            Ok(fields) => columns.parse_row(&fields, config),
            Err(reason) => Err(reason),
        };
        match parsed {
            Ok(Some(record)) => records.push(record.with_source_line(line)),
            Ok(None) => below_minimum += 1,
            Err(reason) => {
                tracing::warn!(line, %reason, "Rejected exploit row");
                rejected.push(RejectedRow { line, reason });
            }
        }
    }

    tracing::info!(
        records = records.len(),
        rejected = rejected.len(),
        below_minimum,
        "Loaded exploit dataset"
    );

    Ok(LoadReport {
        records,
        rejected,
        below_minimum,
        fingerprint,
    })
}

/// A split row: its fields, or why the row could not be split
type SplitRow = std::result::Result<Vec<String>, String>;

/// Split CSV text into rows of fields, each tagged with its starting line
///
/// A quote only opens a quoted field at the start of a field; anywhere else
/// it is a literal character. A quoted field still open at end of input makes
/// the last row an error.
fn split_rows(content: &str) -> Vec<(usize, SplitRow)> {
    let mut rows = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut at_field_start = true;
    let mut line = 1;
    let mut row_start = 1;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if at_field_start => {
                in_quotes = true;
                at_field_start = false;
            }
            ',' => {
                fields.push(std::mem::take(&mut field));
                at_field_start = true;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                fields.push(std::mem::take(&mut field));
                rows.push((row_start, Ok(std::mem::take(&mut fields))));
                line += 1;
                row_start = line;
                at_field_start = true;
            }
            _ => {
                field.push(c);
                at_field_start = false;
            }
        }
    }

    if in_quotes {
        rows.push((row_start, Err("unterminated quoted field".to_string())));
    } else if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        rows.push((row_start, Ok(fields)));
    }

    rows
}

/// Column positions resolved from the header row
#[derive(Debug)]
struct Columns {
    width: usize,
    date: usize,
    name: usize,
    technique: usize,
    amount: Option<usize>,
    amount_m: Option<usize>,
    chain: Option<usize>,
    primitive: Option<usize>,
    target_type: Option<usize>,
}

impl Columns {
    fn from_header(header: &[String]) -> Result<Self> {
        let index: HashMap<String, usize> = header
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_lowercase(), i))
            .collect();
        let find = |names: &[&str]| names.iter().find_map(|n| index.get(*n).copied());
        let require = |names: &[&str]| {
            find(names).ok_or_else(|| {
                VaultRiskError::malformed(1, format!("missing required column '{}'", names[0]))
            })
        };

        let columns = Self {
            width: header.len(),
            date: require(&["date"])?,
            name: require(&["name"])?,
            technique: require(&["technique", "classification"])?,
            amount: find(&["amount"]),
            amount_m: find(&["amount_m"]),
            chain: find(&["chain", "chains"]),
            primitive: find(&["primitive"]),
            target_type: find(&["targettype", "target_type"]),
        };

        if columns.amount.is_none() && columns.amount_m.is_none() {
            return Err(VaultRiskError::malformed(
                1,
                "missing required column 'amount'",
            ));
        }
        Ok(columns)
    }

    /// `Ok(None)` for a de minimis row
    fn parse_row(
        &self,
        fields: &[String],
        config: &DatasetConfig,
    ) -> std::result::Result<Option<ExploitRecord>, String> {
        if fields.len() < self.width {
            return Err(format!(
                "expected {} columns, found {}",
                self.width,
                fields.len()
            ));
        }
        let cell = |i: usize| fields[i].trim();

        let date = parse_date(cell(self.date))?;
        let name = cell(self.name);
        if name.is_empty() {
            return Err("empty name".to_string());
        }

        let amount_m = self
            .amount_m
            .map(|i| cell(i))
            .filter(|s| !s.is_empty())
            .map(|s| parse_number("amount_m", s))
            .transpose()?;
        let amount = match (self.amount, amount_m) {
            (Some(i), _) => parse_number("amount", cell(i))?,
            (None, Some(m)) => m * 1e6,
            (None, None) => return Err("empty amount_m".to_string()),
        };
        if !amount.is_finite() || amount < 0.0 {
            return Err(format!("amount must be non-negative and finite, got {}", amount));
        }
        if let Some(m) = amount_m {
            if !m.is_finite() {
                return Err(format!("amount_m must be finite, got {}", m));
            }
        }
        if let (Some(_), Some(m)) = (self.amount, amount_m) {
            if (m - amount / 1e6).abs() > config.amount_m_tolerance {
                return Err(format!(
                    "amount_m {} inconsistent with amount {} (expected {:.2})",
                    m,
                    amount,
                    amount / 1e6
                ));
            }
        }

        if amount < config.min_amount_usd {
            tracing::debug!(name, amount, "Skipped de minimis exploit");
            return Ok(None);
        }

        let chains = self
            .chain
            .map(|i| parse_chains(cell(i)))
            .unwrap_or_default();
        let mut record = ExploitRecord::new(date, name, cell(self.technique), amount, chains)?;

        if let Some(i) = self.target_type {
            record = record.with_target_type(cell(i));
        }
        if let Some(i) = self.primitive {
            let label = cell(i);
            if !label.is_empty() {
                record = record.with_stored_primitive(label.parse::<Primitive>()?);
            }
        }

        Ok(Some(record))
    }
}

fn parse_number(column: &str, text: &str) -> std::result::Result<f64, String> {
    if text.is_empty() {
        return Err(format!("empty {}", column));
    }
    text.replace('_', "")
        .parse::<f64>()
        .map_err(|_| format!("unparsable {} '{}'", column, text))
}

/// ISO date, ISO date-time (time ignored) or unix seconds
fn parse_date(text: &str) -> std::result::Result<NaiveDate, String> {
    if text.is_empty() {
        return Err("empty date".to_string());
    }
    if text.bytes().all(|b| b.is_ascii_digit()) && text.len() > 8 {
        let secs: i64 = text
            .parse()
            .map_err(|_| format!("unparsable timestamp '{}'", text))?;
        return DateTime::from_timestamp(secs, 0)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| format!("timestamp out of range '{}'", text));
    }
    text.get(..10)
        .unwrap_or(text)
        .parse::<NaiveDate>()
        .map_err(|e| format!("unparsable date '{}': {}", text, e))
}

/// "Ethereum, BSC", "Ethereum;BSC", "Ethereum|BSC" or "['Ethereum', 'BSC']"
fn parse_chains(text: &str) -> BTreeSet<String> {
    text.trim_matches(|c| c == '[' || c == ']')
        .split([',', ';', '|'])
        .map(|c| c.trim().trim_matches(|q| q == '\'' || q == '"').trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}
