use std::sync::OnceLock;

use regex::Regex;

use crate::diagnostic::Diagnostic;
use crate::grid::LogicalTable;

/// Columns whose mean digit density exceeds this are treated as amounts.
pub const DEFAULT_DIGIT_DENSITY_THRESHOLD: f64 = 0.4;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// ASCII digits only, so density and parsing agree on what a digit is.
re!(re_digit, r"[0-9]");
re!(re_non_numeric, r"[^0-9.\-]");

/// Outcome of normalizing a single value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Amount(String),
    /// Nothing numeric was left after stripping; the text stays as it was.
    Unchanged,
    /// Numeric characters remained but did not parse.
    Skipped,
}

pub struct FinancialNormalizer {
    threshold: f64,
}

impl Default for FinancialNormalizer {
    fn default() -> Self {
        Self { threshold: DEFAULT_DIGIT_DENSITY_THRESHOLD }
    }
}

impl FinancialNormalizer {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Rewrite every amount column of `table` in canonical two-decimal form.
    /// Returns the indices of the columns that were classified as numeric.
    pub fn normalize_table(&self, table: &mut LogicalTable) -> Vec<usize> {
        let mut numeric = Vec::new();
        for col in 0..table.col_count() {
            let values: Vec<&str> = table.column(col).map(|c| c.text.as_str()).collect();
            if !is_numeric_column(&values, self.threshold) {
                continue;
            }
            numeric.push(col);

            let mut skipped = Vec::new();
            for (row, cell) in table.column_mut(col).enumerate() {
                match normalize_value(&cell.text) {
                    Normalized::Amount(s) => cell.text = s,
                    Normalized::Unchanged => {}
                    Normalized::Skipped => skipped.push(Diagnostic::NormalizationSkipped {
                        row,
                        col,
                        text: cell.text.clone(),
                    }),
                }
            }
            table.diagnostics.extend(skipped);
        }
        numeric
    }
}

/// Fraction of characters that are decimal digits, with one added to the length.
pub fn digit_density(text: &str) -> f64 {
    let digits = re_digit().find_iter(text).count();
    digits as f64 / (text.chars().count() + 1) as f64
}

/// Whether the mean digit density of a column exceeds `threshold`.
pub fn is_numeric_column<S: AsRef<str>>(values: &[S], threshold: f64) -> bool {
    if values.is_empty() {
        return false;
    }
    let mean = values.iter().map(|v| digit_density(v.as_ref())).sum::<f64>() / values.len() as f64;
    mean > threshold
}

/// Canonical two-decimal form of a single value, or the original text when it
/// does not hold a number. Empty input is read as zero.
pub fn normalize_financial_text(text: &str) -> String {
    match normalize_value(text) {
        Normalized::Amount(s) => s,
        Normalized::Unchanged | Normalized::Skipped => text.to_string(),
    }
}

pub fn normalize_value(text: &str) -> Normalized {
    if text.is_empty() {
        return Normalized::Amount("0.00".to_string());
    }

    let cleaned = re_non_numeric().replace_all(text, "");
    if matches!(cleaned.as_ref(), "" | "." | "-") {
        return Normalized::Unchanged;
    }

    match parse_amount(&cleaned) {
        Some(s) => Normalized::Amount(s),
        None => Normalized::Skipped,
    }
}

fn parse_amount(cleaned: &str) -> Option<String> {
    let f = cleaned.parse::<f64>().ok()?;
    Some(format!("{f:.2}"))
}
