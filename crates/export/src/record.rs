use chrono::{DateTime, SecondsFormat, Utc};
use finscan_core::UnresolvedCell;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Where a table came from and when it was exported.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSource {
    pub document_id: String,
    pub page: usize,
    pub table_index: usize,
    /// Aggregate recognition confidence of the table (0.0–1.0).
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub page_number: usize,
    pub table_index_on_page: usize,
    pub row_count: usize,
    pub column_count: usize,
    /// ISO-8601 / RFC 3339, UTC.
    pub execution_timestamp: String,
}

/// The per-table JSON export. Field order is the schema order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub document_id: String,
    pub table_id: String,
    pub extracted_text: String,
    /// Rounded to four decimals.
    pub confidence_score: f64,
    pub metadata: RecordMetadata,
    /// One object per data row, column label → cell value, in column order.
    pub structured_data: Vec<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved_cells: Vec<UnresolvedCell>,
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}
