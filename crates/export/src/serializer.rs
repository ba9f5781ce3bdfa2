use std::collections::HashMap;

use finscan_core::{HeaderMode, LogicalTable};
use serde_json::{Map, Value};

use crate::record::{format_timestamp, round4, ExportRecord, RecordMetadata, TableSource};
use crate::ExportError;

/// File and id naming for one export run: `{basename}_t{i}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportNaming {
    pub basename: String,
}

impl ExportNaming {
    pub fn new(basename: impl Into<String>) -> Self {
        Self { basename: basename.into() }
    }

    pub fn table_id(&self, index: usize) -> String {
        format!("{}_t{index}", self.basename)
    }

    pub fn csv_name(&self, index: usize) -> String {
        format!("{}.csv", self.table_id(index))
    }

    pub fn json_name(&self, index: usize) -> String {
        format!("{}.json", self.table_id(index))
    }
}

/// Renders a reconstructed table as CSV text and as an [`ExportRecord`].
///
/// Output depends only on the inputs; the timestamp comes from [`TableSource`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportSerializer {
    header_mode: HeaderMode,
}

impl ExportSerializer {
    pub fn new(header_mode: HeaderMode) -> Self {
        Self { header_mode }
    }

    /// Column labels and the rows that follow them.
    fn split<'a>(&self, table: &'a LogicalTable) -> (Vec<String>, Vec<Vec<&'a str>>) {
        let texts: Vec<Vec<&str>> = table
            .rows()
            .iter()
            .map(|r| r.iter().map(|c| c.text.as_str()).collect())
            .collect();

        match self.header_mode {
            HeaderMode::Index => {
                let labels = (0..table.col_count()).map(|i| i.to_string()).collect();
                (labels, texts)
            }
            HeaderMode::FirstRow => {
                let mut rows = texts.into_iter();
                let labels = match rows.next() {
                    Some(first) => dedupe(
                        first.iter().enumerate().map(|(i, t)| clean_label(t, i)).collect(),
                    ),
                    None => Vec::new(),
                };
                (labels, rows.collect())
            }
        }
    }

    pub fn to_csv(&self, table: &LogicalTable) -> Result<String, ExportError> {
        let (labels, rows) = self.split(table);
        let mut wtr = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Always)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        if !labels.is_empty() {
            wtr.write_record(&labels)?;
            for row in &rows {
                wtr.write_record(row)?;
            }
        }

        let bytes = wtr.into_inner().map_err(|e| ExportError::Encode(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| ExportError::Encode(e.to_string()))
    }

    pub fn to_record(&self, table: &LogicalTable, source: &TableSource, table_id: &str) -> ExportRecord {
        let (labels, rows) = self.split(table);

        let structured_data = rows
            .iter()
            .map(|row| {
                labels
                    .iter()
                    .zip(row.iter())
                    .map(|(label, v)| (label.clone(), Value::String((*v).to_string())))
                    .collect::<Map<String, Value>>()
            })
            .collect();

        ExportRecord {
            document_id: source.document_id.clone(),
            table_id: table_id.to_string(),
            extracted_text: extracted_text(table),
            confidence_score: round4(source.confidence),
            metadata: RecordMetadata {
                page_number: source.page,
                table_index_on_page: source.table_index,
                row_count: table.row_count(),
                column_count: table.col_count(),
                execution_timestamp: format_timestamp(&source.timestamp),
            },
            structured_data,
            unresolved_cells: table.unresolved.clone(),
        }
    }

    pub fn to_json(&self, table: &LogicalTable, source: &TableSource, table_id: &str) -> Result<String, ExportError> {
        let record = self.to_record(table, source, table_id);
        Ok(serde_json::to_string_pretty(&record)?)
    }
}

/// Every non-empty cell value in row-major order, joined by single spaces,
/// followed by the text of fragments that did not resolve to a grid slot.
pub fn extracted_text(table: &LogicalTable) -> String {
    table
        .rows()
        .iter()
        .flatten()
        .map(|c| c.text.as_str())
        .chain(table.unresolved.iter().map(|u| u.fragment.text.as_str()))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Trim and collapse whitespace runs (newlines included) to one space.
/// A blank label falls back to the column index.
fn clean_label(raw: &str, index: usize) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        index.to_string()
    } else {
        collapsed
    }
}

fn dedupe(labels: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    labels
        .into_iter()
        .map(|label| {
            let n = seen.entry(label.clone()).or_insert(0);
            *n += 1;
            if *n == 1 {
                label
            } else {
                format!("{label}_{n}")
            }
        })
        .collect()
}
