use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::diagnostic::Diagnostic;
use crate::grid::LogicalTable;

/// Raw cell confidence below this is flagged for review.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.85;
/// Table-structure detection IoU reported for the pretrained detector.
pub const DEFAULT_DETECTION_IOU: f32 = 0.965;
const DETECTION_IOU_PASS: f32 = 0.95;

/// Run-level quality metrics, as handed to report generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub detection_iou: f32,
    pub avg_confidence: f64,
    pub table_count: usize,
    pub document_count: usize,
    pub low_confidence_flag_count: usize,
}

/// A single metric row with its pass/review status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricLine {
    pub metric: String,
    pub value: String,
    pub status: String,
}

impl RunMetrics {
    pub fn summary(&self, confidence_threshold: f32) -> Vec<MetricLine> {
        let line = |metric: &str, value: String, status: &str| MetricLine {
            metric: metric.to_string(),
            value,
            status: status.to_string(),
        };
        vec![
            line(
                "Detection Accuracy (IOU)",
                format!("{:.1}%", self.detection_iou * 100.0),
                if self.detection_iou > DETECTION_IOU_PASS { "PASS" } else { "FAIL" },
            ),
            line(
                "OCR Avg Confidence",
                format!("{:.1}%", self.avg_confidence * 100.0),
                if self.avg_confidence > f64::from(confidence_threshold) {
                    "PASS"
                } else {
                    "MANUAL REVIEW REQ"
                },
            ),
            line("Tables Processed", self.table_count.to_string(), "-"),
            line("Documents Processed", self.document_count.to_string(), "-"),
            line("Low Confidence Cells", self.low_confidence_flag_count.to_string(), "-"),
        ]
    }
}

/// One entry of the validation list handed to report generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFlag {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub source: String,
    pub confidence: f32,
}

/// Consumer of the run summary (PDF, HTML, terminal, …).
pub trait ReportRenderer {
    type Output;
    type Error;

    fn render(&self, metrics: &RunMetrics, flags: &[ValidationFlag]) -> Result<Self::Output, Self::Error>;
}

/// Accumulates quality statistics over one evaluation run.
///
/// Not `Sync`-shared: the running mean depends on commit order, so callers
/// funnel all `record` calls through a single owner.
#[derive(Debug, Clone)]
pub struct QualityAggregator {
    threshold: f32,
    metrics: RunMetrics,
    /// Exact `avg × n` of the committed tables.
    confidence_sum: f64,
    seen_documents: HashSet<String>,
    flags: Vec<ValidationFlag>,
}

impl Default for QualityAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_DETECTION_IOU)
    }
}

impl QualityAggregator {
    pub fn new(threshold: f32, detection_iou: f32) -> Self {
        Self {
            threshold,
            metrics: RunMetrics {
                detection_iou,
                avg_confidence: 0.0,
                table_count: 0,
                document_count: 0,
                low_confidence_flag_count: 0,
            },
            confidence_sum: 0.0,
            seen_documents: HashSet::new(),
            flags: Vec::new(),
        }
    }

    /// Fold one completed table into the run.
    ///
    /// `raw_confidences` are the recognizer's per-cell confidences before any
    /// merging or normalization.
    pub fn record(
        &mut self,
        document_id: &str,
        table_id: &str,
        table: &LogicalTable,
        raw_confidences: &[f32],
    ) {
        let table_mean = f64::from(table.mean_confidence().unwrap_or(0.0));

        let mut new_flags: Vec<ValidationFlag> = raw_confidences
            .iter()
            .enumerate()
            .filter(|(_, c)| **c < self.threshold)
            .map(|(i, c)| ValidationFlag {
                id: format!("{table_id}-c{i}"),
                kind: "LowConfidence".to_string(),
                source: table_id.to_string(),
                confidence: *c,
            })
            .collect();
        let low = new_flags.len();

        new_flags.extend(table.diagnostics.iter().enumerate().map(|(i, d)| ValidationFlag {
            id: format!("{table_id}-d{i}"),
            kind: d.kind().to_string(),
            source: table_id.to_string(),
            confidence: diagnostic_confidence(table, d),
        }));

        // (old_avg × (n − 1) + table_mean) / n, with old_avg × (n − 1) carried exactly.
        let n = self.metrics.table_count + 1;
        self.confidence_sum += table_mean;
        self.metrics.avg_confidence = self.confidence_sum / n as f64;
        self.metrics.table_count = n;
        if self.seen_documents.insert(document_id.to_string()) {
            self.metrics.document_count += 1;
        }
        self.metrics.low_confidence_flag_count += low;
        self.flags.extend(new_flags);
    }

    pub fn snapshot(&self) -> RunMetrics {
        self.metrics.clone()
    }

    pub fn flags(&self) -> &[ValidationFlag] {
        &self.flags
    }
}

fn diagnostic_confidence(table: &LogicalTable, d: &Diagnostic) -> f32 {
    match d {
        Diagnostic::GeometryUnresolved { confidence, .. } => *confidence,
        Diagnostic::NormalizationSkipped { row, col, .. } => {
            table.cell(*row, *col).map_or(0.0, |c| c.confidence)
        }
        Diagnostic::EmptyInput => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TableCell;

    fn table_with_mean(mean: f32) -> LogicalTable {
        let mut t = LogicalTable::from_text_rows(&[vec!["x"]]);
        t.column_mut(0).for_each(|c: &mut TableCell| c.confidence = mean);
        t
    }

    #[test]
    fn running_mean_over_two_tables() {
        let mut agg = QualityAggregator::default();
        agg.record("doc", "doc_t0", &table_with_mean(0.9), &[0.9]);
        assert!((agg.snapshot().avg_confidence - 0.9).abs() < 1e-6);
        agg.record("doc", "doc_t1", &table_with_mean(0.8), &[0.8]);
        let m = agg.snapshot();
        assert!((m.avg_confidence - 0.85).abs() < 1e-6, "avg was {}", m.avg_confidence);
        assert_eq!(m.table_count, 2);
    }

    #[test]
    fn documents_counted_once() {
        let mut agg = QualityAggregator::default();
        agg.record("a", "a_t0", &table_with_mean(1.0), &[]);
        agg.record("a", "a_t1", &table_with_mean(1.0), &[]);
        agg.record("b", "b_t0", &table_with_mean(1.0), &[]);
        assert_eq!(agg.snapshot().document_count, 2);
        assert_eq!(agg.snapshot().table_count, 3);
    }

    #[test]
    fn low_confidence_cells_are_flagged() {
        let mut agg = QualityAggregator::default();
        agg.record("doc", "doc_t0", &table_with_mean(0.9), &[0.99, 0.84, 0.85, 0.2]);
        assert_eq!(agg.snapshot().low_confidence_flag_count, 2);
        let ids: Vec<&str> = agg.flags().iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["doc_t0-c1", "doc_t0-c3"]);
        assert!(agg.flags().iter().all(|f| f.kind == "LowConfidence" && f.source == "doc_t0"));
    }

    #[test]
    fn custom_threshold() {
        let mut agg = QualityAggregator::new(0.5, DEFAULT_DETECTION_IOU);
        agg.record("doc", "t", &table_with_mean(0.9), &[0.6, 0.4]);
        assert_eq!(agg.snapshot().low_confidence_flag_count, 1);
    }

    #[test]
    fn empty_table_contributes_zero_and_is_flagged() {
        let mut t = LogicalTable::default();
        t.diagnostics.push(Diagnostic::EmptyInput);
        let mut agg = QualityAggregator::default();
        agg.record("doc", "doc_t0", &t, &[]);
        let m = agg.snapshot();
        assert_eq!(m.avg_confidence, 0.0);
        assert_eq!(m.low_confidence_flag_count, 0);
        assert_eq!(agg.flags()[0].kind, "EmptyInput");
    }

    #[test]
    fn summary_statuses() {
        let mut agg = QualityAggregator::default();
        agg.record("doc", "t", &table_with_mean(0.5), &[0.5]);
        let lines = agg.snapshot().summary(DEFAULT_CONFIDENCE_THRESHOLD);
        assert_eq!(lines[0].status, "PASS");
        assert_eq!(lines[0].value, "96.5%");
        assert_eq!(lines[1].status, "MANUAL REVIEW REQ");
        assert_eq!(lines[2].value, "1");
    }
}
