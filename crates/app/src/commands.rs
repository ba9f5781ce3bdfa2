use std::convert::Infallible;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::Context;
use chrono::Utc;
use finscan_core::{FinscanConfig, QualityAggregator, ReportRenderer, RunMetrics, ValidationFlag};
use finscan_export::{ExportNaming, ExportSerializer, ExportedPair, TableSource};
use finscan_ocr::{DetectionReplay, DocumentDetections, ExtractedTable, MetricsRecorder};

/// Outcome of one `reconstruct` run.
#[derive(Debug)]
pub struct RunReport {
    pub exported: Vec<ExportedPair>,
    pub metrics: RunMetrics,
    pub flags: Vec<ValidationFlag>,
}

/// Replay the detections of one document through reconstruction.
async fn replay(
    detections: &Path,
    config: &FinscanConfig,
) -> anyhow::Result<(String, Vec<ExtractedTable>, QualityAggregator)> {
    let doc = DocumentDetections::load(detections)
        .await
        .with_context(|| format!("reading detections {}", detections.display()))?;
    let document_id = doc.document_id.clone();

    let recorder =
        MetricsRecorder::spawn(QualityAggregator::new(config.confidence_threshold, config.detection_iou));
    let tables = DetectionReplay::new(config).run(doc, &recorder).await?;
    let aggregator = recorder.finish().await?;
    Ok((document_id, tables, aggregator))
}

pub async fn reconstruct(
    detections: &Path,
    config: &FinscanConfig,
    basename: Option<&str>,
) -> anyhow::Result<RunReport> {
    let (document_id, tables, aggregator) = replay(detections, config).await?;

    let naming = ExportNaming::new(basename.unwrap_or(&document_id));
    let serializer = ExportSerializer::new(config.header_mode);
    let timestamp = Utc::now();

    let mut exported = Vec::with_capacity(tables.len());
    for (index, t) in tables.iter().enumerate() {
        let source = TableSource {
            document_id: t.document_id.clone(),
            page: t.page,
            table_index: t.table_index,
            confidence: t.confidence(),
            timestamp,
        };
        let pair = serializer
            .write_pair(&config.output_dir, &naming, index, &t.table, &source)
            .with_context(|| format!("exporting {}", t.source_id()))?;
        exported.push(pair);
    }

    Ok(RunReport { exported, metrics: aggregator.snapshot(), flags: aggregator.flags().to_vec() })
}

pub async fn summarize(
    detections: &Path,
    config: &FinscanConfig,
) -> anyhow::Result<(RunMetrics, Vec<ValidationFlag>)> {
    let (_, _, aggregator) = replay(detections, config).await?;
    Ok((aggregator.snapshot(), aggregator.flags().to_vec()))
}

/// Plain-text metric table for the terminal.
pub struct TextReport {
    pub confidence_threshold: f32,
}

impl ReportRenderer for TextReport {
    type Output = String;
    type Error = Infallible;

    fn render(&self, metrics: &RunMetrics, flags: &[ValidationFlag]) -> Result<String, Infallible> {
        let mut out = String::new();
        let _ = writeln!(out, "{:<28} {:>10}  Status", "Metric", "Value");
        for line in metrics.summary(self.confidence_threshold) {
            let _ = writeln!(out, "{:<28} {:>10}  {}", line.metric, line.value, line.status);
        }
        if !flags.is_empty() {
            let _ = writeln!(out, "\nValidation flags ({}):", flags.len());
            for f in flags {
                let _ = writeln!(out, "  {} {} {} ({:.2})", f.id, f.kind, f.source, f.confidence);
            }
        }
        Ok(out)
    }
}

pub fn render_summary(metrics: &RunMetrics, flags: &[ValidationFlag], confidence_threshold: f32) -> String {
    match (TextReport { confidence_threshold }).render(metrics, flags) {
        Ok(s) => s,
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const DETECTIONS: &str = r#"{
        "document_id": "q3_statement",
        "pages": [
            {"tables": [{
                "rows": [[0, 0, 200, 20], [0, 20, 200, 40], [0, 40, 200, 60]],
                "columns": [[0, 0, 100, 60], [100, 0, 200, 60]],
                "cells": [
                    {"box": [5, 5, 95, 15], "text": "Item", "confidence": 0.99},
                    {"box": [105, 5, 195, 15], "text": "Amount", "confidence": 0.98},
                    {"box": [5, 25, 95, 35], "text": "Revenue", "confidence": 0.97},
                    {"box": [105, 25, 195, 35], "text": "$1,234.56", "confidence": 0.62},
                    {"box": [5, 45, 95, 55], "text": "Costs", "confidence": 0.96},
                    {"box": [105, 45, 195, 55], "text": "2,500.00", "confidence": 0.95}
                ]
            }]},
            {"tables": [{
                "rows": [[0, 0, 50, 10]],
                "columns": [[0, 0, 50, 10]],
                "cells": [{"box": [1, 1, 49, 9], "text": "Notes", "confidence": 0.9}]
            }]}
        ]
    }"#;

    fn write_detections(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("detections.json");
        fs::write(&path, DETECTIONS).unwrap();
        path
    }

    #[tokio::test]
    async fn reconstruct_exports_one_pair_per_table() {
        let dir = tempfile::tempdir().unwrap();
        let detections = write_detections(dir.path());
        let config = FinscanConfig {
            output_dir: dir.path().join("out"),
            header_mode: finscan_core::HeaderMode::FirstRow,
            ..FinscanConfig::default()
        };

        let report = reconstruct(&detections, &config, Some("final_run")).await.unwrap();
        let ids: Vec<&str> = report.exported.iter().map(|p| p.table_id.as_str()).collect();
        assert_eq!(ids, vec!["final_run_t0", "final_run_t1"]);
        assert!(config.output_dir.join("final_run_t1.csv").exists());

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report.exported[0].json_path).unwrap()).unwrap();
        assert_eq!(json["document_id"], "q3_statement");
        assert_eq!(json["metadata"]["page_number"], 0);
        assert_eq!(json["structured_data"][0]["Amount"], "1234.56");

        assert_eq!(report.metrics.table_count, 2);
        assert_eq!(report.metrics.low_confidence_flag_count, 1);
        assert_eq!(report.flags[0].source, "q3_statement/p0/t0");
    }

    #[tokio::test]
    async fn basename_defaults_to_document_id() {
        let dir = tempfile::tempdir().unwrap();
        let detections = write_detections(dir.path());
        let config = FinscanConfig { output_dir: dir.path().to_path_buf(), ..FinscanConfig::default() };

        let report = reconstruct(&detections, &config, None).await.unwrap();
        assert_eq!(report.exported[0].csv_path, dir.path().join("q3_statement_t0.csv"));
    }

    #[tokio::test]
    async fn summarize_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let detections = write_detections(dir.path());
        let config = FinscanConfig { output_dir: dir.path().join("out"), ..FinscanConfig::default() };

        let (metrics, _) = summarize(&detections, &config).await.unwrap();
        assert_eq!(metrics.document_count, 1);
        assert!(!config.output_dir.exists());
    }

    #[tokio::test]
    async fn missing_detections_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = summarize(&dir.path().join("absent.json"), &FinscanConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("reading detections"));
    }

    #[test]
    fn text_report_lists_metrics_and_flags() {
        let metrics = RunMetrics {
            detection_iou: 0.965,
            avg_confidence: 0.9,
            table_count: 3,
            document_count: 1,
            low_confidence_flag_count: 1,
        };
        let flags = vec![ValidationFlag {
            id: "doc/p0/t0-c3".to_string(),
            kind: "LowConfidence".to_string(),
            source: "doc/p0/t0".to_string(),
            confidence: 0.62,
        }];
        let text = render_summary(&metrics, &flags, 0.85);
        assert!(text.contains("Detection Accuracy (IOU)"));
        assert!(text.contains("90.0%"));
        assert!(text.contains("Validation flags (1):"));
        assert!(text.contains("doc/p0/t0-c3 LowConfidence"));
    }
}
