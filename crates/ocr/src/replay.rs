use std::path::Path;
use std::sync::Arc;

use finscan_core::{
    FinancialNormalizer, FinscanConfig, RecognizedCell, Rect, Region, RegionLabel, TableReconstructor,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::pipeline::{run_tables, ExtractedTable, PipelineError, TableJob};
use crate::recorder::MetricsRecorder;

/// Detector and recognizer output captured for one document.
///
/// Boxes are `[x_min, y_min, x_max, y_max]`; row, column and cell boxes share
/// the coordinate system of their table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentDetections {
    pub document_id: String,
    #[serde(default)]
    pub pages: Vec<PageDetections>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageDetections {
    #[serde(default)]
    pub tables: Vec<TableDetections>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableDetections {
    /// Table region on the page, if it was recorded.
    #[serde(default, rename = "box")]
    pub bbox: Option<Rect>,
    #[serde(default)]
    pub rows: Vec<Rect>,
    #[serde(default)]
    pub columns: Vec<Rect>,
    #[serde(default)]
    pub cells: Vec<RecognizedCell>,
}

impl DocumentDetections {
    pub fn from_json(content: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(content)?)
    }

    pub async fn load(path: &Path) -> Result<Self, PipelineError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    pub fn table_count(&self) -> usize {
        self.pages.iter().map(|p| p.tables.len()).sum()
    }
}

impl TableDetections {
    /// The recorded table box, or the smallest box enclosing everything detected.
    fn bounds(&self) -> Rect {
        if let Some(b) = self.bbox {
            return b;
        }
        let mut boxes = self
            .rows
            .iter()
            .chain(self.columns.iter())
            .chain(self.cells.iter().map(|c| &c.bbox));
        let Some(first) = boxes.next() else {
            return Rect::new(0.0, 0.0, 0.0, 0.0);
        };
        boxes.fold(*first, |acc, b| {
            Rect::new(
                acc.x_min.min(b.x_min),
                acc.y_min.min(b.y_min),
                acc.x_max.max(b.x_max),
                acc.y_max.max(b.y_max),
            )
        })
    }
}

/// Reconstructs tables from recorded detections, skipping the vision backends.
pub struct DetectionReplay {
    reconstructor: Arc<TableReconstructor>,
    permits: Arc<Semaphore>,
}

impl DetectionReplay {
    pub fn new(config: &FinscanConfig) -> Self {
        Self {
            reconstructor: Arc::new(TableReconstructor::new(FinancialNormalizer::new(
                config.digit_density_threshold,
            ))),
            permits: Arc::new(Semaphore::new(config.worker_count())),
        }
    }

    pub async fn run(
        &self,
        doc: DocumentDetections,
        recorder: &MetricsRecorder,
    ) -> Result<Vec<ExtractedTable>, PipelineError> {
        tracing::info!(
            document_id = %doc.document_id,
            pages = doc.pages.len(),
            tables = doc.table_count(),
            "replaying detections"
        );

        let mut jobs: Vec<TableJob> = Vec::with_capacity(doc.table_count());
        for (page, detections) in doc.pages.into_iter().enumerate() {
            for (table_index, t) in detections.tables.into_iter().enumerate() {
                let reconstructor = Arc::clone(&self.reconstructor);
                let document_id = doc.document_id.clone();
                jobs.push(Box::new(move || {
                    let bbox = t.bounds();
                    let rows = as_regions(&t.rows, RegionLabel::Row);
                    let cols = as_regions(&t.columns, RegionLabel::Column);
                    let table = reconstructor.reconstruct(&rows, &cols, &t.cells);
                    let raw_confidences = t.cells.iter().map(|c| c.confidence).collect();
                    Ok::<_, PipelineError>(ExtractedTable { document_id, page, table_index, bbox, table, raw_confidences })
                }));
            }
        }
        run_tables(jobs, &self.permits, recorder).await
    }
}

fn as_regions(boxes: &[Rect], label: RegionLabel) -> Vec<Region> {
    boxes.iter().map(|b| Region::new(*b, label, 1.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use finscan_core::QualityAggregator;

    const BALANCE_SHEET: &str = r#"{
        "document_id": "annual_report",
        "pages": [
            {"tables": [{
                "rows": [[0, 0, 200, 20], [0, 20, 200, 40], [0, 40, 200, 60]],
                "columns": [[0, 0, 100, 60], [100, 0, 200, 60]],
                "cells": [
                    {"box": [5, 5, 95, 15], "text": "Category", "confidence": 0.98},
                    {"box": [105, 5, 195, 15], "text": "2025 (USD)", "confidence": 0.97},
                    {"box": [5, 25, 95, 35], "text": "Total Revenue", "confidence": 0.95},
                    {"box": [105, 25, 195, 35], "text": "$ 4,500,000", "confidence": 0.93},
                    {"box": [5, 45, 95, 55], "text": "Net Income", "confidence": 0.96},
                    {"box": [105, 45, 195, 55], "text": "(2,100,000)", "confidence": 0.80}
                ]
            }]},
            {},
            {"tables": [{"rows": [], "columns": [], "cells": []}]}
        ]
    }"#;

    #[test]
    fn parses_detections_file() {
        let doc = DocumentDetections::from_json(BALANCE_SHEET).unwrap();
        assert_eq!(doc.pages.len(), 3);
        assert_eq!(doc.table_count(), 2);
        assert_eq!(doc.pages[0].tables[0].rows[1], Rect::new(0.0, 20.0, 200.0, 40.0));
        assert_eq!(doc.pages[0].tables[0].cells[3].text, "$ 4,500,000");
    }

    #[test]
    fn malformed_detections_are_rejected() {
        let err = DocumentDetections::from_json(r#"{"pages": []}"#).unwrap_err();
        assert!(matches!(err, PipelineError::Detections(_)));
    }

    #[test]
    fn bounds_enclose_detections_when_box_is_missing() {
        let doc = DocumentDetections::from_json(BALANCE_SHEET).unwrap();
        assert_eq!(doc.pages[0].tables[0].bounds(), Rect::new(0.0, 0.0, 200.0, 60.0));
        assert_eq!(doc.pages[2].tables[0].bounds(), Rect::new(0.0, 0.0, 0.0, 0.0));
    }

    #[tokio::test]
    async fn replays_every_table() {
        let doc = DocumentDetections::from_json(BALANCE_SHEET).unwrap();
        let recorder = MetricsRecorder::spawn(QualityAggregator::default());
        let tables = DetectionReplay::new(&FinscanConfig::default())
            .run(doc, &recorder)
            .await
            .unwrap();

        assert_eq!(tables.len(), 2);
        let sheet = &tables[0];
        assert_eq!(sheet.source_id(), "annual_report/p0/t0");
        assert_eq!(
            sheet.table.text_rows(),
            vec![
                // The header shares the amount column, so it is normalized too.
                vec!["Category", "2025.00"],
                vec!["Total Revenue", "4500000.00"],
                vec!["Net Income", "2100000.00"],
            ]
        );
        assert_eq!(tables[1].page, 2);
        assert!(tables[1].table.is_empty());

        let agg = recorder.finish().await.unwrap();
        let m = agg.snapshot();
        assert_eq!(m.table_count, 2);
        assert_eq!(m.document_count, 1);
        assert_eq!(m.low_confidence_flag_count, 1);
    }
}
