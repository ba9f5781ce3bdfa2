use finscan_core::{LogicalTable, QualityAggregator};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::pipeline::{ExtractedTable, PipelineError};

struct Commit {
    document_id: String,
    source_id: String,
    table: LogicalTable,
    raw_confidences: Vec<f32>,
}

/// Single writer for a run's [`QualityAggregator`].
///
/// Tables finishing on any worker are sent over a channel to one task that
/// owns the aggregator, so `record` calls never interleave. A table is only
/// committed once it has been fully reconstructed.
pub struct MetricsRecorder {
    tx: mpsc::Sender<Commit>,
    task: JoinHandle<QualityAggregator>,
}

impl MetricsRecorder {
    /// Must be called from within a tokio runtime.
    pub fn spawn(mut aggregator: QualityAggregator) -> Self {
        let (tx, mut rx) = mpsc::channel::<Commit>(64);
        let task = tokio::spawn(async move {
            while let Some(c) = rx.recv().await {
                aggregator.record(&c.document_id, &c.source_id, &c.table, &c.raw_confidences);
            }
            aggregator
        });
        Self { tx, task }
    }

    pub async fn commit(&self, extracted: &ExtractedTable) -> Result<(), PipelineError> {
        let commit = Commit {
            document_id: extracted.document_id.clone(),
            source_id: extracted.source_id(),
            table: extracted.table.clone(),
            raw_confidences: extracted.raw_confidences.clone(),
        };
        self.tx.send(commit).await.map_err(|_| PipelineError::RecorderClosed)
    }

    /// Drain outstanding commits and hand back the aggregator.
    pub async fn finish(self) -> Result<QualityAggregator, PipelineError> {
        let MetricsRecorder { tx, task } = self;
        drop(tx);
        Ok(task.await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finscan_core::{Rect, TableCell};
    use std::time::Duration;

    fn extracted(doc: &str, index: usize, mean: f32) -> ExtractedTable {
        let mut table = LogicalTable::from_text_rows(&[vec!["x", "y"]]);
        for col in 0..2 {
            table.column_mut(col).for_each(|c: &mut TableCell| c.confidence = mean);
        }
        ExtractedTable {
            document_id: doc.to_string(),
            page: 0,
            table_index: index,
            bbox: Rect::new(0.0, 0.0, 1.0, 1.0),
            table,
            raw_confidences: vec![mean, mean],
        }
    }

    #[tokio::test]
    async fn commits_are_folded_in_order_received() {
        let recorder = MetricsRecorder::spawn(QualityAggregator::default());
        recorder.commit(&extracted("doc", 0, 0.9)).await.unwrap();
        recorder.commit(&extracted("doc", 1, 0.8)).await.unwrap();
        let agg = recorder.finish().await.unwrap();
        let m = agg.snapshot();
        assert_eq!(m.table_count, 2);
        assert_eq!(m.document_count, 1);
        assert!((m.avg_confidence - 0.85).abs() < 1e-6);
        // 0.8 is below the default 0.85 threshold, twice.
        assert_eq!(m.low_confidence_flag_count, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn aggregate_is_independent_of_completion_order() {
        // Dyadic means keep the floating-point sums exact in any order.
        let means = [0.5f32, 0.75, 1.0, 0.25, 0.625, 0.875, 0.125, 0.375];

        let mut results = Vec::new();
        for delays in [[0u64, 1, 2, 3, 4, 5, 6, 7], [7, 6, 5, 4, 3, 2, 1, 0], [3, 7, 0, 5, 1, 6, 2, 4]] {
            let recorder = std::sync::Arc::new(MetricsRecorder::spawn(QualityAggregator::default()));
            let mut set = tokio::task::JoinSet::new();
            for (i, (&mean, &delay)) in means.iter().zip(delays.iter()).enumerate() {
                let recorder = recorder.clone();
                set.spawn(async move {
                    tokio::time::sleep(Duration::from_millis(delay * 5)).await;
                    recorder.commit(&extracted("doc", i, mean)).await.unwrap();
                });
            }
            while let Some(r) = set.join_next().await {
                r.unwrap();
            }
            let recorder = std::sync::Arc::try_unwrap(recorder).ok().unwrap();
            results.push(recorder.finish().await.unwrap().snapshot());
        }

        assert_eq!(results[0].table_count, means.len());
        assert_eq!(results[0], results[1]);
        assert_eq!(results[1], results[2]);
    }
}
