use std::path::Path;
use std::sync::Arc;

use finscan_core::{
    FinancialNormalizer, FinscanConfig, LogicalTable, RecognizedCell, Rect, Region, RegionLabel,
    TableReconstructor,
};
use image::DynamicImage;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::backend::{BackendError, CellRecognizer, Recognition, TableDetector};
use crate::recorder::MetricsRecorder;
use crate::source::{DocumentSource, SourceError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Document source error: {0}")]
    Source(#[from] SourceError),
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid detections: {0}")]
    Detections(#[from] serde_json::Error),
    #[error("Pipeline was cancelled")]
    Cancelled,
    #[error("Metrics recorder has shut down")]
    RecorderClosed,
}

/// One reconstructed table together with where it came from.
#[derive(Debug, Clone)]
pub struct ExtractedTable {
    pub document_id: String,
    /// Zero-based page index within the document.
    pub page: usize,
    /// Position among the accepted tables of the page.
    pub table_index: usize,
    /// Table region in page coordinates.
    pub bbox: Rect,
    pub table: LogicalTable,
    /// Recognizer confidences for every cell region, in detection order.
    pub raw_confidences: Vec<f32>,
}

impl ExtractedTable {
    /// Stable identifier used for validation flags.
    pub fn source_id(&self) -> String {
        format!("{}/p{}/t{}", self.document_id, self.page, self.table_index)
    }

    /// Mean of the raw cell confidences, 0.0 when no cell was recognized.
    pub fn confidence(&self) -> f64 {
        if self.raw_confidences.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.raw_confidences.iter().map(|c| f64::from(*c)).sum();
        sum / self.raw_confidences.len() as f64
    }
}

pub(crate) type TableJob = Box<dyn FnOnce() -> Result<ExtractedTable, PipelineError> + Send>;

/// Orchestrates: load → detect tables → crop → detect structure → recognize cells → reconstruct.
///
/// Backend calls are blocking and run on tokio's blocking pool, at most
/// `max_workers` at a time. Each table is committed to the recorder as soon as
/// it completes.
pub struct TablePipeline<D, R> {
    detector: Arc<D>,
    recognizer: Arc<R>,
    reconstructor: Arc<TableReconstructor>,
    config: FinscanConfig,
    permits: Arc<Semaphore>,
}

impl<D, R> TablePipeline<D, R>
where
    D: TableDetector + 'static,
    R: CellRecognizer + 'static,
{
    pub fn new(detector: D, recognizer: R, config: FinscanConfig) -> Self {
        let reconstructor =
            TableReconstructor::new(FinancialNormalizer::new(config.digit_density_threshold));
        let permits = Arc::new(Semaphore::new(config.worker_count()));
        Self {
            detector: Arc::new(detector),
            recognizer: Arc::new(recognizer),
            reconstructor: Arc::new(reconstructor),
            config,
            permits,
        }
    }

    /// Process a document on disk. The document id is the file stem.
    pub async fn process_file<S: DocumentSource + 'static>(
        &self,
        source: Arc<S>,
        path: &Path,
        recorder: &MetricsRecorder,
    ) -> Result<Vec<ExtractedTable>, PipelineError> {
        let document_id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let owned = path.to_path_buf();
        let pages = bounded_blocking(&self.permits, move || source.load(&owned)).await??;
        self.process_pages(&document_id, pages, recorder).await
    }

    /// Process already-rasterized pages, in page order.
    pub async fn process_pages(
        &self,
        document_id: &str,
        pages: Vec<DynamicImage>,
        recorder: &MetricsRecorder,
    ) -> Result<Vec<ExtractedTable>, PipelineError> {
        tracing::info!(document_id, pages = pages.len(), "processing document");
        let pages: Vec<Arc<DynamicImage>> = pages.into_iter().map(Arc::new).collect();

        // Table detection, one job per page.
        let mut detections = JoinSet::new();
        for (page_no, page) in pages.iter().enumerate() {
            let detector = Arc::clone(&self.detector);
            let page = Arc::clone(page);
            let permits = Arc::clone(&self.permits);
            detections.spawn(async move {
                let regions = bounded_blocking(&permits, move || detector.detect_tables(&page)).await?;
                Ok::<_, PipelineError>((page_no, regions?))
            });
        }
        let mut per_page: Vec<(usize, Vec<Region>)> = Vec::with_capacity(pages.len());
        while let Some(joined) = detections.join_next().await {
            per_page.push(joined??);
        }
        per_page.sort_by_key(|(page_no, _)| *page_no);

        let mut jobs: Vec<TableJob> = Vec::new();
        for (page_no, regions) in per_page {
            let accepted: Vec<Rect> = regions
                .iter()
                .filter(|r| r.label == RegionLabel::Table && r.score >= self.config.table_threshold)
                .map(|r| r.bbox)
                .collect();
            tracing::debug!(
                document_id,
                page = page_no,
                detected = regions.len(),
                accepted = accepted.len(),
                "tables detected"
            );
            for (table_index, bbox) in accepted.into_iter().enumerate() {
                let detector = Arc::clone(&self.detector);
                let recognizer = Arc::clone(&self.recognizer);
                let reconstructor = Arc::clone(&self.reconstructor);
                let page = Arc::clone(&pages[page_no]);
                let structure_threshold = self.config.structure_threshold;
                let document_id = document_id.to_string();
                jobs.push(Box::new(move || {
                    let (table, raw_confidences) = extract_table(
                        detector.as_ref(),
                        recognizer.as_ref(),
                        &reconstructor,
                        structure_threshold,
                        &page,
                        bbox,
                    )?;
                    Ok::<_, PipelineError>(ExtractedTable {
                        document_id,
                        page: page_no,
                        table_index,
                        bbox,
                        table,
                        raw_confidences,
                    })
                }));
            }
        }

        let tables = run_tables(jobs, &self.permits, recorder).await?;
        tracing::info!(document_id, tables = tables.len(), "document complete");
        Ok(tables)
    }
}

/// Crop, detect structure, recognize every cell region, reconstruct.
fn extract_table<D: TableDetector, R: CellRecognizer>(
    detector: &D,
    recognizer: &R,
    reconstructor: &TableReconstructor,
    structure_threshold: f32,
    page: &DynamicImage,
    bbox: Rect,
) -> Result<(LogicalTable, Vec<f32>), PipelineError> {
    let Some(table_img) = crop(page, &bbox) else {
        tracing::warn!("table region {:?} is outside the page", bbox);
        return Ok((LogicalTable::default(), Vec::new()));
    };

    let structure: Vec<Region> = detector
        .detect_structure(&table_img)?
        .into_iter()
        .filter(|r| r.score >= structure_threshold)
        .collect();

    let mut rows = Vec::new();
    let mut cols = Vec::new();
    let mut cells = Vec::new();
    for region in structure {
        match region.label {
            RegionLabel::Row => rows.push(region),
            RegionLabel::Column => cols.push(region),
            RegionLabel::Cell => {
                let recognition = match crop(&table_img, &region.bbox) {
                    Some(cell_img) => recognizer.recognize(&cell_img)?,
                    None => Recognition::empty(),
                };
                cells.push(RecognizedCell::new(region.bbox, recognition.text, recognition.confidence));
            }
            RegionLabel::Table => {}
        }
    }

    let raw_confidences = cells.iter().map(|c| c.confidence).collect();
    Ok((reconstructor.reconstruct(&rows, &cols, &cells), raw_confidences))
}

/// Pixel crop of `rect`, clamped to the image. `None` for a zero-area result.
pub(crate) fn crop(img: &DynamicImage, rect: &Rect) -> Option<DynamicImage> {
    let (w, h) = (img.width() as f32, img.height() as f32);
    let x0 = rect.x_min.round().clamp(0.0, w) as u32;
    let y0 = rect.y_min.round().clamp(0.0, h) as u32;
    let x1 = rect.x_max.round().clamp(0.0, w) as u32;
    let y1 = rect.y_max.round().clamp(0.0, h) as u32;
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(img.crop_imm(x0, y0, x1 - x0, y1 - y0))
}

/// Run `f` on the blocking pool once a worker permit is available.
pub(crate) async fn bounded_blocking<T, F>(permits: &Arc<Semaphore>, f: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let _permit = Arc::clone(permits)
        .acquire_owned()
        .await
        .map_err(|_| PipelineError::Cancelled)?;
    Ok(tokio::task::spawn_blocking(f).await?)
}

/// Drive table jobs concurrently, committing each one as it finishes.
///
/// The first failure is returned and the remaining jobs are aborted; tables
/// already committed stay in the recorder. The result is ordered by
/// (page, table index).
pub(crate) async fn run_tables(
    jobs: Vec<TableJob>,
    permits: &Arc<Semaphore>,
    recorder: &MetricsRecorder,
) -> Result<Vec<ExtractedTable>, PipelineError> {
    let mut set = JoinSet::new();
    for job in jobs {
        let permits = Arc::clone(permits);
        set.spawn(async move { bounded_blocking(&permits, job).await? });
    }

    let mut done = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        let extracted = joined??;
        recorder.commit(&extracted).await?;
        tracing::debug!(
            source = %extracted.source_id(),
            rows = extracted.table.row_count(),
            cols = extracted.table.col_count(),
            "table committed"
        );
        done.push(extracted);
    }
    done.sort_by_key(|t| (t.page, t.table_index));
    Ok(done)
}
