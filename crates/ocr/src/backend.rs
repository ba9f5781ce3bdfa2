use finscan_core::Region;
use image::DynamicImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("Model inference error: {0}")]
    Inference(String),
    #[error("Backend not available: {0}")]
    NotAvailable(String),
}

/// Text recognized in one cell image.
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    pub text: String,
    /// Recognizer confidence (0.0–1.0).
    pub confidence: f32,
}

impl Recognition {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self { text: text.into(), confidence: confidence.clamp(0.0, 1.0) }
    }

    /// What a zero-area crop yields without calling the backend.
    pub fn empty() -> Self {
        Self { text: String::new(), confidence: 0.0 }
    }
}

/// Pretrained table detector.
///
/// `detect_tables` returns regions in page coordinates; `detect_structure`
/// returns row/column/cell regions in the coordinates of the cropped table.
pub trait TableDetector: Send + Sync {
    fn detect_tables(&self, page: &DynamicImage) -> Result<Vec<Region>, BackendError>;
    fn detect_structure(&self, table: &DynamicImage) -> Result<Vec<Region>, BackendError>;
}

/// Pretrained cell text recognizer.
pub trait CellRecognizer: Send + Sync {
    fn recognize(&self, cell: &DynamicImage) -> Result<Recognition, BackendError>;
}

impl<F> CellRecognizer for F
where
    F: Fn(&DynamicImage) -> Result<Recognition, BackendError> + Send + Sync,
{
    fn recognize(&self, cell: &DynamicImage) -> Result<Recognition, BackendError> {
        self(cell)
    }
}

// ── Mock backends (always available, used for tests) ─────────────────────────

/// Returns the same regions for every page and every table.
pub struct MockDetector {
    pub tables: Vec<Region>,
    pub structure: Vec<Region>,
}

impl MockDetector {
    pub fn new(tables: Vec<Region>, structure: Vec<Region>) -> Self {
        Self { tables, structure }
    }
}

impl TableDetector for MockDetector {
    fn detect_tables(&self, _page: &DynamicImage) -> Result<Vec<Region>, BackendError> {
        Ok(self.tables.clone())
    }

    fn detect_structure(&self, _table: &DynamicImage) -> Result<Vec<Region>, BackendError> {
        Ok(self.structure.clone())
    }
}

/// Returns a pre-set recognition regardless of the image.
pub struct MockRecognizer {
    pub text: String,
    pub confidence: f32,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self { text: text.into(), confidence }
    }
}

impl CellRecognizer for MockRecognizer {
    fn recognize(&self, _cell: &DynamicImage) -> Result<Recognition, BackendError> {
        Ok(Recognition::new(self.text.clone(), self.confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finscan_core::{Rect, RegionLabel};

    fn blank() -> DynamicImage {
        DynamicImage::new_rgb8(4, 4)
    }

    #[test]
    fn mock_recognizer_ignores_image_content() {
        let r = MockRecognizer::new("1,234.56", 0.92);
        assert_eq!(r.recognize(&blank()).unwrap(), Recognition::new("1,234.56", 0.92));
    }

    #[test]
    fn closures_are_recognizers() {
        let r = |img: &DynamicImage| Ok::<_, BackendError>(Recognition::new(img.width().to_string(), 1.0));
        assert_eq!(r.recognize(&blank()).unwrap().text, "4");
    }

    #[test]
    fn mock_detector_returns_fixed_regions() {
        let table = Region::new(Rect::new(0.0, 0.0, 4.0, 4.0), RegionLabel::Table, 0.99);
        let d = MockDetector::new(vec![table.clone()], vec![]);
        assert_eq!(d.detect_tables(&blank()).unwrap(), vec![table]);
        assert!(d.detect_structure(&blank()).unwrap().is_empty());
    }

    #[test]
    fn recognition_clamps_confidence() {
        assert_eq!(Recognition::new("x", -0.5).confidence, 0.0);
        assert_eq!(Recognition::empty().text, "");
    }
}
