use std::path::{Path, PathBuf};

use image::DynamicImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("Failed to load image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Yields the page images of a document, in page order.
pub trait DocumentSource: Send + Sync {
    fn load(&self, path: &Path) -> Result<Vec<DynamicImage>, SourceError>;
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tiff", "tif", "bmp"];

/// Single-page raster documents decoded with the `image` crate.
///
/// PDFs are rejected; rasterizing them is the job of a dedicated source.
pub struct ImageDocumentSource {
    /// Pages larger than this on either side are scaled down.
    pub max_dimension: u32,
}

impl Default for ImageDocumentSource {
    fn default() -> Self {
        Self { max_dimension: 2800 }
    }
}

impl DocumentSource for ImageDocumentSource {
    fn load(&self, path: &Path) -> Result<Vec<DynamicImage>, SourceError> {
        if !path.exists() {
            return Err(SourceError::NotFound(path.to_path_buf()));
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();
        if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            return Err(SourceError::UnsupportedFormat(if ext.is_empty() {
                "(none)".to_string()
            } else {
                format!(".{ext}")
            }));
        }

        tracing::info!("Loading image: {}", path.display());
        let img = image::open(path)?;
        Ok(vec![self.normalize(img)])
    }
}

impl ImageDocumentSource {
    /// RGB, and no side above `max_dimension`.
    fn normalize(&self, img: DynamicImage) -> DynamicImage {
        let img = if img.width() > self.max_dimension || img.height() > self.max_dimension {
            img.resize(self.max_dimension, self.max_dimension, image::imageops::FilterType::Lanczos3)
        } else {
            img
        };
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageBuffer, Luma};

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let img: GrayImage = ImageBuffer::from_fn(w, h, |_, _| Luma([200u8]));
        let path = dir.join(name);
        DynamicImage::ImageLuma8(img).save(&path).unwrap();
        path
    }

    #[test]
    fn loads_png_as_single_rgb_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "statement.png", 8, 6);
        let pages = ImageDocumentSource::default().load(&path).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!((pages[0].width(), pages[0].height()), (8, 6));
        assert!(matches!(pages[0], DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = ImageDocumentSource::default()
            .load(Path::new("/nonexistent/statement.png"))
            .unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.docx");
        std::fs::write(&path, b"not an image").unwrap();
        let err = ImageDocumentSource::default().load(&path).unwrap_err();
        assert!(matches!(err, SourceError::UnsupportedFormat(ref e) if e == ".docx"));
    }

    #[test]
    fn pdf_needs_a_rasterizing_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"%PDF-1.7").unwrap();
        assert!(matches!(
            ImageDocumentSource::default().load(&path),
            Err(SourceError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn large_page_is_scaled_down() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "big.png", 300, 100);
        let pages = ImageDocumentSource { max_dimension: 150 }.load(&path).unwrap();
        assert!(pages[0].width() <= 150 && pages[0].height() <= 150);
    }
}
