pub mod record;
pub mod serializer;
pub mod writer;

use std::path::{Path, PathBuf};
use thiserror::Error;

pub use record::{ExportRecord, RecordMetadata, TableSource};
pub use serializer::{extracted_text, ExportNaming, ExportSerializer};
pub use writer::ExportedPair;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Encoding error: {0}")]
    Encode(String),
}

impl ExportError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        ExportError::Io { path: path.to_path_buf(), source }
    }
}
