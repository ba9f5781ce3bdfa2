pub mod backend;
pub mod pipeline;
pub mod recorder;
pub mod replay;
pub mod source;

pub use backend::{BackendError, CellRecognizer, MockDetector, MockRecognizer, Recognition, TableDetector};
pub use pipeline::{ExtractedTable, PipelineError, TablePipeline};
pub use recorder::MetricsRecorder;
pub use replay::{DetectionReplay, DocumentDetections, PageDetections, TableDetections};
pub use source::{DocumentSource, ImageDocumentSource, SourceError};
