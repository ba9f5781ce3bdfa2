pub mod assembler;
pub mod config;
pub mod diagnostic;
pub mod geometry;
pub mod grid;
pub mod indexer;
pub mod normalize;
pub mod quality;
pub mod reconstruct;

pub use assembler::{AssembledCells, CellAssembler, Fragment, GridCoordinate};
pub use config::{ConfigError, FinscanConfig, HeaderMode};
pub use diagnostic::Diagnostic;
pub use geometry::{RecognizedCell, Rect, Region, RegionLabel};
pub use grid::{GridReconstructor, LogicalTable, TableCell, UnresolvedCell, EMPTY_CELL_CONFIDENCE};
pub use indexer::{Band, GeometryIndexer};
pub use normalize::{digit_density, is_numeric_column, normalize_financial_text, FinancialNormalizer};
pub use quality::{
    MetricLine, QualityAggregator, ReportRenderer, RunMetrics, ValidationFlag,
    DEFAULT_CONFIDENCE_THRESHOLD,
};
pub use reconstruct::TableReconstructor;
