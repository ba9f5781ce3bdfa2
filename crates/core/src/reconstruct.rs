use crate::assembler::CellAssembler;
use crate::geometry::{RecognizedCell, Region};
use crate::grid::{GridReconstructor, LogicalTable};
use crate::indexer::GeometryIndexer;
use crate::normalize::FinancialNormalizer;

/// Runs index → assemble → grid → normalize for one table.
///
/// Holds no state between calls; a single instance may be shared across threads.
#[derive(Default)]
pub struct TableReconstructor {
    normalizer: FinancialNormalizer,
}

impl TableReconstructor {
    pub fn new(normalizer: FinancialNormalizer) -> Self {
        Self { normalizer }
    }

    pub fn reconstruct(
        &self,
        rows: &[Region],
        cols: &[Region],
        cells: &[RecognizedCell],
    ) -> LogicalTable {
        let index = GeometryIndexer::new(rows, cols);
        let assembled = CellAssembler::assemble(cells, &index);
        let mut table = GridReconstructor::reconstruct(&assembled);
        let numeric = self.normalizer.normalize_table(&mut table);

        tracing::debug!(
            rows = table.row_count(),
            cols = table.col_count(),
            unresolved = table.unresolved.len(),
            numeric_columns = ?numeric,
            "table reconstructed"
        );
        table
    }
}
