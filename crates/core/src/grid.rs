use serde::{Deserialize, Serialize};

use crate::assembler::{AssembledCells, Fragment, GridCoordinate};
use crate::diagnostic::Diagnostic;

/// Confidence given to a slot no fragment landed in.
///
/// Absence of text is treated as fully certain so structural gaps do not drag
/// the table average down. This inflates the average for sparse tables.
pub const EMPTY_CELL_CONFIDENCE: f32 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub text: String,
    pub confidence: f32,
    /// Number of recognized fragments merged into this slot.
    pub fragments: usize,
}

impl TableCell {
    pub fn empty() -> Self {
        Self { text: String::new(), confidence: EMPTY_CELL_CONFIDENCE, fragments: 0 }
    }

    fn merged(frags: &[Fragment]) -> Self {
        let text = frags
            .iter()
            .map(|f| f.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let confidence = if frags.is_empty() {
            EMPTY_CELL_CONFIDENCE
        } else {
            frags.iter().map(|f| f.confidence).sum::<f32>() / frags.len() as f32
        };
        Self { text, confidence, fragments: frags.len() }
    }

    pub fn is_populated(&self) -> bool {
        self.fragments > 0
    }
}

/// A fragment that could not be placed in the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedCell {
    /// Band indices as resolved by the geometry index (before compaction).
    pub coordinate: GridCoordinate,
    #[serde(flatten)]
    pub fragment: Fragment,
}

/// Dense reconstructed table: every row holds exactly `col_count` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogicalTable {
    rows: Vec<Vec<TableCell>>,
    col_count: usize,
    pub unresolved: Vec<UnresolvedCell>,
    pub diagnostics: Vec<Diagnostic>,
}

impl LogicalTable {
    /// Build a table from plain text rows, padding short rows with empty cells.
    pub fn from_text_rows<S: AsRef<str>>(rows: &[Vec<S>]) -> Self {
        let col_count = rows.iter().map(Vec::len).max().unwrap_or(0);
        let rows = rows
            .iter()
            .map(|r| {
                let mut cells: Vec<TableCell> = r
                    .iter()
                    .map(|t| TableCell {
                        text: t.as_ref().to_string(),
                        confidence: EMPTY_CELL_CONFIDENCE,
                        fragments: 1,
                    })
                    .collect();
                cells.resize(col_count, TableCell::empty());
                cells
            })
            .collect();
        Self { rows, col_count, ..Default::default() }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn col_count(&self) -> usize {
        self.col_count
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&TableCell> {
        self.rows.get(row)?.get(col)
    }

    pub fn rows(&self) -> &[Vec<TableCell>] {
        &self.rows
    }

    pub fn column(&self, col: usize) -> impl Iterator<Item = &TableCell> + '_ {
        self.rows.iter().filter_map(move |r| r.get(col))
    }

    pub fn column_mut(&mut self, col: usize) -> impl Iterator<Item = &mut TableCell> + '_ {
        self.rows.iter_mut().filter_map(move |r| r.get_mut(col))
    }

    pub fn text_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|r| r.iter().map(|c| c.text.clone()).collect())
            .collect()
    }

    /// Mean slot confidence, empty slots included. `None` for a 0×0 table.
    pub fn mean_confidence(&self) -> Option<f32> {
        let n = self.row_count() * self.col_count();
        if n == 0 {
            return None;
        }
        let sum: f32 = self.rows.iter().flatten().map(|c| c.confidence).sum();
        Some(sum / n as f32)
    }
}

pub struct GridReconstructor;

impl GridReconstructor {
    /// Lay assembled fragments out as a dense grid.
    ///
    /// Leading and trailing rows/columns that received no fragment are dropped;
    /// empty rows/columns between populated ones are kept.
    pub fn reconstruct(assembled: &AssembledCells) -> LogicalTable {
        let mut table = LogicalTable::default();

        if assembled.is_empty() {
            table.diagnostics.push(Diagnostic::EmptyInput);
            return table;
        }

        for (coord, frags) in assembled.unassigned() {
            for f in frags {
                table.diagnostics.push(Diagnostic::GeometryUnresolved {
                    coordinate: *coord,
                    text: f.text.clone(),
                    confidence: f.confidence,
                });
                table.unresolved.push(UnresolvedCell { coordinate: *coord, fragment: f.clone() });
            }
        }

        let extent = assembled.assigned().fold(None, |acc: Option<Extent>, ((r, c), _)| {
            Some(match acc {
                None => Extent { row_min: r, row_max: r, col_min: c, col_max: c },
                Some(e) => Extent {
                    row_min: e.row_min.min(r),
                    row_max: e.row_max.max(r),
                    col_min: e.col_min.min(c),
                    col_max: e.col_max.max(c),
                },
            })
        });
        let Some(extent) = extent else {
            return table;
        };

        let row_count = extent.row_max - extent.row_min + 1;
        let col_count = extent.col_max - extent.col_min + 1;
        let mut rows = vec![vec![TableCell::empty(); col_count]; row_count];
        for ((r, c), frags) in assembled.assigned() {
            rows[r - extent.row_min][c - extent.col_min] = TableCell::merged(frags);
        }

        table.rows = rows;
        table.col_count = col_count;
        table
    }
}

#[derive(Debug, Clone, Copy)]
struct Extent {
    row_min: usize,
    row_max: usize,
    col_min: usize,
    col_max: usize,
}
