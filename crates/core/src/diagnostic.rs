use serde::{Deserialize, Serialize};

use crate::assembler::GridCoordinate;

/// Non-fatal conditions noticed while reconstructing a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A cell center fell outside every row or column band.
    GeometryUnresolved { coordinate: GridCoordinate, text: String, confidence: f32 },
    /// A numeric column held a value that would not parse; it was kept verbatim.
    NormalizationSkipped { row: usize, col: usize, text: String },
    /// The table had no detected cells.
    EmptyInput,
}

impl Diagnostic {
    pub fn kind(&self) -> &'static str {
        match self {
            Diagnostic::GeometryUnresolved { .. } => "GeometryUnresolved",
            Diagnostic::NormalizationSkipped { .. } => "NormalizationSkipped",
            Diagnostic::EmptyInput => "EmptyInput",
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::GeometryUnresolved { coordinate, text, .. } => {
                write!(f, "cell '{text}' did not resolve to a grid slot {coordinate}")
            }
            Diagnostic::NormalizationSkipped { row, col, text } => {
                write!(f, "value '{text}' at ({row}, {col}) is not numeric; kept as-is")
            }
            Diagnostic::EmptyInput => write!(f, "no cells detected"),
        }
    }
}
