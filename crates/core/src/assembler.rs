use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::{Rect, RecognizedCell};
use crate::indexer::GeometryIndexer;

/// Where a recognized cell landed in the table grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GridCoordinate {
    Assigned { row: usize, col: usize },
    /// At least one axis fell outside every band. The axis that did resolve is kept.
    Unassigned { row: Option<usize>, col: Option<usize> },
}

impl GridCoordinate {
    pub fn resolve(row: Option<usize>, col: Option<usize>) -> Self {
        match (row, col) {
            (Some(row), Some(col)) => GridCoordinate::Assigned { row, col },
            (row, col) => GridCoordinate::Unassigned { row, col },
        }
    }

    pub fn assigned(&self) -> Option<(usize, usize)> {
        match *self {
            GridCoordinate::Assigned { row, col } => Some((row, col)),
            GridCoordinate::Unassigned { .. } => None,
        }
    }
}

impl std::fmt::Display for GridCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn axis(v: Option<usize>) -> String {
            v.map_or_else(|| "?".to_string(), |i| i.to_string())
        }
        match *self {
            GridCoordinate::Assigned { row, col } => write!(f, "({row}, {col})"),
            GridCoordinate::Unassigned { row, col } => write!(f, "({}, {})", axis(row), axis(col)),
        }
    }
}

/// One piece of recognized text destined for a grid slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub text: String,
    pub confidence: f32,
    #[serde(rename = "box")]
    pub bbox: Rect,
}

/// Fragments grouped by grid coordinate, each group in detection order.
#[derive(Debug, Clone, Default)]
pub struct AssembledCells {
    groups: BTreeMap<GridCoordinate, Vec<Fragment>>,
}

impl AssembledCells {
    pub fn get(&self, coord: &GridCoordinate) -> Option<&[Fragment]> {
        self.groups.get(coord).map(Vec::as_slice)
    }

    /// Groups whose row and column both resolved.
    pub fn assigned(&self) -> impl Iterator<Item = ((usize, usize), &[Fragment])> {
        self.groups
            .iter()
            .filter_map(|(coord, frags)| coord.assigned().map(|rc| (rc, frags.as_slice())))
    }

    /// Groups with at least one unresolved axis.
    pub fn unassigned(&self) -> impl Iterator<Item = (&GridCoordinate, &[Fragment])> {
        self.groups
            .iter()
            .filter(|(coord, _)| coord.assigned().is_none())
            .map(|(coord, frags)| (coord, frags.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn fragment_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}

pub struct CellAssembler;

impl CellAssembler {
    /// Map every recognized cell to the slot containing its center point.
    pub fn assemble(cells: &[RecognizedCell], index: &GeometryIndexer) -> AssembledCells {
        let mut groups: BTreeMap<GridCoordinate, Vec<Fragment>> = BTreeMap::new();
        for cell in cells {
            let (cx, cy) = cell.bbox.center();
            let coord = GridCoordinate::resolve(index.row_of(cy), index.col_of(cx));
            groups.entry(coord).or_default().push(Fragment {
                text: cell.text.clone(),
                confidence: cell.confidence,
                bbox: cell.bbox,
            });
        }
        AssembledCells { groups }
    }
}
