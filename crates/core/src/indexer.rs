use crate::geometry::{Rect, Region, RegionLabel};

/// Closed interval `[min, max]` along one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub min: f32,
    pub max: f32,
}

impl Band {
    pub fn contains(&self, p: f32) -> bool {
        self.min <= p && p <= self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Vertical,
    Horizontal,
}

impl Axis {
    fn band(self, r: &Rect) -> Band {
        match self {
            Axis::Vertical => Band { min: r.y_min, max: r.y_max },
            Axis::Horizontal => Band { min: r.x_min, max: r.x_max },
        }
    }
}

/// Ordered row and column boundaries of one table.
///
/// Rows are sorted by their top edge and columns by their left edge. The sort
/// is stable, so regions with equal leading edges keep detection order. When
/// bands overlap, lookups return the first band in that order.
#[derive(Debug, Clone, Default)]
pub struct GeometryIndexer {
    rows: Vec<Band>,
    cols: Vec<Band>,
}

impl GeometryIndexer {
    pub fn new(rows: &[Region], cols: &[Region]) -> Self {
        Self {
            rows: sorted_bands(rows, Axis::Vertical),
            cols: sorted_bands(cols, Axis::Horizontal),
        }
    }

    /// Build from a mixed structure list, keeping only row and column regions.
    pub fn from_structure(regions: &[Region]) -> Self {
        let rows: Vec<Region> = regions
            .iter()
            .filter(|r| r.label == RegionLabel::Row)
            .cloned()
            .collect();
        let cols: Vec<Region> = regions
            .iter()
            .filter(|r| r.label == RegionLabel::Column)
            .cloned()
            .collect();
        Self::new(&rows, &cols)
    }

    pub fn row_of(&self, y: f32) -> Option<usize> {
        first_containing(&self.rows, y)
    }

    pub fn col_of(&self, x: f32) -> Option<usize> {
        first_containing(&self.cols, x)
    }

    pub fn rows(&self) -> &[Band] {
        &self.rows
    }

    pub fn cols(&self) -> &[Band] {
        &self.cols
    }
}

fn sorted_bands(regions: &[Region], axis: Axis) -> Vec<Band> {
    let mut bands: Vec<Band> = regions.iter().map(|r| axis.band(&r.bbox)).collect();
    bands.sort_by(|a, b| a.min.total_cmp(&b.min));
    bands
}

fn first_containing(bands: &[Band], p: f32) -> Option<usize> {
    bands.iter().position(|b| b.contains(p))
}
