use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in page (or table-crop) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl Rect {
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self { x_min, y_min, x_max, y_max }
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x_min + self.x_max) / 2.0, (self.y_min + self.y_max) / 2.0)
    }

    pub fn width(&self) -> f32 {
        (self.x_max - self.x_min).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y_max - self.y_min).max(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }
}

impl From<[f32; 4]> for Rect {
    fn from(b: [f32; 4]) -> Self {
        Rect::new(b[0], b[1], b[2], b[3])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionLabel {
    #[serde(alias = "table rotated")]
    Table,
    #[serde(alias = "table row")]
    Row,
    #[serde(alias = "table column")]
    Column,
    #[serde(alias = "table cells", alias = "table cell")]
    Cell,
}

impl std::fmt::Display for RegionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegionLabel::Table => write!(f, "table"),
            RegionLabel::Row => write!(f, "row"),
            RegionLabel::Column => write!(f, "column"),
            RegionLabel::Cell => write!(f, "cell"),
        }
    }
}

impl std::str::FromStr for RegionLabel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "table" | "table rotated" => Ok(RegionLabel::Table),
            "row" | "table row" => Ok(RegionLabel::Row),
            "column" | "table column" => Ok(RegionLabel::Column),
            "cell" | "table cell" | "table cells" => Ok(RegionLabel::Cell),
            other => Err(format!("Unknown region label: '{other}'")),
        }
    }
}

/// A labeled rectangle produced by the external detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    #[serde(rename = "box")]
    pub bbox: Rect,
    pub label: RegionLabel,
    /// Detector score (0.0–1.0).
    pub score: f32,
}

impl Region {
    pub fn new(bbox: Rect, label: RegionLabel, score: f32) -> Self {
        Self { bbox, label, score: score.clamp(0.0, 1.0) }
    }
}

/// Text recognized inside one detected cell region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedCell {
    #[serde(rename = "box")]
    pub bbox: Rect,
    pub text: String,
    pub confidence: f32,
}

impl RecognizedCell {
    pub fn new(bbox: Rect, text: impl Into<String>, confidence: f32) -> Self {
        Self { bbox, text: text.into(), confidence: confidence.clamp(0.0, 1.0) }
    }
}
