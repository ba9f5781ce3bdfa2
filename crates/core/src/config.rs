use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::normalize::DEFAULT_DIGIT_DENSITY_THRESHOLD;
use crate::quality::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_DETECTION_IOU};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// How export column labels are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeaderMode {
    /// Column indices: `"0"`, `"1"`, … Every grid row is exported as data.
    #[default]
    Index,
    /// The first grid row becomes the labels.
    FirstRow,
}

impl std::str::FromStr for HeaderMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "index" => Ok(HeaderMode::Index),
            "first-row" | "first_row" => Ok(HeaderMode::FirstRow),
            other => Err(format!("Unknown header mode: '{other}'")),
        }
    }
}

/// Runtime settings, loadable from a TOML file. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinscanConfig {
    /// Raw cell confidence below this is flagged.
    pub confidence_threshold: f32,
    /// Mean digit density above which a column is treated as amounts.
    pub digit_density_threshold: f64,
    /// Minimum detector score for table regions.
    pub table_threshold: f32,
    /// Minimum detector score for row/column/cell regions.
    pub structure_threshold: f32,
    /// Concurrent table reconstructions. 0 uses the available parallelism.
    pub max_workers: usize,
    pub output_dir: PathBuf,
    pub header_mode: HeaderMode,
    pub detection_iou: f32,
}

impl Default for FinscanConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            digit_density_threshold: DEFAULT_DIGIT_DENSITY_THRESHOLD,
            table_threshold: 0.7,
            structure_threshold: 0.3,
            max_workers: 0,
            output_dir: PathBuf::from("data/processed"),
            header_mode: HeaderMode::Index,
            detection_iou: DEFAULT_DETECTION_IOU,
        }
    }
}

impl FinscanConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FinscanConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml(&content)
    }

    pub fn worker_count(&self) -> usize {
        if self.max_workers > 0 {
            return self.max_workers;
        }
        std::thread::available_parallelism().map_or(1, |n| n.get())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let unit = [
            ("confidence_threshold", self.confidence_threshold),
            ("table_threshold", self.table_threshold),
            ("structure_threshold", self.structure_threshold),
            ("detection_iou", self.detection_iou),
        ];
        for (name, v) in unit {
            if !(0.0..=1.0).contains(&v) {
                return Err(ConfigError::Invalid(format!("{name} must be within 0.0–1.0, got {v}")));
            }
        }
        if !(0.0..=1.0).contains(&self.digit_density_threshold) {
            return Err(ConfigError::Invalid(format!(
                "digit_density_threshold must be within 0.0–1.0, got {}",
                self.digit_density_threshold
            )));
        }
        Ok(())
    }
}
