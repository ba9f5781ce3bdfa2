//! finscan: rebuild financial tables from OCR detections and export them.
//!
//! ```bash
//! finscan reconstruct detections.json --out data/processed --header first-row
//! finscan summary detections.json
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use finscan_core::{FinscanConfig, HeaderMode};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "finscan")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Financial table reconstruction and export", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct every table in a detections file and write CSV/JSON pairs
    Reconstruct {
        /// Detector and recognizer output for one document
        detections: PathBuf,

        /// Output directory (defaults to the configured output_dir)
        #[arg(long)]
        out: Option<PathBuf>,

        /// File name prefix (defaults to the document id)
        #[arg(long)]
        basename: Option<String>,

        /// TOML settings file
        #[arg(long, env = "FINSCAN_CONFIG")]
        config: Option<PathBuf>,

        /// Column labels: index or first-row
        #[arg(long)]
        header: Option<HeaderMode>,
    },
    /// Print the quality summary without exporting
    Summary {
        /// Detector and recognizer output for one document
        detections: PathBuf,

        /// TOML settings file
        #[arg(long, env = "FINSCAN_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<FinscanConfig> {
    match path {
        Some(p) => FinscanConfig::load(p).with_context(|| format!("loading config {}", p.display())),
        None => Ok(FinscanConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Reconstruct { detections, out, basename, config, header } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(out) = out {
                config.output_dir = out;
            }
            if let Some(header) = header {
                config.header_mode = header;
            }

            let report = commands::reconstruct(&detections, &config, basename.as_deref()).await?;
            for pair in &report.exported {
                tracing::info!("Exported {} -> {}", pair.table_id, pair.csv_path.display());
            }
            for flag in &report.flags {
                tracing::warn!(
                    id = %flag.id,
                    kind = %flag.kind,
                    confidence = flag.confidence,
                    "review required: {}",
                    flag.source
                );
            }
            print!("{}", commands::render_summary(&report.metrics, &report.flags, config.confidence_threshold));
        }
        Commands::Summary { detections, config } => {
            let config = load_config(config.as_ref())?;
            let (metrics, flags) = commands::summarize(&detections, &config).await?;
            print!("{}", commands::render_summary(&metrics, &flags, config.confidence_threshold));
        }
    }

    Ok(())
}
