use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vineyard_detect::{ClusterReport, DetectionConfig, Detector, OrtAdapter};

/// Counts grape clusters in images with an ONNX detection model.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// ONNX model file
    #[arg(long, value_name = "FILE")]
    model: PathBuf,

    /// JSON detection config; missing fields use defaults
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Confidence threshold (0.0 - 1.0), overrides the config file
    #[arg(long, value_name = "THRESHOLD")]
    conf: Option<f32>,

    /// NMS IoU threshold (0.0 - 1.0), overrides the config file
    #[arg(long, value_name = "THRESHOLD")]
    iou: Option<f32>,

    /// Images to scan
    #[arg(required = true, value_name = "IMAGE")]
    images: Vec<PathBuf>,
}

#[derive(Serialize)]
struct ReportLine<'a> {
    file: &'a str,
    #[serde(flatten)]
    report: ClusterReport,
}

fn load_config(args: &Args) -> Result<DetectionConfig> {
    let mut config = match &args.config {
        Some(path) => DetectionConfig::from_json_file(path)?,
        None => DetectionConfig::default(),
    };

    if let Some(conf) = args.conf {
        config.conf_threshold = conf;
    }
    if let Some(iou) = args.iou {
        config.iou_threshold = iou;
    }

    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vineyard_detect=info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let adapter = OrtAdapter::from_file(&args.model)
        .with_context(|| format!("failed to load model {}", args.model.display()))?;
    let detector = Detector::new(adapter, config)?;
    info!(model = %args.model.display(), images = args.images.len(), "model loaded");

    let mut failed = 0usize;
    for path in &args.images {
        let result = std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))
            .and_then(|bytes| Ok(detector.cluster_report(&bytes)?));

        match result {
            Ok(report) => {
                let file = path.to_string_lossy();
                let line = ReportLine { file: &file, report };
                println!("{}", serde_json::to_string(&line)?);
            }
            Err(e) => {
                error!(file = %path.display(), error = %format_args!("{e:#}"), "scan failed");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} images failed", args.images.len());
    }

    Ok(())
}
