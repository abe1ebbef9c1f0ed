//! Grape-cluster count report.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::adapter::InferenceAdapter;
use crate::error::DetectError;
use crate::pipeline::{Detections, Detector};

pub const HEAVY_LOAD_ADVICE: &str = "Heavy crop load detected. Consider thinning to improve quality.";
pub const SAFE_RANGE_ADVICE: &str = "Cluster count in safe range.";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanId(String);

impl ScanId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for ScanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CropLoad {
    #[default]
    Normal,
    Heavy,
}

impl CropLoad {
    /// Strictly more than `heavy_threshold` clusters is a heavy load.
    #[must_use]
    pub const fn classify(cluster_count: usize, heavy_threshold: usize) -> Self {
        if cluster_count > heavy_threshold {
            Self::Heavy
        } else {
            Self::Normal
        }
    }

    #[must_use]
    pub const fn advice(self) -> &'static str {
        match self {
            Self::Heavy => HEAVY_LOAD_ADVICE,
            Self::Normal => SAFE_RANGE_ADVICE,
        }
    }
}

/// Per-image result of a cluster scan, serialized in the service's camelCase shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterReport {
    pub scan_id: ScanId,
    pub cluster_count: usize,
    pub crop_load: CropLoad,
    pub advice: &'static str,
}

impl ClusterReport {
    #[must_use]
    pub fn from_detections(detections: &Detections, heavy_threshold: usize) -> Self {
        let cluster_count = detections.count();
        let crop_load = CropLoad::classify(cluster_count, heavy_threshold);
        Self {
            scan_id: ScanId::generate(),
            cluster_count,
            crop_load,
            advice: crop_load.advice(),
        }
    }
}

impl<A: InferenceAdapter> Detector<A> {
    /// Detects clusters in encoded image bytes and summarizes them.
    ///
    /// # Errors
    ///
    /// Same as [`Detector::detect_bytes`].
    #[instrument(skip(self, raw_bytes), fields(input_size = raw_bytes.len()))]
    pub fn cluster_report(&self, raw_bytes: &[u8]) -> Result<ClusterReport, DetectError> {
        let detections = self.detect_bytes(raw_bytes)?;
        let report = ClusterReport::from_detections(&detections, self.config().heavy_load_threshold);

        info!(
            scan_id = %report.scan_id,
            cluster_count = report.cluster_count,
            crop_load = ?report.crop_load,
            "cluster scan completed"
        );

        Ok(report)
    }
}
