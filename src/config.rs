use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DetectError;

/// Model canvas size used by the grape-cluster detector.
pub const DEFAULT_TARGET_SIZE: u32 = 640;

/// Letterbox fill, mid-gray.
pub const DEFAULT_PAD_COLOR: [u8; 3] = [114, 114, 114];

/// Rows accepted from the adapter before the output is rejected as malformed.
pub const DEFAULT_MAX_RAW_ROWS: usize = 50_000;

/// Cluster counts above this are reported as a heavy crop load.
pub const DEFAULT_HEAVY_LOAD_THRESHOLD: usize = 8;

/// Byte and pixel limits applied before an image is fully decoded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageLimits {
    pub max_input_bytes: usize,
    pub max_image_pixels: u64,
    pub max_dimension: u32,
    pub max_alloc_bytes: u64,
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self {
            max_input_bytes: 20 * 1024 * 1024,
            max_image_pixels: 100_000_000,
            max_dimension: 16_384,
            max_alloc_bytes: 512 * 1024 * 1024,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub conf_threshold: f32,
    pub iou_threshold: f32,
    pub target_width: u32,
    pub target_height: u32,
    pub pad_color: [u8; 3],
    /// Upper bound on candidates entering NMS. `None` keeps every candidate.
    pub max_candidates: Option<usize>,
    pub max_raw_rows: usize,
    pub heavy_load_threshold: usize,
    pub limits: ImageLimits,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            conf_threshold: 0.25,
            iou_threshold: 0.45,
            target_width: DEFAULT_TARGET_SIZE,
            target_height: DEFAULT_TARGET_SIZE,
            pad_color: DEFAULT_PAD_COLOR,
            max_candidates: None,
            max_raw_rows: DEFAULT_MAX_RAW_ROWS,
            heavy_load_threshold: DEFAULT_HEAVY_LOAD_THRESHOLD,
            limits: ImageLimits::default(),
        }
    }
}

impl DetectionConfig {
    /// Loads a config from a JSON file; missing fields fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the file cannot be read, parsed, or fails validation.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DetectError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DetectError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| DetectError::InvalidConfig(format!("cannot parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_thresholds(mut self, conf_threshold: f32, iou_threshold: f32) -> Self {
        self.conf_threshold = conf_threshold;
        self.iou_threshold = iou_threshold;
        self
    }

    #[must_use]
    pub fn target_size(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }

    /// # Errors
    ///
    /// Returns `InvalidConfig` for thresholds outside `[0, 1]`, a zero-sized
    /// target, or a zero candidate cap.
    pub fn validate(&self) -> Result<(), DetectError> {
        validate_unit("conf_threshold", self.conf_threshold)?;
        validate_unit("iou_threshold", self.iou_threshold)?;

        if self.target_width == 0 || self.target_height == 0 {
            return Err(DetectError::InvalidConfig(format!(
                "target size must be non-zero, got {}x{}",
                self.target_width, self.target_height
            )));
        }

        if self.max_candidates == Some(0) {
            return Err(DetectError::InvalidConfig(
                "max_candidates must be at least 1 when set".into(),
            ));
        }

        Ok(())
    }
}

fn validate_unit(name: &str, value: f32) -> Result<(), DetectError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(DetectError::InvalidConfig(format!(
            "{name} must be in [0, 1], got {value}"
        )));
    }
    Ok(())
}
