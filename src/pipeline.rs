use std::time::Instant;

use image::RgbImage;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::adapter::InferenceAdapter;
use crate::boxes::BoundingBox;
use crate::config::DetectionConfig;
use crate::error::DetectError;
use crate::image_input::decode_image;
use crate::letterbox::{letterbox, to_input_tensor};
use crate::nms::{cap_candidates, nms};
use crate::postprocess::{candidates, raw_rows};

/// Final detections in original-image pixels, in descending score order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Detections {
    pub boxes: Vec<BoundingBox>,
    /// Candidates that passed the confidence filter.
    pub candidates_before_nms: usize,
    /// Set when `max_candidates` dropped low-scoring candidates before NMS.
    pub truncated: bool,
}

impl Detections {
    #[must_use]
    pub fn count(&self) -> usize {
        self.boxes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

/// Detection pipeline over an injected inference adapter.
///
/// Holds no mutable state; share it across threads whenever `A: Sync`.
pub struct Detector<A> {
    adapter: A,
    config: DetectionConfig,
}

impl<A: InferenceAdapter> Detector<A> {
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `config` fails validation.
    pub fn new(adapter: A, config: DetectionConfig) -> Result<Self, DetectError> {
        config.validate()?;
        Ok(Self { adapter, config })
    }

    #[must_use]
    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    #[must_use]
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Runs letterbox, inference, decode, confidence filter, inverse letterbox
    /// and NMS on one image.
    ///
    /// An empty candidate set after the confidence filter is `Ok` with no boxes.
    ///
    /// # Errors
    ///
    /// `InvalidImage` for a zero-sized image, `Adapter` when inference fails,
    /// `MalformedOutput` when the adapter output has an unexpected shape.
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn detect(&self, image: &RgbImage) -> Result<Detections, DetectError> {
        let preprocess_start = Instant::now();
        let boxed = letterbox(image, self.config.target_size(), self.config.pad_color)?;
        let params = boxed.params;
        let input = to_input_tensor(&boxed.canvas);
        let preprocess_ms = preprocess_start.elapsed().as_secs_f64() * 1000.0;

        let inference_start = Instant::now();
        let output = self.adapter.infer(input)?;
        let inference_ms = inference_start.elapsed().as_secs_f64() * 1000.0;

        let postprocess_start = Instant::now();
        let rows = raw_rows(output, self.config.max_raw_rows)?;
        let raw_count = rows.nrows();

        let canvas_boxes = candidates(rows.view(), self.config.conf_threshold);
        if canvas_boxes.is_empty() {
            debug!(raw_count, preprocess_ms, inference_ms, "no candidates above confidence threshold");
            return Ok(Detections::default());
        }

        let mut image_boxes: Vec<BoundingBox> = canvas_boxes.iter().map(|b| params.unletterbox(b)).collect();
        let candidates_before_nms = image_boxes.len();

        let truncated = match self.config.max_candidates {
            Some(max) => cap_candidates(&mut image_boxes, max),
            None => false,
        };

        let boxes: Vec<BoundingBox> = nms(&image_boxes, self.config.iou_threshold)
            .into_iter()
            .map(|i| image_boxes[i])
            .collect();
        let postprocess_ms = postprocess_start.elapsed().as_secs_f64() * 1000.0;

        debug!(
            detections = boxes.len(),
            raw_count,
            candidates_before_nms,
            truncated,
            preprocess_ms,
            inference_ms,
            postprocess_ms,
            "detection completed"
        );

        Ok(Detections {
            boxes,
            candidates_before_nms,
            truncated,
        })
    }

    /// Number of detections in `image`.
    ///
    /// # Errors
    ///
    /// Same as [`Detector::detect`].
    pub fn count(&self, image: &RgbImage) -> Result<usize, DetectError> {
        Ok(self.detect(image)?.count())
    }

    /// Decodes encoded image bytes under the configured limits, then detects.
    ///
    /// # Errors
    ///
    /// `InvalidImage` when the bytes are empty, oversized, of an unsupported
    /// format or cannot be decoded; otherwise as [`Detector::detect`].
    #[instrument(skip(self, raw_bytes), fields(input_size = raw_bytes.len()))]
    pub fn detect_bytes(&self, raw_bytes: &[u8]) -> Result<Detections, DetectError> {
        let image = decode_image(&self.config.limits, raw_bytes)?;
        self.detect(&image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterError;
    use ndarray::{Array4, ArrayD, IxDyn};
    use std::cell::Cell;

    /// Returns fixed rows and records the tensor shape it was given.
    struct Fixed {
        rows: Vec<[f32; 6]>,
        seen: Cell<Option<Vec<usize>>>,
    }

    impl Fixed {
        fn new(rows: Vec<[f32; 6]>) -> Self {
            Self { rows, seen: Cell::new(None) }
        }
    }

    impl InferenceAdapter for Fixed {
        fn infer(&self, input: Array4<f32>) -> Result<ArrayD<f32>, AdapterError> {
            self.seen.set(Some(input.shape().to_vec()));
            let flat: Vec<f32> = self.rows.iter().flatten().copied().collect();
            ArrayD::from_shape_vec(IxDyn(&[1, self.rows.len(), 6]), flat)
                .map_err(|e| AdapterError::Backend(e.to_string()))
        }
    }

    fn small_config() -> DetectionConfig {
        DetectionConfig {
            target_width: 64,
            target_height: 64,
            ..Default::default()
        }
    }

    #[test]
    fn adapter_receives_target_sized_tensor() {
        let detector = Detector::new(Fixed::new(vec![]), small_config()).unwrap();
        let image = RgbImage::new(128, 32);

        assert_eq!(detector.count(&image).unwrap(), 0);
        assert_eq!(detector.adapter().seen.take(), Some(vec![1, 3, 64, 64]));
    }

    #[test]
    fn boxes_come_back_in_image_space() {
        // 128x32 into 64x64: scale 0.5, pad_y 24
        let adapter = Fixed::new(vec![[32.0, 32.0, 10.0, 4.0, 0.9, 0.9]]);
        let detector = Detector::new(adapter, small_config()).unwrap();

        let detections = detector.detect(&RgbImage::new(128, 32)).unwrap();
        assert_eq!(detections.count(), 1);
        assert_eq!(detections.boxes[0].corners(), [54.0, 12.0, 74.0, 20.0]);
        assert!((detections.boxes[0].score - 0.81).abs() < 1e-6);
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = DetectionConfig::default().with_thresholds(2.0, 0.5);
        assert!(matches!(
            Detector::new(Fixed::new(vec![]), config),
            Err(DetectError::InvalidConfig(_))
        ));
    }

    #[test]
    fn candidate_cap_marks_result_truncated() {
        let adapter = Fixed::new(vec![
            [10.0, 10.0, 4.0, 4.0, 0.5, 1.0],
            [30.0, 30.0, 4.0, 4.0, 0.9, 1.0],
            [50.0, 50.0, 4.0, 4.0, 0.7, 1.0],
        ]);
        let config = DetectionConfig {
            max_candidates: Some(2),
            ..small_config()
        };
        let detector = Detector::new(adapter, config).unwrap();

        let detections = detector.detect(&RgbImage::new(64, 64)).unwrap();
        assert!(detections.truncated);
        assert_eq!(detections.candidates_before_nms, 3);
        let scores: Vec<f32> = detections.boxes.iter().map(|b| b.score).collect();
        assert_eq!(scores, vec![0.9, 0.7]);
    }

    #[test]
    fn detections_serialize_as_json() {
        let detections = Detections {
            boxes: vec![BoundingBox::new(1.0, 2.0, 3.0, 4.0, 0.5)],
            candidates_before_nms: 1,
            truncated: false,
        };
        let json = serde_json::to_value(&detections).unwrap();
        assert_eq!(json["boxes"][0]["x2"], 3.0);
        assert_eq!(json["candidates_before_nms"], 1);
    }
}
