//! Detection post-processing for grape-cluster counting.
//!
//! An image is letterboxed onto the model canvas, handed to an injected
//! [`InferenceAdapter`], and the raw rows it returns are decoded, filtered by
//! `objectness * class_score`, mapped back to image pixels and reduced with
//! greedy non-maximum suppression.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

pub mod adapter;
pub mod boxes;
pub mod cluster;
pub mod config;
pub mod error;
pub mod image_input;
pub mod letterbox;
pub mod nms;
pub mod pipeline;
pub mod postprocess;

pub use adapter::{AdapterError, InferenceAdapter};
pub use boxes::{iou, BoundingBox};
pub use cluster::{ClusterReport, CropLoad, ScanId};
pub use config::{DetectionConfig, ImageLimits};
pub use error::{DetectError, DetectResult, ErrorKind};
pub use image_input::{decode_image, ImageInputError};
pub use letterbox::{letterbox, unletterbox, LetterboxParams, Letterboxed};
pub use nms::nms;
pub use pipeline::{Detections, Detector};

#[cfg(feature = "onnx")]
pub use adapter::OrtAdapter;
