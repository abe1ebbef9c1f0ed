//! Inference capability.
//!
//! The pipeline never owns a model session. Callers construct an adapter once
//! (load-once, use-many) and inject it into a [`crate::Detector`].

use std::sync::Arc;

use ndarray::{Array4, ArrayD};

#[cfg(feature = "onnx")]
mod onnx;

#[cfg(feature = "onnx")]
pub use self::onnx::OrtAdapter;

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("inference backend error: {0}")]
    Backend(String),

    #[error("model load failed: {0}")]
    ModelLoad(#[from] std::io::Error),

    #[error("inference session lock poisoned")]
    LockPoisoned,
}

/// Runs the detection model on one preprocessed tensor.
///
/// Input is `[1, 3, H, W]`, channel-first RGB in `[0, 1]`. The output is
/// expected to be `[1, N, 6]` or `[N, 6]` with columns
/// `[cx, cy, w, h, objectness, class_score]`; the pipeline validates the
/// shape, so implementations return whatever the backend produced.
pub trait InferenceAdapter {
    /// # Errors
    ///
    /// Any backend failure. It is surfaced to the caller as an adapter failure
    /// and never treated as an empty detection set.
    fn infer(&self, input: Array4<f32>) -> Result<ArrayD<f32>, AdapterError>;
}

impl<A: InferenceAdapter + ?Sized> InferenceAdapter for &A {
    fn infer(&self, input: Array4<f32>) -> Result<ArrayD<f32>, AdapterError> {
        (**self).infer(input)
    }
}

impl<A: InferenceAdapter + ?Sized> InferenceAdapter for Box<A> {
    fn infer(&self, input: Array4<f32>) -> Result<ArrayD<f32>, AdapterError> {
        (**self).infer(input)
    }
}

impl<A: InferenceAdapter + ?Sized> InferenceAdapter for Arc<A> {
    fn infer(&self, input: Array4<f32>) -> Result<ArrayD<f32>, AdapterError> {
        (**self).infer(input)
    }
}
