use std::path::Path;
use std::sync::Mutex;

use ndarray::{Array4, ArrayD, IxDyn};
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, instrument};

use super::{AdapterError, InferenceAdapter};

// Manual From impl to sanitize ORT errors
impl From<ort::Error> for AdapterError {
    fn from(e: ort::Error) -> Self {
        // Log full error internally, return sanitized version externally
        tracing::error!(error = %e, "ORT inference error");
        AdapterError::Backend("internal inference error".into())
    }
}

/// ONNX Runtime session behind the [`InferenceAdapter`] capability.
///
/// # Thread Safety
///
/// Session access is serialized through a mutex, so one adapter can be shared
/// (e.g. in an `Arc`) by concurrent detectors. For throughput, use a pool.
pub struct OrtAdapter {
    session: Mutex<Session>,
    output_name: String,
}

impl OrtAdapter {
    /// # Errors
    ///
    /// Returns error if the runtime rejects the model bytes.
    #[instrument(skip(model_bytes), fields(model_size = model_bytes.len()))]
    pub fn from_memory(model_bytes: &[u8]) -> Result<Self, AdapterError> {
        let session = Session::builder()?.commit_from_memory(model_bytes)?;

        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| AdapterError::Backend("model has no outputs".into()))?;

        debug!(output = %output_name, "model loaded");

        Ok(Self {
            session: Mutex::new(session),
            output_name,
        })
    }

    /// # Errors
    ///
    /// Returns error if the file cannot be read or the model cannot be loaded.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AdapterError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading model file");
        let model_bytes = std::fs::read(path)?;
        Self::from_memory(&model_bytes)
    }
}

impl InferenceAdapter for OrtAdapter {
    fn infer(&self, input: Array4<f32>) -> Result<ArrayD<f32>, AdapterError> {
        let input_value = Tensor::from_array(input)?;

        // Acquire lock for thread-safe inference
        let mut session = self.session.lock().map_err(|_| AdapterError::LockPoisoned)?;
        let outputs = session.run(ort::inputs![input_value])?;

        let output = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| AdapterError::Backend(format!("missing output node {}", self.output_name)))?;

        let (shape, data) = output.try_extract_tensor::<f32>()?;
        let dims = shape
            .iter()
            .map(|&dim| {
                usize::try_from(dim)
                    .map_err(|_| AdapterError::Backend(format!("negative output dimension in {shape:?}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        ArrayD::from_shape_vec(IxDyn(&dims), data.to_vec()).map_err(|e| AdapterError::Backend(e.to_string()))
    }
}
