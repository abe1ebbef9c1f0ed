use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapter::AdapterError;
use crate::image_input::ImageInputError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidImage,
    AdapterFailure,
    InvalidConfig,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidImage => "INVALID_IMAGE",
            Self::AdapterFailure => "ADAPTER_FAILURE",
            Self::InvalidConfig => "INVALID_CONFIG",
        }
    }

    /// Whether the failure was caused by the caller's input rather than the service.
    #[must_use]
    pub const fn is_client_error(self) -> bool {
        matches!(self, Self::InvalidImage | Self::InvalidConfig)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("invalid image: {0}")]
    InvalidImage(#[from] ImageInputError),

    #[error("inference adapter failed: {0}")]
    Adapter(#[from] AdapterError),

    #[error("malformed adapter output: expected {expected}, got {got}")]
    MalformedOutput { expected: String, got: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DetectError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidImage(_) => ErrorKind::InvalidImage,
            Self::Adapter(_) | Self::MalformedOutput { .. } => ErrorKind::AdapterFailure,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }

    pub(crate) fn malformed(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::MalformedOutput {
            expected: expected.into(),
            got: got.into(),
        }
    }
}

pub type DetectResult<T> = Result<T, DetectError>;
