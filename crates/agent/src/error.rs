// SPDX-License-Identifier: PolyForm-Shield-1.0

use std::fmt;

use model_runtime::RuntimeError;
use thiserror::Error;

use crate::dispatcher::DispatchState;
use crate::normalize::NormalizeError;
use crate::preprocess::PreprocessError;

/// the first error a dispatch ran into.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

/// flat classification of [`DispatchError`], for callers and log lines that
/// only care about the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ImageDecode,
    UnsupportedFormat,
    ArtifactNotFound,
    ArtifactLoad,
    LabelIndexOutOfRange,
    BackendUnavailable,
    Execution,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ImageDecode => "ImageDecodeError",
            Self::UnsupportedFormat => "UnsupportedFormatError",
            Self::ArtifactNotFound => "ArtifactNotFoundError",
            Self::ArtifactLoad => "ArtifactLoadError",
            Self::LabelIndexOutOfRange => "LabelIndexOutOfRangeError",
            Self::BackendUnavailable => "BackendUnavailableError",
            Self::Execution => "ExecutionError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Preprocess(PreprocessError::ImageDecode(_)) => ErrorKind::ImageDecode,
            Self::Preprocess(PreprocessError::UnsupportedFormat { .. }) => {
                ErrorKind::UnsupportedFormat
            }
            Self::Runtime(RuntimeError::ArtifactNotFound { .. }) => ErrorKind::ArtifactNotFound,
            Self::Runtime(RuntimeError::ArtifactLoad { .. }) => ErrorKind::ArtifactLoad,
            Self::Runtime(RuntimeError::BackendUnavailable { .. }) => {
                ErrorKind::BackendUnavailable
            }
            Self::Runtime(RuntimeError::Execution { .. }) => ErrorKind::Execution,
            Self::Normalize(NormalizeError::LabelIndexOutOfRange { .. }) => {
                ErrorKind::LabelIndexOutOfRange
            }
            // a forward pass that yields NaN or infinity is a broken run.
            Self::Normalize(NormalizeError::NonFiniteLogit { .. }) => ErrorKind::Execution,
        }
    }
}

/// a dispatch that ended in `FAILED`. no partial result survives; only the
/// last state reached and the error that stopped it.
#[derive(Debug, Error)]
#[error("dispatch failed after {state}: {error}")]
pub struct DispatchFailure {
    pub state: DispatchState,
    #[source]
    pub error: DispatchError,
}

impl DispatchFailure {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    /// true when the other backend family might still succeed.
    pub fn is_backend_unavailable(&self) -> bool {
        self.kind() == ErrorKind::BackendUnavailable
    }
}
