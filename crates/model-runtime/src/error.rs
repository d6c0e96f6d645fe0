// SPDX-License-Identifier: PolyForm-Shield-1.0

use std::path::PathBuf;

use protocol::BackendFamily;
use thiserror::Error;

/// failures raised by backend adapters. none of these are retried.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// the artifact path (or half of an IR pair) does not exist.
    #[error("artifact not found: {}", path.display())]
    ArtifactNotFound { path: PathBuf },

    /// the artifact exists but the engine rejected it, or its signature is
    /// not a single image input with at least one output.
    #[error("failed to load artifact {}: {reason}", path.display())]
    ArtifactLoad { path: PathBuf, reason: String },

    /// the engine for this family is not compiled in or cannot be loaded.
    #[error("{family} runtime is unavailable: {reason}")]
    BackendUnavailable {
        family: BackendFamily,
        reason: String,
    },

    /// the engine accepted the model but the forward pass itself failed.
    #[error("forward pass on {} failed: {reason}", path.display())]
    Execution { path: PathBuf, reason: String },
}

#[cfg_attr(
    not(any(feature = "runtime-onnx", feature = "runtime-openvino")),
    allow(dead_code)
)]
impl RuntimeError {
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }

    pub(crate) fn load<P: Into<PathBuf>, E: std::fmt::Display>(path: P, err: E) -> Self {
        Self::ArtifactLoad {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn execution<P: Into<PathBuf>, E: std::fmt::Display>(path: P, err: E) -> Self {
        Self::Execution {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn unavailable<E: std::fmt::Display>(family: BackendFamily, err: E) -> Self {
        Self::BackendUnavailable {
            family,
            reason: err.to_string(),
        }
    }
}
