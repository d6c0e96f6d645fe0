// SPDX-License-Identifier: PolyForm-Shield-1.0

//! Backend adapters that turn a model artifact plus an input tensor into raw
//! logits.
//!
//! Every runtime engine implements [`InferenceBackend`]; orchestration code
//! only ever sees `dyn InferenceBackend` obtained from a [`BackendRegistry`],
//! so adding a family never touches the dispatcher.
//!
//! Engines are compiled in behind cargo features (`runtime-onnx`,
//! `runtime-openvino`). A family that was compiled out still validates its
//! artifact paths and then reports [`RuntimeError::BackendUnavailable`].

use std::path::Path;

use protocol::BackendFamily;

pub mod artifact;
pub mod cache;
pub mod error;
pub mod onnx;
pub mod openvino;
pub mod registry;
pub mod tensor;

pub use cache::ModelCache;
pub use error::RuntimeError;
pub use onnx::OnnxBackend;
pub use openvino::OpenVinoBackend;
pub use registry::BackendRegistry;
pub use tensor::{InputTensor, RawOutput, INPUT_CHANNELS, INPUT_HEIGHT, INPUT_SHAPE, INPUT_WIDTH};

/// a model that has been loaded (and, where the engine needs it, compiled)
/// and is ready for forward passes.
pub trait LoadedModel: Send {
    /// the artifact this model was loaded from.
    fn artifact_path(&self) -> &Path;

    /// run exactly one forward pass and return the first declared output.
    fn run(&mut self, input: &InputTensor) -> Result<RawOutput, RuntimeError>;
}

/// one runtime engine family.
///
/// `load` fails with [`RuntimeError::BackendUnavailable`] when the engine
/// itself cannot be brought up, whatever the artifact. otherwise it fails
/// with [`RuntimeError::ArtifactNotFound`] before reading a missing
/// artifact, and with [`RuntimeError::ArtifactLoad`] when the engine rejects
/// it or its signature is not one `1×3×224×224` image input.
pub trait InferenceBackend: Send + Sync {
    fn family(&self) -> BackendFamily;

    fn load(&self, artifact_path: &Path) -> Result<Box<dyn LoadedModel>, RuntimeError>;
}
