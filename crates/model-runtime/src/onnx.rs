// SPDX-License-Identifier: PolyForm-Shield-1.0

//! Runtime-A: single-file graph artifacts executed by ONNX Runtime.

use std::path::Path;

use protocol::BackendFamily;
use tracing::info;

use crate::{artifact, InferenceBackend, LoadedModel, RuntimeError};

/// ONNX Runtime adapter on the CPU execution provider.
#[derive(Debug, Clone)]
pub struct OnnxBackend {
    intra_threads: usize,
}

impl Default for OnnxBackend {
    fn default() -> Self {
        Self::new(2)
    }
}

impl OnnxBackend {
    pub fn new(intra_threads: usize) -> Self {
        Self {
            intra_threads: intra_threads.max(1),
        }
    }
}

impl InferenceBackend for OnnxBackend {
    fn family(&self) -> BackendFamily {
        BackendFamily::Onnx
    }

    fn load(&self, artifact_path: &Path) -> Result<Box<dyn LoadedModel>, RuntimeError> {
        let engine = engine::Engine::open(self.intra_threads)?;
        artifact::require_file(artifact_path)?;
        let model = engine.load(artifact_path)?;
        info!("onnx: loaded {}", artifact_path.display());
        Ok(model)
    }
}

#[cfg(feature = "runtime-onnx")]
mod engine {
    use std::path::{Path, PathBuf};

    use ort::session::builder::SessionBuilder;
    use ort::session::Session;
    use ort::value::TensorRef;
    use protocol::BackendFamily;

    use crate::{artifact, InputTensor, LoadedModel, RawOutput, RuntimeError};

    struct OnnxModel {
        path: PathBuf,
        session: Session,
        input_name: String,
        output_name: String,
    }

    /// a configured session builder, not yet bound to an artifact.
    pub(super) struct Engine {
        builder: SessionBuilder,
    }

    impl Engine {
        pub(super) fn open(intra_threads: usize) -> Result<Self, RuntimeError> {
            let builder = Session::builder()
                .and_then(|b| b.with_intra_threads(intra_threads))
                .map_err(|e: ort::Error| RuntimeError::unavailable(BackendFamily::Onnx, e))?;
            Ok(Self { builder })
        }

        pub(super) fn load(self, path: &Path) -> Result<Box<dyn LoadedModel>, RuntimeError> {
            let session = self
                .builder
                .commit_from_file(path)
                .map_err(|e: ort::Error| RuntimeError::load(path, e))?;

            if session.inputs.len() != 1 {
                return Err(RuntimeError::load(
                    path,
                    format!("expected one image input, graph declares {}", session.inputs.len()),
                ));
            }
            let Some(output) = session.outputs.first() else {
                return Err(RuntimeError::load(path, "graph declares no outputs"));
            };

            let input = &session.inputs[0];
            let Some(dims) = input.input_type.tensor_shape() else {
                return Err(RuntimeError::load(path, "graph input is not a tensor"));
            };
            artifact::require_image_input(path, dims)?;

            let input_name = input.name.clone();
            let output_name = output.name.clone();
            tracing::debug!(
                "onnx: {} input={} {:?} output={}",
                path.display(),
                input_name,
                &dims[..],
                output_name
            );

            Ok(Box::new(OnnxModel {
                path: path.to_path_buf(),
                session,
                input_name,
                output_name,
            }))
        }
    }

    impl LoadedModel for OnnxModel {
        fn artifact_path(&self) -> &Path {
            &self.path
        }

        fn run(&mut self, input: &InputTensor) -> Result<RawOutput, RuntimeError> {
            let tensor = TensorRef::from_array_view(input.array())
                .map_err(|e| RuntimeError::execution(&self.path, e))?;

            let outputs = self
                .session
                .run(ort::inputs![self.input_name.as_str() => tensor])
                .map_err(|e| RuntimeError::execution(&self.path, e))?;

            let (shape, values) = outputs[self.output_name.as_str()]
                .try_extract_tensor::<f32>()
                .map_err(|e| RuntimeError::execution(&self.path, e))?;

            let dims = shape.iter().map(|&d| d.max(0) as usize).collect();
            Ok(RawOutput::new(dims, values.to_vec()))
        }
    }
}

#[cfg(not(feature = "runtime-onnx"))]
mod engine {
    use std::path::Path;

    use protocol::BackendFamily;

    use crate::{LoadedModel, RuntimeError};

    /// never constructed: without the feature there is no engine to open.
    pub(super) enum Engine {}

    impl Engine {
        pub(super) fn open(_intra_threads: usize) -> Result<Self, RuntimeError> {
            Err(RuntimeError::unavailable(
                BackendFamily::Onnx,
                "built without the `runtime-onnx` feature",
            ))
        }

        pub(super) fn load(self, _path: &Path) -> Result<Box<dyn LoadedModel>, RuntimeError> {
            match self {}
        }
    }
}
