// SPDX-License-Identifier: PolyForm-Shield-1.0

//! Runtime-B: OpenVINO intermediate-representation artifacts.
//!
//! An IR artifact is a pair: the `.xml` network description named in the
//! artifact table and a `.bin` weights file next to it. Both halves must
//! exist. Models are compiled for the CPU device.

use std::path::Path;

use protocol::BackendFamily;
use tracing::info;

use crate::{artifact, InferenceBackend, LoadedModel, RuntimeError};

#[derive(Debug, Clone, Default)]
pub struct OpenVinoBackend;

impl OpenVinoBackend {
    pub fn new() -> Self {
        Self
    }
}

impl InferenceBackend for OpenVinoBackend {
    fn family(&self) -> BackendFamily {
        BackendFamily::OpenVino
    }

    fn load(&self, artifact_path: &Path) -> Result<Box<dyn LoadedModel>, RuntimeError> {
        let engine = engine::Engine::open()?;
        let weights = artifact::ir_weights_path(artifact_path);
        artifact::require_file(artifact_path)?;
        artifact::require_file(&weights)?;

        let model = engine.load(artifact_path, &weights)?;
        info!("openvino: compiled {} for CPU", artifact_path.display());
        Ok(model)
    }
}

#[cfg(feature = "runtime-openvino")]
mod engine {
    use std::path::{Path, PathBuf};

    use openvino::{CompiledModel, Core, DeviceType, ElementType, InferRequest, Shape, Tensor};
    use protocol::BackendFamily;
    use tracing::debug;

    use crate::{artifact, InputTensor, LoadedModel, RawOutput, RuntimeError, INPUT_SHAPE};

    struct OpenVinoModel {
        path: PathBuf,
        request: InferRequest,
        // the request is created from this compiled model; keep it alive
        // for as long as the request is.
        _compiled: CompiledModel,
    }

    pub(super) struct Engine {
        core: Core,
    }

    impl Engine {
        /// with runtime linking this is where a missing libopenvino surfaces.
        pub(super) fn open() -> Result<Self, RuntimeError> {
            let core =
                Core::new().map_err(|e| RuntimeError::unavailable(BackendFamily::OpenVino, e))?;
            Ok(Self { core })
        }

        pub(super) fn load(
            mut self,
            description: &Path,
            weights: &Path,
        ) -> Result<Box<dyn LoadedModel>, RuntimeError> {
            let model = self
                .core
                .read_model_from_file(&description.to_string_lossy(), &weights.to_string_lossy())
                .map_err(|e| RuntimeError::load(description, e))?;

            let inputs = model
                .get_inputs_len()
                .map_err(|e| RuntimeError::load(description, e))?;
            if inputs != 1 {
                return Err(RuntimeError::load(
                    description,
                    format!("expected one image input, model declares {inputs}"),
                ));
            }
            let outputs = model
                .get_outputs_len()
                .map_err(|e| RuntimeError::load(description, e))?;
            if outputs == 0 {
                return Err(RuntimeError::load(description, "model declares no outputs"));
            }

            let mut compiled = self
                .core
                .compile_model(&model, DeviceType::CPU)
                .map_err(|e| RuntimeError::load(description, e))?;
            let mut request = compiled
                .create_infer_request()
                .map_err(|e| RuntimeError::load(description, e))?;

            // a static input is pre-allocated with its declared shape; a
            // dynamic one has no tensor yet and is left to the forward pass.
            match request
                .get_input_tensor_by_index(0)
                .and_then(|t| t.get_shape())
            {
                Ok(shape) if !shape.get_dimensions().is_empty() => {
                    artifact::require_image_input(description, shape.get_dimensions())?;
                }
                _ => debug!("openvino: {} has a dynamic input shape", description.display()),
            }

            Ok(Box::new(OpenVinoModel {
                path: description.to_path_buf(),
                request,
                _compiled: compiled,
            }))
        }
    }

    impl LoadedModel for OpenVinoModel {
        fn artifact_path(&self) -> &Path {
            &self.path
        }

        fn run(&mut self, input: &InputTensor) -> Result<RawOutput, RuntimeError> {
            let exec = |e: openvino::InferenceError| RuntimeError::execution(&self.path, e);

            let dims: Vec<i64> = INPUT_SHAPE.iter().map(|&d| d as i64).collect();
            let shape = Shape::new(&dims).map_err(exec)?;
            let mut tensor = Tensor::new(ElementType::F32, &shape).map_err(exec)?;
            tensor
                .get_data_mut::<f32>()
                .map_err(exec)?
                .copy_from_slice(input.as_slice());

            self.request.set_input_tensor(&tensor).map_err(exec)?;
            self.request.infer().map_err(exec)?;

            let output = self.request.get_output_tensor_by_index(0).map_err(exec)?;
            let out_shape: Vec<usize> = output
                .get_shape()
                .map_err(exec)?
                .get_dimensions()
                .iter()
                .map(|&d| d.max(0) as usize)
                .collect();
            let values = output.get_data::<f32>().map_err(exec)?.to_vec();

            Ok(RawOutput::new(out_shape, values))
        }
    }
}

#[cfg(not(feature = "runtime-openvino"))]
mod engine {
    use std::path::Path;

    use protocol::BackendFamily;

    use crate::{LoadedModel, RuntimeError};

    /// never constructed: without the feature there is no engine to open.
    pub(super) enum Engine {}

    impl Engine {
        pub(super) fn open() -> Result<Self, RuntimeError> {
            Err(RuntimeError::unavailable(
                BackendFamily::OpenVino,
                "built without the `runtime-openvino` feature",
            ))
        }

        pub(super) fn load(
            self,
            _description: &Path,
            _weights: &Path,
        ) -> Result<Box<dyn LoadedModel>, RuntimeError> {
            match self {}
        }
    }
}
