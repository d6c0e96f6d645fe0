// SPDX-License-Identifier: PolyForm-Shield-1.0

use std::path::PathBuf;

use model_runtime::{BackendRegistry, InputTensor};
use protocol::{ArtifactTable, BackendFamily, ModelVariant};
use serde::Serialize;
use tracing::{info, warn};

/// outcome of loading one artifact and running a blank input through it.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub variant: ModelVariant,
    pub artifact_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_shape: Option<Vec<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// smoke-test every artifact of `family`. failures are reported per
/// artifact rather than stopping the probe.
pub fn probe(
    registry: &BackendRegistry,
    artifacts: &ArtifactTable,
    family: BackendFamily,
) -> Vec<ProbeReport> {
    let input = InputTensor::zeros();

    ModelVariant::ALL
        .into_iter()
        .map(|variant| {
            let path = artifacts.resolve(variant, family).to_path_buf();
            let outcome = registry
                .get(family)
                .and_then(|backend| backend.load(&path))
                .and_then(|mut model| model.run(&input));

            match outcome {
                Ok(raw) => {
                    info!("{} {}: output shape {:?}", family, path.display(), raw.shape());
                    ProbeReport {
                        variant,
                        artifact_path: path,
                        output_shape: Some(raw.shape().to_vec()),
                        error: None,
                    }
                }
                Err(err) => {
                    warn!("{} {}: {}", family, path.display(), err);
                    ProbeReport {
                        variant,
                        artifact_path: path,
                        output_shape: None,
                        error: Some(err.to_string()),
                    }
                }
            }
        })
        .collect()
}
