// SPDX-License-Identifier: PolyForm-Shield-1.0

use std::collections::HashMap;

use protocol::BackendFamily;
use tracing::info;

use crate::{InferenceBackend, OnnxBackend, OpenVinoBackend, RuntimeError};

/// maps each backend family to the adapter that executes it.
pub struct BackendRegistry {
    backends: HashMap<BackendFamily, Box<dyn InferenceBackend>>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl BackendRegistry {
    pub fn empty() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// ONNX Runtime and OpenVINO adapters. engines that were compiled out
    /// are still registered and answer with `BackendUnavailable`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(OnnxBackend::default()));
        registry.register(Box::new(OpenVinoBackend::new()));
        registry
    }

    /// install `backend` under its own family, replacing any previous one.
    pub fn register(&mut self, backend: Box<dyn InferenceBackend>) {
        let family = backend.family();
        if self.backends.insert(family, backend).is_some() {
            info!("replaced {} backend adapter", family);
        }
    }

    pub fn get(&self, family: BackendFamily) -> Result<&dyn InferenceBackend, RuntimeError> {
        self.backends
            .get(&family)
            .map(|b| b.as_ref())
            .ok_or_else(|| RuntimeError::BackendUnavailable {
                family,
                reason: "no adapter registered".to_string(),
            })
    }

    pub fn families(&self) -> Vec<BackendFamily> {
        BackendFamily::ALL
            .into_iter()
            .filter(|f| self.backends.contains_key(f))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_both_families() {
        let registry = BackendRegistry::with_defaults();
        assert_eq!(
            registry.families(),
            vec![BackendFamily::Onnx, BackendFamily::OpenVino]
        );
        assert_eq!(
            registry.get(BackendFamily::OpenVino).unwrap().family(),
            BackendFamily::OpenVino
        );
    }

    #[test]
    fn unregistered_family_is_unavailable() {
        let mut registry = BackendRegistry::empty();
        registry.register(Box::new(OnnxBackend::default()));

        let err = registry.get(BackendFamily::OpenVino).err().unwrap();
        assert!(err.is_backend_unavailable());
        assert!(registry.get(BackendFamily::Onnx).is_ok());
    }
}
