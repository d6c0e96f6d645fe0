// SPDX-License-Identifier: PolyForm-Shield-1.0

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use protocol::BackendFamily;
use tracing::{debug, warn};

use crate::{InferenceBackend, LoadedModel, RuntimeError};

type CacheKey = (BackendFamily, PathBuf);

/// loaded models kept across dispatches, keyed by family and artifact path.
///
/// the whole map sits behind one mutex, so a cached model is only ever
/// driven by one caller at a time. a load failure caches nothing.
#[derive(Default)]
pub struct ModelCache {
    entries: Mutex<HashMap<CacheKey, Box<dyn LoadedModel>>>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// run `f` against the model for `path`, loading it through `backend`
    /// on first use.
    pub fn with_model<R, F>(
        &self,
        backend: &dyn InferenceBackend,
        path: &Path,
        f: F,
    ) -> Result<R, RuntimeError>
    where
        F: FnOnce(&mut dyn LoadedModel) -> Result<R, RuntimeError>,
    {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("model cache lock poisoned; continuing with inner state");
            PoisonError::into_inner(poisoned)
        });

        // the key carries the artifact path, so a hit is always the model
        // that was loaded from `path`.
        let model = match entries.entry((backend.family(), path.to_path_buf())) {
            Entry::Occupied(slot) => {
                debug!("model cache hit for {}", path.display());
                slot.into_mut()
            }
            Entry::Vacant(slot) => {
                debug!("model cache miss for {}", path.display());
                slot.insert(backend.load(path)?)
            }
        };

        f(model.as_mut())
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
