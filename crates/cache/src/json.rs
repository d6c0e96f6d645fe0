// SPDX-License-Identifier: PolyForm-Shield-1.0

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};

use crate::write_atomically;

/// a single serde value persisted as pretty-printed JSON.
///
/// the agent keeps its latest dispatch record here so a dashboard can poll
/// one well-known file:
///
/// ```ignore
/// let store = JsonStore::in_dir("outputs", "inference_result")?;
/// store.save(&record)?;
/// ```
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    /// `{dir}/{name}.json`, creating `dir` if needed.
    pub fn in_dir<P: AsRef<Path>>(dir: P, name: &str) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create store directory {}", dir.display()))?;
        Ok(Self {
            path: dir.join(format!("{name}.json")),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when the file is absent or blank.
    pub fn load_optional<T>(&self) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        if !self.path.exists() {
            return Ok(None);
        }

        let buf = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        if buf.trim().is_empty() {
            return Ok(None);
        }

        let value = serde_json::from_str(&buf)
            .with_context(|| format!("failed to parse JSON from {}", self.path.display()))?;
        Ok(Some(value))
    }

    pub fn save<T>(&self, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        let json = serde_json::to_string_pretty(value)
            .context("failed to serialise value to JSON")?;
        write_atomically(&self.path, json.as_bytes())?;
        tracing::debug!("wrote {}", self.path.display());
        Ok(())
    }
}
