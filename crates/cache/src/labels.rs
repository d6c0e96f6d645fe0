// SPDX-License-Identifier: PolyForm-Shield-1.0

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::{write_atomically, CacheError};

/// plain-text label list: line `n` holds the label for class index `n`.
#[derive(Debug, Clone)]
pub struct LabelStore {
    path: PathBuf,
}

impl LabelStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// `Ok(None)` when the file has not been written yet. a file that exists
    /// but holds no labels is an error: index alignment would be meaningless.
    pub fn load(&self) -> Result<Option<Vec<String>>> {
        if !self.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read label file {}", self.path.display()))?;
        let labels: Vec<String> = contents.lines().map(|l| l.trim().to_string()).collect();

        if labels.is_empty() {
            return Err(CacheError::EmptyLabels(self.path.clone()).into());
        }
        Ok(Some(labels))
    }

    pub fn save(&self, labels: &[String]) -> Result<()> {
        let mut contents = String::new();
        for label in labels {
            contents.push_str(label.trim());
            contents.push('\n');
        }
        write_atomically(&self.path, contents.as_bytes())?;
        tracing::info!(
            "saved {} labels to {}",
            labels.len(),
            self.path.display()
        );
        Ok(())
    }
}
