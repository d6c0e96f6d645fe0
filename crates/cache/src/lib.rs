// SPDX-License-Identifier: PolyForm-Shield-1.0

//! On-disk state owned by the agent's collaborators:
//!
//! - [`JsonStore`]: the latest dispatch record as a single JSON document.
//! - [`LabelStore`]: the class-label list as plain text, one label per line.
//! - [`RunLog`]: an append-only, timestamped history of dispatch records.
//!
//! Everything here is synchronous and small; none of it is on the inference
//! hot path.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

mod json;
mod labels;
mod runlog;

pub use json::JsonStore;
pub use labels::LabelStore;
pub use runlog::RunLog;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("label file {} contains no labels", .0.display())]
    EmptyLabels(PathBuf),
}

/// write `contents` next to `target` and rename it into place, so readers
/// never observe a half-written file.
pub(crate) fn write_atomically(target: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let mut tmp_name = target.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    {
        let mut file = fs::File::create(&tmp_path)
            .with_context(|| format!("failed to create temporary file {}", tmp_path.display()))?;
        file.write_all(contents)
            .with_context(|| format!("failed to write temporary file {}", tmp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("failed to sync temporary file {}", tmp_path.display()))?;
    }

    fs::rename(&tmp_path, target).with_context(|| {
        format!(
            "failed to move {} into place at {}",
            tmp_path.display(),
            target.display()
        )
    })?;

    Ok(())
}
