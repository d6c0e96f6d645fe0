// SPDX-License-Identifier: PolyForm-Shield-1.0

use std::path::{Path, PathBuf};

use crate::{RuntimeError, INPUT_SHAPE};

/// fail with `ArtifactNotFound` unless `path` is an existing regular file.
pub fn require_file(path: &Path) -> Result<(), RuntimeError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(RuntimeError::ArtifactNotFound {
            path: path.to_path_buf(),
        })
    }
}

/// weights file that pairs with an IR description: `model.xml` -> `model.bin`.
pub fn ir_weights_path(description: &Path) -> PathBuf {
    description.with_extension("bin")
}

/// fail with `ArtifactLoad` unless the declared input dims can accept a
/// `1×3×224×224` batch. non-positive dims are dynamic and match anything.
pub fn require_image_input(path: &Path, dims: &[i64]) -> Result<(), RuntimeError> {
    let fits = dims.len() == INPUT_SHAPE.len()
        && dims
            .iter()
            .zip(INPUT_SHAPE)
            .all(|(&declared, want)| declared <= 0 || declared as usize == want);
    if fits {
        Ok(())
    } else {
        Err(RuntimeError::load(
            path,
            format!("input shape {dims:?} does not accept {INPUT_SHAPE:?}"),
        ))
    }
}
