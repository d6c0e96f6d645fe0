// SPDX-License-Identifier: PolyForm-Shield-1.0

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

/// append-only text log, one `"<local time>: <message>"` line per entry.
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, message: &str) -> Result<()> {
        self.append_at(Local::now(), message)
    }

    fn append_at(&self, at: DateTime<Local>, message: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory {}", parent.display()))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open run log {}", self.path.display()))?;

        // messages are single-line JSON; flatten anything else so one entry
        // stays one line.
        let line = message.replace('\n', " ");
        writeln!(file, "{}: {}", at.format("%a %b %e %H:%M:%S %Y"), line)
            .with_context(|| format!("failed to append to run log {}", self.path.display()))?;
        Ok(())
    }
}
