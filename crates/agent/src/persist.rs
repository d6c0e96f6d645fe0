// SPDX-License-Identifier: PolyForm-Shield-1.0

use anyhow::{Context, Result};
use cache::{JsonStore, RunLog};
use config::OutputConfig;
use protocol::DispatchRecord;
use tracing::info;

/// where finished dispatch records go: the latest one overwrites a JSON
/// document, and every one is appended to the run log.
pub struct ResultSink {
    latest: JsonStore,
    log: RunLog,
}

impl ResultSink {
    pub fn from_config(output: &OutputConfig) -> Result<Self> {
        let latest = JsonStore::in_dir(&output.dir, &output.result_name)?;
        let log = RunLog::new(output.dir.join(&output.log_file));
        Ok(Self { latest, log })
    }

    pub fn persist(&self, record: &DispatchRecord) -> Result<()> {
        self.latest.save(record)?;
        let line = serde_json::to_string(record).context("failed to serialise dispatch record")?;
        self.log.append(&line)?;
        info!(
            "saved result to {} and appended to {}",
            self.latest.path().display(),
            self.log.path().display()
        );
        Ok(())
    }

    pub fn latest(&self) -> Result<Option<DispatchRecord>> {
        self.latest.load_optional()
    }
}
