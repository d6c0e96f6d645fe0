// SPDX-License-Identifier: PolyForm-Shield-1.0

use config::ThresholdConfig;
use protocol::{ArtifactTable, BackendFamily, Decision, ModelVariant, TelemetrySnapshot};

const REASON_FULL: &str = "Low CPU load and sufficient RAM -> FP32 selected";
const REASON_COMPRESSED: &str = "Moderate system load -> INT8 selected";
const REASON_PRUNED: &str = "High CPU load or low RAM -> PRUNED selected";

/// load limits for the two upper tiers. a tier applies only when cpu is
/// strictly below its limit and free ram strictly above its floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionThresholds {
    pub full_max_cpu_percent: f64,
    pub full_min_ram_mb: f64,
    pub compressed_max_cpu_percent: f64,
    pub compressed_min_ram_mb: f64,
}

impl Default for SelectionThresholds {
    fn default() -> Self {
        Self::from(&ThresholdConfig::default())
    }
}

impl From<&ThresholdConfig> for SelectionThresholds {
    fn from(cfg: &ThresholdConfig) -> Self {
        Self {
            full_max_cpu_percent: cfg.full_max_cpu_percent,
            full_min_ram_mb: cfg.full_min_ram_mb,
            compressed_max_cpu_percent: cfg.compressed_max_cpu_percent,
            compressed_min_ram_mb: cfg.compressed_min_ram_mb,
        }
    }
}

/// maps a telemetry snapshot to one of the configured artifacts.
///
/// pure and total: no I/O, no failure path. NaN readings fail every
/// comparison and land on the pruned tier.
#[derive(Debug, Clone)]
pub struct SelectionPolicy {
    thresholds: SelectionThresholds,
    artifacts: ArtifactTable,
}

impl SelectionPolicy {
    pub fn new(artifacts: ArtifactTable, thresholds: SelectionThresholds) -> Self {
        Self {
            thresholds,
            artifacts,
        }
    }

    pub fn artifacts(&self) -> &ArtifactTable {
        &self.artifacts
    }

    /// first matching tier wins.
    pub fn variant_for(&self, snapshot: &TelemetrySnapshot) -> (ModelVariant, &'static str) {
        let t = &self.thresholds;
        let cpu = snapshot.cpu_percent;
        let ram = snapshot.available_ram_mb;

        if cpu < t.full_max_cpu_percent && ram > t.full_min_ram_mb {
            (ModelVariant::Full, REASON_FULL)
        } else if cpu < t.compressed_max_cpu_percent && ram > t.compressed_min_ram_mb {
            (ModelVariant::Compressed, REASON_COMPRESSED)
        } else {
            (ModelVariant::Pruned, REASON_PRUNED)
        }
    }

    /// consumes the snapshot; it travels on inside the decision.
    pub fn select(&self, snapshot: TelemetrySnapshot, backend: BackendFamily) -> Decision {
        let (variant, reason) = self.variant_for(&snapshot);
        Decision {
            variant,
            artifact_path: self.artifacts.resolve(variant, backend).to_path_buf(),
            reason: reason.to_string(),
            snapshot,
        }
    }
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::new(ArtifactTable::default(), SelectionThresholds::default())
    }
}
