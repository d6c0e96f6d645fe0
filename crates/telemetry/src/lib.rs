// SPDX-License-Identifier: PolyForm-Shield-1.0

//! Telemetry collaborator: produces the [`TelemetrySnapshot`] the selection
//! policy consumes.
//!
//! Readings come from `sysinfo`. Boards without a usable thermal sensor get
//! the load heuristic `35 + 0.4 × cpu_percent` instead of an error, and the
//! snapshot is flagged `temperature_estimated`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use protocol::TelemetrySnapshot;
use sysinfo::{
    Components, CpuRefreshKind, MemoryRefreshKind, RefreshKind, System,
    MINIMUM_CPU_UPDATE_INTERVAL,
};
use tracing::debug;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// anything that can hand out a fresh snapshot on demand.
pub trait TelemetrySource: Send + Sync {
    fn snapshot(&self) -> TelemetrySnapshot;
}

/// temperature used when no sensor reading is available.
pub fn estimate_temperature_c(cpu_percent: f64) -> f64 {
    35.0 + 0.4 * cpu_percent
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// live readings of the current host.
#[derive(Debug, Clone)]
pub struct SystemTelemetry {
    sample_window: Duration,
}

impl Default for SystemTelemetry {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl SystemTelemetry {
    /// `sample_window` is how long cpu usage is averaged over; it is raised
    /// to sysinfo's minimum update interval if shorter.
    pub fn new(sample_window: Duration) -> Self {
        Self {
            sample_window: sample_window.max(MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }

    pub fn sample_window(&self) -> Duration {
        self.sample_window
    }

    /// blocks for the sample window.
    fn read_load(&self) -> (f64, f64) {
        let mut sys = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::new().with_cpu_usage())
                .with_memory(MemoryRefreshKind::everything()),
        );
        std::thread::sleep(self.sample_window);
        sys.refresh_cpu_specifics(CpuRefreshKind::new().with_cpu_usage());
        sys.refresh_memory();

        let cpu = f64::from(sys.global_cpu_info().cpu_usage()).clamp(0.0, 100.0);
        let ram_mb = sys.available_memory() as f64 / BYTES_PER_MB;
        (cpu, ram_mb)
    }

    fn read_temperature() -> Option<f64> {
        let components = Components::new_with_refreshed_list();
        components
            .list()
            .iter()
            .map(|c| f64::from(c.temperature()))
            .find(|t| t.is_finite() && *t > 0.0)
    }
}

impl TelemetrySource for SystemTelemetry {
    fn snapshot(&self) -> TelemetrySnapshot {
        let (cpu, ram_mb) = self.read_load();
        let sensor = Self::read_temperature();
        let estimated = sensor.is_none();
        let temperature = sensor.unwrap_or_else(|| estimate_temperature_c(cpu));

        let mut snapshot = TelemetrySnapshot::new(
            round2(cpu),
            round2(ram_mb),
            round2(temperature),
            unix_timestamp(),
        );
        snapshot.temperature_estimated = estimated;

        debug!(
            "telemetry: cpu={:.2}% ram={:.2}MB temp={:.2}C (estimated={})",
            snapshot.cpu_percent,
            snapshot.available_ram_mb,
            snapshot.temperature_c,
            estimated
        );
        snapshot
    }
}

/// replays fixed load readings. used for what-if selection from the CLI and
/// for deterministic tests.
#[derive(Debug, Clone)]
pub struct FixedTelemetry {
    cpu_percent: f64,
    available_ram_mb: f64,
}

impl FixedTelemetry {
    pub fn new(cpu_percent: f64, available_ram_mb: f64) -> Self {
        Self {
            cpu_percent,
            available_ram_mb,
        }
    }
}

impl TelemetrySource for FixedTelemetry {
    fn snapshot(&self) -> TelemetrySnapshot {
        let mut snapshot = TelemetrySnapshot::new(
            self.cpu_percent,
            self.available_ram_mb,
            estimate_temperature_c(self.cpu_percent),
            unix_timestamp(),
        );
        snapshot.temperature_estimated = true;
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_heuristic_matches_reference_points() {
        assert_eq!(estimate_temperature_c(0.0), 35.0);
        assert_eq!(estimate_temperature_c(50.0), 55.0);
        assert_eq!(estimate_temperature_c(100.0), 75.0);
    }

    #[test]
    fn fixed_source_replays_readings_with_estimated_temperature() {
        let source = FixedTelemetry::new(65.0, 600.0);
        let snap = source.snapshot();

        assert_eq!(snap.cpu_percent, 65.0);
        assert_eq!(snap.available_ram_mb, 600.0);
        assert_eq!(snap.temperature_c, 61.0);
        assert!(snap.temperature_estimated);
        assert!(snap.timestamp > 0.0);
    }

    #[test]
    fn sample_window_is_clamped_to_sysinfo_minimum() {
        let telemetry = SystemTelemetry::new(Duration::ZERO);
        assert_eq!(telemetry.sample_window(), MINIMUM_CPU_UPDATE_INTERVAL);
    }

    #[test]
    fn live_snapshot_is_within_physical_ranges() {
        let snap = SystemTelemetry::new(Duration::ZERO).snapshot();

        assert!((0.0..=100.0).contains(&snap.cpu_percent));
        assert!(snap.available_ram_mb >= 0.0);
        assert!(snap.temperature_c.is_finite());
        assert!(!snap.platform.is_empty());
        assert_eq!(snap.cpu_percent, round2(snap.cpu_percent));
    }

    #[test]
    fn sources_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SystemTelemetry>();
        assert_send_sync::<FixedTelemetry>();
    }
}
