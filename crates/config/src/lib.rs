// SPDX-License-Identifier: PolyForm-Shield-1.0

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use protocol::ArtifactTable;
use serde::{Deserialize, Serialize};

/// root configuration for the deployment agent.
///
/// every section has a default, so an empty file (or no file at all) yields
/// the stock artifact layout and selection thresholds. a file only needs to
/// name the values it overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RamdaConfig {
    /// optional directory that relative artifact paths are resolved against.
    pub model_root: Option<PathBuf>,
    pub artifacts: ArtifactTable,
    pub thresholds: ThresholdConfig,
    pub labels: LabelConfig,
    pub output: OutputConfig,
    pub telemetry: TelemetryConfig,
    /// keep loaded models around between dispatches in the same process.
    pub cache_models: bool,
}

impl RamdaConfig {
    /// the artifact table with `model_root` applied.
    pub fn artifact_table(&self) -> ArtifactTable {
        match &self.model_root {
            Some(root) => self.artifacts.rooted_at(root),
            None => self.artifacts.clone(),
        }
    }
}

/// load thresholds for the three model tiers. comparisons are strict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub full_max_cpu_percent: f64,
    pub full_min_ram_mb: f64,
    pub compressed_max_cpu_percent: f64,
    pub compressed_min_ram_mb: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            full_max_cpu_percent: 50.0,
            full_min_ram_mb: 1000.0,
            compressed_max_cpu_percent: 80.0,
            compressed_min_ram_mb: 400.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// plain-text label file, one label per line.
    pub path: PathBuf,
    /// JSON array of labels fetched when `path` does not exist yet.
    pub url: String,
    pub fetch_timeout_secs: u64,
    /// labels written to `path` instead of fetching `url`, for hosts with
    /// no network. empty means fetch.
    pub inline: Vec<String>,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("imagenet_labels.txt"),
            url: "https://raw.githubusercontent.com/anishathalye/imagenet-simple-labels/master/imagenet-simple-labels.json".to_string(),
            fetch_timeout_secs: 30,
            inline: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// file stem of the latest-result JSON document inside `dir`.
    pub result_name: String,
    /// append-only run log inside `dir`.
    pub log_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("outputs"),
            result_name: "inference_result".to_string(),
            log_file: "logs.txt".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// window over which cpu utilisation is averaged.
    pub sample_window_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            sample_window_ms: 500,
        }
    }
}

pub fn parse(contents: &str) -> Result<RamdaConfig> {
    let config = toml::from_str(contents).context("failed to parse ramda config")?;
    Ok(config)
}

pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<RamdaConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    parse(&contents).with_context(|| format!("invalid config in {}", path.display()))
}

/// load `path` when given, otherwise fall back to built-in defaults.
pub fn load_or_default(path: Option<&str>) -> Result<RamdaConfig> {
    match path {
        Some(p) => load_from_file(p),
        None => Ok(RamdaConfig::default()),
    }
}
