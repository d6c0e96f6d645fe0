// SPDX-License-Identifier: PolyForm-Shield-1.0

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// point-in-time reading of system load, as handed to the selection policy.
///
/// the four core readings are mandatory; the remaining fields are host
/// metadata carried through to the wire record for operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub cpu_percent: f64,
    pub available_ram_mb: f64,
    pub temperature_c: f64,
    /// true when `temperature_c` came from the load heuristic rather than a sensor.
    #[serde(default)]
    pub temperature_estimated: bool,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub architecture: String,
    /// seconds since the unix epoch.
    pub timestamp: f64,
}

impl TelemetrySnapshot {
    pub fn new(cpu_percent: f64, available_ram_mb: f64, temperature_c: f64, timestamp: f64) -> Self {
        Self {
            cpu_percent,
            available_ram_mb,
            temperature_c,
            temperature_estimated: false,
            platform: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            timestamp,
        }
    }
}

/// precision/size tier of the classification model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelVariant {
    #[serde(rename = "FP32")]
    Full,
    #[serde(rename = "INT8")]
    Compressed,
    #[serde(rename = "PRUNED")]
    Pruned,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 3] = [Self::Full, Self::Compressed, Self::Pruned];

    /// the `model_type` string used on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Full => "FP32",
            Self::Compressed => "INT8",
            Self::Pruned => "PRUNED",
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// which runtime engine executes the chosen artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendFamily {
    /// graph artifacts executed by ONNX Runtime.
    #[serde(rename = "onnx")]
    Onnx,
    /// xml/bin IR artifacts executed by OpenVINO.
    #[serde(rename = "openvino")]
    OpenVino,
}

impl BackendFamily {
    pub const ALL: [BackendFamily; 2] = [Self::Onnx, Self::OpenVino];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Onnx => "onnx",
            Self::OpenVino => "openvino",
        }
    }

    /// the other family, for callers that want to fall back.
    pub fn other(self) -> Self {
        match self {
            Self::Onnx => Self::OpenVino,
            Self::OpenVino => Self::Onnx,
        }
    }
}

impl fmt::Display for BackendFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown backend family `{0}` (expected `onnx` or `openvino`)")]
pub struct ParseBackendFamilyError(String);

impl FromStr for BackendFamily {
    type Err = ParseBackendFamilyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // `pytorch` is what the old front-end called the onnx path.
        match s.trim().to_ascii_lowercase().as_str() {
            "onnx" | "onnxruntime" | "pytorch" => Ok(Self::Onnx),
            "openvino" | "ov" => Ok(Self::OpenVino),
            _ => Err(ParseBackendFamilyError(s.to_string())),
        }
    }
}

/// the three artifact paths for one backend family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSet {
    pub full: PathBuf,
    pub compressed: PathBuf,
    pub pruned: PathBuf,
}

impl ArtifactSet {
    pub fn path(&self, variant: ModelVariant) -> &Path {
        match variant {
            ModelVariant::Full => &self.full,
            ModelVariant::Compressed => &self.compressed,
            ModelVariant::Pruned => &self.pruned,
        }
    }

    fn rooted_at(&self, root: &Path) -> Self {
        Self {
            full: root.join(&self.full),
            compressed: root.join(&self.compressed),
            pruned: root.join(&self.pruned),
        }
    }
}

/// fixed mapping from every (variant, backend family) pair to one artifact.
///
/// the table is built once from configuration; nothing downstream ever
/// derives an artifact path on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactTable {
    pub onnx: ArtifactSet,
    pub openvino: ArtifactSet,
}

impl Default for ArtifactTable {
    fn default() -> Self {
        Self {
            onnx: ArtifactSet {
                full: "models/efficientNet-b0.onnx".into(),
                compressed: "models/efficientnet-b0-int8.onnx".into(),
                pruned: "models/mobilenet_v3_pruned.onnx".into(),
            },
            openvino: ArtifactSet {
                full: "models/openvino/efficientNet-b0.xml".into(),
                compressed: "models/openvino/efficientnet-b0-int8.xml".into(),
                pruned: "models/openvino/mobilenet_v3_pruned.xml".into(),
            },
        }
    }
}

impl ArtifactTable {
    pub fn family(&self, backend: BackendFamily) -> &ArtifactSet {
        match backend {
            BackendFamily::Onnx => &self.onnx,
            BackendFamily::OpenVino => &self.openvino,
        }
    }

    pub fn resolve(&self, variant: ModelVariant, backend: BackendFamily) -> &Path {
        self.family(backend).path(variant)
    }

    /// join every relative path onto `root`; absolute paths are kept as-is.
    pub fn rooted_at<P: AsRef<Path>>(&self, root: P) -> Self {
        let root = root.as_ref();
        Self {
            onnx: self.onnx.rooted_at(root),
            openvino: self.openvino.rooted_at(root),
        }
    }
}

/// output of the selection policy. embedded verbatim into the final record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub variant: ModelVariant,
    pub artifact_path: PathBuf,
    pub reason: String,
    pub snapshot: TelemetrySnapshot,
}

/// one entry of the ranked class list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    pub index: usize,
    pub label: String,
    pub probability: f32,
}

/// normalized outcome of one forward pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub prediction: String,
    pub class_index: usize,
    /// softmax probability of `prediction`, always within `[0, 1]`.
    pub confidence: f32,
    /// wall-clock time of the backend forward pass only.
    pub latency_ms: f64,
    pub backend: BackendFamily,
    pub artifact_path: PathBuf,
    #[serde(default)]
    pub top_k: Vec<ClassScore>,
}

/// `decision` block of the wire record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub model_type: ModelVariant,
    pub model_path: String,
    pub reason: String,
    pub backend: BackendFamily,
}

/// `result` block of the wire record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub prediction: String,
    pub confidence: f32,
    pub latency_ms: f64,
    pub model: String,
    pub class_index: usize,
    #[serde(default)]
    pub top_k: Vec<ClassScore>,
}

/// caller-facing record written for dashboards and log shippers.
///
/// the field set (`telemetry`, `decision`, `result`, `pipeline_latency_ms`)
/// is a compatibility contract; add fields, never rename them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub telemetry: TelemetrySnapshot,
    pub decision: DecisionRecord,
    pub result: ResultRecord,
    /// end-to-end time of the whole dispatch, rounded to two decimals.
    pub pipeline_latency_ms: f64,
}

impl DispatchRecord {
    pub fn new(decision: &Decision, result: &InferenceResult, pipeline_latency_ms: f64) -> Self {
        let model_path = decision.artifact_path.display().to_string();
        Self {
            telemetry: decision.snapshot.clone(),
            decision: DecisionRecord {
                model_type: decision.variant,
                model_path: model_path.clone(),
                reason: decision.reason.clone(),
                backend: result.backend,
            },
            result: ResultRecord {
                prediction: result.prediction.clone(),
                confidence: result.confidence,
                latency_ms: result.latency_ms,
                model: result.artifact_path.display().to_string(),
                class_index: result.class_index,
                top_k: result.top_k.clone(),
            },
            pipeline_latency_ms: (pipeline_latency_ms * 100.0).round() / 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_decision() -> Decision {
        Decision {
            variant: ModelVariant::Compressed,
            artifact_path: "models/efficientnet-b0-int8.onnx".into(),
            reason: "Moderate system load -> INT8 selected".into(),
            snapshot: TelemetrySnapshot::new(65.0, 600.0, 61.0, 1_700_000_000.0),
        }
    }

    fn sample_result() -> InferenceResult {
        InferenceResult {
            prediction: "tabby cat".into(),
            class_index: 281,
            confidence: 0.87,
            latency_ms: 12.5,
            backend: BackendFamily::Onnx,
            artifact_path: "models/efficientnet-b0-int8.onnx".into(),
            top_k: Vec::new(),
        }
    }

    #[test]
    fn record_exposes_wire_field_names() {
        let record = DispatchRecord::new(&sample_decision(), &sample_result(), 40.123);
        let value = serde_json::to_value(&record).unwrap();

        for key in ["telemetry", "decision", "result", "pipeline_latency_ms"] {
            assert!(value.get(key).is_some(), "missing top-level field {key}");
        }
        assert_eq!(value["decision"]["model_type"], "INT8");
        assert_eq!(value["decision"]["backend"], "onnx");
        assert_eq!(
            value["decision"]["model_path"],
            "models/efficientnet-b0-int8.onnx"
        );
        assert!(value["decision"]["reason"].is_string());
        assert_eq!(value["result"]["prediction"], "tabby cat");
        assert!(value["result"]["confidence"].is_number());
        assert!(value["result"]["latency_ms"].is_number());
        assert_eq!(value["telemetry"]["cpu_percent"], 65.0);
        assert_eq!(value["telemetry"]["available_ram_mb"], 600.0);
        assert_eq!(value["pipeline_latency_ms"], 40.12);
    }

    #[test]
    fn record_references_same_artifact_as_decision() {
        let record = DispatchRecord::new(&sample_decision(), &sample_result(), 1.0);
        assert_eq!(record.decision.model_path, record.result.model);
    }

    #[test]
    fn backend_family_parses_aliases() {
        assert_eq!("onnx".parse::<BackendFamily>().unwrap(), BackendFamily::Onnx);
        assert_eq!("PyTorch".parse::<BackendFamily>().unwrap(), BackendFamily::Onnx);
        assert_eq!(
            "openvino".parse::<BackendFamily>().unwrap(),
            BackendFamily::OpenVino
        );
        assert!("tensorrt".parse::<BackendFamily>().is_err());
        assert_eq!(BackendFamily::Onnx.other(), BackendFamily::OpenVino);
    }

    #[test]
    fn artifact_table_covers_every_pair_with_distinct_paths() {
        let table = ArtifactTable::default();
        let mut seen = std::collections::HashSet::new();
        for backend in BackendFamily::ALL {
            for variant in ModelVariant::ALL {
                assert!(seen.insert(table.resolve(variant, backend).to_path_buf()));
            }
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn rooted_table_keeps_absolute_paths() {
        let mut table = ArtifactTable::default();
        table.onnx.full = PathBuf::from("/opt/models/full.onnx");
        let rooted = table.rooted_at("/srv/ramda");

        assert_eq!(
            rooted.resolve(ModelVariant::Full, BackendFamily::Onnx),
            Path::new("/opt/models/full.onnx")
        );
        assert_eq!(
            rooted.resolve(ModelVariant::Pruned, BackendFamily::OpenVino),
            Path::new("/srv/ramda/models/openvino/mobilenet_v3_pruned.xml")
        );
    }
}
