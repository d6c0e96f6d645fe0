// SPDX-License-Identifier: PolyForm-Shield-1.0

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use model_runtime::{
    BackendRegistry, InputTensor, LoadedModel, ModelCache, RawOutput, RuntimeError,
};
use protocol::{BackendFamily, Decision, DispatchRecord, InferenceResult};
use telemetry::TelemetrySource;
use tracing::{debug, info, warn};

use crate::error::{DispatchError, DispatchFailure};
use crate::labels::LabelTable;
use crate::normalize::normalize;
use crate::policy::SelectionPolicy;
use crate::preprocess::{preprocess_path, preprocess_pixels, PreprocessError};

/// lifecycle of one dispatch. `ResultReady` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    SnapshotTaken,
    VariantSelected,
    TensorReady,
    BackendExecuted,
    ResultReady,
    Failed,
}

impl DispatchState {
    /// the straight-line successor, or `None` from a terminal state.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::SnapshotTaken),
            Self::SnapshotTaken => Some(Self::VariantSelected),
            Self::VariantSelected => Some(Self::TensorReady),
            Self::TensorReady => Some(Self::BackendExecuted),
            Self::BackendExecuted => Some(Self::ResultReady),
            Self::ResultReady | Self::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::SnapshotTaken => "SNAPSHOT_TAKEN",
            Self::VariantSelected => "VARIANT_SELECTED",
            Self::TensorReady => "TENSOR_READY",
            Self::BackendExecuted => "BACKEND_EXECUTED",
            Self::ResultReady => "RESULT_READY",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// tracks where a single dispatch has got to.
struct Progress {
    state: DispatchState,
}

impl Progress {
    fn start() -> Self {
        Self {
            state: DispatchState::Idle,
        }
    }

    fn advance(&mut self) {
        if let Some(next) = self.state.next() {
            debug!("dispatch {} -> {}", self.state, next);
            self.state = next;
        }
    }

    fn fail<E: Into<DispatchError>>(&self, err: E) -> DispatchFailure {
        let error = err.into();
        warn!(
            "dispatch {} -> {}: {} ({})",
            self.state,
            DispatchState::Failed,
            error,
            error.kind()
        );
        DispatchFailure {
            state: self.state,
            error,
        }
    }
}

/// a completed dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub decision: Decision,
    pub result: InferenceResult,
    /// the whole sequence, telemetry read included.
    pub pipeline_latency_ms: f64,
}

impl DispatchOutcome {
    pub fn record(&self) -> DispatchRecord {
        DispatchRecord::new(&self.decision, &self.result, self.pipeline_latency_ms)
    }
}

/// runs telemetry → selection → preprocessing → backend → normalisation for
/// one image, start to finish on the calling thread.
pub struct Dispatcher<T> {
    telemetry: T,
    policy: SelectionPolicy,
    backends: BackendRegistry,
    labels: Arc<LabelTable>,
    models: Option<ModelCache>,
}

impl<T: TelemetrySource> Dispatcher<T> {
    pub fn new(
        telemetry: T,
        policy: SelectionPolicy,
        backends: BackendRegistry,
        labels: Arc<LabelTable>,
    ) -> Self {
        Self {
            telemetry,
            policy,
            backends,
            labels,
            models: None,
        }
    }

    /// keep loaded models between dispatches instead of reloading each time.
    pub fn with_model_cache(mut self) -> Self {
        self.models = Some(ModelCache::new());
        self
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    pub fn backends(&self) -> &BackendRegistry {
        &self.backends
    }

    pub fn dispatch(
        &self,
        image: &Path,
        backend: BackendFamily,
    ) -> Result<DispatchOutcome, DispatchFailure> {
        self.run_pipeline(backend, || preprocess_path(image))
    }

    /// dispatch an undecoded 8-bit frame, e.g. straight from a camera.
    pub fn dispatch_frame(
        &self,
        width: u32,
        height: u32,
        channels: u8,
        data: &[u8],
        backend: BackendFamily,
    ) -> Result<DispatchOutcome, DispatchFailure> {
        self.run_pipeline(backend, || preprocess_pixels(width, height, channels, data))
    }

    fn run_pipeline<F>(
        &self,
        backend: BackendFamily,
        prepare: F,
    ) -> Result<DispatchOutcome, DispatchFailure>
    where
        F: FnOnce() -> Result<InputTensor, PreprocessError>,
    {
        let pipeline_start = Instant::now();
        let mut progress = Progress::start();

        let snapshot = self.telemetry.snapshot();
        progress.advance();

        let decision = self.policy.select(snapshot, backend);
        info!(
            "selected {} ({}) for {}: {}",
            decision.variant,
            decision.artifact_path.display(),
            backend,
            decision.reason
        );
        progress.advance();

        let tensor = prepare().map_err(|e| progress.fail(e))?;
        progress.advance();

        let (raw, elapsed_ms) = self
            .execute(backend, &decision.artifact_path, &tensor)
            .map_err(|e| progress.fail(e))?;
        progress.advance();

        let result = normalize(&raw, &decision, elapsed_ms, backend, &self.labels)
            .map_err(|e| progress.fail(e))?;
        progress.advance();

        let pipeline_latency_ms = pipeline_start.elapsed().as_secs_f64() * 1000.0;
        info!(
            "predicted '{}' ({:.3}) in {:.2} ms, pipeline {:.2} ms",
            result.prediction, result.confidence, result.latency_ms, pipeline_latency_ms
        );

        Ok(DispatchOutcome {
            decision,
            result,
            pipeline_latency_ms,
        })
    }

    /// load (or reuse) the model and time the forward pass alone.
    fn execute(
        &self,
        family: BackendFamily,
        artifact: &Path,
        tensor: &InputTensor,
    ) -> Result<(RawOutput, f64), RuntimeError> {
        let backend = self.backends.get(family)?;
        let timed = |model: &mut dyn LoadedModel| -> Result<(RawOutput, f64), RuntimeError> {
            let start = Instant::now();
            let raw = model.run(tensor)?;
            Ok((raw, start.elapsed().as_secs_f64() * 1000.0))
        };

        match &self.models {
            Some(cache) => cache.with_model(backend, artifact, timed),
            None => {
                let mut model = backend.load(artifact)?;
                timed(model.as_mut())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use image::{DynamicImage, Rgb, RgbImage};
    use model_runtime::{artifact, InferenceBackend};
    use protocol::{ArtifactTable, ModelVariant};
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use telemetry::FixedTelemetry;

    struct ScriptedModel {
        path: PathBuf,
        logits: Vec<f32>,
    }

    impl LoadedModel for ScriptedModel {
        fn artifact_path(&self) -> &Path {
            &self.path
        }

        fn run(&mut self, input: &InputTensor) -> Result<RawOutput, RuntimeError> {
            assert_eq!(input.shape(), &model_runtime::INPUT_SHAPE);
            Ok(RawOutput::from_logits(self.logits.clone()))
        }
    }

    /// stands in for a real engine: checks the artifact exists, then answers
    /// every forward pass with the same logits.
    struct ScriptedBackend {
        family: BackendFamily,
        logits: Vec<f32>,
        loads: Arc<AtomicUsize>,
    }

    impl InferenceBackend for ScriptedBackend {
        fn family(&self) -> BackendFamily {
            self.family
        }

        fn load(&self, artifact_path: &Path) -> Result<Box<dyn LoadedModel>, RuntimeError> {
            artifact::require_file(artifact_path)?;
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedModel {
                path: artifact_path.to_path_buf(),
                logits: self.logits.clone(),
            }))
        }
    }

    struct Fixture {
        root: PathBuf,
        image: PathBuf,
        artifacts: ArtifactTable,
        loads: Arc<AtomicUsize>,
    }

    impl Fixture {
        fn new(name: &str) -> Self {
            let root = std::env::temp_dir().join(format!(
                "ramda-dispatch-{}-{name}",
                std::process::id()
            ));
            fs::remove_dir_all(&root).ok();
            fs::create_dir_all(root.join("models")).unwrap();

            let image = root.join("red.png");
            DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([255, 0, 0])))
                .save(&image)
                .unwrap();

            let artifacts = ArtifactTable::default().rooted_at(&root);
            for variant in ModelVariant::ALL {
                fs::write(artifacts.resolve(variant, BackendFamily::Onnx), b"graph").unwrap();
            }

            Self {
                root,
                image,
                artifacts,
                loads: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn dispatcher(
            &self,
            cpu: f64,
            ram: f64,
            logits: Vec<f32>,
            labels: usize,
        ) -> Dispatcher<FixedTelemetry> {
            let mut backends = BackendRegistry::empty();
            backends.register(Box::new(ScriptedBackend {
                family: BackendFamily::Onnx,
                logits,
                loads: self.loads.clone(),
            }));
            let labels = LabelTable::new((0..labels).map(|i| format!("label-{i}")).collect());
            Dispatcher::new(
                FixedTelemetry::new(cpu, ram),
                SelectionPolicy::new(self.artifacts.clone(), Default::default()),
                backends,
                Arc::new(labels),
            )
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            fs::remove_dir_all(&self.root).ok();
        }
    }

    #[test]
    fn state_chain_is_linear_and_terminates() {
        let mut state = DispatchState::Idle;
        let mut seen = vec![state];
        while let Some(next) = state.next() {
            state = next;
            seen.push(state);
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(state, DispatchState::ResultReady);
        assert!(DispatchState::Failed.is_terminal());
        assert_eq!(DispatchState::TensorReady.to_string(), "TENSOR_READY");
    }

    #[test]
    fn happy_path_produces_a_complete_record() {
        let fx = Fixture::new("happy");
        let dispatcher = fx.dispatcher(65.0, 600.0, vec![0.0, 4.0, 1.0], 3);

        let outcome = dispatcher.dispatch(&fx.image, BackendFamily::Onnx).unwrap();

        assert_eq!(outcome.decision.variant, ModelVariant::Compressed);
        assert_eq!(outcome.result.prediction, "label-1");
        assert_eq!(outcome.result.artifact_path, outcome.decision.artifact_path);
        assert!(outcome.result.latency_ms >= 0.0);
        assert!(outcome.pipeline_latency_ms >= outcome.result.latency_ms);

        let record = outcome.record();
        assert_eq!(record.decision.model_type, ModelVariant::Compressed);
        assert_eq!(record.telemetry.cpu_percent, 65.0);
    }

    #[test]
    fn missing_artifact_fails_before_execution() {
        let fx = Fixture::new("missing");
        fs::remove_file(fx.artifacts.resolve(ModelVariant::Pruned, BackendFamily::Onnx)).unwrap();
        let dispatcher = fx.dispatcher(95.0, 200.0, vec![1.0], 1);

        let failure = dispatcher.dispatch(&fx.image, BackendFamily::Onnx).unwrap_err();

        assert_eq!(failure.kind(), ErrorKind::ArtifactNotFound);
        assert_eq!(failure.state, DispatchState::TensorReady);
        assert!(!failure.is_backend_unavailable());
        assert_eq!(fx.loads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn undecodable_image_fails_after_selection() {
        let fx = Fixture::new("bad-image");
        let bogus = fx.root.join("notes.png");
        fs::write(&bogus, b"not a png").unwrap();
        let dispatcher = fx.dispatcher(30.0, 2000.0, vec![1.0], 1);

        let failure = dispatcher.dispatch(&bogus, BackendFamily::Onnx).unwrap_err();

        assert_eq!(failure.kind(), ErrorKind::ImageDecode);
        assert_eq!(failure.state, DispatchState::VariantSelected);
    }

    #[test]
    fn raw_frame_runs_the_same_pipeline() {
        let fx = Fixture::new("frame");
        let dispatcher = fx.dispatcher(30.0, 2000.0, vec![0.0, 3.0], 2);
        let frame = [255u8, 0, 0].repeat(4);

        let outcome = dispatcher
            .dispatch_frame(2, 2, 3, &frame, BackendFamily::Onnx)
            .unwrap();

        assert_eq!(outcome.decision.variant, ModelVariant::Full);
        assert_eq!(outcome.result.prediction, "label-1");
    }

    #[test]
    fn frame_with_five_channels_is_unsupported() {
        let fx = Fixture::new("five-channels");
        let dispatcher = fx.dispatcher(30.0, 2000.0, vec![1.0], 1);

        let failure = dispatcher
            .dispatch_frame(2, 2, 5, &[0; 20], BackendFamily::Onnx)
            .unwrap_err();

        assert_eq!(failure.kind(), ErrorKind::UnsupportedFormat);
        assert_eq!(failure.state, DispatchState::VariantSelected);
        assert_eq!(fx.loads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unregistered_family_is_distinguishable_for_fallback() {
        let fx = Fixture::new("unavailable");
        let dispatcher = fx.dispatcher(30.0, 2000.0, vec![1.0], 1);

        let failure = dispatcher
            .dispatch(&fx.image, BackendFamily::OpenVino)
            .unwrap_err();

        assert!(failure.is_backend_unavailable());
        assert_eq!(failure.state, DispatchState::TensorReady);
    }

    #[test]
    fn label_mismatch_surfaces_after_execution() {
        let fx = Fixture::new("labels");
        let dispatcher = fx.dispatcher(30.0, 2000.0, vec![0.0, 0.0, 0.0, 9.0], 2);

        let failure = dispatcher.dispatch(&fx.image, BackendFamily::Onnx).unwrap_err();

        assert_eq!(failure.kind(), ErrorKind::LabelIndexOutOfRange);
        assert_eq!(failure.state, DispatchState::BackendExecuted);
    }

    #[test]
    fn model_cache_loads_each_artifact_once() {
        let fx = Fixture::new("cache");
        let dispatcher = fx
            .dispatcher(30.0, 2000.0, vec![2.0, 1.0], 2)
            .with_model_cache();

        for _ in 0..3 {
            dispatcher.dispatch(&fx.image, BackendFamily::Onnx).unwrap();
        }
        assert_eq!(fx.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn without_cache_every_dispatch_reloads() {
        let fx = Fixture::new("no-cache");
        let dispatcher = fx.dispatcher(30.0, 2000.0, vec![2.0, 1.0], 2);

        dispatcher.dispatch(&fx.image, BackendFamily::Onnx).unwrap();
        dispatcher.dispatch(&fx.image, BackendFamily::Onnx).unwrap();
        assert_eq!(fx.loads.load(Ordering::SeqCst), 2);
    }
}
