// SPDX-License-Identifier: PolyForm-Shield-1.0

//! Adaptive inference dispatch for the edge agent.
//!
//! A [`Dispatcher`] takes one telemetry snapshot, lets the
//! [`SelectionPolicy`] pick a model tier for the current load, preprocesses
//! the image, runs the chosen artifact on the requested backend family and
//! normalises the logits into an [`protocol::InferenceResult`]. Everything in
//! a dispatch is synchronous; async hosts should call it from a blocking
//! worker.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use cache::LabelStore;
use config::RamdaConfig;
use model_runtime::BackendRegistry;
use telemetry::SystemTelemetry;

pub mod dispatcher;
pub mod error;
pub mod labels;
pub mod normalize;
pub mod persist;
pub mod policy;
pub mod preprocess;
pub mod probe;

pub use dispatcher::{DispatchOutcome, DispatchState, Dispatcher};
pub use error::{DispatchError, DispatchFailure, ErrorKind};
pub use labels::{HttpLabelSource, LabelSource, LabelTable, StaticLabelSource};
pub use persist::ResultSink;
pub use policy::{SelectionPolicy, SelectionThresholds};
pub use probe::{probe, ProbeReport};

pub fn selection_policy(config: &RamdaConfig) -> SelectionPolicy {
    SelectionPolicy::new(
        config.artifact_table(),
        SelectionThresholds::from(&config.thresholds),
    )
}

pub fn system_telemetry(config: &RamdaConfig) -> SystemTelemetry {
    SystemTelemetry::new(Duration::from_millis(config.telemetry.sample_window_ms))
}

/// dispatcher over live host telemetry and the default backend adapters.
pub fn build_dispatcher(
    config: &RamdaConfig,
    labels: Arc<LabelTable>,
) -> Dispatcher<SystemTelemetry> {
    let dispatcher = Dispatcher::new(
        system_telemetry(config),
        selection_policy(config),
        BackendRegistry::with_defaults(),
        labels,
    );
    if config.cache_models {
        dispatcher.with_model_cache()
    } else {
        dispatcher
    }
}

/// the label table from disk. on first run it is seeded from the inline
/// list when one is configured, otherwise from the configured URL.
pub async fn load_labels(config: &RamdaConfig) -> Result<LabelTable> {
    let store = LabelStore::new(&config.labels.path);
    let source: Box<dyn LabelSource> = if config.labels.inline.is_empty() {
        Box::new(HttpLabelSource::new(
            config.labels.url.clone(),
            Duration::from_secs(config.labels.fetch_timeout_secs),
        )?)
    } else {
        Box::new(StaticLabelSource(config.labels.inline.clone()))
    };
    labels::load_or_fetch(&store, source.as_ref()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{BackendFamily, ModelVariant, TelemetrySnapshot};
    use std::fs;

    #[test]
    fn policy_honours_model_root_and_thresholds() {
        let config = config::parse(
            r#"
            model_root = "/srv/models"

            [thresholds]
            full_max_cpu_percent = 20.0
            "#,
        )
        .unwrap();
        let policy = selection_policy(&config);

        let decision = policy.select(
            TelemetrySnapshot::new(30.0, 4096.0, 47.0, 0.0),
            BackendFamily::Onnx,
        );
        assert_eq!(decision.variant, ModelVariant::Compressed);
        assert!(decision.artifact_path.starts_with("/srv/models"));
    }

    #[test]
    fn telemetry_window_comes_from_config() {
        let mut config = RamdaConfig::default();
        config.telemetry.sample_window_ms = 750;
        assert_eq!(
            system_telemetry(&config).sample_window(),
            Duration::from_millis(750)
        );
    }

    #[tokio::test]
    async fn existing_label_file_is_used_without_network() {
        let dir = std::env::temp_dir().join(format!("ramda-agent-lib-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("labels.txt");
        fs::write(&path, "tench\ngoldfish\n").unwrap();

        let mut config = RamdaConfig::default();
        config.labels.path = path;
        config.labels.url = "http://127.0.0.1:9/unreachable.json".to_string();

        let labels = load_labels(&config).await.unwrap();
        assert_eq!(labels.len(), 2);

        fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn inline_labels_seed_the_label_file() {
        let dir = std::env::temp_dir().join(format!("ramda-agent-inline-{}", std::process::id()));
        fs::remove_dir_all(&dir).ok();
        let path = dir.join("labels.txt");

        let mut config = RamdaConfig::default();
        config.labels.path = path.clone();
        config.labels.url = "http://127.0.0.1:9/unreachable.json".to_string();
        config.labels.inline = vec!["cat".to_string(), "dog".to_string()];

        let labels = load_labels(&config).await.unwrap();
        assert_eq!(labels.get(1), Some("dog"));
        assert!(path.exists());

        fs::remove_dir_all(dir).ok();
    }
}
