// SPDX-License-Identifier: PolyForm-Shield-1.0

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use cache::LabelStore;
use reqwest::Client;
use tracing::info;

/// index-aligned class names: entry `n` names class index `n`.
///
/// built once at startup and shared read-only between dispatches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }
}

/// remote origin of the label list, consulted only when no local copy exists.
#[async_trait]
pub trait LabelSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<String>>;
}

/// fetches a JSON array of strings over HTTP.
pub struct HttpLabelSource {
    client: Client,
    url: String,
}

impl HttpLabelSource {
    pub fn new<S: Into<String>>(url: S, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client for label fetch")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl LabelSource for HttpLabelSource {
    async fn fetch(&self) -> Result<Vec<String>> {
        info!("fetching class labels from {}", self.url);
        let labels = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("failed to request labels from {}", self.url))?
            .error_for_status()
            .with_context(|| format!("label server {} returned an error", self.url))?
            .json::<Vec<String>>()
            .await
            .with_context(|| format!("labels at {} are not a JSON string array", self.url))?;
        Ok(labels)
    }
}

/// an in-memory list; handy for air-gapped installs and tests.
pub struct StaticLabelSource(pub Vec<String>);

#[async_trait]
impl LabelSource for StaticLabelSource {
    async fn fetch(&self) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

/// read the label file, fetching and writing it first if it is missing.
pub async fn load_or_fetch(store: &LabelStore, source: &dyn LabelSource) -> Result<LabelTable> {
    if let Some(labels) = store.load()? {
        info!(
            "loaded {} class labels from {}",
            labels.len(),
            store.path().display()
        );
        return Ok(LabelTable::new(labels));
    }

    let labels = source.fetch().await?;
    if labels.is_empty() {
        bail!("label source returned an empty list");
    }
    store.save(&labels)?;
    info!(
        "cached {} class labels at {}",
        labels.len(),
        store.path().display()
    );
    Ok(LabelTable::new(labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "ramda-agent-labels-{}-{name}",
            std::process::id()
        ));
        fs::remove_dir_all(&dir).ok();
        dir
    }

    struct CountingSource {
        calls: AtomicUsize,
        labels: Vec<String>,
    }

    #[async_trait]
    impl LabelSource for CountingSource {
        async fn fetch(&self) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.labels.clone())
        }
    }

    #[tokio::test]
    async fn first_use_fetches_and_persists_then_reads_locally() {
        let dir = scratch("fetch-once");
        let store = LabelStore::new(dir.join("labels.txt"));
        let source = CountingSource {
            calls: AtomicUsize::new(0),
            labels: vec!["tench".into(), "goldfish".into()],
        };

        let first = load_or_fetch(&store, &source).await.unwrap();
        let second = load_or_fetch(&store, &source).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.get(1), Some("goldfish"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            fs::read_to_string(store.path()).unwrap().lines().count(),
            2
        );

        fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn empty_remote_list_is_rejected_and_not_written() {
        let dir = scratch("empty");
        let store = LabelStore::new(dir.join("labels.txt"));

        let err = load_or_fetch(&store, &StaticLabelSource(Vec::new()))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("empty"));
        assert!(!store.exists());
    }

    #[test]
    fn table_lookup_is_index_aligned() {
        let table = LabelTable::new(vec!["a".into(), "b".into()]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0), Some("a"));
        assert_eq!(table.get(2), None);
        assert!(LabelTable::default().is_empty());
    }
}
