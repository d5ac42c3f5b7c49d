use super::{ClusterTopology, TopologyStore};
use crate::core::{FatalError, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

/// Produces the agreed topology document, or nothing.
///
/// Implementations may cache internally but have no other side effects.
#[async_trait]
pub trait TopologyProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn topology(&self) -> Option<Value>;
}

/// Ordered chain of providers; the first one to produce a document wins.
///
/// The same call site serves the creation race and a plain rejoin, so callers
/// never branch on how the topology was obtained.
#[derive(Default)]
pub struct TopologyProviderChain {
    providers: Vec<Box<dyn TopologyProvider>>,
}

impl TopologyProviderChain {
    pub fn new(providers: Vec<Box<dyn TopologyProvider>>) -> Self {
        Self { providers }
    }

    /// Appends a provider after the ones already registered.
    pub fn with_provider(mut self, provider: impl TopologyProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Returns the first document any provider produces, in registration order.
    pub async fn topology(&self) -> Result<Value, FatalError> {
        for provider in &self.providers {
            if let Some(document) = provider.topology().await {
                debug!(provider = provider.name(), "topology resolved");
                return Ok(document);
            }
            debug!(provider = provider.name(), "provider had no topology");
        }
        Err(FatalError::Topology(
            "Cannot find relevant topology provider".to_string(),
        ))
    }
}

/// Always returns the same document.
pub struct StaticTopologyProvider {
    document: Option<Value>,
}

impl StaticTopologyProvider {
    pub fn new(document: Value) -> Self {
        Self {
            document: Some(document),
        }
    }

    pub fn from_topology(topology: &ClusterTopology) -> Self {
        Self::new(topology.to_document())
    }

    /// A provider that never has a topology.
    pub fn empty() -> Self {
        Self { document: None }
    }
}

#[async_trait]
impl TopologyProvider for StaticTopologyProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn topology(&self) -> Option<Value> {
        self.document.clone()
    }
}

/// Takes part in the cluster-creation race.
///
/// Writes this node's candidate if no topology exists yet, then reads the
/// agreed value back. The writer reads too, so every participant ends up with
/// the same document whichever write the store kept.
pub struct CoordinationRaceProvider {
    store: Arc<dyn TopologyStore>,
    candidate: ClusterTopology,
}

impl CoordinationRaceProvider {
    pub fn new(store: Arc<dyn TopologyStore>, candidate: ClusterTopology) -> Self {
        Self { store, candidate }
    }

    async fn race(&self) -> Result<Option<Value>, StoreError> {
        let won = self
            .store
            .create_if_absent(self.candidate.to_document())
            .await?;
        if won {
            info!(
                partitions = self.candidate.partition_count(),
                "candidate topology became the agreed topology"
            );
        }
        self.store.read().await
    }
}

#[async_trait]
impl TopologyProvider for CoordinationRaceProvider {
    fn name(&self) -> &str {
        "coordination-race"
    }

    async fn topology(&self) -> Option<Value> {
        match self.race().await {
            Ok(document) => document,
            Err(err) => {
                warn!(error = %err, "topology race against coordination store failed");
                None
            }
        }
    }
}

/// Reads the agreed topology directly; used on rejoin.
pub struct CoordinationReadProvider {
    store: Arc<dyn TopologyStore>,
}

impl CoordinationReadProvider {
    pub fn new(store: Arc<dyn TopologyStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TopologyProvider for CoordinationReadProvider {
    fn name(&self) -> &str {
        "coordination-read"
    }

    async fn topology(&self) -> Option<Value> {
        match self.store.read().await {
            Ok(document) => document,
            Err(err) => {
                warn!(error = %err, "topology read from coordination store failed");
                None
            }
        }
    }
}

/// Serves a locally cached topology file, filling it from `inner` on a miss.
///
/// Cache I/O problems and cached documents that fail validation are logged
/// and treated as a miss. An invalid document from `inner` is passed through
/// but never written to the cache.
pub struct LocalCacheTopologyProvider {
    path: PathBuf,
    inner: Box<dyn TopologyProvider>,
}

impl LocalCacheTopologyProvider {
    pub fn new(path: impl Into<PathBuf>, inner: impl TopologyProvider + 'static) -> Self {
        Self {
            path: path.into(),
            inner: Box::new(inner),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Option<Value> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "cannot read topology cache");
                return None;
            }
        };
        let document: Value = match serde_json::from_slice(&bytes) {
            Ok(document) => document,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "ignoring corrupt topology cache");
                return None;
            }
        };
        if let Err(err) = ClusterTopology::from_document(&document) {
            warn!(path = %self.path.display(), error = %err, "ignoring invalid cached topology");
            return None;
        }
        Some(document)
    }

    async fn store(&self, document: &Value) {
        let bytes = match serde_json::to_vec_pretty(document) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, "cannot encode topology for cache");
                return;
            }
        };
        if let Err(err) = atomic_write(&self.path, &bytes).await {
            warn!(path = %self.path.display(), error = %err, "cannot write topology cache");
        }
    }
}

#[async_trait]
impl TopologyProvider for LocalCacheTopologyProvider {
    fn name(&self) -> &str {
        "local-cache"
    }

    async fn topology(&self) -> Option<Value> {
        if let Some(document) = self.load().await {
            return Some(document);
        }
        let document = self.inner.topology().await?;
        match ClusterTopology::from_document(&document) {
            Ok(_) => self.store(&document).await,
            Err(err) => warn!(provider = self.inner.name(), error = %err, "not caching invalid topology"),
        }
        Some(document)
    }
}

async fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await
}
