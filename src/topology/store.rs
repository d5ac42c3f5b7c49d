use crate::core::StoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Client for the coordination store that holds the agreed topology.
///
/// The store's own consistency protocol guarantees that exactly one
/// `create_if_absent` wins when nodes race at cluster creation.
#[async_trait]
pub trait TopologyStore: Send + Sync {
    /// Reads the agreed topology document, if one has been written.
    async fn read(&self) -> Result<Option<Value>, StoreError>;

    /// Writes `document` unless a topology already exists.
    ///
    /// Returns true if this call's document became the agreed one.
    async fn create_if_absent(&self, document: Value) -> Result<bool, StoreError>;
}

/// An in-memory implementation of `TopologyStore` for testing.
///
/// First writer wins; clones share the same slot, so several simulated nodes
/// can race against one store.
#[derive(Clone, Default)]
pub struct InMemoryTopologyStore {
    slot: Arc<Mutex<Option<Value>>>,
    unavailable: Arc<Mutex<bool>>,
}

impl InMemoryTopologyStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds an agreed topology.
    pub fn with_document(document: Value) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(document))),
            unavailable: Arc::new(Mutex::new(false)),
        }
    }

    /// Makes every subsequent call fail, simulating a lost session.
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().await = unavailable;
    }

    async fn check_available(&self) -> Result<(), StoreError> {
        if *self.unavailable.lock().await {
            return Err(StoreError::Unavailable(
                "in-memory topology store is offline".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TopologyStore for InMemoryTopologyStore {
    async fn read(&self) -> Result<Option<Value>, StoreError> {
        self.check_available().await?;
        Ok(self.slot.lock().await.clone())
    }

    async fn create_if_absent(&self, document: Value) -> Result<bool, StoreError> {
        self.check_available().await?;
        let mut slot = self.slot.lock().await;
        if slot.is_some() {
            return Ok(false);
        }
        *slot = Some(document);
        Ok(true)
    }
}
