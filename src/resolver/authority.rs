use super::PartitionAuthority;
use crate::core::{HostId, PartitionId, StoreError};
use crate::topology::ClusterTopology;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Live replica counts keyed by partition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LiveReplicas {
    #[serde(default)]
    pub replicas: BTreeMap<PartitionId, u32>,
}

/// An in-memory implementation of `PartitionAuthority` for testing and tooling.
///
/// Tracks how many live replicas each partition has. A partition is a hole
/// when it has fewer than `kfactor + 1` live replicas.
#[derive(Clone, Default)]
pub struct InMemoryPartitionAuthority {
    live: Arc<RwLock<LiveReplicas>>,
    unavailable: Arc<RwLock<bool>>,
}

impl InMemoryPartitionAuthority {
    pub fn new(live: LiveReplicas) -> Self {
        Self {
            live: Arc::new(RwLock::new(live)),
            unavailable: Arc::new(RwLock::new(false)),
        }
    }

    /// Every partition of `topology` at full replication.
    pub fn from_topology(topology: &ClusterTopology) -> Self {
        let replicas = topology
            .partitions
            .iter()
            .map(|p| (p.partition_id, p.replicas.len() as u32))
            .collect();
        Self::new(LiveReplicas { replicas })
    }

    /// Drops every replica `host` held, as when that node fails.
    pub async fn remove_host(&self, topology: &ClusterTopology, host: HostId) {
        let mut live = self.live.write().await;
        for partition in topology.partitions_for_host(host) {
            if let Some(count) = live.replicas.get_mut(&partition) {
                *count = count.saturating_sub(1);
            }
        }
    }

    pub async fn set_replica_count(&self, partition: PartitionId, count: u32) {
        self.live.write().await.replicas.insert(partition, count);
    }

    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }

    async fn check_available(&self) -> Result<(), StoreError> {
        if *self.unavailable.read().await {
            return Err(StoreError::Authority(
                "partition authority is not reachable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl PartitionAuthority for InMemoryPartitionAuthority {
    async fn partition_count(&self) -> Result<u32, StoreError> {
        self.check_available().await?;
        Ok(self.live.read().await.replicas.len() as u32)
    }

    async fn partitions_to_replace(
        &self,
        kfactor: u32,
        sites_per_host: u32,
    ) -> Result<Vec<PartitionId>, StoreError> {
        self.check_available().await?;
        let target = kfactor + 1;
        let live = self.live.read().await;
        Ok(live
            .replicas
            .iter()
            .filter(|(_, count)| **count < target)
            .map(|(partition, _)| *partition)
            .take(sites_per_host as usize)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_full_cluster_has_no_holes() {
        let topology = ClusterTopology::compute(&[0, 1, 2], 2, 1).unwrap();
        let authority = InMemoryPartitionAuthority::from_topology(&topology);
        assert_eq!(authority.partition_count().await.unwrap(), 3);
        assert!(authority.partitions_to_replace(1, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_host_leaves_its_partitions_short() {
        let topology = ClusterTopology::compute(&[0, 1, 2], 2, 1).unwrap();
        let authority = InMemoryPartitionAuthority::from_topology(&topology);
        authority.remove_host(&topology, 1).await;

        let holes = authority.partitions_to_replace(1, 2).await.unwrap();
        let expected: Vec<_> = topology.partitions_for_host(1).into_iter().collect();
        assert_eq!(holes, expected);
    }

    #[tokio::test]
    async fn test_holes_capped_by_sites_per_host() {
        let authority = InMemoryPartitionAuthority::new(LiveReplicas {
            replicas: BTreeMap::from([(0, 0), (1, 0), (2, 0), (3, 1)]),
        });
        assert_eq!(authority.partitions_to_replace(1, 2).await.unwrap(), vec![0, 1]);
    }
}
