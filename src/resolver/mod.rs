//! Partition count and ownership for the local node.
//!
//! A fresh start reads its share from the agreed topology. A rejoin asks the
//! live authority which partitions are short of replicas; if none are, the
//! cluster cannot take this node and startup must stop.

pub mod authority;

pub use authority::{InMemoryPartitionAuthority, LiveReplicas};

use crate::core::{FatalError, HostId, PartitionId, PartitionSet, StoreError};
use crate::topology::{ClusterTopology, TopologyProviderChain};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{Instrument, error, info, info_span};

/// How the node was asked to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartAction {
    Create,
    Recover,
    Rejoin,
    LiveRejoin,
}

impl StartAction {
    pub fn does_rejoin(&self) -> bool {
        matches!(self, StartAction::Rejoin | StartAction::LiveRejoin)
    }
}

/// The live partition-leadership authority of a running cluster.
#[async_trait]
pub trait PartitionAuthority: Send + Sync {
    /// Current partition count, including any changes since creation.
    async fn partition_count(&self) -> Result<u32, StoreError>;

    /// Partitions a joining node should replicate, given the creation-time
    /// replication factor and sites per host.
    async fn partitions_to_replace(
        &self,
        kfactor: u32,
        sites_per_host: u32,
    ) -> Result<Vec<PartitionId>, StoreError>;
}

/// Numeric identity of the local host.
pub trait HostIdentity: Send + Sync {
    fn host_id(&self) -> HostId;
}

/// A host id known up front.
#[derive(Debug, Clone, Copy)]
pub struct FixedHostIdentity(pub HostId);

impl HostIdentity for FixedHostIdentity {
    fn host_id(&self) -> HostId {
        self.0
    }
}

/// Answers "how many partitions" and "which are mine".
pub struct PartitionsResolver {
    start_action: StartAction,
    topology: Arc<TopologyProviderChain>,
    authority: Arc<dyn PartitionAuthority>,
    host: Arc<dyn HostIdentity>,
}

impl PartitionsResolver {
    pub fn new(
        start_action: StartAction,
        topology: Arc<TopologyProviderChain>,
        authority: Arc<dyn PartitionAuthority>,
        host: Arc<dyn HostIdentity>,
    ) -> Self {
        Self {
            start_action,
            topology,
            authority,
            host,
        }
    }

    pub fn start_action(&self) -> StartAction {
        self.start_action
    }

    /// Resolves and validates the agreed topology.
    pub async fn cluster_topology(&self) -> Result<ClusterTopology, FatalError> {
        let document = self.topology.topology().await?;
        ClusterTopology::from_document(&document)
    }

    /// Total partitions in the cluster.
    ///
    /// On rejoin this is the authority's live count; otherwise the agreed
    /// topology's count.
    pub async fn partition_count(&self) -> Result<u32, FatalError> {
        let span = info_span!(
            "partition_count",
            host_id = self.host.host_id(),
            rejoin = self.start_action.does_rejoin()
        );
        self.resolve_partition_count().instrument(span).await
    }

    /// Partitions this node is responsible for.
    ///
    /// Fresh start: the host's share of the agreed topology, possibly empty.
    /// Rejoin: the partitions currently short of replicas. An empty
    /// replacement set is a [`FatalError::Capacity`].
    pub async fn owned_partitions(&self) -> Result<PartitionSet, FatalError> {
        let span = info_span!(
            "owned_partitions",
            host_id = self.host.host_id(),
            rejoin = self.start_action.does_rejoin()
        );
        self.resolve_owned_partitions().instrument(span).await
    }

    async fn resolve_partition_count(&self) -> Result<u32, FatalError> {
        let count = if self.start_action.does_rejoin() {
            self.authority.partition_count().await?
        } else {
            self.cluster_topology().await?.partition_count()
        };
        info!(count, "resolved partition count");
        Ok(count)
    }

    async fn resolve_owned_partitions(&self) -> Result<PartitionSet, FatalError> {
        let topology = self.cluster_topology().await?;
        if !self.start_action.does_rejoin() {
            let partitions = topology.partitions_for_host(self.host.host_id());
            info!(partitions = ?partitions, "fresh start assignment");
            return Ok(partitions);
        }

        // Replication factor and sites per host never change after creation,
        // so the agreed topology is authoritative for both.
        let replication_factor = topology.replication_factor();
        let holes = self
            .authority
            .partitions_to_replace(replication_factor, topology.sites_per_host())
            .await?;
        if holes.is_empty() {
            let fatal = FatalError::Capacity { replication_factor };
            error!(error = %fatal, "rejoin rejected");
            return Err(fatal);
        }
        let partitions: PartitionSet = holes.into_iter().collect();
        info!(partitions = ?partitions, "rejoin replacement assignment");
        Ok(partitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::StaticTopologyProvider;

    fn resolver(
        action: StartAction,
        topology: &ClusterTopology,
        authority: InMemoryPartitionAuthority,
        host: HostId,
    ) -> PartitionsResolver {
        let chain = TopologyProviderChain::default()
            .with_provider(StaticTopologyProvider::from_topology(topology));
        PartitionsResolver::new(
            action,
            Arc::new(chain),
            Arc::new(authority),
            Arc::new(FixedHostIdentity(host)),
        )
    }

    #[test]
    fn test_rejoin_actions() {
        assert!(StartAction::Rejoin.does_rejoin());
        assert!(StartAction::LiveRejoin.does_rejoin());
        assert!(!StartAction::Create.does_rejoin());
        assert!(!StartAction::Recover.does_rejoin());
    }

    #[tokio::test]
    async fn test_fresh_start_uses_topology() {
        let topology = ClusterTopology::compute(&[0, 1, 2], 2, 1).unwrap();
        let resolver = resolver(
            StartAction::Create,
            &topology,
            InMemoryPartitionAuthority::default(),
            2,
        );
        assert_eq!(resolver.partition_count().await.unwrap(), 3);
        assert_eq!(
            resolver.owned_partitions().await.unwrap(),
            topology.partitions_for_host(2)
        );
    }

    #[tokio::test]
    async fn test_rejoin_into_full_cluster_is_capacity_fatal() {
        let topology = ClusterTopology::compute(&[0, 1, 2], 2, 1).unwrap();
        let authority = InMemoryPartitionAuthority::from_topology(&topology);
        let resolver = resolver(StartAction::Rejoin, &topology, authority, 3);
        assert_eq!(
            resolver.owned_partitions().await,
            Err(FatalError::Capacity { replication_factor: 1 })
        );
    }

    #[tokio::test]
    async fn test_unreachable_authority_is_topology_fatal() {
        let topology = ClusterTopology::compute(&[0, 1], 1, 1).unwrap();
        let authority = InMemoryPartitionAuthority::from_topology(&topology);
        authority.set_unavailable(true).await;
        let resolver = resolver(StartAction::Rejoin, &topology, authority, 1);
        assert!(matches!(
            resolver.partition_count().await,
            Err(FatalError::Topology(_))
        ));
        assert!(matches!(
            resolver.owned_partitions().await,
            Err(FatalError::Topology(_))
        ));
    }
}
