/// Partitions resolver tests
///
/// Partition counts and ownership for fresh starts and rejoins.
/// Run with: cargo test --test partitions_resolver_tests

use clusterboot::resolver::{InMemoryPartitionAuthority, LiveReplicas};
use clusterboot::topology::{
    ClusterTopology, CoordinationRaceProvider, InMemoryTopologyStore, StaticTopologyProvider,
    TopologyStore,
};
use clusterboot::{
    FatalError, FixedHostIdentity, HostId, PartitionSet, PartitionsResolver, StartAction,
    TopologyProviderChain,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

fn resolver_with_chain(
    action: StartAction,
    chain: TopologyProviderChain,
    authority: InMemoryPartitionAuthority,
    host: HostId,
) -> PartitionsResolver {
    PartitionsResolver::new(
        action,
        Arc::new(chain),
        Arc::new(authority),
        Arc::new(FixedHostIdentity(host)),
    )
}

fn resolver(
    action: StartAction,
    topology: &ClusterTopology,
    authority: InMemoryPartitionAuthority,
    host: HostId,
) -> PartitionsResolver {
    let chain =
        TopologyProviderChain::default().with_provider(StaticTopologyProvider::from_topology(topology));
    resolver_with_chain(action, chain, authority, host)
}

#[tokio::test]
async fn test_fresh_start_covers_every_partition() {
    let hosts = [0, 1, 2];
    let topology = ClusterTopology::compute(&hosts, 4, 1).unwrap();
    assert_eq!(topology.partition_count(), 6);

    let mut replicas_seen: BTreeMap<u32, u32> = BTreeMap::new();
    for host in hosts {
        let resolver = resolver(
            StartAction::Create,
            &topology,
            InMemoryPartitionAuthority::default(),
            host,
        );
        assert_eq!(resolver.partition_count().await.unwrap(), 6);
        let owned = resolver.owned_partitions().await.unwrap();
        assert_eq!(owned.len(), 4);
        for partition in owned {
            *replicas_seen.entry(partition).or_default() += 1;
        }
    }

    assert_eq!(replicas_seen.len(), 6);
    assert!(replicas_seen.values().all(|count| *count == 2));
}

#[tokio::test]
async fn test_racing_hosts_agree_on_ownership() {
    let hosts = [3, 7];
    let store: Arc<dyn TopologyStore> = Arc::new(InMemoryTopologyStore::new());

    let mut owned = Vec::new();
    for host in hosts {
        let candidate = ClusterTopology::compute(&hosts, 2, 0).unwrap();
        let chain = TopologyProviderChain::default()
            .with_provider(CoordinationRaceProvider::new(store.clone(), candidate));
        let resolver = resolver_with_chain(
            StartAction::Create,
            chain,
            InMemoryPartitionAuthority::default(),
            host,
        );
        owned.push(resolver.owned_partitions().await.unwrap());
    }

    assert!(owned[0].is_disjoint(&owned[1]));
    let all: PartitionSet = owned.iter().flatten().copied().collect();
    assert_eq!(all, PartitionSet::from([0, 1, 2, 3]));
}

#[tokio::test]
async fn test_host_outside_topology_owns_nothing() {
    let topology = ClusterTopology::compute(&[0, 1], 2, 0).unwrap();
    let resolver = resolver(
        StartAction::Create,
        &topology,
        InMemoryPartitionAuthority::default(),
        9,
    );
    assert!(resolver.owned_partitions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rejoin_count_matches_fresh_count() {
    let topology = ClusterTopology::compute(&[0, 1, 2], 2, 1).unwrap();
    let authority = InMemoryPartitionAuthority::from_topology(&topology);
    authority.remove_host(&topology, 1).await;

    let fresh = resolver(StartAction::Create, &topology, authority.clone(), 0);
    let rejoin = resolver(StartAction::Rejoin, &topology, authority, 1);
    assert_eq!(
        fresh.partition_count().await.unwrap(),
        rejoin.partition_count().await.unwrap()
    );
}

#[tokio::test]
async fn test_rejoin_takes_the_failed_hosts_partitions() {
    let topology = ClusterTopology::compute(&[0, 1, 2], 2, 1).unwrap();
    let lost = topology.partitions_for_host(2);
    assert_eq!(lost.len(), 2);

    let authority = InMemoryPartitionAuthority::from_topology(&topology);
    authority.remove_host(&topology, 2).await;

    for action in [StartAction::Rejoin, StartAction::LiveRejoin] {
        let rejoin = resolver(action, &topology, authority.clone(), 2);
        assert_eq!(rejoin.owned_partitions().await.unwrap(), lost);
    }
}

#[tokio::test]
async fn test_replacement_is_capped_at_sites_per_host() {
    let topology = ClusterTopology::compute(&[0, 1], 2, 1).unwrap();
    assert_eq!(topology.sites_per_host(), 2);
    let live = LiveReplicas {
        replicas: BTreeMap::from([(0, 1), (1, 1), (2, 0)]),
    };
    let authority = InMemoryPartitionAuthority::new(live);

    let rejoin = resolver(StartAction::Rejoin, &topology, authority, 5);
    assert_eq!(
        rejoin.owned_partitions().await.unwrap(),
        PartitionSet::from([0, 1])
    );
}

#[tokio::test]
async fn test_rejoin_into_full_cluster_is_capacity_fatal() {
    let topology = ClusterTopology::compute(&[0, 1], 2, 1).unwrap();
    let authority = InMemoryPartitionAuthority::from_topology(&topology);

    let rejoin = resolver(StartAction::Rejoin, &topology, authority, 2);
    let err = rejoin.owned_partitions().await.unwrap_err();
    assert_eq!(err, FatalError::Capacity { replication_factor: 1 });
    assert!(err.to_string().contains("k-safety factor of 1"));
    assert_eq!(err.exit_code(), 3);
}

#[tokio::test]
async fn test_malformed_topology_is_fatal() {
    let chain = TopologyProviderChain::default()
        .with_provider(StaticTopologyProvider::new(json!({ "hostcount": "three" })));
    let resolver = resolver_with_chain(
        StartAction::Create,
        chain,
        InMemoryPartitionAuthority::default(),
        0,
    );
    assert!(matches!(
        resolver.partition_count().await,
        Err(FatalError::Topology(_))
    ));
}

#[tokio::test]
async fn test_inconsistent_topology_is_fatal() {
    let mut topology = ClusterTopology::compute(&[0, 1], 2, 1).unwrap();
    topology.partitions[0].replicas = vec![0, 0];

    let chain = TopologyProviderChain::default()
        .with_provider(StaticTopologyProvider::new(topology.to_document()));
    let resolver = resolver_with_chain(
        StartAction::Create,
        chain,
        InMemoryPartitionAuthority::default(),
        0,
    );
    assert!(matches!(
        resolver.owned_partitions().await,
        Err(FatalError::Topology(_))
    ));
}

#[tokio::test]
async fn test_unreachable_authority_on_rejoin() {
    let topology = ClusterTopology::compute(&[0, 1], 2, 1).unwrap();
    let authority = InMemoryPartitionAuthority::from_topology(&topology);
    authority.set_unavailable(true).await;

    let rejoin = resolver(StartAction::Rejoin, &topology, authority, 2);
    assert!(matches!(
        rejoin.partition_count().await,
        Err(FatalError::Topology(_))
    ));
}
