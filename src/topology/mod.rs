//! Cluster topology: how partitions are laid out across hosts.
//!
//! The agreed topology is decided once, when the cluster is created, and read
//! unchanged by every later rejoin. Replication factor and sites-per-host are
//! fixed at that moment.

pub mod provider;
pub mod store;

pub use provider::{
    CoordinationRaceProvider, CoordinationReadProvider, LocalCacheTopologyProvider,
    StaticTopologyProvider, TopologyProvider, TopologyProviderChain,
};
pub use store::{InMemoryTopologyStore, TopologyStore};

use crate::core::{FatalError, HostId, PartitionId, PartitionSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Replica placement for one partition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartitionAssignment {
    pub partition_id: PartitionId,
    pub master: HostId,
    pub replicas: Vec<HostId>,
}

/// Parsed view of the agreed topology document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterTopology {
    pub hostcount: u32,
    pub kfactor: u32,
    pub sites_per_host: u32,
    pub partitions: Vec<PartitionAssignment>,
}

/// Upper bound on `hostcount * sitesperhost`.
pub const MAX_TOTAL_SITES: u64 = u32::MAX as u64;

/// Checks the cluster sizing rules shared by the deployment compiler and
/// topology construction.
pub fn validate_sizing(hostcount: u32, sites_per_host: u32, kfactor: u32) -> Result<(), String> {
    if hostcount == 0 {
        return Err("hostcount must be >= 1".to_string());
    }
    if sites_per_host == 0 {
        return Err("sitesperhost must be >= 1".to_string());
    }
    if kfactor >= hostcount {
        return Err(format!(
            "kfactor {} requires at least {} hosts, but hostcount is {}",
            kfactor,
            kfactor as u64 + 1,
            hostcount
        ));
    }
    let sites = hostcount as u64 * sites_per_host as u64;
    if sites > MAX_TOTAL_SITES {
        return Err(format!(
            "{} total sites exceeds the supported maximum of {}",
            sites, MAX_TOTAL_SITES
        ));
    }
    if sites % (kfactor as u64 + 1) != 0 {
        return Err(format!(
            "{} total sites cannot be divided evenly among replicas for kfactor {}",
            sites, kfactor
        ));
    }
    Ok(())
}

/// Partition count implied by a valid sizing.
///
/// Saturates for sizings `validate_sizing` rejects.
pub fn partition_count_for(hostcount: u32, sites_per_host: u32, kfactor: u32) -> u32 {
    let sites = hostcount as u64 * sites_per_host as u64;
    u32::try_from(sites / (kfactor as u64 + 1)).unwrap_or(u32::MAX)
}

impl ClusterTopology {
    /// Computes the candidate topology for a fresh cluster.
    ///
    /// Sites are ordered slot-major across the sorted hosts and every
    /// partition takes `kfactor + 1` consecutive sites, so all replicas of a
    /// partition sit on distinct hosts. The first replica is the master.
    pub fn compute(hosts: &[HostId], sites_per_host: u32, kfactor: u32) -> Result<Self, FatalError> {
        let hosts: Vec<HostId> = hosts
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let hostcount = hosts.len() as u32;
        validate_sizing(hostcount, sites_per_host, kfactor).map_err(FatalError::Topology)?;

        let capacity = hostcount as u64 * sites_per_host as u64;
        let mut sites = Vec::with_capacity(usize::try_from(capacity).unwrap_or(0));
        for _ in 0..sites_per_host {
            sites.extend(hosts.iter().copied());
        }

        let replica_count = (kfactor + 1) as usize;
        let partitions = sites
            .chunks(replica_count)
            .enumerate()
            .map(|(id, replicas)| PartitionAssignment {
                partition_id: id as PartitionId,
                master: replicas[0],
                replicas: replicas.to_vec(),
            })
            .collect();

        Ok(Self {
            hostcount,
            kfactor,
            sites_per_host,
            partitions,
        })
    }

    /// Parses and validates an agreed topology document.
    pub fn from_document(document: &Value) -> Result<Self, FatalError> {
        let topology: ClusterTopology = serde_json::from_value(document.clone())
            .map_err(|e| FatalError::Topology(format!("malformed topology document: {}", e)))?;
        topology.validate()?;
        Ok(topology)
    }

    pub fn to_document(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Validates the integrity of the topology.
    ///
    /// Checks for:
    /// - valid sizing,
    /// - partition ids forming exactly `0..partition_count`,
    /// - `kfactor + 1` distinct replicas per partition with the master among them,
    /// - no host holding more than `sites_per_host` replicas,
    /// - no more distinct hosts than `hostcount`.
    pub fn validate(&self) -> Result<(), FatalError> {
        validate_sizing(self.hostcount, self.sites_per_host, self.kfactor)
            .map_err(FatalError::Topology)?;

        let expected = self.partition_count();
        if self.partitions.len() as u32 != expected {
            return Err(FatalError::Topology(format!(
                "topology lists {} partitions, sizing implies {}",
                self.partitions.len(),
                expected
            )));
        }

        let mut seen = HashSet::new();
        let mut per_host: BTreeMap<HostId, u32> = BTreeMap::new();
        for partition in &self.partitions {
            if partition.partition_id >= expected {
                return Err(FatalError::Topology(format!(
                    "partition {} is out of range for partition count {}",
                    partition.partition_id, expected
                )));
            }
            if !seen.insert(partition.partition_id) {
                return Err(FatalError::Topology(format!(
                    "partition {} appears more than once",
                    partition.partition_id
                )));
            }
            if partition.replicas.len() as u32 != self.kfactor + 1 {
                return Err(FatalError::Topology(format!(
                    "partition {} has {} replicas, expected {}",
                    partition.partition_id,
                    partition.replicas.len(),
                    self.kfactor + 1
                )));
            }
            let distinct: HashSet<_> = partition.replicas.iter().collect();
            if distinct.len() != partition.replicas.len() {
                return Err(FatalError::Topology(format!(
                    "partition {} places two replicas on one host",
                    partition.partition_id
                )));
            }
            if !partition.replicas.contains(&partition.master) {
                return Err(FatalError::Topology(format!(
                    "master {} of partition {} is not one of its replicas",
                    partition.master, partition.partition_id
                )));
            }
            for host in &partition.replicas {
                *per_host.entry(*host).or_default() += 1;
            }
        }

        if per_host.len() as u32 > self.hostcount {
            return Err(FatalError::Topology(format!(
                "topology places replicas on {} hosts, hostcount is {}",
                per_host.len(),
                self.hostcount
            )));
        }
        for (host, sites) in &per_host {
            if *sites > self.sites_per_host {
                return Err(FatalError::Topology(format!(
                    "host {} holds {} replicas, sitesperhost is {}",
                    host, sites, self.sites_per_host
                )));
            }
        }

        Ok(())
    }

    pub fn partition_count(&self) -> u32 {
        partition_count_for(self.hostcount, self.sites_per_host, self.kfactor)
    }

    pub fn replication_factor(&self) -> u32 {
        self.kfactor
    }

    pub fn sites_per_host(&self) -> u32 {
        self.sites_per_host
    }

    pub fn host_count(&self) -> u32 {
        self.hostcount
    }

    /// Partitions with a replica on `host`. Empty when the host holds none.
    pub fn partitions_for_host(&self, host: HostId) -> PartitionSet {
        self.partitions
            .iter()
            .filter(|p| p.replicas.contains(&host))
            .map(|p| p.partition_id)
            .collect()
    }

    /// Partitions whose master is `host`.
    pub fn masters_for_host(&self, host: HostId) -> PartitionSet {
        self.partitions
            .iter()
            .filter(|p| p.master == host)
            .map(|p| p.partition_id)
            .collect()
    }
}
