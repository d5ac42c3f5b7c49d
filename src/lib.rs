// ============================================================================
// clusterboot Library
// ============================================================================

pub mod core;
pub mod deployment;
pub mod catalog;
pub mod compiler;
pub mod topology;
pub mod resolver;
pub mod config;

// Re-export main types for convenience
pub use core::{BuildInfo, DeployError, FatalError, HostId, PartitionId, PartitionSet, StoreError};
pub use deployment::DeploymentDescriptor;
pub use catalog::CatalogConfig;
pub use compiler::{ConnectorRegistry, DeploymentCompiler, FailurePolicy, is_catalog_version_valid};
pub use topology::{ClusterTopology, TopologyProvider, TopologyProviderChain, TopologyStore};
pub use resolver::{FixedHostIdentity, HostIdentity, PartitionAuthority, PartitionsResolver, StartAction};
