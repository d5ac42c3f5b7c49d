use anyhow::{Context, Result};
use clusterboot::catalog::CatalogConfig;
use clusterboot::compiler::{ConnectorRegistry, DeploymentCompiler, FailurePolicy};
use clusterboot::config::NodeConfig;
use clusterboot::resolver::{
    FixedHostIdentity, InMemoryPartitionAuthority, LiveReplicas, PartitionAuthority,
    PartitionsResolver, StartAction,
};
use clusterboot::topology::{
    ClusterTopology, CoordinationRaceProvider, CoordinationReadProvider, InMemoryTopologyStore,
    LocalCacheTopologyProvider, StaticTopologyProvider, TopologyProviderChain, TopologyStore,
};
use clusterboot::FatalError;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Outcome of a command: plumbing errors are `Err`, fatal node outcomes are
/// `Ok(Err(..))` so `main` can halt with the right exit code.
pub type Outcome = Result<std::result::Result<(), FatalError>>;

pub fn compile(
    node: &NodeConfig,
    deployment: &Path,
    roles: &[String],
    connectors: &[String],
    halt_on_error: bool,
) -> Outcome {
    let document = fs::read_to_string(deployment)
        .with_context(|| format!("failed to read deployment '{}'", deployment.display()))?;

    let mut registry = ConnectorRegistry::new();
    for class in connectors {
        registry.register(class.clone());
    }
    let compiler = DeploymentCompiler::new(node.build_info()).with_connectors(registry);
    let mut config = CatalogConfig::with_roles(roles);

    let policy = if halt_on_error {
        FailurePolicy::Halt
    } else {
        FailurePolicy::Report
    };
    match compiler.compile_document(&mut config, &document, policy) {
        Ok(None) => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(Ok(()))
        }
        Ok(Some(message)) => anyhow::bail!("{}", message),
        Err(fatal) => Ok(Err(fatal)),
    }
}

pub struct PartitionsArgs<'a> {
    pub topology: Option<&'a Path>,
    pub hosts: &'a [u32],
    pub sites_per_host: u32,
    pub kfactor: u32,
    pub host_id: Option<u32>,
    pub rejoin: bool,
    pub live: Option<&'a Path>,
    pub store: Option<&'a Path>,
}

pub async fn partitions(node: &NodeConfig, args: PartitionsArgs<'_>) -> Outcome {
    let store: Arc<dyn TopologyStore> = match args.store {
        Some(path) => Arc::new(InMemoryTopologyStore::with_document(read_json(path)?)),
        None => Arc::new(InMemoryTopologyStore::new()),
    };
    let mut chain = TopologyProviderChain::default();

    if let Some(path) = args.topology {
        chain = chain.with_provider(StaticTopologyProvider::new(read_json(path)?));
    }
    if args.rejoin {
        chain = chain.with_provider(LocalCacheTopologyProvider::new(
            &node.topology_cache,
            CoordinationReadProvider::new(store.clone()),
        ));
    } else if !args.hosts.is_empty() {
        let candidate = match ClusterTopology::compute(args.hosts, args.sites_per_host, args.kfactor) {
            Ok(candidate) => candidate,
            Err(fatal) => return Ok(Err(fatal)),
        };
        chain = chain.with_provider(LocalCacheTopologyProvider::new(
            &node.topology_cache,
            CoordinationRaceProvider::new(store.clone(), candidate),
        ));
    }

    let authority: Arc<dyn PartitionAuthority> = match args.live {
        Some(path) => {
            let live: LiveReplicas = serde_json::from_value(read_json(path)?)
                .with_context(|| format!("invalid live replica file '{}'", path.display()))?;
            Arc::new(InMemoryPartitionAuthority::new(live))
        }
        None => Arc::new(InMemoryPartitionAuthority::default()),
    };

    let action = if args.rejoin {
        StartAction::Rejoin
    } else {
        StartAction::Create
    };
    let host_id = args.host_id.unwrap_or(node.host_id);
    let resolver = PartitionsResolver::new(
        action,
        Arc::new(chain),
        authority,
        Arc::new(FixedHostIdentity(host_id)),
    );

    let count = match resolver.partition_count().await {
        Ok(count) => count,
        Err(fatal) => return Ok(Err(fatal)),
    };
    let owned = match resolver.owned_partitions().await {
        Ok(owned) => owned,
        Err(fatal) => return Ok(Err(fatal)),
    };

    let masters = if action.does_rejoin() {
        None
    } else {
        match resolver.cluster_topology().await {
            Ok(topology) => Some(topology.masters_for_host(host_id)),
            Err(fatal) => return Ok(Err(fatal)),
        }
    };

    let report = json!({
        "host_id": host_id,
        "start_action": action,
        "partition_count": count,
        "partitions": owned,
        "masters": masters,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(Ok(()))
}

pub fn version_check(node: &NodeConfig, version: &str) -> Outcome {
    let compiler = DeploymentCompiler::new(node.build_info());
    let valid = compiler.is_catalog_version_valid(version);
    println!(
        "catalog version '{}' is {} for build {}",
        version,
        if valid { "valid" } else { "invalid" },
        compiler.build().version
    );
    Ok(Ok(()))
}

fn read_json(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("'{}' is not valid JSON", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn node(dir: &TempDir) -> NodeConfig {
        NodeConfig {
            host_id: 0,
            licensed: false,
            topology_cache: dir.path().join("cache").join("topology.json"),
            log_filter: "off".to_string(),
        }
    }

    fn write(dir: &TempDir, name: &str, value: &Value) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, value.to_string()).unwrap();
        path
    }

    #[test]
    fn test_reported_compile_failure_is_an_error() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("root").display().to_string();
        let deployment = write(
            &dir,
            "deployment.json",
            &json!({ "paths": { "voltdbroot": root }, "heartbeat": { "timeout": 0 } }),
        );

        let err = compile(&node(&dir), &deployment, &[], &[], false).unwrap_err();
        assert!(err.to_string().contains("Error parsing deployment file"));
    }

    #[test]
    fn test_successful_compile() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("root").display().to_string();
        let deployment = write(&dir, "deployment.json", &json!({ "paths": { "voltdbroot": root } }));

        assert_eq!(compile(&node(&dir), &deployment, &[], &[], false).unwrap(), Ok(()));
    }

    #[test]
    fn test_halted_compile_is_fatal() {
        let dir = TempDir::new().unwrap();
        let deployment = write(&dir, "deployment.json", &json!({ "heartbeat": { "timeout": 0 } }));

        let outcome = compile(&node(&dir), &deployment, &[], &[], true).unwrap();
        assert!(matches!(outcome, Err(FatalError::Deployment(_))));
    }

    #[tokio::test]
    async fn test_rejoin_reads_seeded_store() {
        let dir = TempDir::new().unwrap();
        let topology = ClusterTopology::compute(&[0, 1, 2], 2, 1).unwrap();
        // host 2 held replicas of partitions 1 and 2
        let live = json!({ "replicas": { "0": 2, "1": 1, "2": 1 } });
        let store = write(&dir, "store.json", &topology.to_document());
        let live = write(&dir, "live.json", &live);
        let node = node(&dir);

        let args = PartitionsArgs {
            topology: None,
            hosts: &[],
            sites_per_host: 2,
            kfactor: 1,
            host_id: Some(2),
            rejoin: true,
            live: Some(live.as_path()),
            store: Some(store.as_path()),
        };
        assert_eq!(partitions(&node, args).await.unwrap(), Ok(()));
        assert!(node.topology_cache.is_file());
    }

    #[tokio::test]
    async fn test_rejoin_without_topology_source_is_fatal() {
        let dir = TempDir::new().unwrap();
        let live = write(&dir, "live.json", &json!({ "replicas": { "0": 1 } }));

        let args = PartitionsArgs {
            topology: None,
            hosts: &[],
            sites_per_host: 2,
            kfactor: 1,
            host_id: Some(2),
            rejoin: true,
            live: Some(live.as_path()),
            store: None,
        };
        let outcome = partitions(&node(&dir), args).await.unwrap();
        assert!(matches!(outcome, Err(FatalError::Topology(_))));
    }
}
