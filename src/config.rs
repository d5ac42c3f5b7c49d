use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::core::{BuildInfo, HostId};

/// Node bootstrap settings taken from the environment.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub host_id: HostId,
    pub licensed: bool,
    /// Where the agreed topology is cached between restarts.
    pub topology_cache: PathBuf,
    pub log_filter: String,
}

impl NodeConfig {
    pub fn from_env() -> Result<Self> {
        let host_id = env_string("CLUSTERBOOT_HOST_ID", "0")
            .parse::<HostId>()
            .context("CLUSTERBOOT_HOST_ID must be a non-negative integer")?;

        let licensed = parse_flag(&env_string(
            "CLUSTERBOOT_LICENSED",
            if cfg!(feature = "licensed") { "true" } else { "false" },
        ))
        .context("CLUSTERBOOT_LICENSED must be true or false")?;

        let topology_cache = PathBuf::from(env_string(
            "CLUSTERBOOT_TOPOLOGY_CACHE",
            "voltdbroot/config/topology.json",
        ));

        let log_filter = env_string("CLUSTERBOOT_LOG", "clusterboot=info");

        Ok(Self {
            host_id,
            licensed,
            topology_cache,
            log_filter,
        })
    }

    /// Build info honoring the licensed override.
    pub fn build_info(&self) -> BuildInfo {
        let current = BuildInfo::current();
        BuildInfo::new(&current.version, self.licensed)
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("unrecognized flag value '{}'", other),
    }
}
