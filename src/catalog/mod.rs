//! The authoritative cluster configuration the rest of the node reads.
//!
//! A `CatalogConfig` is created once per process and updated in place by
//! [`DeploymentCompiler`](crate::compiler::DeploymentCompiler). Maps are
//! ordered so a serialized config is stable across runs.

pub mod auth;

pub use auth::{ADMINISTRATOR_ROLE, CatalogUser, USER_ROLE};

use crate::deployment::ExportTarget;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Default heartbeat timeout in seconds.
pub const DEFAULT_HEARTBEAT_TIMEOUT_SECONDS: u32 = 90;
/// Default temp-table memory ceiling in MB.
pub const DEFAULT_TEMP_TABLE_MAX_SIZE_MB: u32 = 100;
/// Default query timeout; 0 means unlimited.
pub const DEFAULT_QUERY_TIMEOUT_MS: u32 = 0;
pub const DEFAULT_SECURITY_PROVIDER: &str = "hash";
pub const DEFAULT_ADMIN_PORT: u16 = 21211;

pub const PARTITION_DETECTION_KEY: &str = "CLUSTER_PARTITION";
pub const DEFAULT_PARTITION_DETECTION_PREFIX: &str = "partition_detection";
pub const DEFAULT_SNAPSHOT_SCHEDULE_KEY: &str = "default";

/// Connector property carrying the resolved connector class.
pub const EXPORT_TO_TYPE: &str = "__EXPORT_TO_TYPE__";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterSettings {
    pub host_count: u32,
    pub kfactor: u32,
    pub sites_per_host: u32,
    pub use_ddl_schema: bool,
    pub heartbeat_timeout_seconds: u32,
    pub security_enabled: bool,
    /// Network-partition detection.
    pub network_partition: bool,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            host_count: 1,
            kfactor: 0,
            sites_per_host: 8,
            use_ddl_schema: true,
            heartbeat_timeout_seconds: DEFAULT_HEARTBEAT_TIMEOUT_SECONDS,
            security_enabled: false,
            network_partition: true,
        }
    }
}

/// Absolute directories the node writes to.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub root: PathBuf,
    pub snapshots: PathBuf,
    pub export_overflow: PathBuf,
    /// Only set on licensed builds.
    pub command_log: Option<PathBuf>,
    pub command_log_snapshot: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SystemSettings {
    pub temp_table_max_size_mb: u32,
    pub query_timeout_ms: u32,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            temp_table_max_size_mb: DEFAULT_TEMP_TABLE_MAX_SIZE_MB,
            query_timeout_ms: DEFAULT_QUERY_TIMEOUT_MS,
        }
    }
}

/// Snapshot taken when a fault (e.g. a network partition) is detected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FaultSnapshot {
    pub prefix: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotSchedule {
    pub enabled: bool,
    pub frequency: String,
    pub retain: u32,
    pub prefix: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportConnector {
    pub target: ExportTarget,
    pub connector_class: String,
    pub config: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpdSettings {
    pub port: Option<u16>,
    pub json_api_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminModeSettings {
    pub port: u16,
    pub admin_startup: bool,
}

impl Default for AdminModeSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_ADMIN_PORT,
            admin_startup: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogConfig {
    pub cluster: ClusterSettings,
    pub security_provider: String,
    /// Roles defined by the schema; users may only reference these.
    pub roles: BTreeSet<String>,
    pub users: BTreeMap<String, CatalogUser>,
    pub paths: ResolvedPaths,
    pub system_settings: SystemSettings,
    pub fault_snapshots: BTreeMap<String, FaultSnapshot>,
    pub snapshot_schedules: BTreeMap<String, SnapshotSchedule>,
    pub export_enabled: bool,
    pub export: Option<ExportConnector>,
    pub httpd: HttpdSettings,
    pub admin_mode: AdminModeSettings,
}

impl CatalogConfig {
    /// Creates a config whose schema defines only the built-in roles.
    pub fn new() -> Self {
        Self {
            cluster: ClusterSettings::default(),
            security_provider: DEFAULT_SECURITY_PROVIDER.to_string(),
            roles: BTreeSet::from([ADMINISTRATOR_ROLE.to_string(), USER_ROLE.to_string()]),
            users: BTreeMap::new(),
            paths: ResolvedPaths::default(),
            system_settings: SystemSettings::default(),
            fault_snapshots: BTreeMap::new(),
            snapshot_schedules: BTreeMap::new(),
            export_enabled: false,
            export: None,
            httpd: HttpdSettings::default(),
            admin_mode: AdminModeSettings::default(),
        }
    }

    /// Creates a config whose schema also defines `roles`.
    pub fn with_roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::new();
        for role in roles {
            config.define_role(role.as_ref());
        }
        config
    }

    /// Records a schema-defined role.
    pub fn define_role(&mut self, role: &str) -> bool {
        self.roles.insert(auth::normalize_role(role))
    }

    pub fn user(&self, name: &str) -> Option<&CatalogUser> {
        self.users.get(name)
    }

    pub fn admin_count(&self) -> usize {
        self.users.values().filter(|u| u.is_admin()).count()
    }

    pub fn partition_detection_snapshot(&self) -> Option<&FaultSnapshot> {
        self.fault_snapshots.get(PARTITION_DETECTION_KEY)
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_config_defines_builtin_roles() {
        let config = CatalogConfig::new();
        assert!(config.roles.contains(ADMINISTRATOR_ROLE));
        assert!(config.roles.contains(USER_ROLE));
        assert_eq!(config.security_provider, "hash");
        assert_eq!(config.cluster.heartbeat_timeout_seconds, 90);
    }

    #[test]
    fn test_with_roles_normalizes_names() {
        let config = CatalogConfig::with_roles(["LoUno", "lodue"]);
        assert!(config.roles.contains("louno"));
        assert!(config.roles.contains("lodue"));
    }
}
