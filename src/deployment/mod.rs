//! Deployment descriptor model.
//!
//! The descriptor is produced by an external parser. This crate accepts the
//! JSON rendition of it; a document that fails to deserialize is reported the
//! same way a schema violation would be, as an immediate parse message.

use crate::core::{DeployError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// A parsed, schema-valid deployment descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct DeploymentDescriptor {
    pub cluster: ClusterSection,
    pub paths: PathsSection,
    pub security: Option<SecuritySection>,
    pub users: Vec<UserSection>,
    pub heartbeat: Option<HeartbeatSection>,
    pub httpd: Option<HttpdSection>,
    pub admin_mode: Option<AdminModeSection>,
    pub export: Option<ExportSection>,
    pub systemsettings: Option<SystemSettingsSection>,
    pub partition_detection: Option<PartitionDetectionSection>,
    pub snapshot: Option<SnapshotSection>,
}

impl DeploymentDescriptor {
    /// Parses a descriptor document.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| DeployError::Parse(e.to_string()))
    }

    /// Reads and parses a descriptor file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DeployError::Parse(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SchemaMode {
    Catalog,
    #[default]
    Ddl,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterSection {
    pub hostcount: u32,
    pub kfactor: u32,
    pub sitesperhost: u32,
    pub schema: SchemaMode,
}

impl Default for ClusterSection {
    fn default() -> Self {
        Self {
            hostcount: 1,
            kfactor: 0,
            sitesperhost: 8,
            schema: SchemaMode::Ddl,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PathsSection {
    pub voltdbroot: String,
    pub snapshots: String,
    pub exportoverflow: String,
    pub commandlog: String,
    pub commandlogsnapshot: String,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            voltdbroot: "voltdbroot".to_string(),
            snapshots: "snapshots".to_string(),
            exportoverflow: "export_overflow".to_string(),
            commandlog: "command_log".to_string(),
            commandlogsnapshot: "command_log_snapshot".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SecuritySection {
    pub enabled: bool,
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct UserSection {
    pub name: String,
    pub password: String,
    /// `false` means `password` already holds the hex digest.
    #[serde(default = "default_true")]
    pub plaintext: bool,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HeartbeatSection {
    /// Seconds. Signed so that non-positive values reach validation.
    pub timeout: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct HttpdSection {
    pub port: Option<u16>,
    pub jsonapi: Option<JsonApiSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct JsonApiSection {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AdminModeSection {
    pub port: Option<u16>,
    pub adminstartup: bool,
}

/// Export destinations understood by the descriptor schema.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ExportTarget {
    #[default]
    File,
    Kafka,
    Rabbitmq,
    Jdbc,
    Http,
    Custom,
}

impl ExportTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportTarget::File => "file",
            ExportTarget::Kafka => "kafka",
            ExportTarget::Rabbitmq => "rabbitmq",
            ExportTarget::Jdbc => "jdbc",
            ExportTarget::Http => "http",
            ExportTarget::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ExportSection {
    pub enabled: bool,
    pub target: ExportTarget,
    pub exportconnectorclass: Option<String>,
    pub configuration: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SystemSettingsSection {
    pub temptables: Option<TempTablesSection>,
    pub query: Option<QuerySection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TempTablesSection {
    /// Megabytes.
    pub maxsize: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct QuerySection {
    /// Milliseconds; 0 disables the timeout.
    pub timeout: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PartitionDetectionSection {
    pub enabled: bool,
    pub snapshot: Option<PartitionDetectionSnapshot>,
}

impl Default for PartitionDetectionSection {
    fn default() -> Self {
        Self {
            enabled: true,
            snapshot: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PartitionDetectionSnapshot {
    pub prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SnapshotSection {
    pub enabled: bool,
    pub frequency: String,
    pub retain: u32,
    pub prefix: String,
}

impl Default for SnapshotSection {
    fn default() -> Self {
        Self {
            enabled: false,
            frequency: "24h".to_string(),
            retain: 2,
            prefix: "AUTOSNAP".to_string(),
        }
    }
}

fn default_true() -> bool {
    true
}
