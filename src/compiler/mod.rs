//! Deployment compiler.
//!
//! Validates a [`DeploymentDescriptor`] and merges it into a
//! [`CatalogConfig`] in a fixed rule order:
//!
//! 1. numeric sanity (heartbeat, temp tables, query timeout)
//! 2. cluster sizing and schema mode
//! 3. directories
//! 4. security
//! 5. users and roles
//! 6. system settings
//! 7. partition detection
//! 8. snapshot schedule
//! 9. export
//!
//! The first violated rule is reported and later rules are not evaluated.
//! Every rule runs against a staged copy that replaces the caller's config
//! only when all rules pass; directories created along the way stay.

pub mod export;
mod paths;
mod security;
pub mod version;

pub use export::{ConnectorRegistry, builtin_connector_class};
pub use version::is_catalog_version_valid;

use crate::catalog::{
    CatalogConfig, DEFAULT_HEARTBEAT_TIMEOUT_SECONDS, DEFAULT_PARTITION_DETECTION_PREFIX,
    DEFAULT_QUERY_TIMEOUT_MS, DEFAULT_SNAPSHOT_SCHEDULE_KEY, DEFAULT_TEMP_TABLE_MAX_SIZE_MB,
    FaultSnapshot, PARTITION_DETECTION_KEY, SnapshotSchedule,
};
use crate::core::{BuildInfo, DeployError, FatalError, Result};
use crate::deployment::{DeploymentDescriptor, SchemaMode};
use crate::topology::validate_sizing;
use log::{debug, info};

/// What the caller wants when compilation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Hand the message back.
    #[default]
    Report,
    /// Escalate to a [`FatalError::Deployment`] so startup stops.
    Halt,
}

/// Compiles deployment descriptors into catalog configuration.
///
/// Holds no lock; callers serialize compiles against the same config.
#[derive(Debug, Clone, Default)]
pub struct DeploymentCompiler {
    build: BuildInfo,
    connectors: ConnectorRegistry,
}

impl DeploymentCompiler {
    pub fn new(build: BuildInfo) -> Self {
        Self {
            build,
            connectors: ConnectorRegistry::new(),
        }
    }

    pub fn with_connectors(mut self, connectors: ConnectorRegistry) -> Self {
        self.connectors = connectors;
        self
    }

    pub fn build(&self) -> &BuildInfo {
        &self.build
    }

    pub fn connectors(&self) -> &ConnectorRegistry {
        &self.connectors
    }

    /// Validates `descriptor` and merges it into `config`.
    ///
    /// On failure `config` is left as it was.
    pub fn compile(&self, config: &mut CatalogConfig, descriptor: &DeploymentDescriptor) -> Result<()> {
        let mut staged = config.clone();
        self.apply(&mut staged, descriptor)?;
        *config = staged;
        info!(
            "deployment compiled: {} hosts, kfactor {}, {} sites per host",
            config.cluster.host_count, config.cluster.kfactor, config.cluster.sites_per_host
        );
        Ok(())
    }

    /// `compile` with a nullable diagnostic: `None` on success.
    pub fn compile_message(
        &self,
        config: &mut CatalogConfig,
        descriptor: &DeploymentDescriptor,
    ) -> Option<String> {
        self.compile(config, descriptor).err().map(|e| e.to_string())
    }

    /// Parses a descriptor document and compiles it.
    ///
    /// Parse failures are reported like any other failure. Under
    /// [`FailurePolicy::Halt`] a failure becomes a fatal outcome instead of a
    /// returned message.
    pub fn compile_document(
        &self,
        config: &mut CatalogConfig,
        document: &str,
        policy: FailurePolicy,
    ) -> std::result::Result<Option<String>, FatalError> {
        let outcome = DeploymentDescriptor::from_json(document)
            .and_then(|descriptor| self.compile(config, &descriptor));
        match (outcome, policy) {
            (Ok(()), _) => Ok(None),
            (Err(err), FailurePolicy::Report) => Ok(Some(err.to_string())),
            (Err(err), FailurePolicy::Halt) => Err(err.into()),
        }
    }

    /// Whether a catalog from `version` is loadable by this build.
    pub fn is_catalog_version_valid(&self, version: &str) -> bool {
        is_catalog_version_valid(version, &self.build)
    }

    fn apply(&self, config: &mut CatalogConfig, descriptor: &DeploymentDescriptor) -> Result<()> {
        apply_numeric_sanity(config, descriptor)?;
        apply_cluster(config, descriptor)?;
        config.paths = paths::resolve_paths(&descriptor.paths, self.build.licensed)?;
        security::apply_security(config, descriptor)?;
        security::apply_users(config, descriptor)?;
        apply_system_settings(config, descriptor);
        apply_partition_detection(config, descriptor);
        apply_snapshot_schedule(config, descriptor);
        export::apply_export(config, descriptor, &self.connectors);
        apply_http_and_admin(config, descriptor);
        Ok(())
    }
}

fn apply_numeric_sanity(config: &mut CatalogConfig, descriptor: &DeploymentDescriptor) -> Result<()> {
    let heartbeat = match &descriptor.heartbeat {
        None => DEFAULT_HEARTBEAT_TIMEOUT_SECONDS,
        Some(heartbeat) if heartbeat.timeout <= 0 => {
            return Err(DeployError::Parse(format!(
                "heartbeat timeout must be greater than 0, got {}",
                heartbeat.timeout
            )));
        }
        Some(heartbeat) => non_negative_u32(heartbeat.timeout, "heartbeat timeout")?,
    };

    if let Some(settings) = &descriptor.systemsettings {
        if let Some(temptables) = &settings.temptables {
            non_negative_u32(temptables.maxsize, "temptables maxsize")?;
        }
        if let Some(query) = &settings.query {
            non_negative_u32(query.timeout, "query timeout")?;
        }
    }

    config.cluster.heartbeat_timeout_seconds = heartbeat;
    Ok(())
}

fn non_negative_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        DeployError::Parse(format!(
            "{} must be between 0 and {}, got {}",
            field,
            u32::MAX,
            value
        ))
    })
}

fn apply_cluster(config: &mut CatalogConfig, descriptor: &DeploymentDescriptor) -> Result<()> {
    let cluster = &descriptor.cluster;
    validate_sizing(cluster.hostcount, cluster.sitesperhost, cluster.kfactor)
        .map_err(|e| DeployError::Validation(format!("Invalid cluster configuration: {}", e)))?;

    config.cluster.host_count = cluster.hostcount;
    config.cluster.kfactor = cluster.kfactor;
    config.cluster.sites_per_host = cluster.sitesperhost;
    config.cluster.use_ddl_schema = cluster.schema == SchemaMode::Ddl;
    Ok(())
}

fn apply_system_settings(config: &mut CatalogConfig, descriptor: &DeploymentDescriptor) {
    let settings = descriptor.systemsettings.as_ref();
    // Bounds were checked in the numeric stage.
    config.system_settings.temp_table_max_size_mb = settings
        .and_then(|s| s.temptables.as_ref())
        .map(|t| t.maxsize as u32)
        .unwrap_or(DEFAULT_TEMP_TABLE_MAX_SIZE_MB);
    config.system_settings.query_timeout_ms = settings
        .and_then(|s| s.query.as_ref())
        .map(|q| q.timeout as u32)
        .unwrap_or(DEFAULT_QUERY_TIMEOUT_MS);
}

fn apply_partition_detection(config: &mut CatalogConfig, descriptor: &DeploymentDescriptor) {
    let section = descriptor.partition_detection.clone().unwrap_or_default();
    config.cluster.network_partition = section.enabled;

    if !section.enabled {
        debug!("partition detection disabled");
        config.fault_snapshots.remove(PARTITION_DETECTION_KEY);
        return;
    }

    let prefix = section
        .snapshot
        .map(|s| s.prefix)
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PARTITION_DETECTION_PREFIX.to_string());
    config.fault_snapshots.insert(
        PARTITION_DETECTION_KEY.to_string(),
        FaultSnapshot {
            prefix,
            path: config.paths.snapshots.clone(),
        },
    );
}

fn apply_snapshot_schedule(config: &mut CatalogConfig, descriptor: &DeploymentDescriptor) {
    match &descriptor.snapshot {
        None => {
            config.snapshot_schedules.remove(DEFAULT_SNAPSHOT_SCHEDULE_KEY);
        }
        Some(snapshot) => {
            config.snapshot_schedules.insert(
                DEFAULT_SNAPSHOT_SCHEDULE_KEY.to_string(),
                SnapshotSchedule {
                    enabled: snapshot.enabled,
                    frequency: snapshot.frequency.clone(),
                    retain: snapshot.retain,
                    prefix: snapshot.prefix.clone(),
                    path: config.paths.snapshots.clone(),
                },
            );
        }
    }
}

fn apply_http_and_admin(config: &mut CatalogConfig, descriptor: &DeploymentDescriptor) {
    let httpd = descriptor.httpd.as_ref();
    config.httpd.port = httpd.and_then(|h| h.port);
    config.httpd.json_api_enabled = httpd
        .and_then(|h| h.jsonapi.as_ref())
        .is_some_and(|j| j.enabled);

    let admin = descriptor.admin_mode.clone().unwrap_or_default();
    config.admin_mode.port = admin.port.unwrap_or(crate::catalog::DEFAULT_ADMIN_PORT);
    config.admin_mode.admin_startup = admin.adminstartup;
}
