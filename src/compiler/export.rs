use crate::catalog::{CatalogConfig, EXPORT_TO_TYPE, ExportConnector};
use crate::deployment::{DeploymentDescriptor, ExportTarget};
use lazy_static::lazy_static;
use log::{info, warn};
use std::collections::{BTreeSet, HashMap};

pub const FILE_CONNECTOR: &str = "clusterboot.export.FileExportClient";
pub const KAFKA_CONNECTOR: &str = "clusterboot.export.KafkaExportClient";
pub const RABBITMQ_CONNECTOR: &str = "clusterboot.export.RabbitMQExportClient";
pub const JDBC_CONNECTOR: &str = "clusterboot.export.JdbcExportClient";
pub const HTTP_CONNECTOR: &str = "clusterboot.export.HttpExportClient";
/// Connector that discards rows; always resolvable, handy as a custom class.
pub const NOOP_CONNECTOR: &str = "clusterboot.export.NoOpExportClient";

lazy_static! {
    static ref BUILTIN_CONNECTORS: HashMap<ExportTarget, &'static str> = {
        let mut m = HashMap::new();
        m.insert(ExportTarget::File, FILE_CONNECTOR);
        m.insert(ExportTarget::Kafka, KAFKA_CONNECTOR);
        m.insert(ExportTarget::Rabbitmq, RABBITMQ_CONNECTOR);
        m.insert(ExportTarget::Jdbc, JDBC_CONNECTOR);
        m.insert(ExportTarget::Http, HTTP_CONNECTOR);
        m
    };
}

/// Fixed connector class for a built-in target; `None` for `custom`.
pub fn builtin_connector_class(target: ExportTarget) -> Option<&'static str> {
    BUILTIN_CONNECTORS.get(&target).copied()
}

/// Connector classes this node can load.
#[derive(Debug, Clone)]
pub struct ConnectorRegistry {
    classes: BTreeSet<String>,
}

impl ConnectorRegistry {
    /// Registry holding the built-in connectors and the no-op connector.
    pub fn new() -> Self {
        let mut classes: BTreeSet<String> =
            BUILTIN_CONNECTORS.values().map(|c| c.to_string()).collect();
        classes.insert(NOOP_CONNECTOR.to_string());
        Self { classes }
    }

    pub fn register(&mut self, class: impl Into<String>) -> bool {
        self.classes.insert(class.into())
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.register(class);
        self
    }

    pub fn resolve(&self, class: &str) -> bool {
        self.classes.contains(class.trim())
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Records the export connector.
///
/// A custom target whose class cannot be resolved turns export off; this is
/// not a compile failure.
pub(super) fn apply_export(
    config: &mut CatalogConfig,
    descriptor: &DeploymentDescriptor,
    registry: &ConnectorRegistry,
) {
    config.export_enabled = false;
    config.export = None;

    let Some(section) = descriptor.export.as_ref().filter(|e| e.enabled) else {
        return;
    };

    let class = match builtin_connector_class(section.target) {
        Some(class) => class.to_string(),
        None => match section
            .exportconnectorclass
            .as_deref()
            .map(str::trim)
            .filter(|c| registry.resolve(c))
        {
            Some(class) => class.to_string(),
            None => {
                warn!(
                    "export connector class {:?} cannot be resolved; export disabled",
                    section.exportconnectorclass
                );
                return;
            }
        },
    };

    let mut properties = section.configuration.clone();
    properties.insert(EXPORT_TO_TYPE.to_string(), class.clone());

    info!("export enabled with {} connector '{}'", section.target.as_str(), class);
    config.export_enabled = true;
    config.export = Some(ExportConnector {
        target: section.target,
        connector_class: class,
        config: properties,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deployment::ExportSection;

    fn descriptor(target: ExportTarget, class: Option<&str>) -> DeploymentDescriptor {
        DeploymentDescriptor {
            export: Some(ExportSection {
                enabled: true,
                target,
                exportconnectorclass: class.map(str::to_string),
                ..ExportSection::default()
            }),
            ..DeploymentDescriptor::default()
        }
    }

    #[test]
    fn test_custom_target_has_no_builtin_class() {
        assert_eq!(builtin_connector_class(ExportTarget::Custom), None);
        assert_eq!(builtin_connector_class(ExportTarget::Kafka), Some(KAFKA_CONNECTOR));
    }

    #[test]
    fn test_builtin_target_ignores_supplied_class() {
        let mut config = CatalogConfig::new();
        let registry = ConnectorRegistry::new();
        apply_export(
            &mut config,
            &descriptor(ExportTarget::File, Some("com.foo.Whatever")),
            &registry,
        );
        assert_eq!(config.export.unwrap().connector_class, FILE_CONNECTOR);
    }

    #[test]
    fn test_custom_without_class_disables_export() {
        let mut config = CatalogConfig::new();
        apply_export(
            &mut config,
            &descriptor(ExportTarget::Custom, None),
            &ConnectorRegistry::new(),
        );
        assert!(!config.export_enabled);
        assert!(config.export.is_none());
    }

    #[test]
    fn test_registered_custom_class_resolves() {
        let mut config = CatalogConfig::new();
        let registry = ConnectorRegistry::new().with_class("acme.export.Sink");
        apply_export(
            &mut config,
            &descriptor(ExportTarget::Custom, Some("acme.export.Sink")),
            &registry,
        );
        assert!(config.export_enabled);
        let connector = config.export.unwrap();
        assert_eq!(connector.config.get(EXPORT_TO_TYPE).unwrap(), "acme.export.Sink");
    }
}
