use crate::catalog::auth::{self, ADMINISTRATOR_ROLE, CatalogUser};
use crate::catalog::{CatalogConfig, DEFAULT_SECURITY_PROVIDER};
use crate::core::{DeployError, Result};
use crate::deployment::DeploymentDescriptor;
use log::debug;
use std::collections::{BTreeMap, BTreeSet, HashSet};

pub(super) const MISSING_ADMIN_MESSAGE: &str = "Cannot enable security without defining at least one user in the built-in ADMINISTRATOR role in the deployment file.";

/// Security flag and provider.
pub(super) fn apply_security(config: &mut CatalogConfig, descriptor: &DeploymentDescriptor) -> Result<()> {
    let enabled = descriptor.security.as_ref().is_some_and(|s| s.enabled);

    if enabled {
        let has_admin = descriptor
            .users
            .iter()
            .any(|u| u.roles.iter().any(|r| auth::normalize_role(r) == ADMINISTRATOR_ROLE));
        if !has_admin {
            return Err(DeployError::Validation(MISSING_ADMIN_MESSAGE.to_string()));
        }
    }

    config.cluster.security_enabled = enabled;
    config.security_provider = descriptor
        .security
        .as_ref()
        .and_then(|s| s.provider.as_deref())
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_SECURITY_PROVIDER)
        .to_string();
    Ok(())
}

/// Replaces the catalog's users with the declared ones.
///
/// Roles the schema does not define are dropped for that user. With security
/// on, some user must still hold the administrator role once roles resolve.
pub(super) fn apply_users(config: &mut CatalogConfig, descriptor: &DeploymentDescriptor) -> Result<()> {
    let mut seen = HashSet::new();
    let mut users = BTreeMap::new();

    for declared in &descriptor.users {
        let name = declared.name.trim();
        if name.is_empty() {
            return Err(DeployError::Validation("User name cannot be empty".to_string()));
        }
        if !seen.insert(name.to_string()) {
            return Err(DeployError::Validation(format!(
                "User '{}' is defined more than once",
                name
            )));
        }

        let mut roles = BTreeSet::new();
        for role in &declared.roles {
            let role = auth::normalize_role(role);
            if config.roles.contains(&role) {
                roles.insert(role);
            } else {
                debug!("dropping unknown role '{}' for user '{}'", role, name);
            }
        }

        let shadow = auth::shadow_password(name, &declared.password, declared.plaintext)?;
        users.insert(
            name.to_string(),
            CatalogUser::new(name.to_string(), shadow, roles),
        );
    }

    if config.cluster.security_enabled && !users.values().any(CatalogUser::is_admin) {
        return Err(DeployError::Validation(MISSING_ADMIN_MESSAGE.to_string()));
    }

    config.users = users;
    Ok(())
}
