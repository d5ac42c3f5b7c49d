use crate::core::{DeployError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Built-in role required for at least one user when security is on.
pub const ADMINISTRATOR_ROLE: &str = "administrator";

/// Built-in role for ordinary clients.
pub const USER_ROLE: &str = "user";

/// bcrypt work factor for stored shadow credentials.
pub const SHADOW_COST: u32 = 10;

/// User account as recorded in the catalog.
///
/// Only the shadow credential is kept; the descriptor's password never is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogUser {
    name: String,
    shadow_password: String,
    roles: BTreeSet<String>,
}

impl CatalogUser {
    pub fn new(name: String, shadow_password: String, roles: BTreeSet<String>) -> Self {
        Self {
            name,
            shadow_password,
            roles,
        }
    }

    /// Returns the username
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shadow_password(&self) -> &str {
        &self.shadow_password
    }

    /// Roles this user resolved to
    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(&normalize_role(role))
    }

    #[inline]
    pub fn is_admin(&self) -> bool {
        self.roles.contains(ADMINISTRATOR_ROLE)
    }

    /// Checks a password against the shadow credential.
    ///
    /// `plaintext = false` means the caller already holds the hex digest.
    pub fn verify(&self, password: &str, plaintext: bool) -> bool {
        let digest = if plaintext {
            password_digest(password)
        } else {
            password.to_ascii_lowercase()
        };
        bcrypt::verify(digest, &self.shadow_password).unwrap_or(false)
    }
}

/// Role names are case-insensitive.
pub fn normalize_role(role: &str) -> String {
    role.trim().to_ascii_lowercase()
}

/// Hex SHA-256 digest of a plaintext password.
pub fn password_digest(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Derives the storable credential for a declared user.
///
/// Plaintext passwords are digested first; pre-hashed ones are taken as the
/// digest. The digest is then bcrypt-hashed with a salt derived from the user
/// name, so recompiling the same descriptor yields the same credential.
pub fn shadow_password(user: &str, password: &str, plaintext: bool) -> Result<String> {
    let digest = if plaintext {
        password_digest(password)
    } else {
        password.to_ascii_lowercase()
    };

    let hashed = bcrypt::hash_with_salt(digest, SHADOW_COST, user_salt(user)).map_err(|e| {
        DeployError::Validation(format!(
            "Failed to derive credential for user '{}': {}",
            user, e
        ))
    })?;
    Ok(hashed.format_for_version(bcrypt::Version::TwoB))
}

fn user_salt(user: &str) -> [u8; 16] {
    let mut hasher = Sha256::new();
    hasher.update(b"clusterboot-shadow:");
    hasher.update(user.as_bytes());
    let digest = hasher.finalize();
    let mut salt = [0u8; 16];
    salt.copy_from_slice(&digest[..16]);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadow_never_contains_plaintext() {
        let shadow = shadow_password("joe", "aaa", true).unwrap();
        assert!(!shadow.contains("aaa"));
        assert!(shadow.starts_with("$2b$"));
    }

    #[test]
    fn test_plaintext_and_prehashed_agree() {
        let from_plain = shadow_password("joe", "secret", true).unwrap();
        let from_digest = shadow_password("joe", &password_digest("secret"), false).unwrap();
        assert_eq!(from_plain, from_digest);
    }

    #[test]
    fn test_shadow_is_deterministic_per_user() {
        let a = shadow_password("joe", "secret", true).unwrap();
        let b = shadow_password("joe", "secret", true).unwrap();
        let c = shadow_password("jane", "secret", true).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_verify_round_trip() {
        let user = CatalogUser::new(
            "joe".to_string(),
            shadow_password("joe", "secret", true).unwrap(),
            BTreeSet::from([ADMINISTRATOR_ROLE.to_string()]),
        );
        assert!(user.verify("secret", true));
        assert!(user.verify(&password_digest("secret"), false));
        assert!(!user.verify("wrong", true));
        assert!(user.is_admin());
        assert!(user.has_role("ADMINISTRATOR"));
    }
}
