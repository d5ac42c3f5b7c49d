use crate::core::BuildInfo;

/// Whether a catalog written by build `version` can be loaded by `build`.
///
/// Only what the build's compatibility pattern accepts is valid; by default
/// that is exactly the running version.
pub fn is_catalog_version_valid(version: &str, build: &BuildInfo) -> bool {
    let version = version.trim();
    !version.is_empty() && build.compatible_versions.is_match(version)
}
