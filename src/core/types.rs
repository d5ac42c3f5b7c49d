use regex::Regex;
use std::collections::BTreeSet;

pub type HostId = u32;
pub type PartitionId = u32;

/// Partitions owned by, or to be taken over by, the local host.
pub type PartitionSet = BTreeSet<PartitionId>;

/// Facts about the running build that influence compilation.
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Version string of the running build.
    pub version: String,
    /// Licensed builds create command-log directories.
    pub licensed: bool,
    /// Catalog versions accepted by this build.
    pub compatible_versions: Regex,
}

impl BuildInfo {
    /// Creates build info accepting exactly `version`.
    pub fn new(version: &str, licensed: bool) -> Self {
        Self {
            version: version.to_string(),
            licensed,
            compatible_versions: exact_version_pattern(version),
        }
    }

    /// Build info for the binary being compiled.
    pub fn current() -> Self {
        Self::new(env!("CARGO_PKG_VERSION"), cfg!(feature = "licensed"))
    }

    /// Overrides the compatibility pattern.
    pub fn with_compatible_versions(mut self, pattern: Regex) -> Self {
        self.compatible_versions = pattern;
        self
    }
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self::current()
    }
}

fn exact_version_pattern(version: &str) -> Regex {
    Regex::new(&format!("^{}$", regex::escape(version)))
        .expect("escaped version literal is a valid pattern")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_pattern_is_anchored() {
        let build = BuildInfo::new("5.1.2", false);
        assert!(build.compatible_versions.is_match("5.1.2"));
        assert!(!build.compatible_versions.is_match("5.1.20"));
        assert!(!build.compatible_versions.is_match("x5.1.2"));
        assert!(!build.compatible_versions.is_match("5a1.2"));
    }
}
