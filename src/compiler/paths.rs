use crate::catalog::ResolvedPaths;
use crate::core::{DeployError, Result};
use crate::deployment::PathsSection;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Resolves every configured directory and makes sure it exists.
///
/// Relative sub-paths live under the root. Command-log directories are only
/// handled on licensed builds.
pub(super) fn resolve_paths(section: &PathsSection, licensed: bool) -> Result<ResolvedPaths> {
    if section.voltdbroot.trim().is_empty() {
        return Err(DeployError::Validation(
            "voltdbroot path must not be empty".to_string(),
        ));
    }
    let root = std::path::absolute(&section.voltdbroot)?;
    ensure_dir(&root, "voltdbroot")?;

    let snapshots = subdir(&root, &section.snapshots, "snapshots")?;
    let export_overflow = subdir(&root, &section.exportoverflow, "export overflow")?;

    let (command_log, command_log_snapshot) = if licensed {
        (
            Some(subdir(&root, &section.commandlog, "command log")?),
            Some(subdir(&root, &section.commandlogsnapshot, "command log snapshot")?),
        )
    } else {
        debug!("command log directories skipped on unlicensed build");
        (None, None)
    };

    Ok(ResolvedPaths {
        root,
        snapshots,
        export_overflow,
        command_log,
        command_log_snapshot,
    })
}

fn subdir(root: &Path, configured: &str, label: &str) -> Result<PathBuf> {
    if configured.trim().is_empty() {
        return Err(DeployError::Validation(format!(
            "{} path must not be empty",
            label
        )));
    }
    let configured = Path::new(configured);
    let path = if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        root.join(configured)
    };
    ensure_dir(&path, label)?;
    Ok(path)
}

fn ensure_dir(path: &Path, label: &str) -> Result<()> {
    fs::create_dir_all(path).map_err(|err| {
        DeployError::Io(format!(
            "Failed to create {} directory '{}': {}",
            label,
            path.display(),
            err
        ))
    })?;
    if !path.is_dir() {
        return Err(DeployError::Io(format!(
            "{} path '{}' is not a directory",
            label,
            path.display()
        )));
    }
    Ok(())
}
