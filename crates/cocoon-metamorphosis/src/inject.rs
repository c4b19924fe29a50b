//! `inject`: install a runtime bundle as a new version and activate it.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use cocoon_config::descriptor::runtime_base_dir;
use cocoon_config::{CocoonPaths, Settings, is_enabled};
use tracing::{error, info};

use crate::archive;
use crate::error::{MetamorphosisError, MetamorphosisResult};
use crate::overrides::apply_runtime_version;
use crate::prune::{PruneReport, prune_except};

/// Prefix of the hidden staging directories created inside the registry.
const STAGING_PREFIX: &str = ".inject-";

/// A runtime bundle to install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectRequest {
    /// Version directory name to create under the registry.
    pub name: String,
    /// Zip or gzip-compressed tar archive holding the bundle.
    pub archive: PathBuf,
    /// Delete every other installed version afterwards.
    pub drop_others: bool,
}

impl InjectRequest {
    /// Request keeping the other versions.
    #[must_use]
    pub fn new(name: impl Into<String>, archive: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            archive: archive.into(),
            drop_others: false,
        }
    }

    /// Set whether the other versions are deleted.
    #[must_use]
    pub fn with_drop_others(mut self, drop_others: bool) -> Self {
        self.drop_others = drop_others;
        self
    }

    /// Take the drop-others flag from its command-line spelling
    /// (`yes`/`true`, case-insensitive; anything else keeps them).
    #[must_use]
    pub fn with_drop_flag(self, flag: Option<&str>) -> Self {
        self.with_drop_others(flag.is_some_and(is_enabled))
    }
}

/// What a successful injection did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectOutcome {
    /// The new version directory.
    pub version_dir: PathBuf,
    /// Archive entries extracted.
    pub entries: usize,
    /// Result of removing the other versions, when requested.
    pub pruned: Option<PruneReport>,
}

/// Install and activate a bundle, logging any failure.
///
/// Returns whether the settings changed. On failure neither the registry
/// nor the settings are modified.
pub fn inject(request: &InjectRequest, settings: &mut Settings, paths: &CocoonPaths) -> bool {
    match try_inject(request, settings, paths) {
        Ok(_) => true,
        Err(e) => {
            error!(name = %request.name, archive = %request.archive.display(), error = %e, "injection failed");
            false
        },
    }
}

/// Install and activate a bundle.
///
/// # Errors
///
/// Returns an error when the archive or registry is missing, the version
/// already exists, the name is unusable or extraction fails.
pub fn try_inject(
    request: &InjectRequest,
    settings: &mut Settings,
    paths: &CocoonPaths,
) -> MetamorphosisResult<InjectOutcome> {
    validate_name(&request.name)?;

    if !request.archive.is_file() {
        return Err(MetamorphosisError::ArchiveNotFound {
            path: request.archive.clone(),
        });
    }
    let base = runtime_base_dir(settings, paths);
    if !base.is_dir() {
        return Err(MetamorphosisError::BaseDirMissing { path: base });
    }

    let target = base.join(&request.name);
    let entries = unpack_into(&request.archive, &base, &target)?;
    info!(version = %request.name, entries, "runtime bundle installed");

    apply_runtime_version(&request.name, settings, paths);

    let pruned = request
        .drop_others
        .then(|| prune_except(&base, &request.name));

    Ok(InjectOutcome {
        version_dir: target,
        entries,
        pruned,
    })
}

/// Extract into a staging directory next to `target`, then move it into
/// place. `target` either appears complete or not at all.
fn unpack_into(archive_path: &Path, base: &Path, target: &Path) -> MetamorphosisResult<usize> {
    if target.exists() {
        return Err(MetamorphosisError::TargetExists {
            path: target.to_path_buf(),
        });
    }

    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(base)
        .map_err(MetamorphosisError::io(base))?;
    let entries = archive::extract(archive_path, staging.path())?;

    move_into_place(staging.path(), target)?;
    // The staging path is gone; its guard has nothing left to clean up.
    drop(staging);

    Ok(entries)
}

/// Rename `staging` to `target` without ever replacing an existing `target`.
///
/// On Unix `rename` silently replaces an empty directory, so the name is
/// claimed with `create_dir` first and the rename only replaces that claim.
/// Windows refuses to rename onto an existing directory on its own.
fn move_into_place(staging: &Path, target: &Path) -> MetamorphosisResult<()> {
    #[cfg(unix)]
    fs::create_dir(target).map_err(|e| placement_error(e, target))?;

    if let Err(e) = fs::rename(staging, target) {
        #[cfg(unix)]
        {
            // Only succeeds while the claim is still our empty directory.
            let _ = fs::remove_dir(target);
        }
        return Err(placement_error(e, target));
    }
    Ok(())
}

fn placement_error(e: io::Error, target: &Path) -> MetamorphosisError {
    match e.kind() {
        io::ErrorKind::AlreadyExists | io::ErrorKind::DirectoryNotEmpty => {
            MetamorphosisError::TargetExists {
                path: target.to_path_buf(),
            }
        },
        _ => MetamorphosisError::io(target)(e),
    }
}

/// Version names become a single directory under the registry.
fn validate_name(name: &str) -> MetamorphosisResult<()> {
    let mut components = Path::new(name).components();
    let single_normal = matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none();
    if single_normal && !name.starts_with('.') && !name.contains(['/', '\\']) {
        Ok(())
    } else {
        Err(MetamorphosisError::InvalidVersionName {
            name: name.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("jre8u172").is_ok());
        assert!(validate_name("v2.1").is_ok());
        for bad in ["", ".", "..", "../v1", "a/b", "a\\b", ".hidden", "/abs"] {
            assert!(validate_name(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_move_into_place_never_replaces_existing_dir() {
        let base = tempfile::tempdir().unwrap();
        let staging = base.path().join(".inject-x");
        fs::create_dir_all(staging.join("bin")).unwrap();
        let target = base.path().join("v2");
        fs::create_dir(&target).unwrap();

        assert!(matches!(
            move_into_place(&staging, &target),
            Err(MetamorphosisError::TargetExists { .. })
        ));
        assert!(staging.join("bin").is_dir());
        assert!(target.is_dir());
        assert!(!target.join("bin").exists());
    }

    #[test]
    fn test_move_into_place_moves_whole_tree() {
        let base = tempfile::tempdir().unwrap();
        let staging = base.path().join(".inject-x");
        fs::create_dir_all(staging.join("bin")).unwrap();
        fs::write(staging.join("bin").join("run"), "x").unwrap();
        let target = base.path().join("v2");

        move_into_place(&staging, &target).unwrap();

        assert!(!staging.exists());
        assert_eq!(fs::read_to_string(target.join("bin").join("run")).unwrap(), "x");
    }

    #[test]
    fn test_drop_flag_spellings() {
        let base = InjectRequest::new("v1", "b.zip");
        assert!(base.clone().with_drop_flag(Some("YES")).drop_others);
        assert!(base.clone().with_drop_flag(Some("true")).drop_others);
        assert!(!base.clone().with_drop_flag(Some("no")).drop_others);
        assert!(!base.with_drop_flag(None).drop_others);
    }
}
